//! Utility functions and helpers

pub mod certificates;

pub use certificates::{load_certificate_bundle, CertificateBundle, CertificateInfo};
