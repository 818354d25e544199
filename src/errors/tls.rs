use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// TLS-specific error variants surfaced during configuration and certificate loading.
#[derive(Debug, Error)]
pub enum TlsError {
    /// A key path was configured without a certificate path.
    #[error("TLS certificate path is not configured")]
    MissingCertificatePath,

    /// A certificate path was configured without a key path.
    #[error("TLS private key path is not configured")]
    MissingPrivateKeyPath,

    /// The certificate file could not be read.
    #[error("Failed to read certificate at {path}: {source}")]
    CertificateReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The private key file could not be read.
    #[error("Failed to read private key at {path}: {source}")]
    PrivateKeyReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No certificates were found in the supplied PEM file.
    #[error("Certificate file {path} does not contain any certificates")]
    EmptyCertificateChain { path: PathBuf },

    /// The certificate PEM contents were invalid or unreadable.
    #[error("Certificate file {path} is not a valid PEM: {source}")]
    InvalidCertificatePem {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// The private key PEM contents were invalid or unsupported.
    #[error("Private key file {path} does not contain a supported private key")]
    InvalidPrivateKey {
        path: PathBuf,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// The certificate is expired.
    #[error("Certificate at {path} expired at {not_after}")]
    CertificateExpired { path: PathBuf, not_after: DateTime<Utc> },

    /// Generic metadata extraction failure.
    #[error("Failed to extract certificate metadata from {path}: {source}")]
    CertificateMetadata {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// rustls refused the certificate/key pair.
    #[error("Failed to build TLS server configuration: {0}")]
    ServerConfig(#[from] rustls::Error),
}
