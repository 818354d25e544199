//! Pluggable credential backends
//!
//! ## Supported Backends
//!
//! - **Vault**: limited-use tokens from the token store, payloads in the token's cubbyhole
//! - **Memory**: in-process table with the same semantics, for development and tests

pub mod backend;
pub mod memory;
pub mod vault;

pub use backend::{BackendType, CredentialBackend};
pub use memory::MemoryCredentialBackend;
pub use vault::{VaultConfig, VaultCredentialBackend};
