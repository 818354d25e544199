//! # Secret Lifecycle
//!
//! Store-once, read-once secrets guarded by limited-use credentials.
//!
//! - [`SecretStore`]: the backend-agnostic contract (`store` returns a token, `get`
//!   returns the secret and destroys it)
//! - [`TokenLifecycleManager`]: mints credentials good for one write plus one read,
//!   capped by the requested TTL
//! - [`backends`]: Vault and in-memory [`CredentialBackend`] implementations
//! - [`TokenRenewer`]: keeps the service's own Vault token alive
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use secretdrop::secrets::{MemoryCredentialBackend, OneTimeSecretStore, SecretStore};
//!
//! let store = OneTimeSecretStore::new(Arc::new(MemoryCredentialBackend::new()));
//! let token = store.store("hello", "1h").await?;
//! assert_eq!(store.get(&token).await?.expose_secret(), "hello");
//! assert!(store.get(&token).await.unwrap_err().is_not_found());
//! ```

pub mod backends;
pub mod error;
pub mod lifecycle;
pub mod renewal;
pub mod store;
pub mod types;

pub use backends::{
    BackendType, CredentialBackend, MemoryCredentialBackend, VaultConfig, VaultCredentialBackend,
};
pub use error::{Result, SecretsError};
pub use lifecycle::{resolve_ttl, CredentialRequest, TokenLifecycleManager};
pub use renewal::{RenewalHandle, TokenRenewer};
pub use store::{OneTimeSecretStore, SecretStore};
pub use types::SecretString;
