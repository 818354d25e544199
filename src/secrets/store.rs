//! The one-time secret store.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::backends::CredentialBackend;
use super::error::{Result, SecretsError};
use super::lifecycle::{resolve_ttl, TokenLifecycleManager};
use super::types::SecretString;

/// Store a secret once, read it once.
///
/// `store` returns a token bound to exactly one stored secret. `get` hands that secret back
/// and destroys it in the same step; afterwards, and after the TTL, the token yields
/// [`SecretsError::NotFound`].
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Store `secret` for at most `ttl` (empty means the 48h default).
    async fn store(&self, secret: &str, ttl: &str) -> Result<String>;

    /// Read and destroy the secret bound to `token`.
    async fn get(&self, token: &str) -> Result<SecretString>;
}

/// [`SecretStore`] built on a [`CredentialBackend`]: mint a one-time credential, then write
/// the secret keyed by it.
#[derive(Debug, Clone)]
pub struct OneTimeSecretStore {
    lifecycle: TokenLifecycleManager,
    backend: Arc<dyn CredentialBackend>,
}

impl OneTimeSecretStore {
    pub fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self { lifecycle: TokenLifecycleManager::new(Arc::clone(&backend)), backend }
    }
}

#[async_trait]
impl SecretStore for OneTimeSecretStore {
    async fn store(&self, secret: &str, ttl: &str) -> Result<String> {
        let ttl = resolve_ttl(ttl)?;
        let token = self.lifecycle.mint(ttl).await?;

        let payload = SecretString::new(secret);
        if let Err(err) = self.backend.write(&token, &payload).await {
            // The minted credential is not revoked; it expires on its own.
            warn!(
                backend = %self.backend.backend_type(),
                error = %err,
                "Secret write failed after credential was minted"
            );
            return Err(match err {
                SecretsError::Storage { .. } => err,
                other => SecretsError::storage(other.to_string()),
            });
        }

        debug!(backend = %self.backend.backend_type(), ttl_secs = ttl.as_secs(), "Stored secret");
        Ok(token)
    }

    async fn get(&self, token: &str) -> Result<SecretString> {
        self.backend.consume(token).await
    }
}
