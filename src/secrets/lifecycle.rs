//! Minting of one-time credentials.
//!
//! Each stored secret is guarded by its own credential whose usage budget covers exactly
//! the write that stores the secret plus one read. The credential also carries a hard
//! TTL ceiling and cannot be renewed, so it dies at the first successful read or at the
//! deadline, whichever comes first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::backends::CredentialBackend;
use super::error::Result;
use crate::validation::{check_ttl_bounds, validate_ttl, DEFAULT_TTL};

/// Uses spent by the store write.
pub const WRITE_USES: u64 = 1;

/// Uses left for readers.
pub const READ_USES: u64 = 1;

/// Metadata attached to every minted credential.
pub const CREDENTIAL_NAME: &str = "secretdrop";

/// Parameters for a backend credential.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRequest {
    pub num_uses: u64,
    pub explicit_max_ttl: Duration,
    pub renewable: bool,
    pub metadata: HashMap<String, String>,
}

impl CredentialRequest {
    /// A credential good for one write and one read within `ttl`.
    pub fn one_time(ttl: Duration) -> Self {
        Self {
            num_uses: WRITE_USES + READ_USES,
            explicit_max_ttl: ttl,
            renewable: false,
            metadata: HashMap::from([("name".to_string(), CREDENTIAL_NAME.to_string())]),
        }
    }

    /// TTL in the whole-second form token APIs accept, e.g. `"3600s"`.
    pub fn explicit_max_ttl_param(&self) -> String {
        format!("{}s", self.explicit_max_ttl.as_secs())
    }
}

/// Resolve a caller TTL: empty means [`DEFAULT_TTL`], anything else must validate.
pub fn resolve_ttl(ttl: &str) -> Result<Duration> {
    Ok(validate_ttl(ttl)?.unwrap_or(DEFAULT_TTL))
}

/// Issues one-time credentials through a [`CredentialBackend`].
#[derive(Debug, Clone)]
pub struct TokenLifecycleManager {
    backend: Arc<dyn CredentialBackend>,
}

impl TokenLifecycleManager {
    pub fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self { backend }
    }

    /// Mint a credential for a secret living at most `ttl`.
    ///
    /// Out-of-range TTLs fail here, before the backend is contacted.
    pub async fn mint(&self, ttl: Duration) -> Result<String> {
        check_ttl_bounds(ttl)?;

        let request = CredentialRequest::one_time(ttl);
        let token = self.backend.mint(&request).await?;

        debug!(
            backend = %self.backend.backend_type(),
            ttl_secs = ttl.as_secs(),
            num_uses = request.num_uses,
            "Minted one-time credential"
        );

        Ok(token)
    }
}
