//! In-process credential backend
//!
//! Mirrors Vault's limited-use token semantics on a `DashMap`, for development and tests.
//! Consumption runs under the shard write lock held by the map entry, which makes the
//! use-count decrement and the read a single step.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tokio::time::Instant;
use tracing::debug;

use super::backend::{BackendType, CredentialBackend};
use crate::secrets::error::{Result, SecretsError};
use crate::secrets::lifecycle::CredentialRequest;
use crate::secrets::types::SecretString;

const TOKEN_PREFIX: &str = "hvs.";
const TOKEN_BODY_LEN: usize = 24;

#[derive(Debug)]
struct Credential {
    uses_remaining: u64,
    expires_at: Instant,
    payload: Option<SecretString>,
}

impl Credential {
    fn is_live(&self, now: Instant) -> bool {
        self.uses_remaining > 0 && now < self.expires_at
    }
}

/// Credential table keyed by token.
#[derive(Debug, Default)]
pub struct MemoryCredentialBackend {
    credentials: DashMap<String, Credential>,
}

impl MemoryCredentialBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of credentials currently held, live or not yet purged.
    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    fn purge_expired(&self, now: Instant) {
        self.credentials.retain(|_, credential| credential.is_live(now));
    }

    fn generate_token() -> String {
        let body: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(TOKEN_BODY_LEN)
            .map(char::from)
            .collect();
        format!("{TOKEN_PREFIX}{body}")
    }

    /// Spend one use of `token`, dropping the credential once it is exhausted.
    ///
    /// Returns the payload stored before this use, or `None` if the token was not live.
    fn spend_use(&self, token: &str, replacement: Option<&SecretString>) -> Option<Option<SecretString>> {
        let now = Instant::now();
        let Entry::Occupied(mut occupied) = self.credentials.entry(token.to_string()) else {
            return None;
        };

        if !occupied.get().is_live(now) {
            occupied.remove();
            return None;
        }

        let credential = occupied.get_mut();
        credential.uses_remaining -= 1;
        let previous = match replacement {
            Some(payload) => credential.payload.replace(payload.clone()),
            None => credential.payload.clone(),
        };

        if credential.uses_remaining == 0 {
            occupied.remove();
        }

        Some(previous)
    }
}

#[async_trait]
impl CredentialBackend for MemoryCredentialBackend {
    async fn mint(&self, request: &CredentialRequest) -> Result<String> {
        let now = Instant::now();
        self.purge_expired(now);

        if request.num_uses == 0 {
            return Err(SecretsError::storage("credential must allow at least one use"));
        }

        loop {
            let token = Self::generate_token();
            if let Entry::Vacant(vacant) = self.credentials.entry(token.clone()) {
                vacant.insert(Credential {
                    uses_remaining: request.num_uses,
                    expires_at: now + request.explicit_max_ttl,
                    payload: None,
                });
                debug!(live_credentials = self.credentials.len(), "Minted in-memory credential");
                return Ok(token);
            }
        }
    }

    async fn write(&self, token: &str, payload: &SecretString) -> Result<()> {
        match self.spend_use(token, Some(payload)) {
            Some(_) => Ok(()),
            None => Err(SecretsError::storage("permission denied")),
        }
    }

    async fn consume(&self, token: &str) -> Result<SecretString> {
        self.spend_use(token, None).flatten().ok_or(SecretsError::NotFound)
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Memory
    }
}
