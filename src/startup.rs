//! Startup sequence for secretdrop
//!
//! Builds the credential backend named in the configuration, the secret store and
//! handler on top of it, and, for Vault, the renewal task for the service token.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::{start_api_server, ApiState};
use crate::config::{AppConfig, BackendConfig};
use crate::errors::Result;
use crate::secrets::{
    BackendType, CredentialBackend, MemoryCredentialBackend, OneTimeSecretStore, RenewalHandle,
    TokenRenewer, VaultCredentialBackend,
};
use crate::services::SecretHandler;

/// Everything request handling needs, plus the background work tied to it.
#[derive(Debug)]
pub struct Services {
    pub secrets: SecretHandler,
    pub renewer: Option<RenewalHandle>,
}

impl Services {
    /// Stop background tasks.
    pub async fn shutdown(self) {
        if let Some(renewer) = self.renewer {
            renewer.stop().await;
        }
    }
}

/// Construct the backend and the services layered on it.
pub fn build_services(config: &BackendConfig) -> Result<Services> {
    let (backend, renewer): (Arc<dyn CredentialBackend>, Option<RenewalHandle>) = match config.kind
    {
        BackendType::Vault => {
            let vault = VaultCredentialBackend::new(config.vault.clone())?;
            let renewer = TokenRenewer::new(vault.client()).start();
            info!(address = %config.vault.address, prefix = %config.vault.prefix, "Using Vault backend");
            (Arc::new(vault), Some(renewer))
        }
        BackendType::Memory => {
            info!("Using in-memory backend; secrets do not survive a restart");
            (Arc::new(MemoryCredentialBackend::new()), None)
        }
    };

    let store = OneTimeSecretStore::new(backend);
    Ok(Services { secrets: SecretHandler::new(Arc::new(store)), renewer })
}

/// Serve until `shutdown` fires, then stop the background tasks.
pub async fn run(config: AppConfig, shutdown: CancellationToken) -> Result<()> {
    let services = build_services(&config.backend)?;
    let state = ApiState::new(services.secrets.clone(), config.server.static_dir.clone());

    let result = start_api_server(&config, state, shutdown).await;
    services.shutdown().await;
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_has_no_renewer() {
        let config = BackendConfig { kind: BackendType::Memory, ..Default::default() };
        let services = build_services(&config).unwrap();
        assert!(services.renewer.is_none());
        services.shutdown().await;
    }

    #[tokio::test]
    async fn test_vault_backend_starts_renewer() {
        let mut config = BackendConfig { kind: BackendType::Vault, ..Default::default() };
        // Nothing listens here; the renewer only logs its failed lookups.
        config.vault.address = "http://127.0.0.1:1".to_string();
        config.vault.token = Some("hvs.service-token".into());

        let services = build_services(&config).unwrap();
        assert!(services.renewer.is_some());
        services.shutdown().await;
    }
}
