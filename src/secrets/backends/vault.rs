//! Vault credential backend implementation
//!
//! Mints limited-use child tokens through `auth/token/create` and keeps each secret in
//! the cubbyhole of its own token. The write and the read each spend one token use, so
//! after the single read Vault revokes the token and destroys the cubbyhole with it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vaultrs::api::token::requests::CreateTokenRequestBuilder;
use vaultrs::client::{VaultClient, VaultClientSettingsBuilder};
use vaultrs::error::ClientError;
use vaultrs::{kv1, token};

use super::backend::{BackendType, CredentialBackend};
use crate::errors::Error;
use crate::secrets::error::{Result, SecretsError};
use crate::secrets::lifecycle::CredentialRequest;
use crate::secrets::types::SecretString;

/// Field holding the payload inside the cubbyhole entry.
const PAYLOAD_KEY: &str = "msg";

/// Default cubbyhole location.
pub const DEFAULT_PREFIX: &str = "cubbyhole/";

/// Default address used when nothing is configured.
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:8200";

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the Vault backend
#[derive(Debug, Clone)]
pub struct VaultConfig {
    /// Vault server address
    pub address: String,
    /// Service token used to mint child tokens
    pub token: Option<SecretString>,
    /// Vault namespace (for Enterprise)
    pub namespace: Option<String>,
    /// Path prefix under which secrets are written, e.g. `cubbyhole/`
    pub prefix: String,
    /// Deadline applied to every Vault call
    pub timeout: Duration,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            token: None,
            namespace: None,
            prefix: DEFAULT_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Splits a configured prefix into the kv mount and the sub-path inside it.
fn split_prefix(prefix: &str) -> (String, String) {
    let trimmed = prefix.trim_matches('/');
    match trimmed.split_once('/') {
        Some((mount, rest)) => (mount.to_string(), rest.to_string()),
        None => (trimmed.to_string(), String::new()),
    }
}

/// HashiCorp Vault credential backend
pub struct VaultCredentialBackend {
    client: Arc<VaultClient>,
    config: VaultConfig,
    mount: String,
    sub_path: String,
}

impl std::fmt::Debug for VaultCredentialBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultCredentialBackend")
            .field("address", &self.config.address)
            .field("mount", &self.mount)
            .field("client", &"[VaultClient]")
            .finish()
    }
}

impl VaultCredentialBackend {
    /// Create a new Vault backend with the given configuration
    pub fn new(config: VaultConfig) -> crate::errors::Result<Self> {
        if config.address.trim().is_empty() {
            return Err(Error::config("Vault address cannot be empty"));
        }

        let (mount, sub_path) = split_prefix(&config.prefix);
        if mount.is_empty() {
            return Err(Error::config("Vault prefix must name a mount, e.g. 'cubbyhole/'"));
        }

        let client = build_client(&config, config.token.as_ref().map(SecretString::expose_secret))
            .map_err(|e| Error::config(format!("Failed to create Vault client: {}", e)))?;

        info!(
            address = %config.address,
            mount = %mount,
            timeout_secs = config.timeout.as_secs(),
            "Initialized Vault credential backend"
        );

        Ok(Self { client: Arc::new(client), config, mount, sub_path })
    }

    /// Client authenticated with the service token.
    pub fn client(&self) -> Arc<VaultClient> {
        Arc::clone(&self.client)
    }

    fn secret_path(&self, token: &str) -> String {
        if self.sub_path.is_empty() {
            token.to_string()
        } else {
            format!("{}/{}", self.sub_path, token)
        }
    }

    /// Client authenticated with a one-time token, so that each call spends one of its uses.
    fn scoped_client(&self, token: &str) -> Result<VaultClient> {
        build_client(&self.config, Some(token))
            .map_err(|e| SecretsError::storage(format!("failed to build scoped Vault client: {}", e)))
    }

    async fn with_deadline<T, F>(&self, operation: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!(operation, timeout_secs = self.config.timeout.as_secs(), "Vault call timed out");
                Err(SecretsError::storage(format!("vault {} timed out", operation)))
            }
        }
    }
}

fn build_client(config: &VaultConfig, token: Option<&str>) -> std::result::Result<VaultClient, String> {
    let mut settings_builder = VaultClientSettingsBuilder::default();
    settings_builder.address(&config.address);

    if let Some(token) = token {
        settings_builder.token(token);
    }

    if let Some(ref namespace) = config.namespace {
        settings_builder.namespace(Some(namespace.clone()));
    }

    let settings = settings_builder.build().map_err(|e| e.to_string())?;
    VaultClient::new(settings).map_err(|e| e.to_string())
}

/// Maps a failed cubbyhole read. Vault answers 400/403/404 for unknown, revoked and
/// exhausted tokens alike.
fn map_consume_error(err: ClientError) -> SecretsError {
    match err {
        ClientError::APIError { code: 400 | 403 | 404, .. } => SecretsError::NotFound,
        other => SecretsError::storage(format!("vault read failed: {}", other)),
    }
}

#[async_trait]
impl CredentialBackend for VaultCredentialBackend {
    async fn mint(&self, request: &CredentialRequest) -> Result<String> {
        let mut builder = CreateTokenRequestBuilder::default();
        builder
            .num_uses(request.num_uses)
            .renewable(request.renewable)
            .explicit_max_ttl(request.explicit_max_ttl_param())
            .meta(request.metadata.clone());

        let auth = self
            .with_deadline("token create", async {
                token::new(self.client.as_ref(), Some(&mut builder))
                    .await
                    .map_err(|e| SecretsError::storage(format!("vault token create failed: {}", e)))
            })
            .await?;

        debug!(accessor = %auth.accessor, "Created limited-use Vault token");
        Ok(auth.client_token)
    }

    async fn write(&self, token: &str, payload: &SecretString) -> Result<()> {
        let client = self.scoped_client(token)?;
        let path = self.secret_path(token);
        let data = HashMap::from([(PAYLOAD_KEY, payload.expose_secret())]);

        self.with_deadline("cubbyhole write", async {
            kv1::set(&client, &self.mount, &path, &data)
                .await
                .map_err(|e| SecretsError::storage(format!("vault write failed: {}", e)))
        })
        .await
    }

    async fn consume(&self, token: &str) -> Result<SecretString> {
        let client = self.scoped_client(token)?;
        let path = self.secret_path(token);

        let mut data = self
            .with_deadline("cubbyhole read", async {
                kv1::get::<HashMap<String, String>>(&client, &self.mount, &path)
                    .await
                    .map_err(map_consume_error)
            })
            .await?;

        data.remove(PAYLOAD_KEY)
            .map(SecretString::from)
            .ok_or_else(|| SecretsError::storage("cubbyhole entry has no payload"))
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Vault
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_prefix() {
        assert_eq!(split_prefix("cubbyhole/"), ("cubbyhole".to_string(), String::new()));
        assert_eq!(split_prefix("cubbyhole"), ("cubbyhole".to_string(), String::new()));
        assert_eq!(
            split_prefix("cubbyhole/drops/"),
            ("cubbyhole".to_string(), "drops".to_string())
        );
    }

    #[test]
    fn test_secret_path_includes_sub_path() {
        let backend = VaultCredentialBackend::new(VaultConfig {
            prefix: "cubbyhole/drops/".to_string(),
            ..VaultConfig::default()
        })
        .unwrap();
        assert_eq!(backend.secret_path("hvs.X"), "drops/hvs.X");

        let backend = VaultCredentialBackend::new(VaultConfig::default()).unwrap();
        assert_eq!(backend.secret_path("hvs.X"), "hvs.X");
    }

    #[test]
    fn test_rejects_empty_address_and_mount() {
        let err = VaultCredentialBackend::new(VaultConfig {
            address: " ".to_string(),
            ..VaultConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = VaultCredentialBackend::new(VaultConfig {
            prefix: "/".to_string(),
            ..VaultConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_consume_error_mapping() {
        for code in [400, 403, 404] {
            let err = map_consume_error(ClientError::APIError { code, errors: vec![] });
            assert!(err.is_not_found(), "code {code}");
        }

        let err = map_consume_error(ClientError::APIError {
            code: 500,
            errors: vec!["internal".to_string()],
        });
        assert!(matches!(err, SecretsError::Storage { .. }));
    }

    #[test]
    fn test_debug_hides_token() {
        let backend = VaultCredentialBackend::new(VaultConfig {
            token: Some(SecretString::new("hvs.service-token")),
            ..VaultConfig::default()
        })
        .unwrap();
        let debug = format!("{backend:?}");
        assert!(!debug.contains("service-token"));
    }
}
