use std::path::PathBuf;

use crate::{errors::TlsError, Result};

/// Manually provisioned TLS material for the HTTPS listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiTlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

impl ApiTlsConfig {
    /// Load TLS paths from environment variables.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load TLS paths through `lookup`.
    ///
    /// Neither path set means TLS is off. Setting only one of them is an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |key: &str| {
            lookup(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
        };

        let cert_path = read("SECRETDROP_TLS_CERT_FILEPATH");
        let key_path = read("SECRETDROP_TLS_CERT_KEY_FILEPATH");

        match (cert_path, key_path) {
            (None, None) => Ok(None),
            (Some(_), None) => Err(TlsError::MissingPrivateKeyPath.into()),
            (None, Some(_)) => Err(TlsError::MissingCertificatePath.into()),
            (Some(cert_path), Some(key_path)) => Ok(Some(Self {
                cert_path: PathBuf::from(cert_path),
                key_path: PathBuf::from(key_path),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::Error;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_tls_disabled_when_unset() {
        assert_eq!(ApiTlsConfig::from_lookup(lookup(&[])).unwrap(), None);
        assert_eq!(
            ApiTlsConfig::from_lookup(lookup(&[("SECRETDROP_TLS_CERT_FILEPATH", "  ")])).unwrap(),
            None
        );
    }

    #[test]
    fn test_tls_paths_loaded() {
        let config = ApiTlsConfig::from_lookup(lookup(&[
            ("SECRETDROP_TLS_CERT_FILEPATH", "/etc/tls/cert.pem"),
            ("SECRETDROP_TLS_CERT_KEY_FILEPATH", "/etc/tls/key.pem"),
        ]))
        .unwrap()
        .unwrap();

        assert_eq!(config.cert_path, PathBuf::from("/etc/tls/cert.pem"));
        assert_eq!(config.key_path, PathBuf::from("/etc/tls/key.pem"));
    }

    #[test]
    fn test_tls_paths_must_be_paired() {
        let err = ApiTlsConfig::from_lookup(lookup(&[(
            "SECRETDROP_TLS_CERT_FILEPATH",
            "/etc/tls/cert.pem",
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::Tls(TlsError::MissingPrivateKeyPath)));

        let err = ApiTlsConfig::from_lookup(lookup(&[(
            "SECRETDROP_TLS_CERT_KEY_FILEPATH",
            "/etc/tls/key.pem",
        )]))
        .unwrap_err();
        assert!(matches!(err, Error::Tls(TlsError::MissingCertificatePath)));
    }
}
