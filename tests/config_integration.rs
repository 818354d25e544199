//! Integration tests for configuration loading from the process environment.

use std::env;
use std::sync::Mutex;

use secretdrop::{config::AppConfig, secrets::BackendType, Error, Result};

// Tests that modify environment variables run one at a time
static ENV_MUTEX: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "SECRETDROP_HTTP_BINDING_ADDRESS",
    "SECRETDROP_HTTPS_BINDING_ADDRESS",
    "SECRETDROP_HTTPS_REDIRECT_ENABLED",
    "SECRETDROP_TLS_CERT_FILEPATH",
    "SECRETDROP_TLS_CERT_KEY_FILEPATH",
    "SECRETDROP_BACKEND",
    "SECRETDROP_RATE_LIMIT_RPS",
    "SECRETDROP_RATE_LIMIT_BURST",
    "SECRETDROP_VAULT_TOKEN",
    "VAULT_TOKEN",
];

/// Run `test` with exactly `vars` set among [`VARS`], restoring the originals afterwards.
fn with_env<T>(vars: &[(&str, &str)], test: impl FnOnce() -> T) -> T {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let saved: Vec<(&str, Option<String>)> =
        VARS.iter().map(|name| (*name, env::var(name).ok())).collect();
    for name in VARS {
        env::remove_var(name);
    }
    for (name, value) in vars {
        env::set_var(name, value);
    }

    let result = test();

    for (name, value) in saved {
        match value {
            Some(value) => env::set_var(name, value),
            None => env::remove_var(name),
        }
    }
    result
}

#[test]
fn test_config_environment_integration() -> Result<()> {
    let config = with_env(
        &[
            ("SECRETDROP_HTTP_BINDING_ADDRESS", "127.0.0.1:18080"),
            ("SECRETDROP_BACKEND", "memory"),
            ("SECRETDROP_RATE_LIMIT_RPS", "2.5"),
            ("SECRETDROP_RATE_LIMIT_BURST", "4"),
        ],
        AppConfig::from_env,
    )?;

    assert_eq!(config.server.http_address, Some("127.0.0.1:18080".parse().unwrap()));
    assert_eq!(config.backend.kind, BackendType::Memory);
    assert_eq!(config.rate_limit.requests_per_second, 2.5);
    assert_eq!(config.rate_limit.burst, 4);
    Ok(())
}

#[test]
fn test_vault_token_fallback_from_environment() -> Result<()> {
    let config = with_env(
        &[("SECRETDROP_HTTP_BINDING_ADDRESS", ":8080"), ("VAULT_TOKEN", "hvs.from-vault-env")],
        AppConfig::from_env,
    )?;

    let token = config.backend.vault.token.as_ref().unwrap();
    assert_eq!(token.expose_secret(), "hvs.from-vault-env");
    assert!(!config.to_string().contains("from-vault-env"));
    Ok(())
}

#[test]
fn test_invalid_environment_is_config_error() {
    let cases: &[&[(&str, &str)]] = &[
        &[("SECRETDROP_HTTP_BINDING_ADDRESS", "not-an-address"), ("SECRETDROP_BACKEND", "memory")],
        &[("SECRETDROP_HTTP_BINDING_ADDRESS", ":8080"), ("SECRETDROP_BACKEND", "etcd")],
        &[
            ("SECRETDROP_HTTP_BINDING_ADDRESS", ":8080"),
            ("SECRETDROP_BACKEND", "memory"),
            ("SECRETDROP_RATE_LIMIT_RPS", "fast"),
        ],
        &[
            ("SECRETDROP_HTTP_BINDING_ADDRESS", ":8080"),
            ("SECRETDROP_BACKEND", "memory"),
            ("SECRETDROP_HTTPS_REDIRECT_ENABLED", "true"),
        ],
    ];

    for vars in cases {
        let result = with_env(vars, AppConfig::from_env);
        assert!(matches!(result, Err(Error::Config(_))), "{vars:?}");
    }
}

#[test]
fn test_unpaired_tls_path_is_tls_error() {
    let result = with_env(
        &[
            ("SECRETDROP_HTTPS_BINDING_ADDRESS", ":8443"),
            ("SECRETDROP_BACKEND", "memory"),
            ("SECRETDROP_TLS_CERT_FILEPATH", "/etc/secretdrop/cert.pem"),
        ],
        AppConfig::from_env,
    );
    assert!(matches!(result, Err(Error::Tls(_))));
}
