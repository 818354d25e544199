//! # Configuration Settings
//!
//! Defines the configuration structure for the secretdrop service and its loading from
//! `SECRETDROP_*` environment variables.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::tls::ApiTlsConfig;
use crate::errors::{Error, Result};
use crate::secrets::backends::vault::{DEFAULT_ADDRESS, DEFAULT_PREFIX, DEFAULT_TIMEOUT};
use crate::secrets::{BackendType, SecretString, VaultConfig};

/// Upper bound for reading a request and producing its response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Listener configuration
    pub server: ServerConfig,

    /// Per-client request limiting
    pub rate_limit: RateLimitConfig,

    /// Credential backend selection
    pub backend: BackendConfig,

    /// Logging and metrics
    pub observability: ObservabilityConfig,
}

/// HTTP/HTTPS listener configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Plain HTTP listener
    pub http_address: Option<SocketAddr>,

    /// HTTPS listener
    pub https_address: Option<SocketAddr>,

    /// Answer every HTTP request with a redirect to the HTTPS listener
    pub https_redirect: bool,

    /// Certificate and key for the HTTPS listener
    pub tls: Option<ApiTlsConfig>,

    /// CORS allowed origins (empty = no cross-origin access)
    pub allowed_origins: Vec<String>,

    /// Directory holding the HTML pages and static assets
    pub static_dir: PathBuf,

    /// Requests not answered within this window get `408 Request Timeout`
    pub request_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_address: Some(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080)),
            https_address: None,
            https_redirect: false,
            tls: None,
            allowed_origins: Vec::new(),
            static_dir: PathBuf::from("static"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Token bucket parameters per client address
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimitConfig {
    /// Sustained requests per second (0 = disabled)
    pub requests_per_second: f64,

    /// Bucket capacity
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { requests_per_second: 5.0, burst: 10 }
    }
}

impl RateLimitConfig {
    pub fn is_enabled(&self) -> bool {
        self.requests_per_second > 0.0
    }
}

/// Credential backend configuration
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendType,
    pub vault: VaultConfig,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self { kind: BackendType::Vault, vault: VaultConfig::default() }
    }
}

/// Observability configuration for logging and metrics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG` is unset
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,

    /// Prometheus exporter port (None = disabled)
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self { log_level: "info".to_string(), json_logging: false, metrics_port: None }
    }
}

impl ObservabilityConfig {
    /// Get metrics bind address (None if disabled)
    pub fn metrics_bind_address(&self) -> Option<SocketAddr> {
        self.metrics_port.map(|port| SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }
}

impl AppConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup: &lookup };

        let server = ServerConfig {
            http_address: env.parse_with("SECRETDROP_HTTP_BINDING_ADDRESS", parse_bind_address)?,
            https_address: env.parse_with("SECRETDROP_HTTPS_BINDING_ADDRESS", parse_bind_address)?,
            https_redirect: env.flag("SECRETDROP_HTTPS_REDIRECT_ENABLED")?.unwrap_or(false),
            tls: ApiTlsConfig::from_lookup(&lookup)?,
            allowed_origins: env
                .get("SECRETDROP_ALLOWED_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            static_dir: env
                .get("SECRETDROP_STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("static")),
            request_timeout: env
                .parse::<u64>("SECRETDROP_REQUEST_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };

        let defaults = RateLimitConfig::default();
        let rate_limit = RateLimitConfig {
            requests_per_second: env
                .parse::<f64>("SECRETDROP_RATE_LIMIT_RPS")?
                .unwrap_or(defaults.requests_per_second),
            burst: env.parse::<u32>("SECRETDROP_RATE_LIMIT_BURST")?.unwrap_or(defaults.burst),
        };

        let kind = match env.get("SECRETDROP_BACKEND") {
            Some(value) => value.parse::<BackendType>().map_err(Error::config)?,
            None => BackendType::Vault,
        };

        let vault = VaultConfig {
            address: env
                .get_or_fallback("SECRETDROP_VAULT_ADDR", "VAULT_ADDR")
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
            token: env.get_or_fallback("SECRETDROP_VAULT_TOKEN", "VAULT_TOKEN").map(SecretString::from),
            namespace: env.get_or_fallback("SECRETDROP_VAULT_NAMESPACE", "VAULT_NAMESPACE"),
            prefix: env.get("SECRETDROP_VAULT_PREFIX").unwrap_or_else(|| DEFAULT_PREFIX.to_string()),
            timeout: env
                .parse::<u64>("SECRETDROP_VAULT_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_TIMEOUT),
        };

        let observability = ObservabilityConfig {
            log_level: env.get("SECRETDROP_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            json_logging: env.flag("SECRETDROP_LOG_JSON")?.unwrap_or(false),
            metrics_port: env.parse::<u16>("SECRETDROP_METRICS_PORT")?.filter(|port| *port != 0),
        };

        let config = Self {
            server,
            rate_limit,
            backend: BackendConfig { kind, vault },
            observability,
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field rules
    pub fn validate(&self) -> Result<()> {
        let server = &self.server;

        if server.https_address.is_some() && server.tls.is_none() {
            return Err(Error::config(
                "HTTPS binding address requires SECRETDROP_TLS_CERT_FILEPATH and SECRETDROP_TLS_CERT_KEY_FILEPATH",
            ));
        }

        if server.tls.is_some() && server.https_address.is_none() {
            return Err(Error::config("TLS certificate configured without an HTTPS binding address"));
        }

        if server.https_address.is_none() && server.http_address.is_none() {
            return Err(Error::config("HTTP binding address is required when HTTPS is disabled"));
        }

        if server.https_redirect && (server.http_address.is_none() || server.https_address.is_none()) {
            return Err(Error::config("HTTPS redirect requires both HTTP and HTTPS binding addresses"));
        }

        if let (Some(http), Some(https)) = (server.http_address, server.https_address) {
            if http == https {
                return Err(Error::config("HTTP and HTTPS listeners cannot share an address"));
            }
        }

        if server.request_timeout.is_zero() {
            return Err(Error::config("Request timeout must be at least 1 second"));
        }

        if self.rate_limit.requests_per_second < 0.0 || !self.rate_limit.requests_per_second.is_finite() {
            return Err(Error::config("Rate limit must be a non-negative number"));
        }

        if self.rate_limit.is_enabled() && self.rate_limit.burst == 0 {
            return Err(Error::config("Rate limit burst must be at least 1"));
        }

        if self.backend.kind == BackendType::Vault {
            if self.backend.vault.token.is_none() {
                return Err(Error::config(
                    "Vault backend requires SECRETDROP_VAULT_TOKEN or VAULT_TOKEN",
                ));
            }
            if self.backend.vault.timeout.is_zero() {
                return Err(Error::config("Vault timeout must be at least 1 second"));
            }
        }

        Ok(())
    }
}

impl fmt::Display for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |addr: Option<SocketAddr>| addr.map_or_else(|| "disabled".to_string(), |a| a.to_string());

        writeln!(f, "http listener:   {}", show(self.server.http_address))?;
        writeln!(f, "https listener:  {}", show(self.server.https_address))?;
        writeln!(f, "https redirect:  {}", self.server.https_redirect)?;
        if let Some(tls) = &self.server.tls {
            writeln!(f, "tls certificate: {}", tls.cert_path.display())?;
        }
        writeln!(f, "static dir:      {}", self.server.static_dir.display())?;
        writeln!(f, "allowed origins: {}", self.server.allowed_origins.join(", "))?;
        writeln!(f, "request timeout: {}s", self.server.request_timeout.as_secs())?;
        if self.rate_limit.is_enabled() {
            writeln!(
                f,
                "rate limit:      {} rps, burst {}",
                self.rate_limit.requests_per_second, self.rate_limit.burst
            )?;
        } else {
            writeln!(f, "rate limit:      disabled")?;
        }
        writeln!(f, "backend:         {}", self.backend.kind)?;
        if self.backend.kind == BackendType::Vault {
            let vault = &self.backend.vault;
            writeln!(f, "vault address:   {}", vault.address)?;
            writeln!(f, "vault namespace: {}", vault.namespace.as_deref().unwrap_or("-"))?;
            writeln!(f, "vault prefix:    {}", vault.prefix)?;
            writeln!(f, "vault timeout:   {}s", vault.timeout.as_secs())?;
        }
        writeln!(f, "log level:       {}", self.observability.log_level)?;
        write!(f, "metrics:         {}", show(self.observability.metrics_bind_address()))
    }
}

/// Parse a listener address. Accepts `host:port` and the port-only `:port` shorthand.
pub fn parse_bind_address(value: &str) -> std::result::Result<SocketAddr, String> {
    if let Some(port) = value.strip_prefix(':') {
        let port = port.parse::<u16>().map_err(|e| format!("invalid port '{}': {}", port, e))?;
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }
    SocketAddr::from_str(value).map_err(|e| format!("invalid address '{}': {}", value, e))
}

struct Env<'a, F: Fn(&str) -> Option<String>> {
    lookup: &'a F,
}

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.lookup)(key).map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
    }

    fn get_or_fallback(&self, key: &str, fallback: &str) -> Option<String> {
        self.get(key).or_else(|| self.get(fallback))
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        self.parse_with(key, |value| value.parse::<T>().map_err(|e| e.to_string()))
    }

    fn parse_with<T>(
        &self,
        key: &str,
        parser: impl Fn(&str) -> std::result::Result<T, String>,
    ) -> Result<Option<T>> {
        self.get(key)
            .map(|value| parser(&value).map_err(|e| Error::config(format!("Invalid {}: {}", key, e))))
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)
            .map(|value| match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Ok(true),
                "0" | "false" | "no" | "off" => Ok(false),
                other => Err(Error::config(format!("Invalid {}: '{}' is not a boolean", key, other))),
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        AppConfig::from_lookup(move |key| vars.get(key).cloned())
    }

    const MINIMAL: &[(&str, &str)] =
        &[("SECRETDROP_HTTP_BINDING_ADDRESS", ":8082"), ("VAULT_TOKEN", "root")];

    #[test]
    fn test_minimal_config_defaults() {
        let config = load(MINIMAL).unwrap();

        assert_eq!(config.server.http_address, Some("0.0.0.0:8082".parse().unwrap()));
        assert_eq!(config.server.https_address, None);
        assert_eq!(config.server.static_dir, PathBuf::from("static"));
        assert_eq!(config.server.request_timeout, Duration::from_secs(10));
        assert_eq!(config.rate_limit, RateLimitConfig { requests_per_second: 5.0, burst: 10 });
        assert_eq!(config.backend.kind, BackendType::Vault);
        assert_eq!(config.backend.vault.address, "http://127.0.0.1:8200");
        assert_eq!(config.backend.vault.prefix, "cubbyhole/");
        assert_eq!(config.backend.vault.timeout, Duration::from_secs(10));
        assert_eq!(config.observability, ObservabilityConfig::default());
    }

    #[test]
    fn test_prefixed_vault_vars_win_over_fallbacks() {
        let config = load(&[
            ("SECRETDROP_HTTP_BINDING_ADDRESS", "127.0.0.1:8080"),
            ("VAULT_ADDR", "http://fallback:8200"),
            ("SECRETDROP_VAULT_ADDR", "https://vault.internal:8200"),
            ("VAULT_TOKEN", "fallback-token"),
            ("SECRETDROP_VAULT_TOKEN", "service-token"),
            ("VAULT_NAMESPACE", "team-a"),
        ])
        .unwrap();

        let vault = &config.backend.vault;
        assert_eq!(vault.address, "https://vault.internal:8200");
        assert_eq!(vault.token.as_ref().unwrap().expose_secret(), "service-token");
        assert_eq!(vault.namespace.as_deref(), Some("team-a"));
    }

    #[test]
    fn test_memory_backend_needs_no_token() {
        let config = load(&[
            ("SECRETDROP_HTTP_BINDING_ADDRESS", ":8080"),
            ("SECRETDROP_BACKEND", "memory"),
        ])
        .unwrap();
        assert_eq!(config.backend.kind, BackendType::Memory);
    }

    #[test]
    fn test_vault_backend_requires_token() {
        let err = load(&[("SECRETDROP_HTTP_BINDING_ADDRESS", ":8080")]).unwrap_err();
        assert!(err.to_string().contains("VAULT_TOKEN"));
    }

    #[test]
    fn test_listener_rules() {
        let err = load(&[("VAULT_TOKEN", "root")]).unwrap_err();
        assert!(err.to_string().contains("HTTP binding address is required"));

        let err = load(&[("VAULT_TOKEN", "root"), ("SECRETDROP_HTTPS_BINDING_ADDRESS", ":443")])
            .unwrap_err();
        assert!(err.to_string().contains("requires SECRETDROP_TLS_CERT_FILEPATH"));

        let err = load(&[
            ("VAULT_TOKEN", "root"),
            ("SECRETDROP_HTTP_BINDING_ADDRESS", ":80"),
            ("SECRETDROP_TLS_CERT_FILEPATH", "cert.pem"),
            ("SECRETDROP_TLS_CERT_KEY_FILEPATH", "key.pem"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("without an HTTPS binding address"));

        let err = load(&[
            ("VAULT_TOKEN", "root"),
            ("SECRETDROP_HTTP_BINDING_ADDRESS", ":80"),
            ("SECRETDROP_HTTPS_REDIRECT_ENABLED", "true"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("redirect requires both"));
    }

    #[test]
    fn test_https_only_with_redirect_listener() {
        let config = load(&[
            ("VAULT_TOKEN", "root"),
            ("SECRETDROP_HTTP_BINDING_ADDRESS", ":80"),
            ("SECRETDROP_HTTPS_BINDING_ADDRESS", ":443"),
            ("SECRETDROP_HTTPS_REDIRECT_ENABLED", "yes"),
            ("SECRETDROP_TLS_CERT_FILEPATH", "cert.pem"),
            ("SECRETDROP_TLS_CERT_KEY_FILEPATH", "key.pem"),
        ])
        .unwrap();

        assert!(config.server.https_redirect);
        assert_eq!(config.server.https_address.map(|a| a.port()), Some(443));
        assert!(config.server.tls.is_some());
    }

    #[test]
    fn test_rate_limit_settings() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("SECRETDROP_RATE_LIMIT_RPS", "0"));
        vars.push(("SECRETDROP_RATE_LIMIT_BURST", "0"));
        let config = load(&vars).unwrap();
        assert!(!config.rate_limit.is_enabled());

        let mut vars = MINIMAL.to_vec();
        vars.push(("SECRETDROP_RATE_LIMIT_BURST", "0"));
        assert!(load(&vars).is_err());

        let mut vars = MINIMAL.to_vec();
        vars.push(("SECRETDROP_RATE_LIMIT_RPS", "fast"));
        let err = load(&vars).unwrap_err();
        assert!(err.to_string().contains("SECRETDROP_RATE_LIMIT_RPS"));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("SECRETDROP_LOG_JSON", "maybe"));
        assert!(matches!(load(&vars), Err(Error::Config(_))));

        let mut vars = MINIMAL.to_vec();
        vars.push(("SECRETDROP_BACKEND", "consul"));
        assert!(matches!(load(&vars), Err(Error::Config(_))));

        let mut vars = MINIMAL.to_vec();
        vars.push(("SECRETDROP_REQUEST_TIMEOUT_SECS", "0"));
        assert!(matches!(load(&vars), Err(Error::Config(_))));

        let err = load(&[("VAULT_TOKEN", "root"), ("SECRETDROP_HTTP_BINDING_ADDRESS", "nowhere")])
            .unwrap_err();
        assert!(err.to_string().contains("SECRETDROP_HTTP_BINDING_ADDRESS"));
    }

    #[test]
    fn test_allowed_origins_and_observability() {
        let mut vars = MINIMAL.to_vec();
        vars.push(("SECRETDROP_ALLOWED_ORIGINS", "https://a.example, https://b.example,"));
        vars.push(("SECRETDROP_LOG_JSON", "1"));
        vars.push(("SECRETDROP_METRICS_PORT", "9102"));
        vars.push(("SECRETDROP_REQUEST_TIMEOUT_SECS", "30"));
        let config = load(&vars).unwrap();

        assert_eq!(config.server.request_timeout, Duration::from_secs(30));

        assert_eq!(config.server.allowed_origins, vec!["https://a.example", "https://b.example"]);
        assert!(config.observability.json_logging);
        assert_eq!(
            config.observability.metrics_bind_address(),
            Some("0.0.0.0:9102".parse().unwrap())
        );
    }

    #[test]
    fn test_display_hides_token() {
        let config = load(MINIMAL).unwrap();
        let summary = config.to_string();
        assert!(summary.contains("backend:         vault"));
        assert!(!summary.contains("root"));
    }

    #[test]
    fn test_parse_bind_address() {
        assert_eq!(parse_bind_address(":8080").unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(parse_bind_address("[::1]:443").unwrap(), "[::1]:443".parse().unwrap());
        assert!(parse_bind_address(":http").is_err());
        assert!(parse_bind_address("localhost").is_err());
    }
}
