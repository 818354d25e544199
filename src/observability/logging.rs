//! # Structured Logging
//!
//! Installs the global `tracing` subscriber and provides the request span macro used by
//! the HTTP middleware. Secret payloads and tokens are never recorded as fields.

use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::config::{AppConfig, ObservabilityConfig};
use crate::errors::{Error, Result};

/// Create a tracing span for request tracking.
///
/// ```rust,ignore
/// let span = request_span!("GET", "/secret");
/// let span = request_span!("POST", "/secret", client = "10.0.0.1");
/// ```
#[macro_export]
macro_rules! request_span {
    ($method:expr, $path:expr) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4()
        )
    };
    ($method:expr, $path:expr, $($field:tt)*) => {
        tracing::info_span!(
            "http_request",
            method = %$method,
            path = %$path,
            request_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Build the filter: `RUST_LOG` when set, otherwise the configured level.
pub fn build_env_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.log_level)
        .map_err(|e| Error::config(format!("Invalid log level '{}': {}", config.log_level, e)))
}

/// Install the global subscriber.
///
/// A subscriber that is already installed (integration tests, repeated calls) is kept.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let builder = FmtSubscriber::builder().with_env_filter(build_env_filter(config)?);

    let installed = if config.json_logging {
        tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };

    if installed.is_err() {
        tracing::debug!("Global tracing subscriber already set; keeping the existing one");
    }

    Ok(())
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        http_address = ?config.server.http_address,
        https_address = ?config.server.https_address,
        https_redirect = config.server.https_redirect,
        backend = %config.backend.kind,
        rate_limit_rps = config.rate_limit.requests_per_second,
        rate_limit_burst = config.rate_limit.burst,
        metrics_enabled = config.observability.metrics_port.is_some(),
        "secretdrop configuration"
    );
}
