//! # Observability Infrastructure
//!
//! Structured logging through `tracing`, request tracing middleware and Prometheus
//! metrics for the secretdrop service.

pub mod http_tracing;
pub mod logging;
pub mod metrics;

pub use http_tracing::trace_http_requests;
pub use logging::{init_logging, log_config_info};
pub use metrics::{init_metrics, MetricsRecorder, RetrievalOutcome, SecretKind};

use crate::config::ObservabilityConfig;
use crate::errors::Result;
use ::tracing::info;

/// Initialize logging, then the metrics exporter when a port is configured
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    init_logging(config)?;
    init_metrics(config)?;

    info!(
        log_level = %config.log_level,
        json_logging = config.json_logging,
        metrics_enabled = config.metrics_port.is_some(),
        "Observability initialized successfully"
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_observability_without_metrics() {
        let config = ObservabilityConfig { metrics_port: None, ..Default::default() };
        assert!(init_observability(&config).is_ok());
    }
}
