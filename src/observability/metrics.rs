//! # Metrics Collection
//!
//! Prometheus metrics for HTTP traffic and the secret lifecycle. Without an installed
//! exporter the `metrics` macros are no-ops, so recording is always safe.

use ::tracing::info;
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};

/// Kind of payload a created secret carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    Message,
    File,
}

impl SecretKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::File => "file",
        }
    }
}

/// Result of a retrieval attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalOutcome {
    Success,
    NotFound,
    Invalid,
    Error,
}

impl RetrievalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::Invalid => "invalid",
            Self::Error => "error",
        }
    }
}

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record an HTTP request
    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration: f64) {
        counter!(
            "http_requests_total",
            "method" => method.to_string(),
            "path" => path.to_string(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            "http_request_duration_seconds",
            "method" => method.to_string(),
            "path" => path.to_string()
        )
        .record(duration);
    }

    /// Record a stored secret
    pub fn record_secret_created(&self, kind: SecretKind) {
        counter!("secrets_created_total", "kind" => kind.as_str()).increment(1);
    }

    /// Record a create request that failed after validation
    pub fn record_store_failure(&self) {
        counter!("secret_store_failures_total").increment(1);
    }

    /// Record a retrieval attempt
    pub fn record_retrieval(&self, outcome: RetrievalOutcome) {
        counter!("secret_retrievals_total", "outcome" => outcome.as_str()).increment(1);
    }

    /// Record a request rejected by the rate limiter
    pub fn record_rate_limited(&self) {
        counter!("http_rate_limited_total").increment(1);
    }

    pub fn register_metrics(&self) {
        describe_counter!("http_requests_total", Unit::Count, "HTTP requests by method, path and status");
        describe_histogram!(
            "http_request_duration_seconds",
            Unit::Seconds,
            "HTTP request latency"
        );
        describe_counter!("http_rate_limited_total", Unit::Count, "Requests rejected with 429");
        describe_counter!("secrets_created_total", Unit::Count, "Secrets stored, by payload kind");
        describe_counter!(
            "secret_store_failures_total",
            Unit::Count,
            "Create requests that failed in the backend"
        );
        describe_counter!(
            "secret_retrievals_total",
            Unit::Count,
            "Retrieval attempts grouped by outcome"
        );
    }
}

/// Install the Prometheus exporter on `config.metrics_port`.
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let Some(socket_addr) = config.metrics_bind_address() else {
        return Ok(());
    };

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", crate::APP_NAME)
        .install()
        .map_err(|e| Error::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    MetricsRecorder::new().register_metrics();

    info!(metrics_addr = %socket_addr, "Metrics collection initialized");
    Ok(())
}
