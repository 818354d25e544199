//! Health check endpoint for monitoring and readiness probes

/// Liveness probe, answered for any method without touching the backend.
pub async fn health_handler() -> &'static str {
    "OK"
}
