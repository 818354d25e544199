//! # HTTP Request Tracing Middleware
//!
//! Wraps every request in a `http_request` span, logs its completion and records
//! Prometheus metrics. Health probes are passed through untouched.

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{info, warn, Instrument};

use super::metrics::MetricsRecorder;
use crate::request_span;

/// Paths that are never logged or counted.
const QUIET_PATHS: &[&str] = &["/health"];

/// Axum middleware logging method, path, status and latency for each request
pub async fn trace_http_requests(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    if QUIET_PATHS.contains(&path.as_str()) {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let span = request_span!(method, path);
    let start = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    let status = response.status().as_u16();
    let elapsed = start.elapsed();

    span.in_scope(|| {
        if status >= 500 {
            warn!(status, latency_ms = elapsed.as_millis() as u64, "request failed");
        } else {
            info!(status, latency_ms = elapsed.as_millis() as u64, "request completed");
        }
    });

    MetricsRecorder::new().record_http_request(
        method.as_str(),
        normalize_path_for_metrics(&path),
        status,
        elapsed.as_secs_f64(),
    );

    response
}

/// Collapse request paths into a fixed label set.
fn normalize_path_for_metrics(path: &str) -> &'static str {
    match path {
        "/" => "/",
        "/secret" => "/secret",
        "/msg" => "/msg",
        "/getmsg" => "/getmsg",
        "/robots.txt" => "/robots.txt",
        _ if path.starts_with("/static/") => "/static/*",
        _ => "other",
    }
}
