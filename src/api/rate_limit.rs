//! Per-client rate limiting.
//!
//! Token bucket per client address: `burst` requests may arrive at once, after which
//! tokens refill at `requests_per_second`. Buckets idle for longer than [`IDLE_EXPIRY`]
//! are dropped during the next check.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::server::ClientAddr;
use crate::config::RateLimitConfig;
use crate::observability::MetricsRecorder;

/// Buckets untouched for this long are forgotten.
pub const IDLE_EXPIRY: Duration = Duration::from_secs(60);

/// Token bucket for rate limiting.
#[derive(Debug, Clone)]
struct TokenBucket {
    /// Current number of tokens available
    tokens: f64,
    /// Time of last token refill
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: f64, now: Instant) -> Self {
        Self { tokens: capacity, last_refill: now }
    }

    /// Try to consume a token from the bucket.
    ///
    /// Returns `Ok(())` if successful, `Err(retry_after_secs)` if rate limited.
    fn try_consume(&mut self, capacity: f64, refill_per_sec: f64, now: Instant) -> Result<(), u32> {
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * refill_per_sec).min(capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let seconds_until_refill = (1.0 - self.tokens) / refill_per_sec;
            Err(seconds_until_refill.ceil().max(1.0) as u32)
        }
    }
}

/// Rate limiter using token bucket algorithm, keyed by client address.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    capacity: f64,
    refill_per_sec: f64,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    /// - `requests_per_second`: Sustained refill rate
    /// - `burst`: Bucket capacity
    pub fn new(requests_per_second: f64, burst: u32) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            capacity: f64::from(burst.max(1)),
            refill_per_sec: requests_per_second,
        }
    }

    /// Build a limiter from configuration; `None` when limiting is disabled.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        config
            .is_enabled()
            .then(|| Self::new(config.requests_per_second, config.burst))
    }

    /// Check if request is allowed under rate limit.
    ///
    /// # Returns
    /// - `Ok(())` if request allowed
    /// - `Err(retry_after_secs)` if rate limited
    pub async fn check_rate_limit(&self, key: &str) -> Result<(), u32> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().await;

        buckets.retain(|_, bucket| now.duration_since(bucket.last_refill) < IDLE_EXPIRY);

        let bucket =
            buckets.entry(key.to_string()).or_insert_with(|| TokenBucket::full(self.capacity, now));

        match bucket.try_consume(self.capacity, self.refill_per_sec, now) {
            Ok(()) => {
                debug!(client = %key, remaining_tokens = bucket.tokens as u32, "Rate limit check passed");
                Ok(())
            }
            Err(retry_after) => {
                warn!(client = %key, retry_after_seconds = retry_after, "Rate limit exceeded");
                Err(retry_after)
            }
        }
    }

    /// Number of clients currently tracked.
    pub async fn tracked_clients(&self) -> usize {
        self.buckets.lock().await.len()
    }

    /// Whether `key` currently has a bucket.
    pub async fn tracks(&self, key: &str) -> bool {
        self.buckets.lock().await.contains_key(key)
    }
}

/// Identify the caller: `X-Real-IP`, then the first `X-Forwarded-For` hop, then the peer.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let header_value = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    };

    if let Some(real_ip) = header_value("x-real-ip") {
        return real_ip.to_string();
    }

    if let Some(first) = header_value("x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
    {
        return first.to_string();
    }

    peer.map(|addr| addr.ip().to_string()).unwrap_or_else(|| "unknown".to_string())
}

/// Axum middleware rejecting callers that exhausted their bucket with `429`.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<ClientAddr>>()
        .map(|&ConnectInfo(ClientAddr(addr))| addr);
    let key = client_key(request.headers(), peer);

    match limiter.check_rate_limit(&key).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            MetricsRecorder::new().record_rate_limited();
            let mut response =
                (StatusCode::TOO_MANY_REQUESTS, Json(json!({ "error": "rate limit exceeded" })))
                    .into_response();
            response.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_allows_burst() {
        let limiter = RateLimiter::new(5.0, 10);

        for i in 0..10 {
            assert!(limiter.check_rate_limit("10.0.0.1").await.is_ok(), "Request {} should pass", i + 1);
        }
        assert!(limiter.check_rate_limit("10.0.0.1").await.is_err(), "11th request should be limited");
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_isolates_clients() {
        let limiter = RateLimiter::new(1.0, 2);

        limiter.check_rate_limit("10.0.0.1").await.unwrap();
        limiter.check_rate_limit("10.0.0.1").await.unwrap();
        assert!(limiter.check_rate_limit("10.0.0.1").await.is_err());

        assert!(limiter.check_rate_limit("10.0.0.2").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limiter_refills_over_time() {
        let limiter = RateLimiter::new(5.0, 1);

        limiter.check_rate_limit("client").await.unwrap();
        let retry_after = limiter.check_rate_limit("client").await.unwrap_err();
        assert_eq!(retry_after, 1);

        tokio::time::advance(Duration::from_millis(250)).await;
        assert!(limiter.check_rate_limit("client").await.is_ok(), "Token should have refilled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_buckets_expire() {
        let limiter = RateLimiter::new(5.0, 10);
        limiter.check_rate_limit("a").await.unwrap();
        limiter.check_rate_limit("b").await.unwrap();
        assert_eq!(limiter.tracked_clients().await, 2);

        tokio::time::advance(IDLE_EXPIRY + Duration::from_secs(1)).await;
        limiter.check_rate_limit("c").await.unwrap();
        assert_eq!(limiter.tracked_clients().await, 1);
    }

    #[test]
    fn test_disabled_config_builds_no_limiter() {
        let config = RateLimitConfig { requests_per_second: 0.0, burst: 10 };
        assert!(RateLimiter::from_config(&config).is_none());
        assert!(RateLimiter::from_config(&RateLimitConfig::default()).is_some());
    }

    #[tokio::test]
    async fn test_middleware_keys_by_connection_peer() {
        use axum::{body::Body, middleware, routing::get, Router};
        use tower::ServiceExt;

        let limiter = RateLimiter::new(0.001, 1);
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(limiter.clone(), rate_limit_middleware));

        let request = |peer: &str| {
            let mut request = Request::builder().uri("/").body(Body::empty()).unwrap();
            request
                .extensions_mut()
                .insert(ConnectInfo(ClientAddr(peer.parse::<SocketAddr>().unwrap())));
            request
        };

        let response = app.clone().oneshot(request("192.0.2.7:40000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(limiter.tracks("192.0.2.7").await);

        let response = app.clone().oneshot(request("192.0.2.7:40001")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));

        let response = app.oneshot(request("192.0.2.8:40000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_client_key_precedence() {
        let peer: SocketAddr = "192.0.2.7:5555".parse().unwrap();
        let mut headers = HeaderMap::new();
        assert_eq!(client_key(&headers, Some(peer)), "192.0.2.7");
        assert_eq!(client_key(&headers, None), "unknown");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_key(&headers, Some(peer)), "203.0.113.9");

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.4"));
        assert_eq!(client_key(&headers, Some(peer)), "198.51.100.4");
    }
}
