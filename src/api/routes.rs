use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::{header, HeaderValue, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{any, get},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::{ServeDir, ServeFile},
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
};
use tracing::warn;

use super::handlers::{
    create_secret, get_secret, getmsg_page, health_handler, index_page, pages, root_redirect,
};
use super::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::config::AppConfig;
use crate::observability::trace_http_requests;
use crate::services::SecretHandler;

/// Requests above this size are refused with `413` before the form is parsed.
pub const MAX_REQUEST_BODY: usize = 64 * 1024 * 1024;

const CORS_MAX_AGE_SECS: u64 = 86_400;

const CONTENT_SECURITY_POLICY: &str = "default-src 'self'; script-src 'self'; \
     style-src 'self' 'unsafe-inline'; img-src 'self' data:; font-src 'self'; \
     frame-ancestors 'none'";

/// Shared state for every route.
#[derive(Debug, Clone)]
pub struct ApiState {
    pub secrets: SecretHandler,
    pub static_dir: Arc<PathBuf>,
}

impl ApiState {
    pub fn new(secrets: SecretHandler, static_dir: impl Into<PathBuf>) -> Self {
        Self { secrets, static_dir: Arc::new(static_dir.into()) }
    }
}

/// Build the full application router.
pub fn build_router(state: ApiState, config: &AppConfig) -> Router {
    let static_dir = state.static_dir.as_ref().clone();

    let assets = Router::new()
        .nest_service("/static", ServeDir::new(&static_dir))
        .layer(middleware::from_fn(pages::static_cache_control))
        .route_service("/robots.txt", ServeFile::new(static_dir.join("robots.txt")));

    let mut router = Router::new()
        .route("/", get(root_redirect))
        .route("/health", any(health_handler))
        .route("/secret", get(get_secret).post(create_secret))
        .route("/msg", get(index_page))
        .route("/getmsg", get(getmsg_page))
        .with_state(state)
        .merge(assets)
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY));

    if let Some(limiter) = RateLimiter::from_config(&config.rate_limit) {
        router = router.layer(middleware::from_fn_with_state(limiter, rate_limit_middleware));
    }

    with_common_layers(
        router.layer(cors_layer(&config.server.allowed_origins)),
        config.server.request_timeout,
    )
}

/// Router for the plain HTTP listener when it only redirects to HTTPS.
pub fn build_redirect_router(https_port: u16, request_timeout: Duration) -> Router {
    with_common_layers(
        Router::new().fallback(redirect_to_https).with_state(https_port),
        request_timeout,
    )
}

/// Timeout innermost, then security headers (so `408`s carry them), then tracing.
fn with_common_layers(router: Router, request_timeout: Duration) -> Router {
    let router =
        router.layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, request_timeout));

    let security_headers = [
        (header::X_XSS_PROTECTION, "1; mode=block"),
        (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
        (header::X_FRAME_OPTIONS, "DENY"),
        (header::STRICT_TRANSPORT_SECURITY, "max-age=31536000; includeSubDomains; preload"),
        (header::CONTENT_SECURITY_POLICY, CONTENT_SECURITY_POLICY),
    ];

    security_headers
        .into_iter()
        .fold(router, |router, (name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(
                name,
                HeaderValue::from_static(value),
            ))
        })
        .layer(middleware::from_fn(trace_http_requests))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::ORIGIN, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(CORS_MAX_AGE_SECS))
}

async fn redirect_to_https(State(https_port): State<u16>, request: Request) -> Response {
    let Some(host) = request
        .headers()
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| request.uri().host())
    else {
        return (StatusCode::BAD_REQUEST, "missing Host header").into_response();
    };

    match https_location(host, https_port, request.uri()) {
        Some(location) => (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        None => (StatusCode::BAD_REQUEST, "invalid Host header").into_response(),
    }
}

/// `https://` URL for the same host and path, on the HTTPS listener's port.
fn https_location(host: &str, https_port: u16, uri: &Uri) -> Option<HeaderValue> {
    let authority: axum::http::uri::Authority = host.parse().ok()?;
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");

    let location = if https_port == 443 {
        format!("https://{}{}", authority.host(), path_and_query)
    } else {
        format!("https://{}:{}{}", authority.host(), https_port, path_and_query)
    };
    HeaderValue::from_str(&location).ok()
}
