//! HTML pages, static assets and the root redirect.

use std::path::Path;

use axum::{
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::warn;

use crate::api::error::ApiError;
use crate::api::routes::ApiState;

/// Languages the bundled pages are translated into.
pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "fr", "es", "de", "it"];
pub const DEFAULT_LANGUAGE: &str = "en";

const ONE_YEAR: &str = "public, max-age=31536000, immutable";
const ONE_DAY: &str = "public, max-age=86400";
const ONE_HOUR: &str = "public, max-age=3600";

#[derive(Debug, Default, Deserialize)]
pub struct LangQuery {
    #[serde(default)]
    pub lang: String,
}

/// `GET /`
pub async fn root_redirect() -> Redirect {
    Redirect::permanent("/msg")
}

/// `GET /msg`: the page for writing a secret.
pub async fn index_page(
    State(state): State<ApiState>,
    Query(query): Query<LangQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve_page(&state.static_dir, "index.html", &query.lang, &headers).await
}

/// `GET /getmsg`: the page for reading a secret.
pub async fn getmsg_page(
    State(state): State<ApiState>,
    Query(query): Query<LangQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    serve_page(&state.static_dir, "getmsg.html", &query.lang, &headers).await
}

async fn serve_page(
    static_dir: &Path,
    page: &str,
    lang: &str,
    headers: &HeaderMap,
) -> Result<Response, ApiError> {
    let path = static_dir.join(page);
    let html = tokio::fs::read_to_string(&path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to read page");
        ApiError::NotFound("page not found".to_string())
    })?;

    let accept_language = headers.get(header::ACCEPT_LANGUAGE).and_then(|v| v.to_str().ok());
    let language = negotiate_language(lang, accept_language);

    Ok(([(header::CONTENT_LANGUAGE, HeaderValue::from_static(language))], Html(html))
        .into_response())
}

/// Pick the page language: `?lang=` first, then the primary subtag of the first
/// `Accept-Language` entry. Unsupported values fall back to English.
pub fn negotiate_language(query: &str, accept_language: Option<&str>) -> &'static str {
    let requested = if query.is_empty() {
        accept_language
            .and_then(|value| value.split(',').next())
            .and_then(|tag| tag.split(['-', ';']).next())
            .map(str::trim)
            .unwrap_or_default()
    } else {
        query
    };

    SUPPORTED_LANGUAGES
        .iter()
        .find(|supported| **supported == requested)
        .copied()
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// `Cache-Control` tier for a static asset path.
pub fn cache_control_for(path: &str) -> &'static str {
    if path.starts_with("/static/fonts/") || path.starts_with("/static/icons/") {
        ONE_YEAR
    } else if path.starts_with("/static/locales/") {
        ONE_DAY
    } else {
        ONE_HOUR
    }
}

/// Middleware for the static router: successful asset responses get their cache tier.
pub async fn static_cache_control(request: Request, next: Next) -> Response {
    let tier = cache_control_for(request.uri().path());
    let mut response = next.run(request).await;

    if response.status().is_success() {
        response.headers_mut().insert(header::CACHE_CONTROL, HeaderValue::from_static(tier));
    }
    response
}
