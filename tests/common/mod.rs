//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use axum::{body::Body, http::Request, Router};
use http_body_util::BodyExt;
use secretdrop::{
    api::{build_router, ApiState},
    config::AppConfig,
    secrets::{MemoryCredentialBackend, OneTimeSecretStore},
    services::SecretHandler,
};

pub const BOUNDARY: &str = "secretdrop-test-boundary";

/// Router over a fresh in-memory backend, with rate limiting disabled.
pub fn memory_app(static_dir: &Path) -> Router {
    let mut config = AppConfig::default();
    config.rate_limit.requests_per_second = 0.0;
    app_with_config(static_dir, &config)
}

pub fn app_with_config(static_dir: &Path, config: &AppConfig) -> Router {
    let store = OneTimeSecretStore::new(Arc::new(MemoryCredentialBackend::new()));
    let state = ApiState::new(SecretHandler::new(Arc::new(store)), static_dir);
    build_router(state, config)
}

/// One part of a multipart body.
pub enum Part<'a> {
    Field(&'a str, &'a str),
    File { name: &'a str, filename: &'a str, data: &'a [u8] },
}

pub fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match part {
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File { name, filename, data } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                         Content-Type: application/octet-stream\r\n\r\n"
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub fn multipart_request(parts: &[Part<'_>]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/secret")
        .header("content-type", format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(multipart_body(parts)))
        .unwrap()
}

pub fn form_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/secret")
        .header("content-type", "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Static directory with the two pages, a robots file and a few assets.
pub fn static_fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::write(root.join("index.html"), "<html>create</html>").unwrap();
    std::fs::write(root.join("getmsg.html"), "<html>read</html>").unwrap();
    std::fs::write(root.join("robots.txt"), "User-agent: *\nDisallow: /\n").unwrap();
    std::fs::create_dir_all(root.join("fonts")).unwrap();
    std::fs::create_dir_all(root.join("locales")).unwrap();
    std::fs::write(root.join("fonts/inter.woff2"), b"font").unwrap();
    std::fs::write(root.join("locales/fr.json"), "{}").unwrap();
    std::fs::write(root.join("index.js"), "console.log(1);").unwrap();
    dir
}
