//! # secretdrop
//!
//! A web service for sharing secrets that can be read exactly once. Each secret is
//! written under a freshly minted credential that allows one write and one read and
//! expires after the requested TTL, so the backend itself destroys the secret on first
//! retrieval or expiry.
//!
//! ## Architecture
//!
//! ```text
//! HTTP API (axum) → SecretHandler → SecretStore → TokenLifecycleManager
//!                                        ↓                 ↓
//!                                 CredentialBackend (Vault cubbyhole / in-memory)
//! ```
//!
//! - [`api`]: routes, form extraction, rate limiting, static pages and the HTTP/HTTPS
//!   listeners
//! - [`services`]: request validation and response assembly
//! - [`secrets`]: the one-time store, credential minting and backends
//! - [`validation`]: size, TTL, filename and token checks
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use secretdrop::{api::shutdown_on_ctrl_c, config::AppConfig, startup, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env()?;
//!     startup::run(config, shutdown_on_ctrl_c()).await
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod errors;
pub mod observability;
pub mod secrets;
pub mod services;
pub mod startup;
pub mod utils;
pub mod validation;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use errors::{Error, Result};

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
