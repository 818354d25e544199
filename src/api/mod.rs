//! # HTTP API
//!
//! Routing, handlers, middleware and listeners for the secretdrop web service.

pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use rate_limit::RateLimiter;
pub use routes::{build_redirect_router, build_router, ApiState, MAX_REQUEST_BODY};
pub use server::{shutdown_on_ctrl_c, start_api_server, ClientAddr, TlsListener};
