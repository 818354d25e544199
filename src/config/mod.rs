//! # Configuration Management
//!
//! Settings are read from `SECRETDROP_*` environment variables (after an optional `.env`
//! file has been loaded) and validated as a whole before anything starts listening.

pub mod settings;
pub mod tls;

pub use settings::{
    parse_bind_address, AppConfig, BackendConfig, ObservabilityConfig, RateLimitConfig,
    ServerConfig,
};
pub use tls::ApiTlsConfig;
