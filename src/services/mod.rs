//! Business logic services
//!
//! Service layer components that encapsulate business logic, separated from HTTP concerns.

pub mod secret_handler;

pub use secret_handler::{CreateSecretRequest, MsgResponse, SecretHandler, TokenResponse};
