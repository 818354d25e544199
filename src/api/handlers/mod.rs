//! HTTP request handlers

pub mod health;
pub mod pages;
pub mod secrets;

pub use health::health_handler;
pub use pages::{getmsg_page, index_page, root_redirect};
pub use secrets::{create_secret, get_secret, CreateSecretForm};
