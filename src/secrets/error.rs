//! Error types for the secret lifecycle.

use thiserror::Error;

use crate::validation::ValidationError;

/// Result type for secret lifecycle operations.
pub type Result<T> = std::result::Result<T, SecretsError>;

/// Closed error taxonomy for `store`/`get`.
///
/// Unknown, expired and consumed tokens are deliberately indistinguishable: all of them
/// surface as [`SecretsError::NotFound`].
#[derive(Error, Debug)]
pub enum SecretsError {
    /// The request was rejected before any backend call.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The token does not (or no longer) grant access to a secret.
    #[error("Secret not found")]
    NotFound,

    /// The backend failed or could not be reached.
    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl SecretsError {
    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage { message: message.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
