//! # Error Handling
//!
//! Process-level errors for secretdrop: configuration, listener transport, I/O and TLS
//! material. Request-path errors live in [`crate::secrets::SecretsError`] and
//! [`crate::validation::ValidationError`].

pub mod tls;

pub use tls::TlsError;

/// Custom result type for secretdrop process operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for starting and running the service
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network transport errors (listener bind, serve loop)
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS certificate and key loading errors
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        let err = Error::config("missing HTTP binding address");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: missing HTTP binding address");

        let err = Error::transport("address in use");
        assert!(err.to_string().starts_with("Transport error"));
    }

    #[test]
    fn test_tls_error_converts() {
        let err: Error = TlsError::MissingCertificatePath.into();
        assert!(matches!(err, Error::Tls(TlsError::MissingCertificatePath)));
    }
}
