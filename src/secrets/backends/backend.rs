//! Credential backend trait and types
//!
//! A backend owns the limited-use credentials that gate access to stored secrets.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::secrets::error::Result;
use crate::secrets::lifecycle::CredentialRequest;
use crate::secrets::types::SecretString;

/// Type of credential backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// HashiCorp Vault token store + cubbyhole
    Vault,
    /// In-process credential table
    Memory,
}

impl BackendType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vault => "vault",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for BackendType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vault" => Ok(Self::Vault),
            "memory" => Ok(Self::Memory),
            other => Err(format!("Unknown credential backend: {}", other)),
        }
    }
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Primitives a backend exposes to the secret lifecycle.
///
/// Every call spends at most one use of the credential it names. `consume` must decrement
/// and read in one atomic step so that concurrent callers on one token see exactly one
/// success.
#[async_trait]
pub trait CredentialBackend: Send + Sync + fmt::Debug {
    /// Mint a fresh credential and return its token.
    async fn mint(&self, request: &CredentialRequest) -> Result<String>;

    /// Store `payload` under `token`, spending one use.
    async fn write(&self, token: &str, payload: &SecretString) -> Result<()>;

    /// Read the payload stored under `token`, spending one use.
    ///
    /// Unknown, expired and exhausted tokens return `SecretsError::NotFound`.
    async fn consume(&self, token: &str) -> Result<SecretString>;

    fn backend_type(&self) -> BackendType;
}
