//! Secret create/retrieve business logic
//!
//! Sits between the HTTP handlers and the [`SecretStore`]: validates input, stores the
//! optional file and the message as independent secrets and assembles the responses.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::observability::{MetricsRecorder, RetrievalOutcome, SecretKind};
use crate::secrets::{SecretStore, SecretsError};
use crate::validation::{
    parse_content_disposition, validate_file_upload, validate_message, validate_token_format,
    validate_ttl, FileUpload,
};

/// Input for [`SecretHandler::create`].
#[derive(Debug, Clone, Default)]
pub struct CreateSecretRequest {
    pub msg: String,
    /// Empty means the store default.
    pub ttl: String,
    pub file: Option<FileUpload>,
}

/// Tokens handed back to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filetoken: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// The one-time payload handed to the reader.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgResponse {
    pub msg: String,
}

impl fmt::Debug for MsgResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MsgResponse").field("msg", &"[REDACTED]").finish()
    }
}

/// Service for creating and retrieving one-time secrets
#[derive(Clone)]
pub struct SecretHandler {
    store: Arc<dyn SecretStore>,
    metrics: MetricsRecorder,
}

impl fmt::Debug for SecretHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretHandler").finish_non_exhaustive()
    }
}

impl SecretHandler {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store, metrics: MetricsRecorder::new() }
    }

    /// Validate, store the optional file, then store the message.
    ///
    /// The file and the message get independent tokens. If the message store fails after
    /// the file was stored, the whole request fails and the file token is abandoned.
    pub async fn create(&self, request: CreateSecretRequest) -> Result<TokenResponse, SecretsError> {
        validate_message(&request.msg)?;
        validate_ttl(&request.ttl)?;
        if let Some(file) = &request.file {
            validate_file_upload(file)?;
        }

        let mut response = TokenResponse { token: String::new(), filetoken: None, filename: None };

        if let Some(file) = request.file.as_ref().filter(|file| !file.is_empty()) {
            let encoded = STANDARD.encode(&file.data);
            let filetoken = self.store.store(&encoded, &request.ttl).await.inspect_err(|e| {
                self.metrics.record_store_failure();
                error!(error = %e, "Failed to store file secret");
            })?;

            self.metrics.record_secret_created(SecretKind::File);
            response.filetoken = Some(filetoken);
            response.filename = upload_filename(file);
        }

        response.token = self.store.store(&request.msg, &request.ttl).await.inspect_err(|e| {
            self.metrics.record_store_failure();
            if response.filetoken.is_some() {
                warn!(error = %e, "Message store failed after file was stored; file token abandoned");
            } else {
                error!(error = %e, "Failed to store message secret");
            }
        })?;

        self.metrics.record_secret_created(SecretKind::Message);
        debug!(has_file = response.filetoken.is_some(), "Created secret");
        Ok(response)
    }

    /// Validate the token shape, then read and destroy the secret.
    pub async fn retrieve(&self, token: &str) -> Result<MsgResponse, SecretsError> {
        if let Err(e) = validate_token_format(token) {
            self.metrics.record_retrieval(RetrievalOutcome::Invalid);
            return Err(e.into());
        }

        match self.store.get(token).await {
            Ok(secret) => {
                self.metrics.record_retrieval(RetrievalOutcome::Success);
                Ok(MsgResponse { msg: secret.into_inner() })
            }
            Err(SecretsError::NotFound) => {
                self.metrics.record_retrieval(RetrievalOutcome::NotFound);
                debug!("Secret not found or already consumed");
                Err(SecretsError::NotFound)
            }
            Err(e) => {
                self.metrics.record_retrieval(RetrievalOutcome::Error);
                error!(error = %e, "Failed to retrieve secret");
                Err(e)
            }
        }
    }
}

/// Name reported back for an uploaded file: the parser's view first, then the raw header.
fn upload_filename(file: &FileUpload) -> Option<String> {
    file.file_name
        .clone()
        .or_else(|| {
            file.content_disposition
                .as_deref()
                .and_then(parse_content_disposition)
                .and_then(|disposition| disposition.filename)
        })
        .filter(|name| !name.is_empty())
}
