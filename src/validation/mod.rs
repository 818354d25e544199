//! # Request Validation
//!
//! Pure checks that guard entry into the secret lifecycle. Every function here runs
//! before any backend round trip, so a rejected request never mints a credential.
//!
//! - [`validate_message`]: non-blank, at most [`MAX_MESSAGE_SIZE`] bytes
//! - [`validate_ttl`]: empty (store default) or a duration in `[MIN_TTL, MAX_TTL]`
//! - [`validate_file_upload`]: at most [`MAX_FILE_SIZE`] bytes, safe filename, `form-data` part
//! - [`validate_token_format`]: matches the Vault service/batch token grammar

pub mod duration;

use std::time::Duration;

use bytes::Bytes;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

pub use duration::{parse_duration, DurationError};

/// Largest accepted text message (1 MiB, inclusive).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Largest accepted file upload (50 MiB, inclusive).
pub const MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Shortest TTL a caller may request.
pub const MIN_TTL: Duration = Duration::from_secs(60);

/// Longest TTL a caller may request (7 days).
pub const MAX_TTL: Duration = Duration::from_secs(168 * 60 * 60);

/// TTL applied when the caller leaves it empty.
pub const DEFAULT_TTL: Duration = Duration::from_secs(48 * 60 * 60);

/// `hvs.`/`hvb.` followed by either the 24-character short form or the long form.
static TOKEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^hv[sb]\.(?:[A-Za-z0-9]{24}|[A-Za-z0-9_-]{91,})$")
        .expect("token grammar regex is valid")
});

/// Client-caused request problems. Every variant maps to HTTP 400.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("message is required")]
    EmptyMessage,

    #[error("{what} too large (limit {limit} bytes)")]
    TooLarge { what: &'static str, limit: usize },

    #[error("invalid {field} format")]
    InvalidFormat { field: &'static str },

    #[error("TTL must be between 1m and 168h")]
    OutOfRange,

    #[error("invalid filename")]
    InvalidFilename,

    #[error("invalid file upload")]
    InvalidUpload,
}

/// A file part received alongside a secret message.
#[derive(Debug, Clone, Default)]
pub struct FileUpload {
    /// Filename as reported by the multipart parser.
    pub file_name: Option<String>,
    /// Raw `Content-Disposition` header of the part.
    pub content_disposition: Option<String>,
    /// File contents.
    pub data: Bytes,
}

impl FileUpload {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

pub fn validate_message(msg: &str) -> Result<(), ValidationError> {
    if msg.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }

    if msg.len() > MAX_MESSAGE_SIZE {
        return Err(ValidationError::TooLarge { what: "message", limit: MAX_MESSAGE_SIZE });
    }

    Ok(())
}

/// Validate a caller-supplied TTL.
///
/// Returns `Ok(None)` for the empty string so the store applies [`DEFAULT_TTL`].
pub fn validate_ttl(ttl: &str) -> Result<Option<Duration>, ValidationError> {
    if ttl.is_empty() {
        return Ok(None);
    }

    let duration = match parse_duration(ttl) {
        Ok(duration) => duration,
        Err(DurationError::Negative) => return Err(ValidationError::OutOfRange),
        Err(DurationError::Invalid) => return Err(ValidationError::InvalidFormat { field: "TTL" }),
    };

    check_ttl_bounds(duration)?;
    Ok(Some(duration))
}

/// Range check shared by request validation and credential minting.
pub fn check_ttl_bounds(ttl: Duration) -> Result<(), ValidationError> {
    if ttl < MIN_TTL || ttl > MAX_TTL {
        return Err(ValidationError::OutOfRange);
    }
    Ok(())
}

pub fn validate_file_upload(file: &FileUpload) -> Result<(), ValidationError> {
    let disposition = file
        .content_disposition
        .as_deref()
        .and_then(parse_content_disposition)
        .ok_or(ValidationError::InvalidUpload)?;

    if !disposition.kind.eq_ignore_ascii_case("form-data") {
        return Err(ValidationError::InvalidUpload);
    }

    if file.size() > MAX_FILE_SIZE {
        return Err(ValidationError::TooLarge { what: "file", limit: MAX_FILE_SIZE });
    }

    let names = [disposition.filename.as_deref(), file.file_name.as_deref()];
    if names.into_iter().flatten().any(is_unsafe_filename) {
        return Err(ValidationError::InvalidFilename);
    }

    Ok(())
}

pub fn validate_token_format(token: &str) -> Result<(), ValidationError> {
    if !TOKEN_REGEX.is_match(token) {
        return Err(ValidationError::InvalidFormat { field: "token" });
    }
    Ok(())
}

fn is_unsafe_filename(name: &str) -> bool {
    name.contains("..") || name.contains('/') || name.contains('\\')
}

/// Parsed `Content-Disposition` header: the disposition type and its `filename` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentDisposition {
    pub kind: String,
    pub filename: Option<String>,
}

/// Parse a `Content-Disposition` header value.
///
/// Returns `None` when the disposition type is missing or a parameter is malformed.
pub fn parse_content_disposition(header: &str) -> Option<ContentDisposition> {
    let mut parts = split_params(header).into_iter();
    let kind = parts.next()?.trim().to_string();
    if kind.is_empty() || kind.contains('=') {
        return None;
    }

    let mut filename = None;
    for param in parts {
        let param = param.trim();
        if param.is_empty() {
            continue;
        }
        let (key, value) = param.split_once('=')?;
        let key = key.trim();
        if key.is_empty() {
            return None;
        }
        if key.eq_ignore_ascii_case("filename") {
            filename = Some(unquote(value.trim())?);
        }
    }

    Some(ContentDisposition { kind, filename })
}

/// Split on `;` while respecting quoted strings.
fn split_params(header: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut escaped = false;
    let mut start = 0;

    for (idx, ch) in header.char_indices() {
        match ch {
            _ if escaped => escaped = false,
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&header[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&header[start..]);
    parts
}

fn unquote(value: &str) -> Option<String> {
    let Some(inner) = value.strip_prefix('"') else {
        return Some(value.to_string());
    };
    let inner = inner.strip_suffix('"')?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            out.push(chars.next()?);
        } else {
            out.push(ch);
        }
    }
    Some(out)
}
