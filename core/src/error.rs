//! Error types for the request/response core.
//!
//! # Design
//! Two families never mix. `InvalidRequest` is a caller programming error
//! raised by the normalizer before anything goes on the wire.
//! `ClassifiedError` is the single value every runtime failure is turned
//! into: timeouts, dropped connections and error envelopes all end up with
//! a code, a kind and an optional localized message. `CoreError` is what
//! `CoreClient::request` hands back so callers can `?` both.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code reported for a request that timed out.
pub const TIMEOUT_CODE: u16 = 408;

/// Code used when an error envelope does not carry one.
pub const DEFAULT_ERROR_CODE: u16 = 400;

/// Normalized failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Timeout,
    Forbidden,
    NotFound,
    CsrfInvalid,
    ServerError,
    BadRequest,
    Cancelled,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "notFound",
            ErrorKind::CsrfInvalid => "csrfInvalid",
            ErrorKind::ServerError => "serverError",
            ErrorKind::BadRequest => "badRequest",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform result of every failure path through the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("request failed: {kind} (code {code})")]
pub struct ClassifiedError {
    /// HTTP-status-like code; `0` when unknown or cancelled.
    pub code: u16,
    pub kind: ErrorKind,
    /// Localized text for the user, `None` when nothing should be shown.
    pub message: Option<String>,
}

impl ClassifiedError {
    pub fn new(code: u16, kind: ErrorKind, message: Option<String>) -> Self {
        Self {
            code,
            kind,
            message,
        }
    }

    pub fn cancelled() -> Self {
        Self::new(0, ErrorKind::Cancelled, None)
    }

    /// Cancelled requests were stopped by the user and must stay silent.
    pub fn should_alert(&self) -> bool {
        self.kind != ErrorKind::Cancelled
    }
}

/// Caller misuse detected by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("request sets both `path` and `url`")]
    BothTargets,

    #[error("request sets neither `path` nor `url`")]
    MissingTarget,

    #[error("invalid request url `{url}`: {reason}")]
    BadUrl { url: String, reason: String },

    #[error("request body could not be form-encoded: {0}")]
    Encoding(String),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),
}

/// Everything `CoreClient::request` can fail with.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error(transparent)]
    Invalid(#[from] InvalidRequest),

    #[error(transparent)]
    Failed(#[from] ClassifiedError),
}

impl CoreError {
    /// The classified runtime failure, if this is one.
    pub fn classified(&self) -> Option<&ClassifiedError> {
        match self {
            CoreError::Failed(err) => Some(err),
            CoreError::Invalid(_) => None,
        }
    }
}
