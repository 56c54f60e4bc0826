//! Error types and error kinds for Flotilla
//!
//! This module defines:
//! - `FlotillaError`: Application-specific error enum
//! - `ErrorKind`: Stable kind strings returned verbatim by the API

use serde::{Deserialize, Serialize};

/// Stable error kinds surfaced through the operator API.
///
/// The kind string is part of the API contract and is returned verbatim in
/// the `error` field of failed responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    PreconditionFailed,
    RemoteUnavailable,
    RemoteMalformed,
    Timeout,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::PreconditionFailed => "precondition_failed",
            ErrorKind::RemoteUnavailable => "remote_unavailable",
            ErrorKind::RemoteMalformed => "remote_malformed",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Application-specific error types
#[derive(thiserror::Error, Debug)]
pub enum FlotillaError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("remote response malformed: {0}")]
    RemoteMalformed(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

impl FlotillaError {
    /// The stable API kind for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlotillaError::NotFound(_) => ErrorKind::NotFound,
            FlotillaError::Conflict(_) => ErrorKind::Conflict,
            FlotillaError::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            FlotillaError::RemoteUnavailable(_) => ErrorKind::RemoteUnavailable,
            FlotillaError::RemoteMalformed(_) => ErrorKind::RemoteMalformed,
            FlotillaError::Timeout(_) => ErrorKind::Timeout,
            FlotillaError::Cancelled => ErrorKind::Cancelled,
            FlotillaError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Build a `FlotillaError` from any anyhow error, preserving a typed
    /// flotilla error if one is in the chain.
    pub fn from_anyhow(err: anyhow::Error) -> Self {
        match err.downcast::<FlotillaError>() {
            Ok(typed) => typed,
            Err(other) => FlotillaError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_strings_are_stable() {
        assert_eq!(FlotillaError::NotFound("x".into()).kind().as_str(), "not_found");
        assert_eq!(FlotillaError::Conflict("x".into()).kind().as_str(), "conflict");
        assert_eq!(
            FlotillaError::PreconditionFailed("locked".into()).kind().as_str(),
            "precondition_failed"
        );
        assert_eq!(FlotillaError::Cancelled.kind().as_str(), "cancelled");
    }

    #[test]
    fn test_from_anyhow_preserves_typed_error() {
        let err = anyhow::Error::new(FlotillaError::Timeout("drain".into()));
        let typed = FlotillaError::from_anyhow(err);
        assert_eq!(typed.kind(), ErrorKind::Timeout);

        let plain = anyhow::anyhow!("boom");
        assert_eq!(FlotillaError::from_anyhow(plain).kind(), ErrorKind::Internal);
    }
}
