//! Error types
//!
//! Authorization denials live in [`crate::registry::AuthDenied`]; everything
//! else a caller can observe is collected here.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::registry::{AuthDenied, StreamId, StreamKey};

/// Result type alias for registry and service operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for registry and service operations
#[derive(Debug, Error)]
pub enum Error {
    /// Publish request was denied
    #[error(transparent)]
    Denied(#[from] AuthDenied),

    /// No record with this identifier
    #[error("stream not found: {0}")]
    StreamNotFound(StreamId),

    /// No record on this application/name is currently active
    #[error("no active stream on {0}")]
    NoActiveStream(StreamKey),

    /// Durable write failed; the in-memory mutation has already been applied
    #[error(transparent)]
    Persist(#[from] PersistError),

    /// Admin input rejected
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Outbound HTTP client could not be constructed
    #[error("failed to build control-plane http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

impl Error {
    /// Whether this is a lookup failure (unknown id or nothing active)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::StreamNotFound(_) | Error::NoActiveStream(_))
    }

    /// HTTP status an inbound handler should answer with
    ///
    /// Unpublish for an app/name with nothing active answers 401, matching
    /// what the relay expects from a rejected callback.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Denied(denied) => denied.status_code(),
            Error::NoActiveStream(_) => 401,
            Error::StreamNotFound(_) => 404,
            Error::Validation(_) => 400,
            Error::Persist(_) | Error::HttpClient(_) => 500,
        }
    }
}

/// Persistence failures
#[derive(Debug, Error)]
pub enum PersistError {
    /// Reading, writing or renaming the state file failed
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// State file exists but could not be decoded
    #[error("corrupt state file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
}

/// Binary envelope decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("bad magic bytes")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u8),
    #[error("invalid utf-8 string")]
    InvalidUtf8,
    #[error("invalid secret length {0}")]
    InvalidSecretLength(usize),
    #[error("invalid expiry value {0}")]
    InvalidExpiry(i64),
    #[error("{0} trailing bytes after state")]
    TrailingBytes(usize),
}

/// Admin input validation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid auth expiry: '{0}'")]
    InvalidExpiry(String),
    #[error("stream name must be set")]
    EmptyName,
    #[error("stream name contains unsafe characters: '{0}'")]
    UnsafeName(String),
    #[error("unknown application: '{0}'")]
    UnknownApplication(String),
}

/// Control-plane revocation failures
///
/// None of these are fatal to the operation that triggered the revocation.
#[derive(Debug, Error)]
pub enum ControlError {
    /// Identifier unknown to the registry
    #[error("stream {0} not found")]
    NotFound(StreamId),

    /// Record is not the active publisher, nothing to drop
    #[error("stream {0} is not active")]
    NotActive(StreamId),

    /// Another record on the same app/name holds the grant
    #[error("publish on {stream} was granted to another stream than {id}")]
    Superseded { id: StreamId, stream: StreamKey },

    /// Relay answered with a non-success status
    #[error("control request denied with status {status}")]
    Denied { status: u16 },

    /// Relay unreachable or timed out
    #[error("control request failed: {0}")]
    Unreachable(#[source] reqwest::Error),
}

impl ControlError {
    /// Whether the revocation was skipped because it did not apply
    pub fn is_not_applicable(&self) -> bool {
        matches!(
            self,
            ControlError::NotFound(_) | ControlError::NotActive(_) | ControlError::Superseded { .. }
        )
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let key = StreamKey::new("live", "s1");
        let id = StreamId::from("abc");

        assert_eq!(Error::from(AuthDenied::Unauthorized).status_code(), 401);
        assert_eq!(Error::from(AuthDenied::Blocked(id.clone())).status_code(), 403);
        assert_eq!(Error::from(AuthDenied::Busy(id.clone())).status_code(), 409);
        assert_eq!(Error::NoActiveStream(key).status_code(), 401);
        assert_eq!(Error::StreamNotFound(id).status_code(), 404);
        assert_eq!(Error::from(ValidationError::EmptyName).status_code(), 400);
    }

    #[test]
    fn test_is_not_found() {
        assert!(Error::StreamNotFound(StreamId::from("x")).is_not_found());
        assert!(Error::NoActiveStream(StreamKey::new("a", "b")).is_not_found());
        assert!(!Error::from(AuthDenied::Unauthorized).is_not_found());
    }

    #[test]
    fn test_control_error_applicability() {
        let id = StreamId::from("x");
        assert!(ControlError::NotActive(id.clone()).is_not_applicable());
        assert!(ControlError::Superseded {
            id,
            stream: StreamKey::new("live", "s1"),
        }
        .is_not_applicable());
        assert!(!ControlError::Denied { status: 500 }.is_not_applicable());
    }

    #[test]
    fn test_display() {
        let err = ValidationError::InvalidExpiry("P0D".into());
        assert_eq!(err.to_string(), "invalid auth expiry: 'P0D'");

        let err = Error::NoActiveStream(StreamKey::new("live", "s1"));
        assert_eq!(err.to_string(), "no active stream on live/s1");
    }
}
