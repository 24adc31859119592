//! Authorization denial reasons
//!
//! A denied publish is an expected outcome, not a system fault.

use thiserror::Error;

use super::entry::StreamId;

/// Reason a publish request was refused
///
/// `Blocked` and `Busy` carry the matched record's identifier so the caller
/// can log which credential was presented.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthDenied {
    /// No record matches app, name and key
    #[error("publish denied: access unauthorized")]
    Unauthorized,
    /// Matching record is administratively blocked
    #[error("publish denied: stream {0} blocked")]
    Blocked(StreamId),
    /// Another record on the same app/name is currently publishing
    #[error("publish denied: resource busy (stream {0})")]
    Busy(StreamId),
}

impl AuthDenied {
    /// Identifier of the matched record, if any
    pub fn stream_id(&self) -> Option<&StreamId> {
        match self {
            AuthDenied::Unauthorized => None,
            AuthDenied::Blocked(id) | AuthDenied::Busy(id) => Some(id),
        }
    }

    /// HTTP status the publish callback answers with
    pub fn status_code(&self) -> u16 {
        match self {
            AuthDenied::Unauthorized => 401,
            AuthDenied::Blocked(_) => 403,
            AuthDenied::Busy(_) => 409,
        }
    }
}
