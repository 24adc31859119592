//! Credential record types
//!
//! This module defines one authorized publishing credential and the small
//! value types it is built from.

use std::fmt;

use uuid::Uuid;

/// Value stored on disk for a credential that never expires
pub(crate) const NEVER_EXPIRES: i64 = -1;

/// Opaque, globally unique identifier of a credential record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(String);

impl StreamId {
    /// Generate a fresh random identifier
    pub(crate) fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the identifier as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for StreamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Publishing slot on the relay (app + stream name)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamKey {
    /// Application name (e.g., "live")
    pub app: String,
    /// Stream name (e.g., "camera1")
    pub name: String,
}

impl StreamKey {
    /// Create a new stream key
    pub fn new(app: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for StreamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app, self.name)
    }
}

/// Credential expiry
///
/// Either never, or a Unix timestamp in seconds. Timestamps are clamped to
/// the epoch so the on-disk `-1` marker can only ever mean "never".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Expiry(Option<i64>);

impl Expiry {
    /// Credential does not expire
    pub const NEVER: Expiry = Expiry(None);

    /// Credential expires at the given Unix time (seconds)
    pub fn at(unix_secs: i64) -> Self {
        Self(Some(unix_secs.max(0)))
    }

    /// Expiry timestamp, `None` for never
    pub fn timestamp(&self) -> Option<i64> {
        self.0
    }

    /// Check whether this is the "never" sentinel
    pub fn is_never(&self) -> bool {
        self.0.is_none()
    }

    /// Check whether the credential has expired at `now` (inclusive)
    pub fn is_expired_at(&self, now: i64) -> bool {
        matches!(self.0, Some(at) if at <= now)
    }

    pub(crate) fn to_wire(self) -> i64 {
        self.0.unwrap_or(NEVER_EXPIRES)
    }

    /// `None` for values no encoder produces (below the never marker)
    pub(crate) fn from_wire(value: i64) -> Option<Self> {
        match value {
            NEVER_EXPIRES => Some(Self::NEVER),
            v if v < 0 => None,
            v => Some(Self(Some(v))),
        }
    }
}

impl fmt::Display for Expiry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            None => f.write_str("never"),
            Some(at) => write!(f, "{}", at),
        }
    }
}

/// A single credential record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    /// Assigned at creation, never changes
    pub id: StreamId,
    /// RTMP application name
    pub app: String,
    /// Stream name within the application
    pub name: String,
    /// Key the publisher must present
    pub auth_key: String,
    pub expiry: Expiry,
    /// Free-text admin notes
    pub notes: String,
    /// Administratively disabled
    pub blocked: bool,
    /// Currently believed to hold the relay's publish grant
    pub active: bool,
}

impl StreamEntry {
    /// Publishing slot this record belongs to
    pub fn key(&self) -> StreamKey {
        StreamKey::new(self.app.clone(), self.name.clone())
    }

    /// Check if the record is on the given app/name
    pub fn is_on(&self, app: &str, name: &str) -> bool {
        self.app == app && self.name == name
    }

    pub(crate) fn from_new(id: StreamId, stream: NewStream) -> Self {
        Self {
            id,
            app: stream.app,
            name: stream.name,
            auth_key: stream.auth_key,
            expiry: stream.expiry,
            notes: stream.notes,
            blocked: stream.blocked,
            active: false,
        }
    }
}

impl fmt::Display for StreamEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}/{}, expires {}, blocked={}, active={})",
            self.id, self.app, self.name, self.expiry, self.blocked, self.active
        )
    }
}

/// Record contents supplied when adding a stream
///
/// The identifier is assigned by the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStream {
    pub app: String,
    pub name: String,
    pub auth_key: String,
    pub expiry: Expiry,
    pub notes: String,
    pub blocked: bool,
}

impl NewStream {
    /// Create an unblocked, never-expiring stream without notes
    pub fn new(app: impl Into<String>, name: impl Into<String>, auth_key: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            name: name.into(),
            auth_key: auth_key.into(),
            expiry: Expiry::NEVER,
            notes: String::new(),
            blocked: false,
        }
    }

    /// Set the expiry
    pub fn expiry(mut self, expiry: Expiry) -> Self {
        self.expiry = expiry;
        self
    }

    /// Set the notes
    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    /// Set the initial blocked flag
    pub fn blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }
}
