//! Registry state
//!
//! The plain data behind [`super::CredentialStore`]: the shared secret, the
//! control-plane URL and the ordered credential records. Nothing here locks;
//! the store hands out `&RegistryState` / `&mut RegistryState` only inside a
//! read or write scope.

use rand::RngCore;

use super::entry::{NewStream, StreamEntry, StreamId, StreamKey};
use super::error::AuthDenied;

/// Length of the persisted shared secret in bytes
pub const SECRET_LEN: usize = 32;

/// Shared secret generated once at first startup
pub type Secret = [u8; SECRET_LEN];

/// Full registry state as persisted on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryState {
    pub(crate) secret: Secret,
    /// Empty means revocation is disabled
    pub(crate) control_url: String,
    /// Insertion order is kept; `authorize` picks the first match
    pub(crate) streams: Vec<StreamEntry>,
}

impl RegistryState {
    /// Create an empty state with a freshly generated secret
    pub fn new() -> Self {
        let mut secret = [0u8; SECRET_LEN];
        rand::rng().fill_bytes(&mut secret);
        Self::with_secret(secret)
    }

    /// Create an empty state with the given secret
    pub fn with_secret(secret: Secret) -> Self {
        Self {
            secret,
            control_url: String::new(),
            streams: Vec::new(),
        }
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    /// Configured control-plane base URL, `None` when disabled
    pub fn control_url(&self) -> Option<&str> {
        if self.control_url.is_empty() {
            None
        } else {
            Some(&self.control_url)
        }
    }

    /// Records in insertion order
    pub fn streams(&self) -> &[StreamEntry] {
        &self.streams
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Look up a record by identifier
    pub fn get(&self, id: &StreamId) -> Option<&StreamEntry> {
        self.streams.iter().find(|s| &s.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &StreamId) -> Option<&mut StreamEntry> {
        self.streams.iter_mut().find(|s| &s.id == id)
    }

    /// Check if any record on app/name other than `except` is active
    pub fn has_active(&self, app: &str, name: &str, except: Option<&StreamId>) -> bool {
        self.streams
            .iter()
            .any(|s| s.active && s.is_on(app, name) && Some(&s.id) != except)
    }

    /// Decide whether app/name/key may publish
    ///
    /// The first record matching all three wins. Blocked is checked first,
    /// an already active record is re-granted, and any other active record
    /// on the same app/name makes the slot busy.
    pub fn authorize(&self, app: &str, name: &str, key: &str) -> Result<StreamId, AuthDenied> {
        let stream = self
            .streams
            .iter()
            .find(|s| s.is_on(app, name) && s.auth_key == key)
            .ok_or(AuthDenied::Unauthorized)?;

        if stream.blocked {
            return Err(AuthDenied::Blocked(stream.id.clone()));
        }

        if !stream.active && self.has_active(app, name, Some(&stream.id)) {
            return Err(AuthDenied::Busy(stream.id.clone()));
        }

        Ok(stream.id.clone())
    }

    /// Append a record under a fresh identifier
    pub(crate) fn insert(&mut self, stream: NewStream) -> StreamId {
        let mut id = StreamId::generate();
        while self.get(&id).is_some() {
            id = StreamId::generate();
        }

        self.streams.push(StreamEntry::from_new(id.clone(), stream));
        id
    }

    /// Remove a record, keeping the order of the others
    pub(crate) fn remove(&mut self, id: &StreamId) -> Option<StreamEntry> {
        let index = self.streams.iter().position(|s| &s.id == id)?;
        Some(self.streams.remove(index))
    }

    /// Mark every record on app/name inactive
    ///
    /// Returns the number of records that were active.
    pub(crate) fn deactivate_all(&mut self, app: &str, name: &str) -> usize {
        let mut changed = 0;
        for stream in self.streams.iter_mut() {
            if stream.active && stream.is_on(app, name) {
                stream.active = false;
                changed += 1;
            }
        }
        changed
    }

    /// Identifiers of records expired at `now`, in insertion order
    pub fn expired(&self, now: i64) -> Vec<StreamId> {
        self.streams
            .iter()
            .filter(|s| s.expiry.is_expired_at(now))
            .map(|s| s.id.clone())
            .collect()
    }

    /// Identifier and slot of a record, for log lines
    pub fn describe(&self, id: &StreamId) -> Option<StreamKey> {
        self.get(id).map(StreamEntry::key)
    }
}

impl Default for RegistryState {
    fn default() -> Self {
        Self::new()
    }
}
