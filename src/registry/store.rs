//! Credential store implementation
//!
//! The central registry of credential records, guarded by one readers/writer
//! lock and mirrored to disk after every mutation.

use std::path::{Path, PathBuf};

use tokio::sync::RwLock;

use super::entry::{NewStream, StreamEntry, StreamId, StreamKey};
use super::error::AuthDenied;
use super::state::{RegistryState, Secret};
use crate::error::{Error, Result};
use crate::persist;

/// Persistent registry of publishing credentials
///
/// Reads (authorization, lookups) share the lock. Every mutation holds the
/// write lock until the state file has been rewritten, so callers return only
/// after the change is durable. If that write fails the in-memory change is
/// kept and [`Error::Persist`] is returned.
pub struct CredentialStore {
    state: RwLock<RegistryState>,
    path: PathBuf,
}

impl CredentialStore {
    /// Open the store at `path`
    ///
    /// A missing file starts an empty registry with a fresh secret, which is
    /// persisted right away. A file that cannot be decoded is an error.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let state = match persist::load(&path).await? {
            Some(state) => state,
            None => {
                let state = RegistryState::new();
                persist::save(&path, &state).await?;
                tracing::info!(path = %path.display(), "Created new state file");
                state
            }
        };

        Ok(Self::with_state(path, state))
    }

    /// Create a store around an existing state without touching disk
    pub fn with_state(path: impl Into<PathBuf>, state: RegistryState) -> Self {
        Self {
            state: RwLock::new(state),
            path: path.into(),
        }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` inside a read scope
    ///
    /// The closure cannot hand references out of the scope; copy what you need.
    pub async fn read<R>(&self, f: impl FnOnce(&RegistryState) -> R) -> R {
        let state = self.state.read().await;
        f(&state)
    }

    /// Run `f` inside a write scope and persist if it succeeds
    ///
    /// `f` must not modify the state before returning an error.
    async fn write<R>(&self, f: impl FnOnce(&mut RegistryState) -> Result<R>) -> Result<R> {
        let mut state = self.state.write().await;
        let value = f(&mut state)?;

        if let Err(e) = persist::save(&self.path, &state).await {
            tracing::error!(
                path = %self.path.display(),
                error = %e,
                "Failed to persist state, memory and disk diverge"
            );
            return Err(e.into());
        }

        Ok(value)
    }

    /// Decide whether app/name/key may publish
    pub async fn auth(&self, app: &str, name: &str, key: &str) -> std::result::Result<StreamId, AuthDenied> {
        self.read(|state| state.authorize(app, name, key)).await
    }

    /// Authorize app/name/key and mark the matched record active
    ///
    /// Both happen under one write lock, so two publishers racing for the
    /// same slot cannot both be granted.
    pub async fn grant(&self, app: &str, name: &str, key: &str) -> Result<StreamId> {
        let id = self
            .write(|state| {
                let id = state.authorize(app, name, key)?;
                if let Some(stream) = state.get_mut(&id) {
                    stream.active = true;
                }
                Ok(id)
            })
            .await?;

        tracing::info!(id = %id, stream = %StreamKey::new(app, name), "Stream active");
        Ok(id)
    }

    /// Mark a record as the active publisher
    pub async fn set_active(&self, id: &StreamId) -> Result<()> {
        let key = self
            .write(|state| {
                let stream = state
                    .get_mut(id)
                    .ok_or_else(|| Error::StreamNotFound(id.clone()))?;
                stream.active = true;
                Ok(stream.key())
            })
            .await?;

        tracing::info!(id = %id, stream = %key, "Stream active");
        Ok(())
    }

    /// Mark every record on app/name inactive
    ///
    /// The relay reports unpublish per app/name, not per credential, so all
    /// matching records are cleared. Fails if none was active.
    pub async fn set_inactive(&self, app: &str, name: &str) -> Result<usize> {
        let count = self
            .write(|state| match state.deactivate_all(app, name) {
                0 => Err(Error::NoActiveStream(StreamKey::new(app, name))),
                n => Ok(n),
            })
            .await?;

        tracing::info!(stream = %StreamKey::new(app, name), records = count, "Stream inactive");
        Ok(count)
    }

    /// Append a record under a fresh identifier
    pub async fn add_stream(&self, stream: NewStream) -> Result<StreamId> {
        let key = StreamKey::new(stream.app.clone(), stream.name.clone());
        let id = self.write(|state| Ok(state.insert(stream))).await?;

        tracing::info!(id = %id, stream = %key, "Stream added");
        Ok(id)
    }

    /// Remove a record by identifier
    pub async fn remove_stream(&self, id: &StreamId) -> Result<StreamEntry> {
        let removed = self
            .write(|state| state.remove(id).ok_or_else(|| Error::StreamNotFound(id.clone())))
            .await?;

        tracing::info!(id = %id, stream = %removed.key(), "Stream removed");
        Ok(removed)
    }

    /// Set or clear the blocked flag
    ///
    /// Does not drop a running publisher; see
    /// [`crate::ControlClient::drop_publisher`].
    pub async fn set_blocked(&self, id: &StreamId, blocked: bool) -> Result<()> {
        let key = self
            .write(|state| {
                let stream = state
                    .get_mut(id)
                    .ok_or_else(|| Error::StreamNotFound(id.clone()))?;
                stream.blocked = blocked;
                Ok(stream.key())
            })
            .await?;

        tracing::info!(id = %id, stream = %key, blocked, "Stream block state changed");
        Ok(())
    }

    /// Replace the control-plane base URL; empty disables revocation
    pub async fn set_control_url(&self, url: impl Into<String>) -> Result<()> {
        let url = url.into();
        self.write(|state| {
            state.control_url = url;
            Ok(())
        })
        .await
    }

    /// Get a copy of a record
    pub async fn get_stream(&self, id: &StreamId) -> Result<StreamEntry> {
        self.read(|state| state.get(id).cloned())
            .await
            .ok_or_else(|| Error::StreamNotFound(id.clone()))
    }

    /// Get the app/name a record belongs to
    pub async fn get_app_name(&self, id: &StreamId) -> Result<StreamKey> {
        self.read(|state| state.describe(id))
            .await
            .ok_or_else(|| Error::StreamNotFound(id.clone()))
    }

    /// Copies of all records in insertion order
    pub async fn streams(&self) -> Vec<StreamEntry> {
        self.read(|state| state.streams().to_vec()).await
    }

    /// Shared secret generated at first startup
    pub async fn secret(&self) -> Secret {
        self.read(|state| *state.secret()).await
    }

    /// Control-plane base URL, `None` when disabled
    pub async fn control_url(&self) -> Option<String> {
        self.read(|state| state.control_url().map(str::to_string)).await
    }

    /// Identifiers of records expired at `now`
    pub async fn expired(&self, now: i64) -> Vec<StreamId> {
        self.read(|state| state.expired(now)).await
    }

    /// Get total number of records
    pub async fn stream_count(&self) -> usize {
        self.read(|state| state.len()).await
    }
}
