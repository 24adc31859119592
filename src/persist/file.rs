//! State file I/O
//!
//! Saves go to a temporary sibling file first and are then renamed over the
//! real path, so a reader never observes a partially written state.

use std::io;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use super::codec;
use crate::error::PersistError;
use crate::registry::state::RegistryState;

/// Read the state file
///
/// A missing file yields `Ok(None)`; an unreadable or undecodable file is an
/// error.
pub async fn load(path: &Path) -> Result<Option<RegistryState>, PersistError> {
    let data = match tokio::fs::read(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(PersistError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let state = codec::decode(&data).map_err(|source| PersistError::Decode {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(path = %path.display(), streams = state.len(), "State restored");
    Ok(Some(state))
}

/// Atomically replace the state file with `state`
pub async fn save(path: &Path, state: &RegistryState) -> Result<(), PersistError> {
    let encoded = codec::encode(state);
    let tmp = temp_path(path);

    if let Err(source) = write_private(&tmp, &encoded).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PersistError::Io { path: tmp, source });
    }

    if let Err(source) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(PersistError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    if let Err(source) = sync_dir(parent_dir(path)).await {
        return Err(PersistError::Io {
            path: parent_dir(path).to_path_buf(),
            source,
        });
    }

    tracing::trace!(path = %path.display(), bytes = encoded.len(), "State saved");
    Ok(())
}

/// Temporary sibling path used while saving
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "state".into());
    name.push(format!(".{}.tmp", std::process::id()));
    path.with_file_name(name)
}

/// Directory holding `path`; a bare file name lives in the working directory
pub(crate) fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Flush a directory entry so a completed rename survives power loss
#[cfg(unix)]
async fn sync_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

async fn write_private(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(data).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DecodeError;
    use crate::registry::entry::{Expiry, NewStream};

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = load(&dir.path().join("store.db")).await.unwrap();
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut state = RegistryState::new();
        state.insert(NewStream::new("live", "s1", "k1"));
        state.insert(NewStream::new("live", "s2", "k2").expiry(Expiry::at(123)));

        save(&path, &state).await.unwrap();
        let loaded = load(&path).await.unwrap().unwrap();
        assert_eq!(loaded, state);

        // No temporary file left behind
        assert!(!temp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_save_replaces_previous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let mut state = RegistryState::new();
        save(&path, &state).await.unwrap();
        state.insert(NewStream::new("live", "s1", "k1"));
        save(&path, &state).await.unwrap();

        assert_eq!(load(&path).await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        tokio::fs::write(&path, b"garbage").await.unwrap();

        let err = load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            PersistError::Decode {
                source: DecodeError::BadMagic,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("store.db");

        let err = save(&path, &RegistryState::new()).await.unwrap_err();
        assert!(matches!(err, PersistError::Io { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_saved_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        save(&path, &RegistryState::new()).await.unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_parent_dir() {
        assert_eq!(parent_dir(Path::new("/var/lib/rtmp-auth/store.db")), Path::new("/var/lib/rtmp-auth"));
        assert_eq!(parent_dir(Path::new("store.db")), Path::new("."));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sync_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(sync_dir(dir.path()).await.is_ok());
        assert!(sync_dir(&dir.path().join("missing")).await.is_err());
    }

    #[test]
    fn test_temp_path_is_sibling() {
        let tmp = temp_path(Path::new("/var/lib/rtmp-auth/store.db"));
        assert_eq!(tmp.parent(), Some(Path::new("/var/lib/rtmp-auth")));
        let name = tmp.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("store.db."));
        assert!(name.ends_with(".tmp"));
    }
}
