//! Local file backend
//!
//! State lives in a JSON file (default `stackit.state.json`); the lock is a
//! sibling `.lock` file holding the serialized `LockInfo`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use log::{debug, warn};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs;

use crate::backend::{BackendConfig, BackendError, BackendResult, StateBackend};
use crate::lock::LockInfo;
use crate::state::StateFile;

pub struct LocalBackend {
    state_path: PathBuf,
    lock_path: PathBuf,
}

impl LocalBackend {
    pub const DEFAULT_STATE_FILE: &'static str = "stackit.state.json";

    pub fn with_path(state_path: impl Into<PathBuf>) -> Self {
        let state_path = state_path.into();
        let lock_path = state_path.with_extension("lock");
        Self {
            state_path,
            lock_path,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Self {
        Self::with_path(config.get_string("path").unwrap_or(Self::DEFAULT_STATE_FILE))
    }

    pub fn state_path(&self) -> &Path {
        &self.state_path
    }

    async fn read_lock(&self) -> BackendResult<Option<LockInfo>> {
        read_json(&self.lock_path, "lock file").await
    }

    async fn remove_lock(&self) -> BackendResult<()> {
        fs::remove_file(&self.lock_path)
            .await
            .map_err(|e| BackendError::Io(format!("Failed to remove lock file: {}", e)))
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::with_path(Self::DEFAULT_STATE_FILE)
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> BackendResult<Option<T>> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(BackendError::Io(format!("Failed to read {}: {}", what, e))),
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| BackendError::InvalidState(format!("Failed to parse {}: {}", what, e)))
}

/// Write through a temporary sibling and rename, so readers never see a
/// partial file
async fn write_json<T: Serialize>(path: &Path, value: &T, what: &str) -> BackendResult<()> {
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| BackendError::Serialization(format!("Failed to serialize {}: {}", what, e)))?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, content)
        .await
        .map_err(|e| BackendError::Io(format!("Failed to write {}: {}", what, e)))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| BackendError::Io(format!("Failed to write {}: {}", what, e)))
}

#[async_trait]
impl StateBackend for LocalBackend {
    async fn read_state(&self) -> BackendResult<Option<StateFile>> {
        let state: Option<StateFile> = read_json(&self.state_path, "state file").await?;
        if let Some(state) = &state
            && state.version > StateFile::CURRENT_VERSION
        {
            return Err(BackendError::UnsupportedVersion {
                found: state.version,
                supported: StateFile::CURRENT_VERSION,
            });
        }
        Ok(state)
    }

    async fn write_state(&self, state: &StateFile) -> BackendResult<()> {
        if let Some(stored) = read_json::<StateFile>(&self.state_path, "state file").await?
            && stored.lineage != state.lineage
        {
            return Err(BackendError::LineageMismatch {
                expected: stored.lineage,
                actual: state.lineage.clone(),
            });
        }
        debug!(
            "writing state serial={} to {}",
            state.serial,
            self.state_path.display()
        );
        write_json(&self.state_path, state, "state file").await
    }

    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo> {
        if let Some(existing) = self.read_lock().await? {
            if !existing.is_expired() {
                return Err(BackendError::locked(&existing));
            }
            warn!(
                "Taking over expired lock {} held by {}",
                existing.id, existing.who
            );
        }

        let lock = LockInfo::new(operation);
        write_json(&self.lock_path, &lock, "lock file").await?;
        Ok(lock)
    }

    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()> {
        let existing = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock.id.clone()))?;
        if existing.id != lock.id {
            return Err(BackendError::LockMismatch {
                expected: lock.id.clone(),
                actual: existing.id,
            });
        }
        self.remove_lock().await
    }

    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()> {
        let existing = self
            .read_lock()
            .await?
            .ok_or_else(|| BackendError::LockNotFound(lock_id.to_string()))?;
        if existing.id != lock_id {
            return Err(BackendError::LockMismatch {
                expected: lock_id.to_string(),
                actual: existing.id,
            });
        }
        self.remove_lock().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    use crate::state::ResourceState;

    #[tokio::test]
    async fn read_before_first_write_is_none() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        assert!(backend.read_state().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn written_state_reads_back() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let mut state = StateFile::new();
        state.upsert_resource(ResourceState::new("git_instance", "repo"));
        state.increment_serial();
        backend.write_state(&state).await.unwrap();

        let read = backend.read_state().await.unwrap().unwrap();
        assert_eq!(read.serial, 1);
        assert_eq!(read.lineage, state.lineage);
        assert_eq!(read.resources, state.resources);
        assert!(!dir.path().join("test.state.tmp").exists());
    }

    #[tokio::test]
    async fn write_of_another_lineage_is_rejected() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        backend.write_state(&StateFile::new()).await.unwrap();

        let err = backend.write_state(&StateFile::new()).await.unwrap_err();
        assert!(matches!(err, BackendError::LineageMismatch { .. }));
    }

    #[tokio::test]
    async fn newer_state_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.state.json");
        let mut state = StateFile::new();
        state.version = StateFile::CURRENT_VERSION + 1;
        std::fs::write(&path, serde_json::to_string(&state).unwrap()).unwrap();

        let err = LocalBackend::with_path(path).read_state().await.unwrap_err();
        assert!(matches!(err, BackendError::UnsupportedVersion { .. }));
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_released() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));

        let lock = backend.acquire_lock("apply").await.unwrap();
        let err = backend.acquire_lock("plan").await.unwrap_err();
        assert!(matches!(err, BackendError::Locked { .. }));

        backend.release_lock(&lock).await.unwrap();
        let again = backend.acquire_lock("destroy").await.unwrap();
        assert_eq!(again.operation, "destroy");
    }

    #[tokio::test]
    async fn expired_lock_is_taken_over() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let stale = LockInfo::with_ttl("apply", chrono::Duration::seconds(-1));
        write_json(&backend.lock_path, &stale, "lock file")
            .await
            .unwrap();

        let lock = backend.acquire_lock("apply").await.unwrap();
        assert_ne!(lock.id, stale.id);
    }

    #[tokio::test]
    async fn force_unlock_checks_the_lock_id() {
        let dir = tempdir().unwrap();
        let backend = LocalBackend::with_path(dir.path().join("test.state.json"));
        let lock = backend.acquire_lock("apply").await.unwrap();

        let err = backend.force_unlock("other").await.unwrap_err();
        assert!(matches!(err, BackendError::LockMismatch { .. }));
        backend.force_unlock(&lock.id).await.unwrap();

        let err = backend.release_lock(&lock).await.unwrap_err();
        assert!(matches!(err, BackendError::LockNotFound(_)));
    }

    #[test]
    fn from_config_uses_path_or_default() {
        let backend = LocalBackend::from_config(&BackendConfig::default());
        assert_eq!(backend.state_path(), Path::new("stackit.state.json"));

        let backend = LocalBackend::from_config(&BackendConfig::local("prod.state.json"));
        assert_eq!(backend.state_path(), Path::new("prod.state.json"));
        assert_eq!(backend.lock_path, PathBuf::from("prod.state.lock"));
    }
}
