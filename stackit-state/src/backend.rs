//! State backend trait and error types

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::lock::LockInfo;
use crate::state::StateFile;

#[derive(Debug, Error)]
pub enum BackendError {
    /// The state is locked by another run
    #[error("State is locked by {who} (lock ID: {lock_id}, operation: {operation})")]
    Locked {
        lock_id: String,
        who: String,
        operation: String,
    },

    #[error("Lock not found: {0}")]
    LockNotFound(String),

    #[error("Lock ID mismatch: expected {expected}, got {actual}")]
    LockMismatch { expected: String, actual: String },

    #[error("Unsupported backend type: {0}")]
    UnsupportedBackend(String),

    #[error("Invalid state file: {0}")]
    InvalidState(String),

    /// Writing would replace a state of another lineage
    #[error("State lineage mismatch: expected {expected}, got {actual}")]
    LineageMismatch { expected: String, actual: String },

    /// The stored state was written by a newer version of the file format
    #[error("State file version {found} is newer than the supported version {supported}")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BackendError {
    pub fn locked(lock: &LockInfo) -> Self {
        Self::Locked {
            lock_id: lock.id.clone(),
            who: lock.who.clone(),
            operation: lock.operation.clone(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage for the state file and its lock
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Read the current state; `None` before the first write
    async fn read_state(&self) -> BackendResult<Option<StateFile>>;

    /// Write the state
    ///
    /// Fails with `LineageMismatch` when the stored state belongs to another
    /// lineage. Callers increment the serial before writing.
    async fn write_state(&self, state: &StateFile) -> BackendResult<()>;

    /// Acquire the lock for `operation`, unless another unexpired lock exists
    async fn acquire_lock(&self, operation: &str) -> BackendResult<LockInfo>;

    /// Release a lock this run holds
    async fn release_lock(&self, lock: &LockInfo) -> BackendResult<()>;

    /// Remove a stale lock by its ID
    async fn force_unlock(&self, lock_id: &str) -> BackendResult<()>;
}

/// `backend` block of the configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Backend type; only "local" is supported
    #[serde(rename = "type", default = "default_backend_type")]
    pub backend_type: String,
    #[serde(flatten)]
    pub attributes: HashMap<String, serde_json::Value>,
}

fn default_backend_type() -> String {
    "local".to_string()
}

impl BackendConfig {
    /// Local backend storing state at `path`
    pub fn local(path: impl Into<String>) -> Self {
        Self {
            backend_type: default_backend_type(),
            attributes: HashMap::from([(
                "path".to_string(),
                serde_json::Value::String(path.into()),
            )]),
        }
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(serde_json::Value::as_str)
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            backend_type: default_backend_type(),
            attributes: HashMap::new(),
        }
    }
}
