//! STACKIT State Management
//!
//! Persists the state of managed resources between CLI runs, with locking so
//! two runs never write the same state.
//!
//! - **StateFile**: versioned state with a serial number and a lineage
//! - **StateBackend**: storage for state files and their locks
//! - **LockInfo**: who holds the state and until when
//!
//! # Example
//!
//! ```ignore
//! use stackit_state::{create_backend, BackendConfig};
//!
//! let backend = create_backend(&BackendConfig::local("prod.state.json"))?;
//! let lock = backend.acquire_lock("apply").await?;
//! let mut state = backend.read_state().await?.unwrap_or_default();
//! // ... apply changes ...
//! state.increment_serial();
//! backend.write_state(&state).await?;
//! backend.release_lock(&lock).await?;
//! ```

pub mod backend;
pub mod backends;
pub mod lock;
pub mod state;

// Re-export main types for convenience
pub use backend::{BackendConfig, BackendError, BackendResult, StateBackend};
pub use backends::{LocalBackend, create_backend};
pub use lock::LockInfo;
pub use state::{ResourceState, StateFile};
