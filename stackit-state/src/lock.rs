//! State lock held by one CLI run

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Locks older than this are considered abandoned
pub const DEFAULT_LOCK_TTL_SECS: i64 = 900;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockInfo {
    pub id: String,
    /// CLI command holding the lock ("apply", "destroy", ...)
    pub operation: String,
    /// `user@host` of the holder
    pub who: String,
    pub created: DateTime<Utc>,
    pub expires: DateTime<Utc>,
}

impl LockInfo {
    pub fn new(operation: impl Into<String>) -> Self {
        Self::with_ttl(operation, Duration::seconds(DEFAULT_LOCK_TTL_SECS))
    }

    pub fn with_ttl(operation: impl Into<String>, ttl: Duration) -> Self {
        let created = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            operation: operation.into(),
            who: lock_holder(),
            created,
            expires: created + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires
    }
}

fn lock_holder() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    format!("{}@{}", user, host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_lock_is_held_by_someone_and_not_expired() {
        let lock = LockInfo::new("apply");
        assert_eq!(lock.operation, "apply");
        assert!(lock.who.contains('@'));
        assert!(!lock.is_expired());
        assert_eq!(
            (lock.expires - lock.created).num_seconds(),
            DEFAULT_LOCK_TTL_SECS
        );
    }

    #[test]
    fn negative_ttl_is_already_expired() {
        let lock = LockInfo::with_ttl("destroy", Duration::seconds(-1));
        assert!(lock.is_expired());
    }
}
