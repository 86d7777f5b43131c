//! Teardown sweeps for test harnesses
//!
//! After an acceptance run, objects the run created may still exist. A sweep
//! lists the objects in a scope, skips the ones already being deleted and
//! deletes the ones the run tracked, waiting for each deletion to finish.
//! Running a sweep twice is harmless.

use async_trait::async_trait;
use log::{debug, info};
use thiserror::Error;

use crate::client::ApiError;
use crate::wait::WaitError;

/// A listed remote object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepCandidate {
    pub id: String,
    /// Deletion already in progress
    pub deleting: bool,
}

#[async_trait]
pub trait Sweepable: Send + Sync {
    /// Human readable object kind, used in errors
    fn kind(&self) -> &'static str;

    async fn list_candidates(&self, scope: &str) -> Result<Vec<SweepCandidate>, ApiError>;

    async fn delete_candidate(&self, scope: &str, id: &str) -> Result<(), ApiError>;

    async fn wait_deleted(&self, scope: &str, id: &str) -> Result<(), WaitError>;
}

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("getting {kind}s: {source}")]
    List {
        kind: &'static str,
        #[source]
        source: ApiError,
    },

    #[error("destroying {kind} {id} during CheckDestroy: {source}")]
    Delete {
        kind: &'static str,
        id: String,
        #[source]
        source: ApiError,
    },

    #[error("destroying {kind} {id} during CheckDestroy: waiting for deletion {source}")]
    Wait {
        kind: &'static str,
        id: String,
        #[source]
        source: WaitError,
    },
}

/// Ids touched by a sweep
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub deleted: Vec<String>,
    pub skipped_deleting: Vec<String>,
}

/// Delete every tracked object still present in `scope`
pub async fn sweep(
    target: &dyn Sweepable,
    scope: &str,
    tracked: &[String],
) -> Result<SweepReport, SweepError> {
    let kind = target.kind();
    let candidates = target
        .list_candidates(scope)
        .await
        .map_err(|source| SweepError::List { kind, source })?;

    let mut report = SweepReport::default();
    for candidate in candidates {
        if !tracked.contains(&candidate.id) {
            continue;
        }
        if candidate.deleting {
            debug!("{} {} is already being deleted", kind, candidate.id);
            report.skipped_deleting.push(candidate.id);
            continue;
        }

        let deleted = target.delete_candidate(scope, &candidate.id).await;
        match deleted {
            Ok(()) => {}
            Err(e) if e.is_not_found_or_gone() => {}
            Err(source) => {
                return Err(SweepError::Delete {
                    kind,
                    id: candidate.id,
                    source,
                });
            }
        }
        target
            .wait_deleted(scope, &candidate.id)
            .await
            .map_err(|source| SweepError::Wait {
                kind,
                id: candidate.id.clone(),
                source,
            })?;
        info!("swept {} {}", kind, candidate.id);
        report.deleted.push(candidate.id);
    }
    Ok(report)
}
