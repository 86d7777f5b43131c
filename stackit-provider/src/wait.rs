//! Convergence waits
//!
//! Asynchronous API operations are polled until the remote object reaches a
//! terminal state. The first check runs immediately, later checks are spaced
//! by the poll interval.

use std::future::Future;
use std::time::Duration;

use log::debug;
use thiserror::Error;
use tokio::time::Instant;

use crate::client::ApiError;
use crate::config::WaitConfig;

/// Outcome of a single poll
#[derive(Debug)]
pub enum WaitStatus<T> {
    Pending,
    Done(T),
}

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Debug, Clone, Copy)]
pub struct WaitHandler {
    config: WaitConfig,
}

impl WaitHandler {
    pub fn new(config: WaitConfig) -> Self {
        Self { config }
    }

    /// Poll `check` until it reports `Done`, fails, or the timeout elapses
    ///
    /// A check that hangs is abandoned once the overall timeout is reached.
    ///
    /// Transient gateway errors (502/503/504) are retried up to the configured
    /// number of consecutive times; any other error ends the wait.
    pub async fn wait<T, F, Fut>(&self, what: &str, mut check: F) -> Result<T, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<WaitStatus<T>, WaitError>>,
    {
        let start = Instant::now();
        let mut transient_failures = 0;

        loop {
            let remaining = self.config.timeout.saturating_sub(start.elapsed());
            let Ok(outcome) = tokio::time::timeout(remaining, check()).await else {
                return Err(WaitError::Timeout(self.config.timeout));
            };
            match outcome {
                Ok(WaitStatus::Done(value)) => {
                    debug!("{} done after {:?}", what, start.elapsed());
                    return Ok(value);
                }
                Ok(WaitStatus::Pending) => {
                    transient_failures = 0;
                    debug!("{} pending", what);
                }
                Err(WaitError::Api(e)) if e.is_transient() => {
                    transient_failures += 1;
                    if transient_failures > self.config.transient_retries {
                        return Err(WaitError::Api(e));
                    }
                    debug!(
                        "{} transient error ({}/{}): {}",
                        what, transient_failures, self.config.transient_retries, e
                    );
                }
                Err(e) => return Err(e),
            }

            if start.elapsed() + self.config.poll_interval > self.config.timeout {
                return Err(WaitError::Timeout(self.config.timeout));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
