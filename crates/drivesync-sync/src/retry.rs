//! Retry executor
//!
//! Runs an async operation and retries it with exponential backoff while its
//! failures are classified as transient. The first sleep lasts the policy's
//! initial delay; every further retryable failure multiplies the delay by the
//! ratio. Attempts are unbounded unless the policy sets a cap.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use drivesync_core::config::RetryConfig;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Backoff parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep before the first retry
    pub initial_delay: Duration,
    /// Multiplier applied after each further failure
    pub ratio: u32,
    /// Total attempts allowed, including the first. `None` is unbounded.
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            ratio: 2,
            max_attempts: None,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            initial_delay: Duration::from_secs(config.starting_delay_secs),
            ratio: config.ratio,
            max_attempts: config.max_attempts,
        }
    }
}

/// Executes operations under a [`RetryPolicy`], stopping early when the
/// cancellation token fires
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy, cancel: CancellationToken) -> Self {
        Self { policy, cancel }
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Runs `op` until it succeeds, fails with an error `should_retry`
    /// rejects, runs out of attempts, or is cancelled
    ///
    /// On cancellation the last error is returned. `job` and `operation` only
    /// label log lines.
    pub async fn with_retry<T, E, F, Fut, P>(
        &self,
        job: &str,
        operation: &str,
        should_retry: P,
        mut op: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut delay = self.policy.initial_delay;
        let mut attempt: u32 = 1;

        loop {
            let err = match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(job, operation, attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(err) => err,
            };

            if !should_retry(&err) {
                return Err(err);
            }
            if self.policy.max_attempts.is_some_and(|max| attempt >= max) {
                warn!(job, operation, attempt, error = %err, "Retry attempts exhausted");
                return Err(err);
            }
            if self.cancel.is_cancelled() {
                return Err(err);
            }

            warn!(
                job,
                operation,
                attempt,
                delay_secs = delay.as_secs_f64(),
                error = %err,
                "Transient error, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => {
                    info!(job, operation, attempt, "Retry cancelled");
                    return Err(err);
                }
            }

            delay = delay.saturating_mul(self.policy.ratio);
            attempt += 1;
        }
    }
}
