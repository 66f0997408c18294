//! Linear backoff for read-only queries.
//!
//! Only wrap idempotent reads here. File writes and the on-change command
//! must never be retried.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// How often and how patiently to retry a failing query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,

    /// Delay before retry `n` is `n * step`.
    pub step: Duration,
}

impl BackoffPolicy {
    /// Create a policy.
    pub fn new(max_retries: u32, step: Duration) -> Self {
        Self { max_retries, step }
    }

    /// Delay before the given retry, counting from 1.
    pub fn delay(&self, retry: u32) -> Duration {
        self.step * retry
    }

    /// Total attempts, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}

/// Run `op`, retrying failures with linearly growing delays.
///
/// Returns the first success, or the last error once
/// `policy.max_retries` retries have failed. Every call starts counting
/// from scratch.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: BackoffPolicy, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut retry = 0;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if retry >= policy.max_retries => return Err(e),
            Err(e) => {
                retry += 1;
                let delay = policy.delay(retry);
                warn!(
                    "Query failed (attempt {retry} of {}), retrying in {delay:?}: {e}",
                    policy.max_attempts()
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
