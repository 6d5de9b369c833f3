//! Bounded external calls
//!
//! Every call to a Port runs under a timeout. A timeout or a retryable failure
//! is retried exactly once after a fixed backoff; the second failure is
//! returned to the caller.

use std::future::Future;
use std::time::Duration;

/// Errors that can tell whether another attempt is worthwhile
pub trait RetryableError: std::fmt::Display {
    fn is_retryable(&self) -> bool;

    /// Error value standing for an attempt that exceeded its timeout
    fn timed_out(after: Duration) -> Self;
}

/// Timeout and backoff of one external call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(timeout: Duration, backoff: Duration) -> Self {
        Self { timeout, backoff }
    }
}

/// Run `op` under `policy.timeout`, retrying once on a retryable failure.
pub async fn retry_once<T, E, F, Fut>(label: &str, policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: RetryableError,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    match attempt(policy.timeout, op()).await {
        Ok(value) => Ok(value),
        Err(e) if e.is_retryable() => {
            tracing::warn!(
                "{} failed ({}), retrying in {}ms",
                label,
                e,
                policy.backoff.as_millis()
            );
            tokio::time::sleep(policy.backoff).await;
            attempt(policy.timeout, op()).await.map_err(|e| {
                tracing::warn!("{} failed again: {}", label, e);
                e
            })
        }
        Err(e) => Err(e),
    }
}

async fn attempt<T, E, Fut>(timeout: Duration, fut: Fut) -> Result<T, E>
where
    E: RetryableError,
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(E::timed_out(timeout)),
    }
}
