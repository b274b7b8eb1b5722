//! Bounded retries for transient storage failures

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// How often and how patiently an operation is retried
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay before the second attempt; grows linearly per attempt
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Run `operation` until it succeeds, fails permanently, or attempts run out
    ///
    /// `is_retryable` decides whether an error is transient. The last error is
    /// returned once the policy is exhausted.
    pub async fn run<T, E, F, Fut, R>(&self, label: &str, is_retryable: R, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        R: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && is_retryable(&err) => {
                    warn!(
                        "{} failed on attempt {}/{}: {}; retrying",
                        label, attempt, max_attempts, err
                    );
                    tokio::time::sleep(self.delay_before(attempt + 1)).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Pause before the given attempt; saturates instead of overflowing
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff.saturating_mul(attempt.saturating_sub(1))
    }
}
