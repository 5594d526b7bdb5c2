//! Explicit retry policy with bounded attempts and exponential backoff.
//!
//! Retry behaviour in this system is never hidden behind interception:
//! callers construct a policy, decide which errors are retryable, and
//! optionally supply a fallback invoked when attempts are exhausted.

use std::future::Future;
use std::time::Duration;

/// A bounded retry schedule: `max_attempts` tries, exponential backoff
/// starting at `base_delay` and growing by `multiplier` per attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    multiplier: u32,
}

impl RetryPolicy {
    /// Creates a retry policy.
    ///
    /// `max_attempts` counts the first try; it is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            multiplier: multiplier.max(1),
        }
    }

    /// A policy that retries immediately without sleeping, for
    /// in-process conflicts where backoff buys nothing.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1)
    }

    /// Returns the configured number of attempts.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Returns the delay to sleep after the given 1-based failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * self.multiplier.saturating_pow(attempt.saturating_sub(1))
    }

    /// Runs `op`, retrying every error until attempts are exhausted.
    pub async fn run<T, E, Fut>(&self, op: impl FnMut() -> Fut) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_if(op, |_| true).await
    }

    /// Runs `op`, retrying only errors for which `retryable` returns true.
    ///
    /// Non-retryable errors and the final exhausted error are returned
    /// to the caller unchanged.
    pub async fn run_if<T, E, Fut>(
        &self,
        mut op: impl FnMut() -> Fut,
        retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_attempts && retryable(&e) => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "operation failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs `op` with retries, invoking `fallback` on the final error
    /// once attempts are exhausted (or a non-retryable error is hit).
    pub async fn run_with_fallback<T, E, Fut>(
        &self,
        op: impl FnMut() -> Fut,
        retryable: impl Fn(&E) -> bool,
        fallback: impl FnOnce(E) -> Result<T, E>,
    ) -> Result<T, E>
    where
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        match self.run_if(op, retryable).await {
            Ok(value) => Ok(value),
            Err(e) => fallback(e),
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, 2s base delay, doubling per attempt.
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2), 2)
    }
}
