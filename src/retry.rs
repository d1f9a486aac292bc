//! Bounded retry for fallible async operations.
//!
//! [`with_retry`] runs an operation up to [`RetryPolicy::max_attempts`] times,
//! sleeping [`RetryPolicy::delay`] between attempts. Every error is retried;
//! the error from the final attempt is returned once the budget is spent.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// How many times to run an operation and how long to wait between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    /// A policy with the given attempt budget. Zero attempts is raised to one.
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run once, never retry.
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::once()
    }
}

/// Outcome of an exhausted retry loop: the last error and how many attempts were made.
#[derive(Debug)]
pub struct RetryExhausted<E> {
    pub attempts: u32,
    pub last_error: E,
}

/// Runs `operation` until it succeeds or the policy's attempt budget is spent.
///
/// No sleep happens after the final attempt.
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    action: &str,
    mut operation: F,
) -> std::result::Result<T, RetryExhausted<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    E: Display,
{
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(target: "identity.retry", action, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(error) if attempt < policy.max_attempts => {
                tracing::warn!(
                    target: "identity.retry",
                    action,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %error,
                    "attempt failed, retrying"
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
            Err(error) => {
                tracing::warn!(
                    target: "identity.retry",
                    action,
                    attempts = attempt,
                    error = %error,
                    "all attempts failed"
                );
                return Err(RetryExhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }
        }
    }
}
