//! Bounded retry around single file operations.
//!
//! Every discrete read or write the crate performs goes through a
//! [`RetryStrategy`]. Antivirus scanners and cloud-sync clients routinely hold
//! short-lived locks on files in mod directories, so a failed attempt is
//! retried after a fixed delay before the error is surfaced.
//!
//! A strategy always wraps one file operation, never a whole batch: a lock on
//! one file must not force unrelated work to be redone.
//!
//! # Example
//!
//! ```ignore
//! use modpatch::retry::{RetryPolicy, RetryStrategy};
//!
//! let strategy = RetryStrategy::new(RetryPolicy::default());
//! let text = strategy.run(|| tokio::fs::read_to_string(&path)).await?;
//! ```

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

// =============================================================================
// Retry Policy Constants
// =============================================================================

/// Default number of attempts (including the first one).
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 10;

/// Default delay between attempts in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 250;

/// Fixed-delay retry policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Creates a fixed retry policy.
    ///
    /// # Arguments
    ///
    /// * `max_attempts` - Maximum number of attempts (including initial), at least 1
    /// * `delay` - Fixed delay between attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Returns the delay to wait after the given failed attempt (1-based),
    /// or `None` when no attempts remain.
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt < self.max_attempts {
            Some(self.delay)
        } else {
            None
        }
    }
}

/// Aggregate failure raised when every attempt failed.
///
/// Holds the error of each attempt in the order they happened.
#[derive(Debug, Error)]
#[error("{}", summarize(.errors))]
pub struct RetryError<E: fmt::Debug + fmt::Display> {
    /// One error per failed attempt.
    pub errors: Vec<E>,
}

impl<E: fmt::Debug + fmt::Display> RetryError<E> {
    /// Number of attempts that were made.
    pub fn attempts(&self) -> usize {
        self.errors.len()
    }

    /// The error of the final attempt.
    pub fn last(&self) -> Option<&E> {
        self.errors.last()
    }
}

fn summarize<E: fmt::Display>(errors: &[E]) -> String {
    match errors.last() {
        Some(last) => format!(
            "retry strategy failed after {} attempts: {}",
            errors.len(),
            last
        ),
        None => "retry strategy failed without attempts".to_string(),
    }
}

/// Executes async operations under a [`RetryPolicy`].
#[derive(Clone, Debug, Default)]
pub struct RetryStrategy {
    policy: RetryPolicy,
}

impl RetryStrategy {
    /// Create a strategy for the given policy.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// The policy in force.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `op` until it succeeds or the attempts are exhausted.
    ///
    /// The operation is invoked afresh on every attempt. Returns the first
    /// successful value, or a [`RetryError`] holding every attempt's error.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        E: fmt::Debug + fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut errors = Vec::new();
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(attempt, "Operation succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    warn!(attempt, max_attempts = self.policy.max_attempts, error = %e, "Attempt failed");
                    errors.push(e);
                }
            }

            match self.policy.delay_for_attempt(attempt) {
                Some(delay) => {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                }
                None => return Err(RetryError { errors }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 10);
        assert_eq!(policy.delay, Duration::from_millis(250));
    }

    #[test]
    fn test_fixed_policy_clamps_to_one_attempt() {
        let policy = RetryPolicy::fixed(0, Duration::from_millis(5));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.delay_for_attempt(1), None);
    }

    #[test]
    fn test_delay_for_attempt() {
        let policy = RetryPolicy::fixed(3, Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(10)));
        assert_eq!(policy.delay_for_attempt(3), None);
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let strategy = RetryStrategy::default();
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: Result<u32, RetryError<io::Error>> = strategy
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(7)
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_transient_failures() {
        let strategy = RetryStrategy::default();
        let calls = Arc::new(AtomicU32::new(0));

        let result = strategy
            .run(|| {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(io::Error::new(io::ErrorKind::PermissionDenied, "locked"))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_attempts_every_time_with_delay() {
        let strategy = RetryStrategy::default();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let start = tokio::time::Instant::now();

        let result: Result<(), _> = strategy
            .run(move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Err(io::Error::new(io::ErrorKind::Other, format!("failure {}", n)))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(err.attempts(), 10);
        assert_eq!(err.errors[0].to_string(), "failure 0");
        assert_eq!(err.last().unwrap().to_string(), "failure 9");
        // Nine pauses between ten attempts
        assert_eq!(start.elapsed(), Duration::from_millis(9 * 250));
    }

    #[tokio::test]
    async fn test_error_display_mentions_last_failure() {
        let strategy = RetryStrategy::new(RetryPolicy::fixed(2, Duration::ZERO));

        let err = strategy
            .run(|| async { Err::<(), _>(io::Error::new(io::ErrorKind::Other, "disk full")) })
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("2 attempts"));
        assert!(message.contains("disk full"));
    }
}
