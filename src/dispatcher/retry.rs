//! Retry policy and a generic execute-with-retry helper.
//!
//! The policy is plain data with no global state, so tests inject a
//! zero-delay policy and count attempts.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::GatemonResult;

/// Backoff strategies for retry delays
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// No delay between attempts
    None,
    /// Fixed delay between attempts
    Fixed,
    /// Linear backoff: delay = base_delay * attempt
    Linear,
}

/// Retry policy: attempt budget plus backoff shape.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            backoff: BackoffStrategy::Fixed,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Policy with no inter-attempt delay, for tests.
    pub fn zero_delay(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            backoff: BackoffStrategy::None,
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        match self.backoff {
            BackoffStrategy::None => Duration::ZERO,
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay * attempt,
        }
    }
}

/// Run `operation` up to the policy's attempt budget. Only errors that
/// report themselves retryable are retried; everything else surfaces
/// immediately. The final attempt's error surfaces as-is.
pub async fn execute_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> GatemonResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = GatemonResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if e.is_retryable() && attempt < policy.max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "attempt failed, retrying"
                );
                let delay = policy.delay_after(attempt);
                if !delay.is_zero() {
                    sleep(delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatemonError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_exhausts_attempt_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::zero_delay(3);
        let result: GatemonResult<()> = execute_with_retry(&policy, "always-fails", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatemonError::transport("p", "refused")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_succeeds_mid_budget() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::zero_delay(5);
        let result = execute_with_retry(&policy, "flaky", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(GatemonError::transport("p", "refused"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_fast() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::zero_delay(3);
        let result: GatemonResult<()> = execute_with_retry(&policy, "fatal", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(GatemonError::config("bad")) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_shapes() {
        let fixed = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            backoff: BackoffStrategy::Fixed,
        };
        assert_eq!(fixed.delay_after(1), Duration::from_millis(100));
        assert_eq!(fixed.delay_after(3), Duration::from_millis(100));

        let linear = RetryPolicy {
            backoff: BackoffStrategy::Linear,
            ..fixed
        };
        assert_eq!(linear.delay_after(2), Duration::from_millis(200));
    }
}
