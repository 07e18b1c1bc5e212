//! Retry with exponential backoff for idempotent collaborator calls
//!
//! Only reads and revokes go through here. Publish and chat calls are never
//! retried automatically: a duplicate publish is a visible duplicate post.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Backoff policy
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    pub initial_backoff: Duration,

    pub max_backoff: Duration,

    /// Add up to 25% random jitter
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Backoff before retry number `attempt` (0-based), doubling each time
    pub fn backoff_duration(&self, attempt: u32) -> Duration {
        let base = self.initial_backoff.as_secs_f64() * 2f64.powi(attempt as i32);
        let capped = base.min(self.max_backoff.as_secs_f64());

        let factor = if self.jitter {
            1.0 + rand::thread_rng().gen_range(0.0..0.25)
        } else {
            1.0
        };

        Duration::from_secs_f64(capped * factor)
    }
}

/// Retry classification for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry,
    /// Retry after a server-provided delay (e.g. from Retry-After)
    RetryAfter(Duration),
    NoRetry,
}

/// Errors that know whether they are transient
pub trait RetryableError {
    fn retry_decision(&self) -> RetryDecision;
}

/// Run an idempotent async operation, retrying transient failures
pub async fn with_retry<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: RetryableError + std::fmt::Display,
{
    let mut attempt = 0;

    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        let delay = match error.retry_decision() {
            RetryDecision::NoRetry => {
                debug!(operation = operation_name, attempt, "Non-retryable failure: {}", error);
                return Err(error);
            }
            _ if attempt >= policy.max_retries => {
                warn!(
                    operation = operation_name,
                    attempts = attempt + 1,
                    "Giving up: {}",
                    error
                );
                return Err(error);
            }
            RetryDecision::RetryAfter(d) => d.min(policy.max_backoff),
            RetryDecision::Retry => policy.backoff_duration(attempt),
        };

        warn!(
            operation = operation_name,
            attempt = attempt + 1,
            backoff_ms = delay.as_millis() as u64,
            "Retrying after error: {}",
            error
        );
        sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct FlakyError {
        transient: bool,
    }

    impl std::fmt::Display for FlakyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "FlakyError(transient={})", self.transient)
        }
    }

    impl RetryableError for FlakyError {
        fn retry_decision(&self) -> RetryDecision {
            if self.transient {
                RetryDecision::Retry
            } else {
                RetryDecision::NoRetry
            }
        }
    }

    fn fast_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
            jitter: false,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(6),
            jitter: false,
            ..Default::default()
        };
        assert_eq!(policy.backoff_duration(0), Duration::from_secs(1));
        assert_eq!(policy.backoff_duration(1), Duration::from_secs(2));
        assert_eq!(policy.backoff_duration(2), Duration::from_secs(4));
        assert_eq!(policy.backoff_duration(3), Duration::from_secs(6));
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy {
            initial_backoff: Duration::from_secs(1),
            jitter: true,
            ..Default::default()
        };
        let d = policy.backoff_duration(0);
        assert!(d >= Duration::from_secs(1));
        assert!(d <= Duration::from_millis(1250));
    }

    #[tokio::test]
    async fn test_transient_failures_recover() {
        let mut calls = 0;
        let result: Result<&str, FlakyError> = with_retry(&fast_policy(3), "test", || {
            calls += 1;
            let n = calls;
            async move {
                if n < 3 {
                    Err(FlakyError { transient: true })
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_permanent_failure_not_retried() {
        let mut calls = 0;
        let result: Result<(), FlakyError> = with_retry(&fast_policy(3), "test", || {
            calls += 1;
            async { Err(FlakyError { transient: false }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_none_policy_single_attempt() {
        let mut calls = 0;
        let result: Result<(), FlakyError> = with_retry(&RetryPolicy::none(), "test", || {
            calls += 1;
            async { Err(FlakyError { transient: true }) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }
}
