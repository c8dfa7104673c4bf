//! Timeouts and retry with exponential backoff for external calls.

use crate::config::RetrySettings;
use crate::error::{FortellError, Result};
use std::future::Future;
use std::time::Duration;
use tokio_retry2::strategy::{jitter, ExponentialBackoff};
use tokio_retry2::{Retry, RetryError};
use tracing::warn;

/// Backoff delays between attempts: `initial`, `2 * initial`, `4 * initial`...
/// jittered and capped at `max_backoff_ms`, one fewer than the attempt budget.
pub fn backoff(policy: &RetrySettings) -> impl Iterator<Item = Duration> {
    let cap = Duration::from_millis(policy.max_backoff_ms);
    ExponentialBackoff::from_millis(2)
        .factor(policy.initial_backoff_ms / 2)
        .max_delay(cap)
        .map(jitter)
        .map(move |delay| delay.min(cap))
        .take(policy.max_attempts.saturating_sub(1))
}

/// Run a future with a deadline; elapsing becomes a transient `Timeout`.
pub async fn with_timeout<T, Fut>(limit: Duration, what: &str, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(FortellError::Timeout(limit.as_secs(), what.to_string())),
    }
}

/// Retry an operation while it fails with retryable errors.
///
/// Permanent errors are returned after the first attempt.
pub async fn with_retry<T, F, Fut>(policy: &RetrySettings, what: &str, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    Retry::spawn(backoff(policy), || async {
        match operation().await {
            Ok(value) => Ok(value),
            Err(e) if e.is_retryable() => {
                warn!("{} failed, will retry: {}", what, e);
                Err(RetryError::Transient {
                    err: e,
                    retry_after: None,
                })
            }
            Err(e) => Err(RetryError::Permanent(e)),
        }
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn instant(max_attempts: usize) -> RetrySettings {
        RetrySettings {
            max_attempts,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }

    #[test]
    fn test_backoff_respects_budget() {
        assert_eq!(backoff(&RetrySettings::default()).count(), 2);
        assert_eq!(backoff(&instant(1)).count(), 0);
        assert_eq!(backoff(&instant(0)).count(), 0);
    }

    #[test]
    fn test_backoff_never_exceeds_cap() {
        let policy = RetrySettings {
            max_attempts: 10,
            initial_backoff_ms: 2000,
            max_backoff_ms: 5000,
        };
        for _ in 0..50 {
            assert!(backoff(&policy).all(|d| d <= Duration::from_millis(5000)));
        }
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let calls = AtomicUsize::new(0);
        let result = with_retry(&instant(3), "op", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FortellError::ServiceTransient("busy".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(tokio_test::assert_ok!(result), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_budget_exhausted() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_retry(&instant(3), "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FortellError::ServiceTransient("busy".into()))
        })
        .await;
        tokio_test::assert_err!(result);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_not_retried() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = with_retry(&instant(3), "op", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(FortellError::ServicePermanent("bad key".into()))
        })
        .await;
        assert!(matches!(result, Err(FortellError::ServicePermanent(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_is_retryable() {
        let result: Result<()> = with_timeout(Duration::from_millis(10), "slow", async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        let err = result.unwrap_err();
        assert!(matches!(err, FortellError::Timeout(..)));
        assert!(err.is_retryable());
    }
}
