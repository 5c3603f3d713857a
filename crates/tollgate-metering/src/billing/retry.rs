//! Retry and cancellation for billing calls
//!
//! Only transport-class failures (unavailable, deadline exceeded, resource
//! exhausted) are retried, with a fixed delay. Cancellation is checked before
//! every attempt and during every delay.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tollgate_common::BillingError;
use tracing::warn;

/// Bounded fixed-delay retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            delay: Duration::from_secs(1),
        }
    }
}

/// Race a billing call against cancellation
pub async fn cancellable<T, Fut>(cancel: &CancellationToken, call: Fut) -> Result<T, BillingError>
where
    Fut: Future<Output = Result<T, BillingError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BillingError::Cancelled),
        result = call => result,
    }
}

/// Run a billing call with retries
///
/// `on_retry` is invoked once per retry, before the delay.
pub async fn with_retry<T, F, Fut, R>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    mut on_retry: R,
    mut call: F,
) -> Result<T, BillingError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BillingError>>,
    R: FnMut(u32, &BillingError),
{
    let mut retries = 0u32;
    loop {
        match cancellable(cancel, call()).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && retries < policy.max_retries => {
                retries += 1;
                warn!(
                    attempt = retries,
                    max_retries = policy.max_retries,
                    error = %err,
                    "Retrying billing call"
                );
                on_retry(retries, &err);

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(BillingError::Cancelled),
                    _ = tokio::time::sleep(policy.delay) => {}
                }
            }
            Err(err) if err.is_retryable() => {
                return Err(BillingError::RetriesExhausted {
                    attempts: retries + 1,
                    last: Box::new(err),
                });
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            delay: Duration::from_millis(100),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let result = with_retry(policy(), &cancel, |_, _| {}, || {
            let calls = calls.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(BillingError::from(tonic::Status::unavailable("down")))
                } else {
                    Ok("ack")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ack");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_exhausted() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut retries = 0;
        let cancel = CancellationToken::new();

        let result: Result<(), _> = with_retry(policy(), &cancel, |_, _| retries += 1, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BillingError::from(tonic::Status::deadline_exceeded("slow"))) }
        })
        .await;

        assert!(matches!(result, Err(BillingError::RetriesExhausted { attempts: 4, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(retries, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_is_terminal() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let result: Result<(), _> = with_retry(policy(), &cancel, |_, _| {}, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BillingError::from(tonic::Status::permission_denied("no"))) }
        })
        .await;

        assert!(matches!(result, Err(BillingError::Status(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff() {
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();

        let slow = RetryPolicy {
            max_retries: 10,
            delay: Duration::from_secs(60),
        };
        let result: Result<(), _> = with_retry(slow, &cancel, |_, _| trigger.cancel(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BillingError::from(tonic::Status::unavailable("down"))) }
        })
        .await;

        assert!(matches!(result, Err(BillingError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_call() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = cancellable(&cancel, async { Ok::<_, BillingError>(1) }).await;
        assert!(matches!(result, Err(BillingError::Cancelled)));
    }
}
