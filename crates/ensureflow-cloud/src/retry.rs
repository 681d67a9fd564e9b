//! Bounded exponential backoff around a single provider call

use std::future::Future;

use tracing::warn;

use crate::error::CloudResult;
use crate::provider::RetryConfig;

/// Runs `call`, retrying transient failures up to `config.max_attempts` times.
///
/// Non-transient errors are returned immediately.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, mut call: F) -> CloudResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = CloudResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = config.delay_for(attempt - 1);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient provider error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CloudError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn fast() -> RetryConfig {
        RetryConfig {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = &AtomicU32::new(0);
        let result = with_retry(&fast(), "describe", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(CloudError::api("ThrottlingException", "slow down"))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: CloudResult<()> = with_retry(&fast(), "update", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CloudError::api("RequestLimitExceeded", "limit"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = &AtomicU32::new(0);
        let result: CloudResult<()> = with_retry(&fast(), "create", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(CloudError::api("ValidationException", "bad request"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
