//! Bounded exponential backoff for transient upstream failures
//!
//! Only `UpstreamUnavailable` is retried; auth, quota, and malformed
//! responses return immediately.

use super::ServiceError;
use std::time::Duration;

/// Initial delay before the second attempt
const INITIAL_BACKOFF_MS: u64 = 250;
/// Ceiling for a single backoff sleep
const MAX_BACKOFF_MS: u64 = 2_000;

/// Retry an upstream operation with exponential backoff.
///
/// `max_attempts` counts the first try, so `max_attempts = 3` means at
/// most two retries.
pub async fn retry_backoff<F, Fut, T>(
    operation_name: &str,
    max_attempts: u32,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ServiceError>>,
{
    let max_attempts = max_attempts.max(1);
    let mut backoff_ms = INITIAL_BACKOFF_MS;

    for attempt in 1..=max_attempts {
        if attempt > 1 {
            tracing::debug!(
                operation = operation_name,
                attempt,
                "Retrying upstream operation"
            );
        }

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Upstream operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_retryable() && attempt < max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    error = %err,
                    "Upstream unavailable, backing off"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(MAX_BACKOFF_MS);
            }
            Err(err) => return Err(err),
        }
    }

    unreachable!("retry loop returns on the final attempt")
}
