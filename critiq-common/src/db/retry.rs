//! Database retry logic
//!
//! Retries writes that fail with a transient "database is locked" error using
//! exponential backoff. Any other error is returned immediately.

use crate::{Error, Result};
use std::time::{Duration, Instant};

/// Default upper bound on total retry time for a single write
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Retry a database operation with exponential backoff until `max_wait_ms` elapses.
///
/// Backoff starts at 10ms, doubles per attempt and is capped at 1000ms.
pub async fn retry_on_lock<F, Fut, T>(
    operation_name: &str,
    max_wait_ms: u64,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis() as u64,
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if !is_lock_error(&err) {
                    return Err(err);
                }

                let elapsed = start_time.elapsed();
                if elapsed >= max_duration {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = elapsed.as_millis() as u64,
                        max_wait_ms,
                        "Database operation failed: max retry time exceeded"
                    );
                    return Err(Error::DatabaseLocked {
                        operation: operation_name.to_string(),
                        attempts: attempt,
                        elapsed_ms: elapsed.as_millis() as u64,
                    });
                }

                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    backoff_ms,
                    "Database locked, retrying"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
        }
    }
}

fn is_lock_error(err: &Error) -> bool {
    match err {
        Error::Database(db_err) => db_err.to_string().contains("database is locked"),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result = retry_on_lock("test", 100, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, Error>(42)
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_non_lock_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let result: Result<()> = retry_on_lock("test", 1000, move || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::MissingUser(1))
        })
        .await;

        assert!(matches!(result, Err(Error::MissingUser(1))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lock_exhaustion_reports_operation() {
        let result: Result<()> = retry_on_lock("mark_sent", 0, || async {
            Err(Error::Database(sqlx::Error::Protocol(
                "database is locked".to_string(),
            )))
        })
        .await;

        match result {
            Err(Error::DatabaseLocked {
                operation,
                attempts,
                ..
            }) => {
                assert_eq!(operation, "mark_sent");
                assert_eq!(attempts, 1);
            }
            other => panic!("expected DatabaseLocked, got {:?}", other),
        }
    }
}
