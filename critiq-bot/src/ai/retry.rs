//! Retry with exponential backoff for transient assistant API failures
//!
//! Only errors that [`AiError::is_transient`] accepts are retried; anything
//! else is returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::AiError;

/// Backoff schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(4),
        }
    }
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    backoff: &Backoff,
    mut operation: F,
) -> Result<T, AiError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AiError>>,
{
    let mut attempt = 0u32;
    let mut delay = backoff.initial_delay;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "Assistant call succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_transient() && attempt < backoff.max_attempts => {
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Transient assistant failure, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(backoff.max_delay);
            }
            Err(err) => return Err(err),
        }
    }
}
