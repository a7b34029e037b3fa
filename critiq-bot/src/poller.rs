//! Long-polling update loop
//!
//! Fetches updates in order, admits each message to the dispatcher on this
//! task (keeping album order), and spawns the resulting work on a
//! [`TaskTracker`] so shutdown can wait for it.

use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::dispatcher::Dispatcher;
use crate::error::TelegramError;
use crate::telegram::UpdateSource;

/// First delay after a failed poll
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for the poll retry delay
const MAX_BACKOFF: Duration = Duration::from_secs(30);

pub struct Poller {
    source: Arc<dyn UpdateSource>,
    dispatcher: Arc<Dispatcher>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    timeout_secs: u64,
}

impl Poller {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        dispatcher: Arc<Dispatcher>,
        tracker: TaskTracker,
        cancel: CancellationToken,
        timeout_secs: u64,
    ) -> Self {
        Self {
            source,
            dispatcher,
            tracker,
            cancel,
            timeout_secs,
        }
    }

    /// Poll until cancelled
    ///
    /// Returns the offset to resume from, if any update was seen.
    pub async fn run(self) -> Option<i64> {
        let mut offset: Option<i64> = None;
        let mut backoff = INITIAL_BACKOFF;

        info!(timeout_secs = self.timeout_secs, "Polling for updates");

        loop {
            let result = tokio::select! {
                _ = self.cancel.cancelled() => break,
                result = self.source.get_updates(offset, self.timeout_secs) => result,
            };

            match result {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for update in updates {
                        offset = Some(update.update_id + 1);

                        let Some(message) = update.message else {
                            debug!(update_id = update.update_id, "Skipping update without message");
                            continue;
                        };

                        if let Some(work) = self.dispatcher.admit(message) {
                            self.tracker.spawn(work);
                        }
                    }
                }
                Err(e) => {
                    let delay = retry_delay(&e, backoff);
                    warn!(error = %e, retry_in_secs = delay.as_secs(), "Polling failed");

                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }
        }

        self.acknowledge(offset).await;
        info!("Polling stopped");
        offset
    }

    /// Confirm the last processed update so a restart does not replay it
    async fn acknowledge(&self, offset: Option<i64>) {
        let Some(offset) = offset else {
            return;
        };
        if let Err(e) = self.source.get_updates(Some(offset), 0).await {
            warn!(offset, error = %e, "Failed to confirm processed updates");
        }
    }
}

/// Flood control's `retry_after` wins over the local backoff
fn retry_delay(error: &TelegramError, backoff: Duration) -> Duration {
    match error {
        TelegramError::Api {
            retry_after: Some(secs),
            ..
        } => Duration::from_secs(*secs),
        _ => backoff,
    }
}
