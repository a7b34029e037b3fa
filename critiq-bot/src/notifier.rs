//! Quota renewal reminders
//!
//! After a photo is analysed the user gets a reminder once the quota window
//! has passed. Reminders are persisted before their timer is armed, so a
//! restart re-arms whatever is still outstanding (at-least-once delivery).

use async_trait::async_trait;
use critiq_common::db::{notifications, ScheduledNotification};
use critiq_common::time::{duration_to_ms, now_ms, until_ms};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::telegram::BotApi;

/// Text of the reminder message
pub const RENEWAL_TEXT: &str =
    "Your daily limit has been renewed! You can send new photos for analysis.";

/// Schedules a reminder for a user
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Returns once the reminder is stored; delivery happens later
    async fn schedule(&self, user_id: i64, delay: Duration) -> critiq_common::Result<()>;
}

/// Notifier backed by `scheduled_notifications` and tokio timers
pub struct DelayedNotifier {
    pool: SqlitePool,
    bot: Arc<dyn BotApi>,
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl DelayedNotifier {
    /// Timers stop when `cancel` fires; undelivered rows stay pending
    pub fn new(pool: SqlitePool, bot: Arc<dyn BotApi>, cancel: CancellationToken) -> Self {
        Self {
            pool,
            bot,
            cancel,
            tracker: TaskTracker::new(),
        }
    }

    /// Re-arm every reminder not yet delivered
    ///
    /// Overdue reminders fire immediately. Returns how many were armed.
    pub async fn restore_pending(&self) -> critiq_common::Result<usize> {
        let pending = notifications::pending_notifications(&self.pool).await?;
        let count = pending.len();

        for notification in pending {
            self.arm(notification);
        }

        if count > 0 {
            info!(count, "Restored pending reminders");
        }
        Ok(count)
    }

    /// Number of armed timers not yet finished
    pub fn armed(&self) -> usize {
        self.tracker.len()
    }

    /// Cancel all timers and wait for in-progress deliveries to finish
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        debug!("Reminder timers stopped");
    }

    fn arm(&self, notification: ScheduledNotification) {
        let pool = self.pool.clone();
        let bot = Arc::clone(&self.bot);
        let cancel = self.cancel.clone();
        let delay = until_ms(notification.due_at_ms, now_ms());

        debug!(
            id = notification.id,
            user_id = notification.user_id,
            delay_secs = delay.as_secs(),
            "Armed reminder"
        );

        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(id = notification.id, "Reminder timer cancelled");
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            deliver(&pool, bot.as_ref(), &notification).await;
        });
    }
}

#[async_trait]
impl Notifier for DelayedNotifier {
    async fn schedule(&self, user_id: i64, delay: Duration) -> critiq_common::Result<()> {
        let due_at_ms = now_ms().saturating_add(duration_to_ms(delay));
        let id = notifications::insert_notification(&self.pool, user_id, due_at_ms).await?;

        self.arm(ScheduledNotification {
            id,
            user_id,
            due_at_ms,
        });
        Ok(())
    }
}

async fn deliver(pool: &SqlitePool, bot: &dyn BotApi, notification: &ScheduledNotification) {
    match bot.send_message(notification.user_id, RENEWAL_TEXT, None).await {
        Ok(_) => {
            info!(user_id = notification.user_id, "Sent renewal reminder");
        }
        Err(e) if e.is_permanent() => {
            // Blocked bot or deleted chat; retrying on the next start would fail again
            warn!(user_id = notification.user_id, error = %e, "Dropping undeliverable reminder");
        }
        Err(e) => {
            error!(
                user_id = notification.user_id,
                error = %e,
                "Failed to send reminder, left pending for next start"
            );
            return;
        }
    }

    if let Err(e) = notifications::mark_sent(pool, notification.id).await {
        error!(id = notification.id, error = %e, "Failed to mark reminder sent");
    }
}
