//! Persisted renewal reminders
//!
//! A reminder row is written before its timer is armed and flagged `sent`
//! only after delivery, so a restart re-arms anything still outstanding.

use sqlx::{Row, SqlitePool};

use super::models::ScheduledNotification;
use super::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use crate::Result;

/// Store a reminder due at `due_at_ms` and return its id
pub async fn insert_notification(pool: &SqlitePool, user_id: i64, due_at_ms: i64) -> Result<i64> {
    retry_on_lock("insert_notification", DEFAULT_MAX_LOCK_WAIT_MS, move || async move {
        let result = sqlx::query(
            "INSERT INTO scheduled_notifications (user_id, due_at_ms, sent) VALUES (?, ?, 0)",
        )
        .bind(user_id)
        .bind(due_at_ms)
        .execute(pool)
        .await?;

        Ok::<i64, crate::Error>(result.last_insert_rowid())
    })
    .await
}

/// Flag a reminder as delivered
pub async fn mark_sent(pool: &SqlitePool, id: i64) -> Result<()> {
    retry_on_lock("mark_sent", DEFAULT_MAX_LOCK_WAIT_MS, move || async move {
        sqlx::query("UPDATE scheduled_notifications SET sent = 1 WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok::<(), crate::Error>(())
    })
    .await
}

/// All reminders not yet delivered, soonest first
pub async fn pending_notifications(pool: &SqlitePool) -> Result<Vec<ScheduledNotification>> {
    let rows = sqlx::query(
        "SELECT id, user_id, due_at_ms FROM scheduled_notifications WHERE sent = 0 ORDER BY due_at_ms, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| ScheduledNotification {
            id: row.get("id"),
            user_id: row.get("user_id"),
            due_at_ms: row.get("due_at_ms"),
        })
        .collect())
}
