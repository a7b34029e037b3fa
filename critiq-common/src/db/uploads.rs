//! Photo submission log
//!
//! One row per analyzed photo (an album counts once). Quota checks count rows
//! inside the rolling window.

use sqlx::SqlitePool;

use super::retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
use crate::time::now_ms;
use crate::Result;

/// Record a submission at `at_ms`, registering the user if needed
pub async fn record_upload(pool: &SqlitePool, tg_id: i64, at_ms: i64) -> Result<()> {
    retry_on_lock("record_upload", DEFAULT_MAX_LOCK_WAIT_MS, move || async move {
        let mut tx = pool.begin().await?;

        sqlx::query(
            "INSERT OR IGNORE INTO users (tg_id, thread_id, created_at_ms) VALUES (?, NULL, ?)",
        )
        .bind(tg_id)
        .bind(now_ms())
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO photo_uploads (user_id, created_at_ms) VALUES (?, ?)")
            .bind(tg_id)
            .bind(at_ms)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok::<(), crate::Error>(())
    })
    .await
}

/// Number of submissions by the user at or after `since_ms`
pub async fn count_uploads_since(pool: &SqlitePool, tg_id: i64, since_ms: i64) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM photo_uploads WHERE user_id = ? AND created_at_ms >= ?",
    )
    .bind(tg_id)
    .bind(since_ms)
    .fetch_one(pool)
    .await?;

    Ok(count)
}

/// Timestamp of the oldest submission at or after `since_ms`
pub async fn oldest_upload_since(
    pool: &SqlitePool,
    tg_id: i64,
    since_ms: i64,
) -> Result<Option<i64>> {
    let oldest: Option<i64> = sqlx::query_scalar(
        "SELECT MIN(created_at_ms) FROM photo_uploads WHERE user_id = ? AND created_at_ms >= ?",
    )
    .bind(tg_id)
    .bind(since_ms)
    .fetch_one(pool)
    .await?;

    Ok(oldest)
}
