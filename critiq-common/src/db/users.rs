//! User registration and assistant thread bookkeeping

use sqlx::{Row, SqlitePool};

use super::models::User;
use crate::time::{ms_to_datetime, now_ms};
use crate::Result;

/// Register a user if unknown and return the stored record
pub async fn get_or_create_user(pool: &SqlitePool, tg_id: i64) -> Result<User> {
    sqlx::query("INSERT OR IGNORE INTO users (tg_id, thread_id, created_at_ms) VALUES (?, NULL, ?)")
        .bind(tg_id)
        .bind(now_ms())
        .execute(pool)
        .await?;

    get_user(pool, tg_id)
        .await?
        .ok_or(crate::Error::MissingUser(tg_id))
}

/// Load a user by Telegram id
pub async fn get_user(pool: &SqlitePool, tg_id: i64) -> Result<Option<User>> {
    let row = sqlx::query("SELECT tg_id, thread_id, created_at_ms FROM users WHERE tg_id = ?")
        .bind(tg_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| User {
        tg_id: row.get("tg_id"),
        thread_id: row.get("thread_id"),
        created_at: ms_to_datetime(row.get("created_at_ms")),
    }))
}

/// Set (or clear) the user's current assistant thread
///
/// Registers the user on the fly so a photo sent before `/start` still keeps
/// its conversation.
pub async fn set_thread(pool: &SqlitePool, tg_id: i64, thread_id: Option<&str>) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (tg_id, thread_id, created_at_ms) VALUES (?, ?, ?)
        ON CONFLICT(tg_id) DO UPDATE SET thread_id = excluded.thread_id
        "#,
    )
    .bind(tg_id)
    .bind(thread_id)
    .bind(now_ms())
    .execute(pool)
    .await?;

    Ok(())
}

/// Current assistant thread for the user, if any
pub async fn get_thread(pool: &SqlitePool, tg_id: i64) -> Result<Option<String>> {
    let thread: Option<Option<String>> =
        sqlx::query_scalar("SELECT thread_id FROM users WHERE tg_id = ?")
            .bind(tg_id)
            .fetch_optional(pool)
            .await?;

    Ok(thread.flatten())
}
