//! Per-user submission quota
//!
//! A user may submit up to `limit` photos inside any rolling `window`
//! (3 per 24 hours by default).

use sqlx::SqlitePool;
use std::time::Duration;

use crate::db::uploads;
use crate::time::{duration_to_ms, now_ms};
use crate::Result;

/// Rolling-window submission limit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    pub limit: u32,
    pub window: Duration,
}

impl Default for QuotaPolicy {
    fn default() -> Self {
        Self {
            limit: 3,
            window: Duration::from_secs(86_400),
        }
    }
}

impl QuotaPolicy {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self { limit, window }
    }

    fn window_start(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(duration_to_ms(self.window))
    }

    /// Whether the user may submit another photo now
    pub async fn user_allowed(&self, pool: &SqlitePool, tg_id: i64) -> Result<bool> {
        self.user_allowed_at(pool, tg_id, now_ms()).await
    }

    pub async fn user_allowed_at(
        &self,
        pool: &SqlitePool,
        tg_id: i64,
        now_ms: i64,
    ) -> Result<bool> {
        let used = uploads::count_uploads_since(pool, tg_id, self.window_start(now_ms)).await?;
        Ok(used < i64::from(self.limit))
    }

    /// Record a submission made now
    pub async fn record_submission(&self, pool: &SqlitePool, tg_id: i64) -> Result<()> {
        uploads::record_upload(pool, tg_id, now_ms()).await
    }

    /// When the user regains a free slot
    ///
    /// `None` if a slot is already free. Otherwise the moment the oldest
    /// submission in the window ages out.
    pub async fn next_available_at(
        &self,
        pool: &SqlitePool,
        tg_id: i64,
        now_ms: i64,
    ) -> Result<Option<i64>> {
        if self.user_allowed_at(pool, tg_id, now_ms).await? {
            return Ok(None);
        }

        let oldest = uploads::oldest_upload_since(pool, tg_id, self.window_start(now_ms)).await?;
        Ok(oldest.map(|ms| ms.saturating_add(duration_to_ms(self.window))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    const HOUR_MS: i64 = 3_600_000;

    #[tokio::test]
    async fn test_allows_up_to_limit() {
        let pool = open_in_memory().await.unwrap();
        let policy = QuotaPolicy::default();
        let now = 100 * HOUR_MS;

        for i in 0..3 {
            assert!(policy.user_allowed_at(&pool, 1, now).await.unwrap(), "slot {}", i);
            uploads::record_upload(&pool, 1, now - HOUR_MS + i).await.unwrap();
        }

        assert!(!policy.user_allowed_at(&pool, 1, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_old_submissions_age_out() {
        let pool = open_in_memory().await.unwrap();
        let policy = QuotaPolicy::default();
        let now = 100 * HOUR_MS;

        uploads::record_upload(&pool, 1, now - 25 * HOUR_MS).await.unwrap();
        uploads::record_upload(&pool, 1, now - 2 * HOUR_MS).await.unwrap();
        uploads::record_upload(&pool, 1, now - HOUR_MS).await.unwrap();

        assert!(policy.user_allowed_at(&pool, 1, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_next_available_at() {
        let pool = open_in_memory().await.unwrap();
        let policy = QuotaPolicy::new(2, Duration::from_secs(24 * 3600));
        let now = 100 * HOUR_MS;

        assert_eq!(policy.next_available_at(&pool, 1, now).await.unwrap(), None);

        uploads::record_upload(&pool, 1, now - 10 * HOUR_MS).await.unwrap();
        uploads::record_upload(&pool, 1, now - 5 * HOUR_MS).await.unwrap();

        assert_eq!(
            policy.next_available_at(&pool, 1, now).await.unwrap(),
            Some(now + 14 * HOUR_MS)
        );
    }
}
