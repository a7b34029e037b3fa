//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered bot user
///
/// `thread_id` is the assistant conversation opened by the user's most recent
/// photo; follow-up questions continue it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub tg_id: i64,
    pub thread_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A renewal reminder waiting to be delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledNotification {
    pub id: i64,
    pub user_id: i64,
    pub due_at_ms: i64,
}
