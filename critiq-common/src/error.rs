//! Failures of the shared store and configuration layer

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("SQLite query failed: {0}")]
    Database(#[from] sqlx::Error),

    /// Write kept hitting "database is locked" past the retry budget
    #[error("{operation}: database still locked after {attempts} attempts ({elapsed_ms} ms)")]
    DatabaseLocked {
        operation: String,
        attempts: u32,
        elapsed_ms: u64,
    },

    /// Creating the database directory failed
    #[error("Cannot prepare data directory: {0}")]
    DataDir(#[from] std::io::Error),

    /// Config file unreadable or invalid, or a required setting missing
    #[error("Configuration error: {0}")]
    Config(String),

    /// Upsert succeeded but the row could not be read back
    #[error("User {0} missing after insert")]
    MissingUser(i64),
}
