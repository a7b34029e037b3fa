//! Database models and queries

pub mod init;
pub mod models;
pub mod notifications;
pub mod retry;
pub mod uploads;
pub mod users;

pub use init::*;
pub use models::*;
pub use retry::retry_on_lock;
