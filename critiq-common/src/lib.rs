//! # Critiq Common Library
//!
//! Shared code for the Critiq bot crates including:
//! - Error and result types
//! - Configuration loading (TOML file, secrets, defaults)
//! - Database initialization and queries (users, uploads, reminders)
//! - Quota policy
//! - Timestamp utilities

pub mod config;
pub mod db;
pub mod error;
pub mod quota;
pub mod time;

pub use error::{Error, Result};
pub use quota::QuotaPolicy;
