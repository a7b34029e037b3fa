//! critiq-bot - Telegram photo critique bot
//!
//! Users send a photo (or an album), an OpenAI assistant reviews it, and the
//! user can ask follow-up questions in the same conversation. Submissions are
//! limited per user per rolling window, with a reminder once a slot frees up.
//!
//! Flow: [`poller::Poller`] → [`dispatcher::Dispatcher`] (album collation via
//! [`collator::AlbumCollator`]) → [`handlers::Handlers`].

pub mod ai;
pub mod collator;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod format;
pub mod handlers;
pub mod notifier;
pub mod poller;
pub mod telegram;

pub use error::{AiError, HandlerError, HandlerResult, TelegramError};

/// Build identification baked in by `build.rs`
pub fn build_info() -> String {
    format!(
        "{} ({}, {} build, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    )
}
