//! Telegram Bot API access
//!
//! [`TelegramClient`] talks to the real API over HTTPS. Handlers and the
//! reminder scheduler only see the [`BotApi`] trait, and the poller only sees
//! [`UpdateSource`], so both can run against fakes in tests.

mod client;
pub mod types;

pub use client::TelegramClient;
pub use types::{Chat, File, Message, ParseMode, PhotoSize, Update, User};

use crate::error::TelegramError;
use async_trait::async_trait;

/// Reply channel used by handlers and the notifier
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Send a message and return it (handlers need its id to edit/delete it)
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<Message, TelegramError>;

    /// Replace the text of a message sent earlier
    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), TelegramError>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError>;

    /// Public download URL for a photo, resolved through `getFile`
    ///
    /// The URL embeds the bot token; never log it.
    async fn photo_url(&self, file_id: &str) -> Result<String, TelegramError>;
}

/// Source of inbound updates (long polling)
#[async_trait]
pub trait UpdateSource: Send + Sync {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError>;
}
