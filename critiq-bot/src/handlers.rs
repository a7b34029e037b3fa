//! Message handlers
//!
//! Each handler receives one collated unit: a single message, or every
//! message of an album in arrival order. Failures are shown to the user as a
//! generic text and returned so the dispatcher logs the detail.

use critiq_common::db::users;
use critiq_common::time::{now_ms, until_ms};
use critiq_common::QuotaPolicy;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::ai::AiBackend;
use crate::error::{HandlerError, HandlerResult};
use crate::format::{split_message, strip_html_tags, DEFAULT_CHUNK_CHARS};
use crate::notifier::Notifier;
use crate::telegram::{BotApi, Message, ParseMode};

pub const ANALYZING_TEXT: &str = "Analyzing your photo...";
pub const ANALYSIS_FAILED_TEXT: &str = "Sorry, the analysis failed. Please try again later.";
pub const WRITING_TEXT: &str = "Writing a reply...";
pub const ANSWER_FAILED_TEXT: &str = "Sorry, I couldn't get an answer. Please try again later.";
pub const NEED_PHOTO_TEXT: &str = "Send me a photo first, then ask your questions about it.";

/// Greeting for `/start`
pub fn welcome_text(daily_limit: u32) -> String {
    format!(
        "<b>Hi! I'm Critiq, your photo critic.</b>\n\n\
         Send me a photo (or an album) and I'll review its composition, light and color.\n\n\
         • Up to <b>{}</b> photos per day\n\
         • Ask follow-up questions about your last photo as plain text\n\
         • Sending a new photo starts a fresh conversation",
        daily_limit
    )
}

/// Reply when the quota is used up
///
/// `wait` is how long until the oldest submission leaves the window.
pub fn limit_reached_text(daily_limit: u32, wait: Option<Duration>) -> String {
    let mut text = format!("You've used all {} photo reviews for today.", daily_limit);
    if let Some(wait) = wait {
        text.push_str(&format!(" The next one frees up in {}.", format_wait(wait)));
    }
    text.push_str(" I'll message you as soon as you can send more.");
    text
}

/// Coarse human wait, rounded up to the minute: `"5 h 12 min"`, `"40 min"`
fn format_wait(wait: Duration) -> String {
    let minutes = wait.as_millis().div_ceil(60_000);
    match (minutes / 60, minutes % 60) {
        (0, 0) => "less than a minute".to_string(),
        (0, m) => format!("{} min", m),
        (h, 0) => format!("{} h", h),
        (h, m) => format!("{} h {} min", h, m),
    }
}

/// Tunables for the handlers
#[derive(Debug, Clone, Copy)]
pub struct HandlerSettings {
    pub quota: QuotaPolicy,
    /// Delay before the renewal reminder
    pub reminder_delay: Duration,
    /// Maximum characters per outgoing message
    pub chunk_chars: usize,
}

impl Default for HandlerSettings {
    fn default() -> Self {
        let quota = QuotaPolicy::default();
        Self {
            quota,
            reminder_delay: quota.window,
            chunk_chars: DEFAULT_CHUNK_CHARS,
        }
    }
}

pub struct Handlers {
    pool: SqlitePool,
    bot: Arc<dyn BotApi>,
    ai: Arc<dyn AiBackend>,
    notifier: Arc<dyn Notifier>,
    settings: HandlerSettings,
}

impl Handlers {
    pub fn new(
        pool: SqlitePool,
        bot: Arc<dyn BotApi>,
        ai: Arc<dyn AiBackend>,
        notifier: Arc<dyn Notifier>,
        settings: HandlerSettings,
    ) -> Self {
        Self {
            pool,
            bot,
            ai,
            notifier,
            settings,
        }
    }

    /// Route a collated unit by its first message
    pub async fn handle(&self, messages: Vec<Message>) -> HandlerResult<()> {
        let Some(first) = messages.first() else {
            return Ok(());
        };

        if first.has_photo() {
            return self.handle_photo(first, messages.len()).await;
        }

        match first.command() {
            Some("start") => self.handle_start(first).await,
            Some(command) => {
                debug!(command, chat_id = first.chat.id, "Ignoring unknown command");
                Ok(())
            }
            None if first.text.is_some() => self.handle_text(first).await,
            None => {
                debug!(chat_id = first.chat.id, "Ignoring unsupported message");
                Ok(())
            }
        }
    }

    /// Register the user and send the greeting
    pub async fn handle_start(&self, message: &Message) -> HandlerResult<()> {
        let user_id = message.sender_id();
        users::get_or_create_user(&self.pool, user_id).await?;

        self.bot
            .send_message(
                message.chat.id,
                &welcome_text(self.settings.quota.limit),
                Some(ParseMode::Html),
            )
            .await?;

        info!(user_id, "User started the bot");
        Ok(())
    }

    /// Analyse the album's first photo and start a new conversation
    pub async fn handle_photo(&self, first: &Message, album_size: usize) -> HandlerResult<()> {
        let user_id = first.sender_id();
        let chat_id = first.chat.id;

        if !self.settings.quota.user_allowed(&self.pool, user_id).await? {
            let now = now_ms();
            let wait = self
                .settings
                .quota
                .next_available_at(&self.pool, user_id, now)
                .await?
                .map(|at| until_ms(at, now));
            info!(
                user_id,
                wait_secs = wait.map(|w| w.as_secs()),
                "Photo rejected: quota exhausted"
            );

            let text = limit_reached_text(self.settings.quota.limit, wait);
            self.bot.send_message(chat_id, &text, None).await?;
            return Ok(());
        }

        info!(user_id, album_size, "Analyzing photo");
        let status = self.bot.send_message(chat_id, ANALYZING_TEXT, None).await?;

        match self.analyze_photo(first, user_id).await {
            Ok(text) => {
                self.remove_status(chat_id, status.message_id).await;
                self.reply_html(chat_id, &text).await
            }
            Err(e) => {
                self.replace_status(chat_id, status.message_id, ANALYSIS_FAILED_TEXT).await;
                Err(e)
            }
        }
    }

    async fn analyze_photo(&self, message: &Message, user_id: i64) -> HandlerResult<String> {
        let photo = message
            .largest_photo()
            .ok_or(HandlerError::MissingPhoto(message.message_id))?;
        let url = self.bot.photo_url(&photo.file_id).await?;

        let reply = self.ai.start_session(&url).await?;

        users::set_thread(&self.pool, user_id, Some(&reply.thread_id)).await?;
        self.settings.quota.record_submission(&self.pool, user_id).await?;

        // The analysis already succeeded; a lost reminder is not worth failing it
        if let Err(e) = self.notifier.schedule(user_id, self.settings.reminder_delay).await {
            warn!(user_id, error = %e, "Failed to schedule renewal reminder");
        }

        Ok(reply.text)
    }

    /// Answer a follow-up question in the user's current conversation
    pub async fn handle_text(&self, message: &Message) -> HandlerResult<()> {
        let user_id = message.sender_id();
        let chat_id = message.chat.id;
        let question = message.text.as_deref().unwrap_or_default();

        let Some(thread_id) = users::get_thread(&self.pool, user_id).await? else {
            self.bot.send_message(chat_id, NEED_PHOTO_TEXT, None).await?;
            return Ok(());
        };

        let status = self.bot.send_message(chat_id, WRITING_TEXT, None).await?;

        match self.ai.continue_session(&thread_id, question).await {
            Ok(text) => {
                self.remove_status(chat_id, status.message_id).await;
                self.reply_html(chat_id, &text).await
            }
            Err(e) => {
                self.replace_status(chat_id, status.message_id, ANSWER_FAILED_TEXT).await;
                Err(e.into())
            }
        }
    }

    /// Send `text` as HTML in chunks, falling back to plain text per chunk
    /// when Telegram rejects the markup
    async fn reply_html(&self, chat_id: i64, text: &str) -> HandlerResult<()> {
        for chunk in split_message(text, self.settings.chunk_chars) {
            match self.bot.send_message(chat_id, &chunk, Some(ParseMode::Html)).await {
                Ok(_) => {}
                Err(e) if e.is_parse_entities() => {
                    warn!(chat_id, error = %e, "HTML rejected, resending as plain text");
                    let plain = strip_html_tags(&chunk);
                    if !plain.trim().is_empty() {
                        self.bot.send_message(chat_id, &plain, None).await?;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn remove_status(&self, chat_id: i64, message_id: i64) {
        if let Err(e) = self.bot.delete_message(chat_id, message_id).await {
            warn!(chat_id, message_id, error = %e, "Failed to delete status message");
        }
    }

    async fn replace_status(&self, chat_id: i64, message_id: i64, text: &str) {
        if let Err(e) = self.bot.edit_message_text(chat_id, message_id, text, None).await {
            warn!(chat_id, message_id, error = %e, "Failed to update status message");
        }
    }
}
