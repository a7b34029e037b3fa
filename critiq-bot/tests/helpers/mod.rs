//! Test doubles for the bot's collaborators
//!
//! Each integration test file pulls this in with `mod helpers;` and uses only
//! part of it.

#![allow(dead_code)]

use async_trait::async_trait;
use critiq_bot::ai::{AiBackend, SessionReply};
use critiq_bot::error::{AiError, TelegramError};
use critiq_bot::handlers::{HandlerSettings, Handlers};
use critiq_bot::notifier::Notifier;
use critiq_bot::telegram::{BotApi, Chat, Message, ParseMode, PhotoSize, Update, UpdateSource, User};
use critiq_common::db::open_in_memory;
use sqlx::SqlitePool;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Something the bot did in a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotEvent {
    Sent { chat_id: i64, text: String, html: bool },
    Edited { chat_id: i64, message_id: i64, text: String },
    Deleted { chat_id: i64, message_id: i64 },
}

/// Records every Bot API call
#[derive(Default)]
pub struct FakeBot {
    events: Mutex<Vec<BotEvent>>,
    next_message_id: AtomicI64,
    /// Answer HTML sends with Telegram's "can't parse entities" error
    pub reject_html: AtomicBool,
}

impl FakeBot {
    pub fn events(&self) -> Vec<BotEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Texts sent (not edited) in order
    pub fn sent_texts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                BotEvent::Sent { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: BotEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl BotApi for FakeBot {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<Message, TelegramError> {
        let html = parse_mode == Some(ParseMode::Html);
        if html && self.reject_html.load(Ordering::SeqCst) {
            return Err(TelegramError::Api {
                code: 400,
                description: "Bad Request: can't parse entities: unsupported start tag".to_string(),
                retry_after: None,
            });
        }

        self.record(BotEvent::Sent {
            chat_id,
            text: text.to_string(),
            html,
        });
        let message_id = 1000 + self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let mut message = text_message(message_id, chat_id, text);
        message.from = None;
        Ok(message)
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        _parse_mode: Option<ParseMode>,
    ) -> Result<(), TelegramError> {
        self.record(BotEvent::Edited {
            chat_id,
            message_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        self.record(BotEvent::Deleted { chat_id, message_id });
        Ok(())
    }

    async fn photo_url(&self, file_id: &str) -> Result<String, TelegramError> {
        Ok(format!("https://files.test/{}", file_id))
    }
}

/// Scripted assistant
pub struct FakeAi {
    pub reply: Mutex<String>,
    pub fail: AtomicBool,
    pub images: Mutex<Vec<String>>,
    pub questions: Mutex<Vec<(String, String)>>,
    sessions: AtomicI64,
}

impl Default for FakeAi {
    fn default() -> Self {
        Self {
            reply: Mutex::new("<b>Strong composition.</b>".to_string()),
            fail: AtomicBool::new(false),
            images: Mutex::new(Vec::new()),
            questions: Mutex::new(Vec::new()),
            sessions: AtomicI64::new(0),
        }
    }
}

impl FakeAi {
    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = reply.to_string();
    }

    pub fn images(&self) -> Vec<String> {
        self.images.lock().unwrap().clone()
    }

    fn check_failure(&self) -> Result<(), AiError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AiError::RunFailed {
                status: "failed".to_string(),
                detail: Some("server_error: boom".to_string()),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl AiBackend for FakeAi {
    async fn start_session(&self, image_url: &str) -> Result<SessionReply, AiError> {
        self.images.lock().unwrap().push(image_url.to_string());
        self.check_failure()?;

        let n = self.sessions.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SessionReply {
            thread_id: format!("thread_{}", n),
            text: self.reply.lock().unwrap().clone(),
        })
    }

    async fn continue_session(&self, thread_id: &str, question: &str) -> Result<String, AiError> {
        self.questions
            .lock()
            .unwrap()
            .push((thread_id.to_string(), question.to_string()));
        self.check_failure()?;
        Ok(self.reply.lock().unwrap().clone())
    }
}

/// Remembers scheduled reminders without timers
#[derive(Default)]
pub struct RecordingNotifier {
    pub scheduled: Mutex<Vec<(i64, Duration)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn schedule(&self, user_id: i64, delay: Duration) -> critiq_common::Result<()> {
        self.scheduled.lock().unwrap().push((user_id, delay));
        Ok(())
    }
}

/// Replays a fixed sequence of poll results, then idles
#[derive(Default)]
pub struct ScriptedSource {
    script: Mutex<VecDeque<Result<Vec<Update>, TelegramError>>>,
    /// `(offset, timeout_secs)` of every call
    pub calls: Mutex<Vec<(Option<i64>, u64)>>,
}

impl ScriptedSource {
    pub fn new(script: Vec<Result<Vec<Update>, TelegramError>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(Option<i64>, u64)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpdateSource for ScriptedSource {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        self.calls.lock().unwrap().push((offset, timeout_secs));

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            // A zero timeout returns at once, like the real API
            None if timeout_secs == 0 => Ok(Vec::new()),
            None => std::future::pending().await,
        }
    }
}

/// Everything a handler test needs
pub struct Harness {
    pub pool: SqlitePool,
    pub bot: Arc<FakeBot>,
    pub ai: Arc<FakeAi>,
    pub notifier: Arc<RecordingNotifier>,
    pub settings: HandlerSettings,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_settings(HandlerSettings::default()).await
    }

    pub async fn with_settings(settings: HandlerSettings) -> Self {
        Self {
            pool: open_in_memory().await.unwrap(),
            bot: Arc::new(FakeBot::default()),
            ai: Arc::new(FakeAi::default()),
            notifier: Arc::new(RecordingNotifier::default()),
            settings,
        }
    }

    pub fn handlers(&self) -> Handlers {
        Handlers::new(
            self.pool.clone(),
            self.bot.clone(),
            self.ai.clone(),
            self.notifier.clone(),
            self.settings,
        )
    }
}

pub fn text_message(message_id: i64, user_id: i64, text: &str) -> Message {
    Message {
        message_id,
        chat: Chat {
            id: user_id,
            kind: "private".to_string(),
        },
        from: Some(User {
            id: user_id,
            is_bot: false,
            first_name: "Test".to_string(),
            username: None,
        }),
        date: 1_718_000_000,
        text: Some(text.to_string()),
        caption: None,
        photo: None,
        media_group_id: None,
    }
}

/// Photo message with three sizes; the largest has file id `{file_id}`
pub fn photo_message(message_id: i64, user_id: i64, file_id: &str, group: Option<&str>) -> Message {
    let size = |suffix: &str, width: u32, height: u32| PhotoSize {
        file_id: format!("{}{}", file_id, suffix),
        file_unique_id: format!("u_{}{}", file_id, suffix),
        width,
        height,
        file_size: None,
    };

    let mut message = text_message(message_id, user_id, "");
    message.text = None;
    message.photo = Some(vec![
        size("_s", 90, 60),
        size("", 1280, 853),
        size("_m", 320, 213),
    ]);
    message.media_group_id = group.map(str::to_string);
    message
}

pub fn update(update_id: i64, message: Option<Message>) -> Update {
    Update { update_id, message }
}

/// Poll `condition` every 10 ms for up to two seconds
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}
