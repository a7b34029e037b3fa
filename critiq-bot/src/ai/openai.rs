//! OpenAI Assistants client
//!
//! One conversation per photo, kept as an Assistants API thread:
//! 1. create thread
//! 2. add the user message (prompt text + image URL)
//! 3. start a run of the configured assistant
//! 4. poll the run until it reaches a terminal status
//! 5. read the assistant's reply produced by that run
//!
//! Follow-up questions repeat steps 2-5 on the stored thread.
//!
//! # API Reference
//! - Endpoint: `https://api.openai.com/v1/threads`
//! - Header `OpenAI-Beta: assistants=v2` is required
//! - Documentation: https://platform.openai.com/docs/api-reference/assistants

use async_trait::async_trait;
use critiq_common::config::Secret;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::retry::{retry_transient, Backoff};
use super::{AiBackend, SessionReply};
use crate::error::AiError;

/// Default timeout for a single HTTP request
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 500;

/// Prompt sent together with every photo
const PHOTO_PROMPT: &str = "Analyze this work according to your instructions. \
     Reply strictly in HTML format (use <b>, <i>, <code>).";

/// Appended to the assistant's own instructions on every run
const RUN_INSTRUCTIONS: &str = "Please format your response using HTML tags supported by Telegram. \
     Do not use markdown like **bold**.";

/// Connection and polling settings
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub api_base: String,
    pub api_key: Secret,
    pub assistant_id: String,
    /// Delay between run status checks
    pub poll_interval: Duration,
    /// Give up (and cancel the run) after this long
    pub run_timeout: Duration,
    pub backoff: Backoff,
}

/// Assistants API client
pub struct OpenAiAssistant {
    http_client: Client,
    settings: OpenAiSettings,
}

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: String,
    status: String,
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: TextContent },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct TextContent {
    value: String,
}

/// Where a run stands, from its `status` string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Pending,
    Completed,
    Failed,
    /// Waiting on tool output the bot never supplies; blocks the thread until cancelled
    Stalled,
}

fn run_state(status: &str) -> RunState {
    match status {
        "queued" | "in_progress" | "cancelling" => RunState::Pending,
        "completed" => RunState::Completed,
        "requires_action" => RunState::Stalled,
        // failed, cancelled, expired, incomplete
        _ => RunState::Failed,
    }
}

/// Body of the user message that carries a photo
fn photo_message_body(image_url: &str) -> Value {
    json!({
        "role": "user",
        "content": [
            { "type": "text", "text": PHOTO_PROMPT },
            { "type": "image_url", "image_url": { "url": image_url } }
        ]
    })
}

fn question_message_body(question: &str) -> Value {
    json!({ "role": "user", "content": question })
}

/// Text of the newest assistant message in a (newest-first) listing
fn assistant_text(list: MessageList) -> Result<String, AiError> {
    let message = list
        .data
        .into_iter()
        .find(|m| m.role == "assistant")
        .ok_or(AiError::EmptyResponse)?;

    let text = message
        .content
        .into_iter()
        .filter_map(|part| match part {
            ContentPart::Text { text } => Some(text.value),
            ContentPart::Other => None,
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    if text.trim().is_empty() {
        return Err(AiError::EmptyResponse);
    }
    Ok(text)
}

fn truncate(body: &str) -> String {
    match body.char_indices().nth(MAX_ERROR_BODY) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

impl OpenAiAssistant {
    pub fn new(settings: OpenAiSettings) -> Result<Self, AiError> {
        let mut headers = header::HeaderMap::new();
        let bearer = format!("Bearer {}", settings.api_key.expose());
        let mut auth = header::HeaderValue::from_str(&bearer).map_err(|_| {
            AiError::Parse("API key contains invalid header characters".to_string())
        })?;
        auth.set_sensitive(true);
        headers.insert(header::AUTHORIZATION, auth);
        headers.insert("OpenAI-Beta", header::HeaderValue::from_static("assistants=v2"));

        let http_client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| AiError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            settings: OpenAiSettings {
                api_base: settings.api_base.trim_end_matches('/').to_string(),
                ..settings
            },
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_base, path)
    }

    async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, AiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body: truncate(&body),
            });
        }
        response
            .json()
            .await
            .map_err(|e| AiError::Parse(e.to_string()))
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, AiError> {
        let response = self.http_client.post(self.url(path)).json(body).send().await?;
        Self::read_json(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, AiError> {
        let response = self.http_client.get(self.url(path)).send().await?;
        Self::read_json(response).await
    }

    async fn create_thread(&self) -> Result<String, AiError> {
        let body = json!({});
        let body = &body;
        let thread: ThreadObject =
            retry_transient("create_thread", &self.settings.backoff, move || {
                self.post_json("threads", body)
            })
            .await?;
        debug!(thread_id = %thread.id, "Created assistant thread");
        Ok(thread.id)
    }

    async fn add_message(&self, thread_id: &str, body: &Value) -> Result<(), AiError> {
        let path = format!("threads/{}/messages", thread_id);
        let path = path.as_str();
        let _: Value = retry_transient("add_message", &self.settings.backoff, move || {
            self.post_json(path, body)
        })
        .await?;
        Ok(())
    }

    /// Run the assistant on the thread and return its reply
    async fn run_and_read(&self, thread_id: &str) -> Result<String, AiError> {
        let path = format!("threads/{}/runs", thread_id);
        let path = path.as_str();
        let body = json!({
            "assistant_id": self.settings.assistant_id,
            "additional_instructions": RUN_INSTRUCTIONS,
        });
        let body = &body;
        let run: RunObject = retry_transient("create_run", &self.settings.backoff, move || {
            self.post_json(path, body)
        })
        .await?;
        debug!(thread_id, run_id = %run.id, status = %run.status, "Started assistant run");

        self.wait_for_run(thread_id, run).await?;
        self.latest_reply(thread_id).await
    }

    async fn wait_for_run(&self, thread_id: &str, mut run: RunObject) -> Result<(), AiError> {
        let deadline = Instant::now() + self.settings.run_timeout;
        let path = format!("threads/{}/runs/{}", thread_id, run.id);
        let path = path.as_str();

        loop {
            match run_state(&run.status) {
                RunState::Completed => return Ok(()),
                state @ (RunState::Failed | RunState::Stalled) => {
                    if state == RunState::Stalled {
                        self.cancel_run(thread_id, &run.id).await;
                    }
                    let detail = run
                        .last_error
                        .map(|e| format!("{}: {}", e.code, e.message));
                    return Err(AiError::RunFailed {
                        status: run.status,
                        detail,
                    });
                }
                RunState::Pending => {}
            }

            if Instant::now() >= deadline {
                self.cancel_run(thread_id, &run.id).await;
                return Err(AiError::RunTimeout(self.settings.run_timeout));
            }

            tokio::time::sleep(self.settings.poll_interval).await;
            run = retry_transient("get_run", &self.settings.backoff, move || self.get_json(path))
                .await?;
        }
    }

    /// Best-effort cancel so the thread accepts new messages later
    async fn cancel_run(&self, thread_id: &str, run_id: &str) {
        let path = format!("threads/{}/runs/{}/cancel", thread_id, run_id);
        if let Err(e) = self.post_json::<Value>(&path, &json!({})).await {
            warn!(thread_id, run_id, error = %e, "Failed to cancel assistant run");
        }
    }

    async fn latest_reply(&self, thread_id: &str) -> Result<String, AiError> {
        let path = format!("threads/{}/messages?order=desc&limit=20", thread_id);
        let path = path.as_str();
        let list: MessageList =
            retry_transient("list_messages", &self.settings.backoff, move || {
                self.get_json(path)
            })
            .await?;
        assistant_text(list)
    }
}

#[async_trait]
impl AiBackend for OpenAiAssistant {
    async fn start_session(&self, image_url: &str) -> Result<SessionReply, AiError> {
        // A fresh thread per photo resets the conversation context
        let thread_id = self.create_thread().await?;
        self.add_message(&thread_id, &photo_message_body(image_url)).await?;
        let text = self.run_and_read(&thread_id).await?;

        info!(thread_id = %thread_id, chars = text.chars().count(), "Photo analysis complete");
        Ok(SessionReply { thread_id, text })
    }

    async fn continue_session(&self, thread_id: &str, question: &str) -> Result<String, AiError> {
        self.add_message(thread_id, &question_message_body(question)).await?;
        let text = self.run_and_read(thread_id).await?;

        info!(thread_id, chars = text.chars().count(), "Follow-up answered");
        Ok(text)
    }
}
