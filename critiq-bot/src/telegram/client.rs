//! Telegram Bot API HTTP client
//!
//! # API Reference
//! - Endpoint: `https://api.telegram.org/bot<token>/<method>`
//! - File download: `https://api.telegram.org/file/bot<token>/<file_path>`
//! - Documentation: https://core.telegram.org/bots/api

use async_trait::async_trait;
use critiq_common::config::Secret;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use super::types::{ApiResponse, File, Message, ParseMode, Update, User};
use super::{BotApi, UpdateSource};
use crate::error::TelegramError;

/// Timeout for ordinary (non-polling) requests
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra slack on top of the long-poll timeout before the HTTP layer gives up
const POLL_SLACK: Duration = Duration::from_secs(10);

/// Telegram Bot API client
pub struct TelegramClient {
    /// HTTP client for API requests
    http_client: Client,
    /// API base, e.g. `https://api.telegram.org`
    api_base: String,
    /// Bot token
    token: Secret,
}

impl TelegramClient {
    /// Create a client for `api_base` authenticated with `token`
    pub fn new(api_base: impl Into<String>, token: Secret) -> Result<Self, TelegramError> {
        let http_client = Client::builder()
            .build()
            .map_err(|e| TelegramError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token.expose(), method)
    }

    /// Download URL for a `file_path` returned by `getFile`
    pub fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{}", self.api_base, self.token.expose(), file_path)
    }

    /// Call a Bot API method with a JSON body
    async fn call<P, R>(
        &self,
        method: &str,
        params: &P,
        timeout: Duration,
    ) -> Result<R, TelegramError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(method, "Telegram API call");

        let response = self
            .http_client
            .post(self.method_url(method))
            .timeout(timeout)
            .json(params)
            .send()
            .await?;

        // Error responses also carry the JSON envelope
        let envelope: ApiResponse<R> = response.json().await?;
        unwrap_envelope(method, envelope)
    }

    /// Verify the token and fetch the bot's own account
    pub async fn get_me(&self) -> Result<User, TelegramError> {
        self.call("getMe", &json!({}), REQUEST_TIMEOUT).await
    }

    pub async fn get_file(&self, file_id: &str) -> Result<File, TelegramError> {
        self.call("getFile", &json!({ "file_id": file_id }), REQUEST_TIMEOUT)
            .await
    }
}

fn unwrap_envelope<R>(method: &str, envelope: ApiResponse<R>) -> Result<R, TelegramError> {
    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| TelegramError::Parse(format!("{}: ok response without result", method)));
    }

    Err(TelegramError::Api {
        code: envelope.error_code.unwrap_or(0),
        description: envelope
            .description
            .unwrap_or_else(|| "unknown error".to_string()),
        retry_after: envelope.parameters.and_then(|p| p.retry_after),
    })
}

#[async_trait]
impl BotApi for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<Message, TelegramError> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if let Some(mode) = parse_mode {
            params["parse_mode"] = json!(mode);
        }
        self.call("sendMessage", &params, REQUEST_TIMEOUT).await
    }

    async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        parse_mode: Option<ParseMode>,
    ) -> Result<(), TelegramError> {
        let mut params = json!({ "chat_id": chat_id, "message_id": message_id, "text": text });
        if let Some(mode) = parse_mode {
            params["parse_mode"] = json!(mode);
        }
        // Returns the edited Message; only success matters here
        let _: serde_json::Value = self.call("editMessageText", &params, REQUEST_TIMEOUT).await?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), TelegramError> {
        let _: bool = self
            .call(
                "deleteMessage",
                &json!({ "chat_id": chat_id, "message_id": message_id }),
                REQUEST_TIMEOUT,
            )
            .await?;
        Ok(())
    }

    async fn photo_url(&self, file_id: &str) -> Result<String, TelegramError> {
        let file = self.get_file(file_id).await?;
        let path = file
            .file_path
            .ok_or_else(|| TelegramError::MissingFilePath(file_id.to_string()))?;
        Ok(self.file_url(&path))
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let mut params = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            params["offset"] = json!(offset);
        }

        self.call(
            "getUpdates",
            &params,
            Duration::from_secs(timeout_secs) + POLL_SLACK,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> TelegramClient {
        TelegramClient::new("https://api.telegram.org/", Secret::new("123:secret")).unwrap()
    }

    #[test]
    fn test_method_and_file_urls() {
        let client = client();
        assert_eq!(
            client.method_url("getUpdates"),
            "https://api.telegram.org/bot123:secret/getUpdates"
        );
        assert_eq!(
            client.file_url("photos/file_7.jpg"),
            "https://api.telegram.org/file/bot123:secret/photos/file_7.jpg"
        );
    }

    #[test]
    fn test_unwrap_envelope_ok() {
        let envelope: ApiResponse<bool> =
            serde_json::from_str(r#"{"ok": true, "result": true}"#).unwrap();
        assert!(unwrap_envelope("deleteMessage", envelope).unwrap());
    }

    #[test]
    fn test_unwrap_envelope_error() {
        let envelope: ApiResponse<bool> = serde_json::from_str(
            r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}"#,
        )
        .unwrap();

        match unwrap_envelope("sendMessage", envelope) {
            Err(TelegramError::Api { code, description, retry_after }) => {
                assert_eq!(code, 403);
                assert!(description.contains("blocked"));
                assert_eq!(retry_after, None);
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[test]
    fn test_unwrap_envelope_ok_without_result_is_parse_error() {
        let envelope: ApiResponse<bool> = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(matches!(
            unwrap_envelope("deleteMessage", envelope),
            Err(TelegramError::Parse(_))
        ));
    }

    #[test]
    fn test_debug_output_hides_token() {
        let client = client();
        let printed = format!("{:?}", client.token);
        assert!(!printed.contains("secret"));
    }
}
