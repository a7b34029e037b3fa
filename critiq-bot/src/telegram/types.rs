//! Telegram Bot API wire types
//!
//! Only the fields the bot reads are modelled; unknown fields are ignored.

use serde::{Deserialize, Serialize};

/// Response envelope shared by every Bot API method
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    pub retry_after: Option<u64>,
}

/// Incoming update (only `message` updates are requested)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub photo: Option<Vec<PhotoSize>>,
    /// Shared by all messages of one album
    pub media_group_id: Option<String>,
}

impl Message {
    /// Sender's user id, falling back to the chat id for anonymous posts
    pub fn sender_id(&self) -> i64 {
        self.from.as_ref().map_or(self.chat.id, |user| user.id)
    }

    /// Highest-resolution variant of the attached photo
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .as_deref()?
            .iter()
            .max_by_key(|size| u64::from(size.width) * u64::from(size.height))
    }

    pub fn has_photo(&self) -> bool {
        self.photo.as_ref().is_some_and(|sizes| !sizes.is_empty())
    }

    /// Bot command name without the leading slash or `@botname` suffix
    ///
    /// `"/start@critiq_bot payload"` → `Some("start")`
    pub fn command(&self) -> Option<&str> {
        let text = self.text.as_deref()?.strip_prefix('/')?;
        let word = text.split_whitespace().next().unwrap_or("");
        let name = word.split('@').next().unwrap_or("");
        (!name.is_empty()).then_some(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub file_unique_id: String,
    pub width: u32,
    pub height: u32,
    pub file_size: Option<u64>,
}

/// Result of `getFile`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_unique_id: String,
    pub file_size: Option<u64>,
    pub file_path: Option<String>,
}

/// Text formatting mode for outgoing messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    #[serde(rename = "HTML")]
    Html,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALBUM_UPDATE: &str = r#"{
        "update_id": 815,
        "message": {
            "message_id": 1201,
            "from": {"id": 4242, "is_bot": false, "first_name": "Ann", "language_code": "en"},
            "chat": {"id": 4242, "type": "private", "first_name": "Ann"},
            "date": 1718000000,
            "media_group_id": "13724861937415",
            "photo": [
                {"file_id": "small", "file_unique_id": "u1", "width": 90, "height": 60, "file_size": 1200},
                {"file_id": "large", "file_unique_id": "u3", "width": 1280, "height": 853, "file_size": 98000},
                {"file_id": "medium", "file_unique_id": "u2", "width": 320, "height": 213, "file_size": 15000}
            ]
        }
    }"#;

    #[test]
    fn test_album_message_deserializes() {
        let update: Update = serde_json::from_str(ALBUM_UPDATE).unwrap();
        let message = update.message.expect("message present");

        assert_eq!(update.update_id, 815);
        assert_eq!(message.sender_id(), 4242);
        assert_eq!(message.chat.kind, "private");
        assert_eq!(message.media_group_id.as_deref(), Some("13724861937415"));
        assert!(message.has_photo());
        assert_eq!(message.largest_photo().unwrap().file_id, "large");
        assert_eq!(message.command(), None);
    }

    #[test]
    fn test_update_without_message() {
        let update: Update = serde_json::from_str(
            r#"{"update_id": 9, "edited_message": {"message_id": 1}}"#,
        )
        .unwrap();
        assert!(update.message.is_none());
    }

    fn text_message(text: &str) -> Message {
        Message {
            message_id: 1,
            chat: Chat { id: 10, kind: "private".into() },
            from: None,
            date: 0,
            text: Some(text.into()),
            caption: None,
            photo: None,
            media_group_id: None,
        }
    }

    #[test]
    fn test_command_parsing() {
        assert_eq!(text_message("/start").command(), Some("start"));
        assert_eq!(text_message("/start@critiq_bot ref42").command(), Some("start"));
        assert_eq!(text_message("/").command(), None);
        assert_eq!(text_message("what about the shadows?").command(), None);
    }

    #[test]
    fn test_sender_falls_back_to_chat() {
        assert_eq!(text_message("hi").sender_id(), 10);
    }

    #[test]
    fn test_error_envelope_deserializes() {
        let response: ApiResponse<Message> = serde_json::from_str(
            r#"{"ok": false, "error_code": 429, "description": "Too Many Requests: retry after 7", "parameters": {"retry_after": 7}}"#,
        )
        .unwrap();

        assert!(!response.ok);
        assert!(response.result.is_none());
        assert_eq!(response.error_code, Some(429));
        assert_eq!(response.parameters.and_then(|p| p.retry_after), Some(7));
    }

    #[test]
    fn test_parse_mode_serializes_as_html() {
        assert_eq!(serde_json::to_string(&ParseMode::Html).unwrap(), "\"HTML\"");
    }
}
