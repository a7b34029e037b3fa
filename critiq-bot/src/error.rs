//! Error types for critiq-bot
//!
//! One enum per outside service plus [`HandlerError`], which is what a
//! message handler returns. Handlers show users a generic failure text; the
//! detail carried here only goes to the log.

use std::time::Duration;
use thiserror::Error;

/// Telegram Bot API errors
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Transport failure (connect, timeout, TLS). Never contains the request URL.
    #[error("Telegram request failed: {0}")]
    Network(String),

    /// API answered `ok: false`
    #[error("Telegram API error {code}: {description}")]
    Api {
        code: i64,
        description: String,
        /// Seconds to wait before retrying (flood control)
        retry_after: Option<u64>,
    },

    /// Response body did not match the expected shape
    #[error("Malformed Telegram response: {0}")]
    Parse(String),

    /// `getFile` returned no download path (file too large or expired)
    #[error("File has no download path: {0}")]
    MissingFilePath(String),
}

impl TelegramError {
    /// Telegram could not parse the HTML entities in a message
    pub fn is_parse_entities(&self) -> bool {
        matches!(
            self,
            TelegramError::Api { code: 400, description, .. }
                if description.contains("can't parse entities")
        )
    }

    /// Retrying the same request later cannot succeed (bad request, blocked bot)
    pub fn is_permanent(&self) -> bool {
        matches!(self, TelegramError::Api { code: 400 | 403, .. })
    }
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        // The URL embeds the bot token
        let err = err.without_url();
        if err.is_decode() {
            TelegramError::Parse(err.to_string())
        } else {
            TelegramError::Network(err.to_string())
        }
    }
}

/// AI assistant service errors
#[derive(Debug, Error)]
pub enum AiError {
    /// Transport failure
    #[error("Assistant request failed: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("Assistant API returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected shape
    #[error("Malformed assistant response: {0}")]
    Parse(String),

    /// Run ended in a status other than `completed`
    #[error("Assistant run ended with status {status}")]
    RunFailed { status: String, detail: Option<String> },

    /// Run still pending after the configured limit
    #[error("Assistant run did not finish within {0:?}")]
    RunTimeout(Duration),

    /// Run completed but produced no text
    #[error("Assistant returned no text")]
    EmptyResponse,
}

impl AiError {
    /// Worth retrying: network trouble, rate limiting, server-side errors
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Network(_) => true,
            AiError::Status { status, .. } => *status == 429 || (500..600).contains(status),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AiError::Parse(err.to_string())
        } else {
            AiError::Network(err.to_string())
        }
    }
}

/// Errors surfaced by message handlers
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Telegram(#[from] TelegramError),

    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("Common error: {0}")]
    Common(#[from] critiq_common::Error),

    /// Photo route reached with a message that carries no photo
    #[error("Message {0} has no photo")]
    MissingPhoto(i64),
}

pub type HandlerResult<T> = Result<T, HandlerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entities_detection() {
        let err = TelegramError::Api {
            code: 400,
            description: "Bad Request: can't parse entities: unexpected end tag".to_string(),
            retry_after: None,
        };
        assert!(err.is_parse_entities());
        assert!(err.is_permanent());

        let other = TelegramError::Api {
            code: 429,
            description: "Too Many Requests".to_string(),
            retry_after: Some(3),
        };
        assert!(!other.is_parse_entities());
        assert!(!other.is_permanent());
    }

    #[test]
    fn test_ai_transient_classification() {
        assert!(AiError::Network("reset".into()).is_transient());
        assert!(AiError::Status { status: 429, body: String::new() }.is_transient());
        assert!(AiError::Status { status: 503, body: String::new() }.is_transient());
        assert!(!AiError::Status { status: 401, body: String::new() }.is_transient());
        assert!(!AiError::EmptyResponse.is_transient());
        assert!(!AiError::RunFailed { status: "failed".into(), detail: None }.is_transient());
    }
}
