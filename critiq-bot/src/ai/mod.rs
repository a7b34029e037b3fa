//! AI assistant backend
//!
//! Every photo opens a fresh assistant conversation (context reset); text
//! questions continue the conversation of the user's latest photo.

mod openai;
mod retry;

pub use openai::{OpenAiAssistant, OpenAiSettings};
pub use retry::{retry_transient, Backoff};

use crate::error::AiError;
use async_trait::async_trait;

/// Reply to a new session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReply {
    /// Handle to pass to [`AiBackend::continue_session`]
    pub thread_id: String,
    pub text: String,
}

#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Open a new conversation about the image at `image_url`
    async fn start_session(&self, image_url: &str) -> Result<SessionReply, AiError>;

    /// Ask a follow-up question in an existing conversation
    async fn continue_session(&self, thread_id: &str, question: &str) -> Result<String, AiError>;
}
