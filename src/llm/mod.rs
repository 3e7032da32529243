//! Language-model capability: function selection and answer synthesis.

pub mod openai;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use openai::OpenAiChatModel;
pub use types::{
    AssistantMessage, ChatMessage, ChatRequest, ChatResponse, Choice, FunctionCall,
    FunctionDefinition, ToolCall, ToolChoice, ToolDefinition,
};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("chat API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("failed to parse chat response: {0}")]
    Parse(String),

    #[error("chat client setup failed: {0}")]
    Client(String),
}

impl LlmError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// A chat-completions capable model.
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> &str;

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError>;
}
