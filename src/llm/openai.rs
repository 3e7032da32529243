//! OpenAI-compatible chat completions client.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use super::types::{ChatRequest, ChatResponse};
use super::{ChatModel, LlmError};
use crate::openai::{http_client, read_failure};

#[derive(Clone)]
pub struct OpenAiChatModel {
    inner: Arc<Inner>,
}

struct Inner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

/// Request body: the shared request plus the model identifier.
#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    #[serde(flatten)]
    request: &'a ChatRequest,
}

impl OpenAiChatModel {
    pub fn new(api_key: &SecretString, base_url: &str, model: &str) -> Result<Self, LlmError> {
        let client = http_client(api_key).map_err(LlmError::Client)?;
        Ok(Self {
            inner: Arc::new(Inner {
                client,
                endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
                model: model.to_string(),
            }),
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_id(&self) -> &str {
        &self.inner.model
    }

    #[instrument(
        skip(self, request),
        fields(model = %self.inner.model, messages = request.messages.len(), tools = request.tools.len())
    )]
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = WireRequest {
            model: &self.inner.model,
            request: &request,
        };

        let response = self
            .inner
            .client
            .post(&self.inner.endpoint)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let failure = read_failure(response).await;
            tracing::warn!(
                status = failure.status,
                code = ?failure.code,
                "Chat completion rejected"
            );
            return Err(LlmError::Api {
                status: failure.status,
                code: failure.code,
                message: failure.message,
            });
        }

        let text = response.text().await?;
        serde_json::from_str(&text).map_err(|e| LlmError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::{ChatMessage, ToolChoice, ToolDefinition};
    use serde_json::json;

    #[test]
    fn test_wire_request_flattens_model() {
        let request = ChatRequest {
            messages: vec![ChatMessage::user("where is my order")],
            tools: vec![ToolDefinition::function("OrderStatus", "Track orders", json!({"type": "object"}))],
            tool_choice: Some(ToolChoice::Required),
        };
        let wire = WireRequest {
            model: "gpt-4o-mini",
            request: &request,
        };

        let value = serde_json::to_value(&wire).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["tool_choice"], "required");
        assert_eq!(value["tools"][0]["function"]["name"], "OrderStatus");
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_endpoint_and_model_id() {
        let key = SecretString::from("sk-test".to_string());
        let model = OpenAiChatModel::new(&key, "https://example.test/v1/", "gpt-4.1").unwrap();
        assert_eq!(model.inner.endpoint, "https://example.test/v1/chat/completions");
        assert_eq!(model.model_id(), "gpt-4.1");
    }
}
