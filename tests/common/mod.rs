//! Deterministic stand-ins for the embedding and chat capabilities.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use toolsift::embedding::EmbeddingError;
use toolsift::llm::{ChatMessage, ChatModel, ChatRequest, ChatResponse, LlmError, ToolChoice};
use toolsift::{Catalog, Embedder, ToolSpec};

/// Counts occurrences of each vocabulary word. Texts sharing no vocabulary
/// word with it embed to the zero vector.
pub struct BagOfWords {
    vocab: Vec<String>,
    batches: AtomicUsize,
}

impl BagOfWords {
    pub fn new(vocab: &[&str]) -> Self {
        Self {
            vocab: vocab.iter().map(|w| w.to_string()).collect(),
            batches: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls so far.
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.vocab.len()];
        for word in text
            .split(|c: char| !c.is_ascii_alphanumeric())
            .map(str::to_lowercase)
        {
            if let Some(i) = self.vocab.iter().position(|w| *w == word) {
                v[i] += 1.0;
            }
        }
        v
    }
}

#[async_trait]
impl Embedder for BagOfWords {
    fn model_id(&self) -> &str {
        "bag-of-words"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

type Script = dyn Fn(&ChatRequest) -> Result<ChatResponse, LlmError> + Send + Sync;

/// Chat model answering from a closure, recording every request it sees.
pub struct ScriptedModel {
    id: String,
    script: Box<Script>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedModel {
    pub fn new<F>(id: &str, script: F) -> Self
    where
        F: Fn(&ChatRequest) -> Result<ChatResponse, LlmError> + Send + Sync + 'static,
    {
        Self {
            id: id.to_string(),
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Picks the best-ranked candidate and answers with the tool output.
    pub fn top_candidate(id: &str) -> Self {
        Self::new(id, |request| match selection_tools(request) {
            Some(tools) => Ok(tool_call(&tools[0], json!({}))),
            None => Ok(text(&format!("Answer: {}", tool_output(request).unwrap_or_default()))),
        })
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_id(&self) -> &str {
        &self.id
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.script)(&request)
    }
}

/// Offered tool names if `request` is a selection turn.
pub fn selection_tools(request: &ChatRequest) -> Option<Vec<String>> {
    (request.tool_choice == Some(ToolChoice::Required))
        .then(|| request.tools.iter().map(|t| t.function.name.clone()).collect())
}

/// Content of the tool turn in a synthesis transcript.
pub fn tool_output(request: &ChatRequest) -> Option<String> {
    request.messages.iter().find_map(|m| match m {
        ChatMessage::Tool { content, .. } => Some(content.clone()),
        _ => None,
    })
}

pub fn tool_call(name: &str, args: Value) -> ChatResponse {
    raw_tool_call(name, &args.to_string())
}

pub fn raw_tool_call(name: &str, arguments: &str) -> ChatResponse {
    serde_json::from_value(json!({
        "choices": [{
            "message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": name, "arguments": arguments}
                }]
            },
            "finish_reason": "tool_calls"
        }]
    }))
    .unwrap()
}

pub fn text(content: &str) -> ChatResponse {
    serde_json::from_value(json!({
        "choices": [{
            "message": {"content": content},
            "finish_reason": "stop"
        }]
    }))
    .unwrap()
}

pub fn api_error(status: u16, code: Option<&str>, message: &str) -> LlmError {
    LlmError::Api {
        status,
        code: code.map(str::to_string),
        message: message.to_string(),
    }
}

/// Tool returning `{"ok": true, "content": content}` and counting its calls.
pub fn counted_tool(name: &str, description: &str, content: &str, calls: Arc<AtomicUsize>) -> ToolSpec {
    let content = content.to_string();
    ToolSpec::new(
        name,
        description,
        json!({
            "type": "object",
            "properties": {"sku": {"type": "string"}},
            "required": ["sku"]
        }),
        move |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"ok": true, "content": content}))
        },
    )
}

pub const STORE_VOCAB: &[&str] = &["weather", "forecast", "stock", "units", "hours", "open"];

/// Three tools where stock questions land on `InventoryLookup`.
pub fn store_catalog(calls: Arc<AtomicUsize>) -> Catalog {
    Catalog::new(vec![
        counted_tool(
            "WeatherForecast",
            "Weather forecast for the store region",
            "Sunny, 21C.",
            calls.clone(),
        ),
        counted_tool(
            "InventoryLookup",
            "Check stock units on hand",
            "SKU 42: 12 units on hand.",
            calls.clone(),
        ),
        counted_tool(
            "StoreHours",
            "Opening hours of a store",
            "Open 9am to 9pm.",
            calls,
        ),
    ])
    .unwrap()
}
