//! Retriever and selector/executor.
//!
//! A query is embedded, the top-K tools are retrieved from the index, and only
//! those candidates are offered to the chat model with a mandatory tool choice.
//! The chosen call is validated against the candidates, executed, and a second
//! model call turns the tool result into the final answer.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::instrument;

use crate::catalog::{Catalog, ToolError};
use crate::config::Config;
use crate::embedding::Embedder;
use crate::index::{EmbeddingIndex, IndexError, ScoredTool};
use crate::llm::{
    ChatMessage, ChatModel, ChatRequest, LlmError, ToolCall, ToolChoice, ToolDefinition,
};
use crate::schema::{check_arguments, SchemaViolation};

pub const SELECTION_PROMPT: &str = "You are a precise retail assistant. Pick exactly one tool from the provided functions and return the best arguments. Do not invent fields.";

pub const SYNTHESIS_PROMPT: &str =
    "Answer succinctly for a retail operator. Include critical numbers and the action to take.";

#[derive(Debug, Clone)]
pub struct RouterSettings {
    /// Number of candidates offered to the model.
    pub top_k: usize,
    /// Check arguments against the tool schema before dispatch.
    pub validate_arguments: bool,
    pub embeddings_cache: Option<PathBuf>,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            top_k: 4,
            validate_arguments: false,
            embeddings_cache: None,
        }
    }
}

impl RouterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            top_k: config.top_k,
            validate_arguments: config.validate_arguments,
            embeddings_cache: config.embeddings_cache_path.clone(),
        }
    }
}

/// Outcome of a successful routing cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub tool_name: String,
    pub tool_args: Map<String, Value>,
    pub tool_result: Value,
    pub answer: String,
    /// Names offered to the model, best match first.
    pub candidates: Vec<String>,
}

/// Failure of a routing cycle, carrying whatever was collected before it.
#[derive(Debug, Error)]
pub enum RouteError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[source] IndexError),

    #[error("API call failed: {source}")]
    ApiCall {
        candidates: Vec<String>,
        #[source]
        source: LlmError,
    },

    #[error("No tool selected by model.")]
    NoToolSelected { candidates: Vec<String> },

    #[error("Unknown tool '{tool_name}' chosen.")]
    UnknownTool {
        tool_name: String,
        candidates: Vec<String>,
    },

    #[error("arguments for '{tool_name}' rejected: {reason}")]
    InvalidArguments {
        tool_name: String,
        raw_arguments: String,
        reason: String,
        candidates: Vec<String>,
    },

    #[error("tool '{tool_name}' failed: {source}")]
    ToolFailed {
        tool_name: String,
        tool_args: Map<String, Value>,
        candidates: Vec<String>,
        #[source]
        source: ToolError,
    },

    #[error("Synthesis failed: {source}")]
    SynthesisFailed {
        tool_name: String,
        tool_args: Map<String, Value>,
        tool_result: Value,
        candidates: Vec<String>,
        #[source]
        source: LlmError,
    },
}

impl RouteError {
    /// Stable machine-readable code.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Retrieval(_) => "embedding_failed",
            Self::ApiCall { .. } => "api_call_failed",
            Self::NoToolSelected { .. } => "no_tool_selected",
            Self::UnknownTool { .. } => "unknown_tool",
            Self::InvalidArguments { .. } => "invalid_arguments",
            Self::ToolFailed { .. } => "tool_failed",
            Self::SynthesisFailed { .. } => "synthesis_failed",
        }
    }

    /// Name of the tool that was actually executed, if execution happened.
    pub fn executed_tool(&self) -> Option<&str> {
        match self {
            Self::SynthesisFailed { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }

    /// Name the model chose, whether or not it could be executed.
    pub fn chosen_tool(&self) -> Option<&str> {
        match self {
            Self::UnknownTool { tool_name, .. }
            | Self::InvalidArguments { tool_name, .. }
            | Self::ToolFailed { tool_name, .. }
            | Self::SynthesisFailed { tool_name, .. } => Some(tool_name),
            _ => None,
        }
    }

    pub fn candidates(&self) -> &[String] {
        match self {
            Self::Retrieval(_) => &[],
            Self::ApiCall { candidates, .. }
            | Self::NoToolSelected { candidates }
            | Self::UnknownTool { candidates, .. }
            | Self::InvalidArguments { candidates, .. }
            | Self::ToolFailed { candidates, .. }
            | Self::SynthesisFailed { candidates, .. } => candidates,
        }
    }

    /// The chat-model error behind this failure, if there is one.
    pub fn llm_error(&self) -> Option<&LlmError> {
        match self {
            Self::ApiCall { source, .. } | Self::SynthesisFailed { source, .. } => Some(source),
            _ => None,
        }
    }

    /// JSON report with `ok: false`, the error kind and the partial state.
    pub fn report(&self) -> Value {
        let mut report = json!({
            "ok": false,
            "kind": self.kind(),
            "error": self.to_string(),
            "candidates": self.candidates(),
        });

        if let Some(name) = self.chosen_tool() {
            report["tool_name"] = json!(name);
        }
        match self {
            Self::ToolFailed { tool_args, .. } => {
                report["tool_args"] = Value::Object(tool_args.clone());
            }
            Self::SynthesisFailed {
                tool_args,
                tool_result,
                ..
            } => {
                report["tool_args"] = Value::Object(tool_args.clone());
                report["tool_result"] = tool_result.clone();
            }
            Self::InvalidArguments { raw_arguments, .. } => {
                report["raw_arguments"] = json!(raw_arguments);
            }
            _ => {}
        }

        report
    }
}

pub struct ToolRouter {
    index: EmbeddingIndex,
    embedder: Arc<dyn Embedder>,
    model: Arc<dyn ChatModel>,
    settings: RouterSettings,
}

impl ToolRouter {
    /// Build the index for exactly `catalog` and wrap it in a router.
    pub async fn build(
        catalog: Catalog,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        settings: RouterSettings,
    ) -> Result<Self, IndexError> {
        let index =
            EmbeddingIndex::build_cached(catalog, embedder.as_ref(), settings.embeddings_cache.as_deref())
                .await?;

        tracing::info!(
            num_tools = index.len(),
            top_k = settings.top_k,
            model = model.model_id(),
            "Tool router ready"
        );

        Ok(Self::new(index, embedder, model, settings))
    }

    pub fn new(
        index: EmbeddingIndex,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn ChatModel>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            index,
            embedder,
            model,
            settings,
        }
    }

    pub fn index(&self) -> &EmbeddingIndex {
        &self.index
    }

    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    /// Embed `query` and rank the catalog, returning at most `k` tools.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<ScoredTool<'_>>, IndexError> {
        let start = Instant::now();
        let query_vector = self.embedder.embed(query).await?;
        let ranked = self.index.rank(&query_vector, k)?;

        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::histogram!("retrieval_latency_ms").record(elapsed_ms);
        tracing::debug!(
            k,
            returned = ranked.len(),
            top = ranked.first().map(|s| s.tool.name.as_str()),
            latency_ms = elapsed_ms,
            "Retrieval complete"
        );

        Ok(ranked)
    }

    /// Top-K candidates for `query`, with K from the router settings.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredTool<'_>>, IndexError> {
        self.search(query, self.settings.top_k).await
    }

    /// Run one full routing cycle for `query`.
    #[instrument(skip(self, query), fields(model = %self.model.model_id(), query_len = query.len()))]
    pub async fn decide_and_execute(&self, query: &str) -> Result<Decision, RouteError> {
        let start = Instant::now();
        metrics::counter!("route_requests_total").increment(1);

        let result = self.route(query).await;

        metrics::histogram!("route_latency_ms").record(start.elapsed().as_secs_f64() * 1000.0);
        match &result {
            Ok(decision) => {
                tracing::info!(tool = %decision.tool_name, "Query routed");
            }
            Err(e) => {
                metrics::counter!("route_errors_total", "kind" => e.kind()).increment(1);
                tracing::warn!(kind = e.kind(), error = %e, "Routing failed");
            }
        }

        result
    }

    async fn route(&self, query: &str) -> Result<Decision, RouteError> {
        let candidates = self.retrieve(query).await.map_err(RouteError::Retrieval)?;
        let names: Vec<String> = candidates.iter().map(|c| c.tool.name.clone()).collect();

        let selection = ChatRequest {
            messages: vec![
                ChatMessage::system(SELECTION_PROMPT),
                ChatMessage::user(query),
            ],
            tools: candidates
                .iter()
                .map(|c| {
                    ToolDefinition::function(&c.tool.name, &c.tool.description, c.tool.schema.clone())
                })
                .collect(),
            tool_choice: Some(ToolChoice::Required),
        };

        let response = match self.model.complete(selection).await {
            Ok(response) => response,
            Err(source) => {
                return Err(RouteError::ApiCall {
                    candidates: names,
                    source,
                })
            }
        };

        let Some(call) = response.first_tool_call().cloned() else {
            return Err(RouteError::NoToolSelected { candidates: names });
        };
        let tool_name = call.function.name.clone();

        // The model only saw the candidates; anything else is an invention.
        let Some(tool) = candidates.iter().map(|c| c.tool).find(|t| t.name == tool_name) else {
            return Err(RouteError::UnknownTool {
                tool_name,
                candidates: names,
            });
        };

        let tool_args = match parse_arguments(&call.function.arguments) {
            Ok(args) => args,
            Err(reason) => {
                return Err(RouteError::InvalidArguments {
                    tool_name,
                    raw_arguments: call.function.arguments,
                    reason,
                    candidates: names,
                })
            }
        };

        if self.settings.validate_arguments {
            if let Err(violation) = check_arguments(&tool.schema, &tool_args) {
                return Err(RouteError::InvalidArguments {
                    tool_name,
                    raw_arguments: call.function.arguments,
                    reason: schema_reason(&violation),
                    candidates: names,
                });
            }
        }

        let tool_result = match tool.call(&tool_args) {
            Ok(result) => result,
            Err(source) => {
                return Err(RouteError::ToolFailed {
                    tool_name,
                    tool_args,
                    candidates: names,
                    source,
                })
            }
        };
        tracing::debug!(tool = %tool_name, "Tool executed");

        let synthesis = ChatRequest {
            messages: synthesis_messages(
                query,
                response.message().and_then(|m| m.content.clone()),
                call,
                &tool_result,
            ),
            ..ChatRequest::default()
        };

        match self.model.complete(synthesis).await {
            Ok(answer) => Ok(Decision {
                tool_name,
                tool_args,
                tool_result,
                answer: answer.text().trim().to_string(),
                candidates: names,
            }),
            Err(source) => Err(RouteError::SynthesisFailed {
                tool_name,
                tool_args,
                tool_result,
                candidates: names,
                source,
            }),
        }
    }
}

/// The model's argument string must decode to a JSON object.
fn parse_arguments(raw: &str) -> Result<Map<String, Value>, String> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!("expected a JSON object, got {other}")),
        Err(e) => Err(format!("malformed JSON: {e}")),
    }
}

fn schema_reason(violation: &SchemaViolation) -> String {
    format!("schema check failed: {violation}")
}

/// Transcript for the answer turn: the executed call replayed, then its result.
fn synthesis_messages(
    query: &str,
    selection_content: Option<String>,
    mut call: ToolCall,
    tool_result: &Value,
) -> Vec<ChatMessage> {
    if call.id.is_empty() {
        call.id = format!("call_{}", uuid::Uuid::new_v4().simple());
    }

    let result_turn = ChatMessage::Tool {
        tool_call_id: call.id.clone(),
        name: call.function.name.clone(),
        content: tool_result.to_string(),
    };

    vec![
        ChatMessage::system(SYNTHESIS_PROMPT),
        ChatMessage::user(query),
        ChatMessage::Assistant {
            content: selection_content,
            tool_calls: vec![call],
        },
        result_turn,
    ]
}
