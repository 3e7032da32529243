//! Two-bucket classifier: does a failure condemn the model or just the case?
//!
//! Structured signals from the API decide first. Only when the error carries
//! no structured code does the classifier fall back to sniffing the message.

use crate::embedding::EmbeddingError;
use crate::index::IndexError;
use crate::llm::LlmError;
use crate::router::RouteError;

/// Substrings that mark an unstructured error as model-related.
pub const MODEL_ERROR_KEYWORDS: [&str; 3] = ["model", "not found", "invalid"];

const MODEL_ERROR_CODES: [&str; 2] = ["model_not_found", "invalid_model"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureScope {
    /// Score the case as a miss and keep going.
    Case,
    /// Abort the remaining tool counts for this model.
    Model,
}

pub fn looks_model_related(text: &str) -> bool {
    let lower = text.to_lowercase();
    MODEL_ERROR_KEYWORDS.iter().any(|k| lower.contains(k))
}

fn from_signals(status: Option<u16>, code: Option<&str>, text: &str) -> FailureScope {
    if status == Some(404) {
        return FailureScope::Model;
    }
    match code {
        Some(code) if MODEL_ERROR_CODES.contains(&code) => FailureScope::Model,
        Some(_) => FailureScope::Case,
        None if looks_model_related(text) => FailureScope::Model,
        None => FailureScope::Case,
    }
}

pub fn classify_llm_error(err: &LlmError) -> FailureScope {
    match err {
        LlmError::Parse(_) => FailureScope::Case,
        _ => from_signals(err.status(), err.code(), &err.to_string()),
    }
}

pub fn classify_embedding_error(err: &EmbeddingError) -> FailureScope {
    match err {
        EmbeddingError::Http(_) | EmbeddingError::Api { .. } | EmbeddingError::Setup(_) => {
            from_signals(err.status(), err.code(), &err.to_string())
        }
        _ => FailureScope::Case,
    }
}

pub fn classify_index_error(err: &IndexError) -> FailureScope {
    match err {
        IndexError::Embedding(e) => classify_embedding_error(e),
        _ => FailureScope::Case,
    }
}

/// Protocol-compliance and partial-pipeline failures are always per-case.
pub fn classify(err: &RouteError) -> FailureScope {
    match err {
        RouteError::Retrieval(e) => classify_index_error(e),
        RouteError::ApiCall { source, .. } => classify_llm_error(source),
        RouteError::NoToolSelected { .. }
        | RouteError::UnknownTool { .. }
        | RouteError::InvalidArguments { .. }
        | RouteError::ToolFailed { .. }
        | RouteError::SynthesisFailed { .. } => FailureScope::Case,
    }
}
