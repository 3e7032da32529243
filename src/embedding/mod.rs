//! Embedding capability: text in, fixed-length vectors out.
//!
//! Two backends implement [`Embedder`]: an OpenAI-compatible HTTP client and a
//! local ONNX bi-encoder. Both preserve input order and return exactly one
//! vector per input, or fail.

pub mod local;
pub mod openai;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, EmbeddingBackend};

pub use local::LocalEmbedder;
pub use openai::OpenAiEmbedder;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("embedding API error ({status}): {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("embedding client setup failed: {0}")]
    Setup(String),

    #[error("local encoder failure: {0}")]
    Local(String),
}

impl EmbeddingError {
    /// HTTP status of an API failure, if this error came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Structured error code of an API failure, if the endpoint sent one.
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding model; part of the embeddings cache key.
    fn model_id(&self) -> &str;

    /// Embed every text, preserving order. The result has exactly `texts.len()` rows.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}

/// Construct the embedder selected by `EMBEDDING_BACKEND`.
pub fn from_config(config: &Config) -> Result<Arc<dyn Embedder>, EmbeddingError> {
    match config.embedding_backend {
        EmbeddingBackend::OpenAi => {
            let api_key = config.openai_api_key.as_ref().ok_or_else(|| {
                EmbeddingError::Setup("OPENAI_API_KEY must be set for the openai backend".into())
            })?;
            let embedder =
                OpenAiEmbedder::new(api_key, &config.openai_base_url, &config.embed_model)?;
            Ok(Arc::new(embedder))
        }
        EmbeddingBackend::Local => {
            let embedder = LocalEmbedder::load(
                &config.bi_encoder_model_path,
                &config.bi_encoder_tokenizer_path,
                config.max_sequence_length,
            )?;
            Ok(Arc::new(embedder))
        }
    }
}
