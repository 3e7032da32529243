//! OpenAI-compatible embeddings client.

use async_trait::async_trait;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{Embedder, EmbeddingError};
use crate::openai::{http_client, read_failure};

/// Upper bound on inputs per request accepted by the embeddings endpoint.
const MAX_INPUTS_PER_REQUEST: usize = 2048;

#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(api_key: &SecretString, base_url: &str, model: &str) -> Result<Self, EmbeddingError> {
        let client = http_client(api_key).map_err(EmbeddingError::Setup)?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if !response.status().is_success() {
            let failure = read_failure(response).await;
            return Err(EmbeddingError::Api {
                status: failure.status,
                code: failure.code,
                message: failure.message,
            });
        }

        let mut response: EmbeddingResponse = response.json().await?;
        // The endpoint reports each vector's input position; order by it rather
        // than trusting array order.
        response.data.sort_by_key(|d| d.index);

        if response.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: response.data.len(),
            });
        }

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, texts), fields(model = %self.model, count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(MAX_INPUTS_PER_REQUEST) {
            vectors.extend(self.request(chunk).await?);
        }

        if let Some(first) = vectors.first() {
            let dim = first.len();
            if let Some(pos) = vectors.iter().position(|v| v.len() != dim) {
                return Err(EmbeddingError::Malformed(format!(
                    "vector {pos} has {} dimensions, expected {dim}",
                    vectors[pos].len()
                )));
            }
        }

        tracing::debug!(count = vectors.len(), "Embeddings received");
        Ok(vectors)
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
