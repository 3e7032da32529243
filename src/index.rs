//! Embedding index over a fixed tool catalog.
//!
//! One vector per tool, computed from `"<name>: <description>"` when the index
//! is built and never recomputed afterwards. Ranking is a brute-force cosine
//! scan; catalogs are tens to hundreds of tools.

use ndarray::{Array1, Array2, ArrayView1};
use std::path::Path;
use thiserror::Error;

use crate::catalog::{Catalog, ToolSpec};
use crate::embedding::{Embedder, EmbeddingError};
use crate::persistence::{self, CacheError};

/// Floor for the cosine denominator so zero vectors score 0 instead of NaN.
pub const SIMILARITY_EPSILON: f32 = 1e-9;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("expected {expected} tool embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("query vector has {query} dimensions, index has {index}")]
    DimensionMismatch { query: usize, index: usize },

    #[error("tool embeddings have inconsistent dimensions")]
    Ragged,

    #[error("embeddings cache: {0}")]
    Cache(#[from] CacheError),
}

/// `dot(a, b) / max(‖a‖·‖b‖, ε)`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);
    let denom = (a.dot(&a).sqrt() * b.dot(&b).sqrt()).max(SIMILARITY_EPSILON);
    a.dot(&b) / denom
}

/// A tool together with its similarity to a query.
#[derive(Debug, Clone, Copy)]
pub struct ScoredTool<'a> {
    pub tool: &'a ToolSpec,
    pub score: f32,
}

pub struct EmbeddingIndex {
    catalog: Catalog,
    /// `catalog.len() x dims`, row i belongs to tool i.
    embeddings: Array2<f32>,
    norms: Array1<f32>,
}

impl EmbeddingIndex {
    /// Embed every tool in one batch. Any failure aborts the build.
    pub async fn build(catalog: Catalog, embedder: &dyn Embedder) -> Result<Self, IndexError> {
        Self::build_cached(catalog, embedder, None).await
    }

    /// Like [`build`](Self::build), reusing embeddings from `cache_path` when
    /// the cache was written for the same model and the same tool texts.
    pub async fn build_cached(
        catalog: Catalog,
        embedder: &dyn Embedder,
        cache_path: Option<&Path>,
    ) -> Result<Self, IndexError> {
        let texts: Vec<String> = catalog.iter().map(ToolSpec::embedding_text).collect();

        if let Some(path) = cache_path {
            if let Some(cached) =
                persistence::try_load_embeddings_cache(path, embedder.model_id(), &texts)?
            {
                return Self::from_embeddings(catalog, cached);
            }
        }

        let start = std::time::Instant::now();
        let vectors = embedder.embed_batch(&texts).await?;
        let matrix = to_matrix(vectors, texts.len())?;

        tracing::info!(
            num_tools = texts.len(),
            dims = matrix.ncols(),
            model = embedder.model_id(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Tool embeddings computed"
        );

        if let Some(path) = cache_path {
            if let Err(e) =
                persistence::save_embeddings_cache(path, embedder.model_id(), &texts, &matrix)
            {
                tracing::warn!(error = %e, "Failed to save embeddings cache, continuing");
            }
        }

        Self::from_embeddings(catalog, matrix)
    }

    /// Assemble an index from precomputed embeddings, one row per tool in catalog order.
    pub fn from_embeddings(catalog: Catalog, embeddings: Array2<f32>) -> Result<Self, IndexError> {
        if embeddings.nrows() != catalog.len() {
            return Err(IndexError::CountMismatch {
                expected: catalog.len(),
                actual: embeddings.nrows(),
            });
        }

        let norms = embeddings.map_axis(ndarray::Axis(1), |row| row.dot(&row).sqrt());

        Ok(Self {
            catalog,
            embeddings,
            norms,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.embeddings.ncols()
    }

    /// Cosine similarity of `query` against every tool, in catalog order.
    pub fn similarities(&self, query: &[f32]) -> Result<Vec<f32>, IndexError> {
        if query.len() != self.dims() {
            return Err(IndexError::DimensionMismatch {
                query: query.len(),
                index: self.dims(),
            });
        }

        let q = ArrayView1::from(query);
        let q_norm = q.dot(&q).sqrt();
        let dots = self.embeddings.dot(&q);

        Ok(dots
            .iter()
            .zip(self.norms.iter())
            .map(|(dot, norm)| dot / (norm * q_norm).max(SIMILARITY_EPSILON))
            .collect())
    }

    /// Top `k` tools by descending similarity. Ties keep catalog order.
    ///
    /// `k` larger than the catalog returns the whole catalog ranked.
    pub fn rank(&self, query: &[f32], k: usize) -> Result<Vec<ScoredTool<'_>>, IndexError> {
        let scores = self.similarities(query)?;

        let mut scored: Vec<ScoredTool<'_>> = self
            .catalog
            .iter()
            .zip(scores)
            .map(|(tool, score)| ScoredTool { tool, score })
            .collect();

        // `sort_by` is stable; equal scores stay in insertion order.
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);

        Ok(scored)
    }
}

fn to_matrix(vectors: Vec<Vec<f32>>, expected: usize) -> Result<Array2<f32>, IndexError> {
    if vectors.len() != expected {
        return Err(IndexError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }

    let dims = vectors.first().map_or(0, Vec::len);
    if vectors.iter().any(|v| v.len() != dims) {
        return Err(IndexError::Ragged);
    }

    let flat: Vec<f32> = vectors.into_iter().flatten().collect();
    Array2::from_shape_vec((expected, dims), flat).map_err(|_| IndexError::Ragged)
}
