//! Semantic search over the tool catalog.
//!
//! Exposes the retrieval stage on its own: the query is embedded and every
//! tool is ranked by cosine similarity against the precomputed tool vectors.
//! No language model is involved.

use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    /// The natural language query to match against tools
    pub query: String,
    /// Number of results to return (default: the router's top-K)
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub description: String,
    /// Cosine similarity to the query, in [-1, 1]
    pub score: f32,
    pub schema: Value,
}

/// POST /search - Rank tools by similarity to a natural language query.
pub async fn search_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let start_time = std::time::Instant::now();

    if request.query.trim().is_empty() {
        return Err(AppError::ValidationError("Query cannot be empty".to_string()));
    }

    let top_k = request.top_k.unwrap_or(state.router.settings().top_k);
    if top_k == 0 {
        return Err(AppError::ValidationError("top_k must be at least 1".to_string()));
    }

    if !state.is_ready() {
        return Err(AppError::NotReadyError("Tool index not built yet".to_string()));
    }

    let ranked = state.router.search(&request.query, top_k).await?;

    let results: Vec<SearchResult> = ranked
        .into_iter()
        .map(|scored| SearchResult {
            name: scored.tool.name.clone(),
            description: scored.tool.description.clone(),
            score: scored.score,
            schema: scored.tool.schema.clone(),
        })
        .collect();

    let total_time = start_time.elapsed();
    tracing::info!(
        top_k,
        returned = results.len(),
        total_ms = total_time.as_millis() as u64,
        "Search completed"
    );

    metrics::counter!("search_requests_total").increment(1);

    Ok(Json(SearchResponse { results }))
}
