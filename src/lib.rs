//! Toolsift - embedding-based tool routing for LLM agents
//!
//! A query is matched against a tool catalog by embedding similarity, the
//! top candidates are offered to a chat model that must pick exactly one, the
//! pick is executed and the result turned into an answer. The degradation
//! harness measures how selection accuracy holds up as the catalog grows.

pub mod catalog;
pub mod config;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod handlers;
pub mod harness;
pub mod index;
pub mod llm;
pub(crate) mod openai;
pub mod persistence;
pub mod router;
pub mod schema;
pub mod state;
pub mod telemetry;

// Re-export key types for convenience
pub use catalog::{retail_catalog, Catalog, ToolSpec};
pub use config::Config;
pub use embedding::Embedder;
pub use error::{AppError, Result};
pub use handlers::{health_handler, ready_handler, route_handler, search_handler};
pub use index::{cosine_similarity, EmbeddingIndex};
pub use llm::ChatModel;
pub use router::{Decision, RouteError, RouterSettings, ToolRouter};
pub use state::AppState;
