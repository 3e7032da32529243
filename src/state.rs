use crate::catalog::{retail_catalog, CatalogError};
use crate::config::Config;
use crate::embedding::{self, EmbeddingError};
use crate::index::IndexError;
use crate::llm::{LlmError, OpenAiChatModel};
use crate::router::{RouterSettings, ToolRouter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InitError {
    #[error("OPENAI_API_KEY must be set")]
    MissingApiKey,

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("embedding backend: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("chat model: {0}")]
    Llm(#[from] LlmError),

    #[error("tool index: {0}")]
    Index(#[from] IndexError),
}

/// Application state shared across all request handlers.
pub struct AppState {
    pub router: Arc<ToolRouter>,
    /// Set once the tool index is built and the router can serve queries.
    pub ready: AtomicBool,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wrap an already built router. The state starts ready.
    pub fn new(config: Config, router: ToolRouter) -> Self {
        Self {
            router: Arc::new(router),
            ready: AtomicBool::new(true),
            config: Arc::new(config),
        }
    }

    /// Build the retail router from configuration: embedder, chat model and
    /// the embedded tool index.
    pub async fn initialize(config: Config) -> Result<Self, InitError> {
        let api_key = config.openai_api_key.as_ref().ok_or(InitError::MissingApiKey)?;

        let catalog = retail_catalog()?;
        let embedder = embedding::from_config(&config)?;
        let model = OpenAiChatModel::new(api_key, &config.openai_base_url, &config.router_model)?;

        tracing::info!(
            num_tools = catalog.len(),
            embed_model = embedder.model_id(),
            router_model = %config.router_model,
            "Building tool index"
        );

        let router = ToolRouter::build(
            catalog,
            embedder,
            Arc::new(model),
            RouterSettings::from_config(&config),
        )
        .await?;

        Ok(Self::new(config, router))
    }

    /// Check if the service is ready to handle requests.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}
