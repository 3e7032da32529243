pub mod health;
pub mod route;
pub mod search;

pub use health::{health_handler, ready_handler};
pub use route::route_handler;
pub use search::search_handler;

use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Routing, search and health endpoints over `state`.
pub fn api_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/route", post(route_handler))
        .route("/search", post(search_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
