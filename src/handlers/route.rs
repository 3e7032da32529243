use crate::error::{AppError, Result};
use crate::router::{Decision, RouteError};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct RouteRequest {
    pub query: String,
}

#[derive(Serialize)]
struct RouteResponse<'a> {
    ok: bool,
    #[serde(flatten)]
    decision: &'a Decision,
}

/// Upstream failures are the gateway's fault; everything else is the model misbehaving.
fn status_for(err: &RouteError) -> StatusCode {
    match err {
        RouteError::Retrieval(_) | RouteError::ApiCall { .. } | RouteError::SynthesisFailed { .. } => {
            StatusCode::BAD_GATEWAY
        }
        RouteError::ToolFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        RouteError::NoToolSelected { .. }
        | RouteError::UnknownTool { .. }
        | RouteError::InvalidArguments { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

/// POST /route - Select, execute and answer with one tool.
///
/// Success is `{"ok": true, tool_name, tool_args, tool_result, answer, candidates}`.
/// Failures return the error report with `ok: false`, its `kind` and whatever
/// partial state was collected.
pub async fn route_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> Result<Response> {
    if request.query.trim().is_empty() {
        return Err(AppError::ValidationError("Query cannot be empty".to_string()));
    }

    if !state.is_ready() {
        return Err(AppError::NotReadyError("Tool index not built yet".to_string()));
    }

    let response = match state.router.decide_and_execute(&request.query).await {
        Ok(decision) => Json(RouteResponse {
            ok: true,
            decision: &decision,
        })
        .into_response(),
        Err(err) => (status_for(&err), Json(err.report())).into_response(),
    };

    Ok(response)
}
