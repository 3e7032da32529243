use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::index::IndexError;

/// Errors surfaced by the HTTP layer.
///
/// Routing failures carry partial state and are rendered by the route
/// handler itself.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Upstream capability failed: {0}")]
    UpstreamError(String),

    #[error("Service not ready: {0}")]
    NotReadyError(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::ValidationError(msg) => {
                tracing::warn!(error = %msg, "Validation error");
                (StatusCode::BAD_REQUEST, msg.clone())
            }
            AppError::UpstreamError(msg) => {
                tracing::error!(error = %msg, "Upstream error");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::NotReadyError(msg) => {
                tracing::warn!(error = %msg, "Request before readiness");
                (StatusCode::SERVICE_UNAVAILABLE, msg.clone())
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<IndexError> for AppError {
    fn from(err: IndexError) -> Self {
        AppError::UpstreamError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
