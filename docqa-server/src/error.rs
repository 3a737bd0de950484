//! Mapping from service errors to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use docqa_rag::RagError;
use thiserror::Error;
use tracing::error;

use crate::protocol::ErrorResponse;

/// An error returned by a handler, rendered as `{"detail": ...}`.
#[derive(Debug, Error)]
#[error("{detail}")]
pub struct ApiError {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, detail: detail.into() }
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::INTERNAL_SERVER_ERROR, detail: detail.into() }
    }
}

impl From<RagError> for ApiError {
    fn from(err: RagError) -> Self {
        let status = match err.root() {
            RagError::ConfigError(_) | RagError::InvalidInput(_) | RagError::LoadError { .. } => {
                StatusCode::BAD_REQUEST
            }
            // `root()` looks through every `Indexing` layer, so only provider errors remain.
            RagError::EmbeddingError { .. }
            | RagError::IndexError { .. }
            | RagError::ModelError { .. }
            | RagError::Indexing { .. } => StatusCode::BAD_GATEWAY,
        };
        Self { status, detail: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, detail = %self.detail, "request failed");
        }
        (self.status, Json(ErrorResponse { detail: self.detail })).into_response()
    }
}
