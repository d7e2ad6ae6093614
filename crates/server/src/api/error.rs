//! Mapping of orchestrator errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

use opused_core::{OrchestratorError, TaskStoreError};

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// An orchestrator error on its way out of a handler.
#[derive(Debug)]
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(e: OrchestratorError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            OrchestratorError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::AlreadyRunning(_) => StatusCode::CONFLICT,
            OrchestratorError::Store(TaskStoreError::Duplicate(_)) => StatusCode::CONFLICT,
            OrchestratorError::Store(TaskStoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            OrchestratorError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            OrchestratorError::Metadata(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self.0, "Request failed");
        }
        (
            status,
            Json(ErrorResponse {
                error: self.0.to_string(),
            }),
        )
            .into_response()
    }
}
