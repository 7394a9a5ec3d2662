//! HTTP response types and error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use agentrun_core::RuntimeError;

// ============================================================================
// Generic responses
// ============================================================================

/// Body for successful lifecycle operations.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    /// The canonical `{ "success": true }` body.
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Error mapping
// ============================================================================

/// Map a runtime error onto an HTTP response.
pub fn error_response(error: RuntimeError) -> Response {
    let status = match &error {
        RuntimeError::TaskNotFound(_) | RuntimeError::AgentNotFound(_) => StatusCode::NOT_FOUND,
        RuntimeError::InvalidState { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}
