//! Agent status and collaboration handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

/// GET /agents/:id/status: busy/idle view from the active-execution set.
pub async fn status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    Json(state.runtime.agent_status(&id).await)
}

/// GET /agents: collaboration registry snapshot.
pub async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.collaboration.snapshot().await)
}
