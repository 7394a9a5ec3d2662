//! Health, metrics, and diagnostic handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::state::AppState;

/// GET /executions: active-execution task-id set.
pub async fn active_executions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.runtime.active_executions().await)
}

/// GET /notifications: recent outbound notifications.
pub async fn notifications(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.notifications.recent().await)
}

/// GET /health: run registered health checks; 503 when any fails.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = state.health.run().await;
    let status = if report.healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}

/// GET /metrics: Prometheus text exposition.
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let body = crate::metrics::collect_metrics(&state).await;
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
