//! Task submission and lifecycle handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;

use agentrun_core::{TaskId, TaskSpec};

use crate::responses::{error_response, SuccessResponse};
use crate::state::AppState;

/// POST /execute: run a task end to end and return its result.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<TaskSpec>,
) -> impl IntoResponse {
    let result = state.runtime.execute_task(spec).await;
    Json(result)
}

/// GET /task/:id: the persisted task, or `null` when unknown.
pub async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.runtime.task(&TaskId::new(id)).await {
        Ok(task) => Json(task).into_response(),
        Err(_) => Json(Value::Null).into_response(),
    }
}

/// GET /tasks: diagnostic view of the in-process task map.
pub async fn list(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.in_memory_tasks().await)
}

/// POST /task/:id/cancel
pub async fn cancel(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.runtime.cancel_task(&TaskId::new(id)).await {
        Ok(()) => Json(SuccessResponse::ok()).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /task/:id/pause
pub async fn pause(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.runtime.pause_task(&TaskId::new(id)).await {
        Ok(()) => Json(SuccessResponse::ok()).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /task/:id/resume
pub async fn resume(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.runtime.resume_task(&TaskId::new(id)).await {
        Ok(()) => Json(SuccessResponse::ok()).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /task/:id/executions: durable execution records for a task.
/// Empty when no database is configured (silent degradation).
pub async fn executions(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    let task_id = TaskId::new(id);
    match state.store.durable() {
        Some(durable) => match durable.executions_for_task(&task_id).await {
            Ok(executions) => Json(executions).into_response(),
            Err(e) => error_response(e),
        },
        None => Json(Vec::<agentrun_core::Execution>::new()).into_response(),
    }
}
