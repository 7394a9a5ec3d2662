//! HTTP router for the agentrun front door.
//!
//! Provides endpoints for:
//! - Task execution (`/execute`) and lookup (`/task/:id`, `/tasks`)
//! - Lifecycle operations (`/task/:id/cancel|pause|resume`)
//! - Runtime views (`/executions`, `/agents`, `/agents/:id/status`)
//! - Observability (`/health`, `/metrics`, `/notifications`)

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    // CORS layer for dashboard/devtools access
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Task routes
        .route("/execute", post(handlers::tasks::execute))
        .route("/task/:id", get(handlers::tasks::get_task))
        .route("/task/:id/cancel", post(handlers::tasks::cancel))
        .route("/task/:id/pause", post(handlers::tasks::pause))
        .route("/task/:id/resume", post(handlers::tasks::resume))
        .route("/task/:id/executions", get(handlers::tasks::executions))
        .route("/tasks", get(handlers::tasks::list))
        // Runtime views
        .route("/executions", get(handlers::system::active_executions))
        .route("/agents", get(handlers::agents::list))
        .route("/agents/:id/status", get(handlers::agents::status))
        // Observability routes
        .route("/notifications", get(handlers::system::notifications))
        .route("/health", get(handlers::system::health))
        .route("/metrics", get(handlers::system::metrics))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
