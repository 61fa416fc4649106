//! Health check handlers.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

/// Liveness probe - process is running.
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "alive" })),
    )
}

/// Relay health: sink backend, forwarding mode and tracked submissions.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "healthy",
            "sink": state.config.sink_backend().to_string(),
            "forward_mode": state.config.forward_mode().to_string(),
            "tracked_submissions": state.queue.statuses().len(),
        })),
    )
}
