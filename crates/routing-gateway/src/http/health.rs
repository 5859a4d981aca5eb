use std::sync::Arc;

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;

/// GET /health — liveness probe, surfaces the active session count and
/// per-department queue depths so an operator dashboard can poll one endpoint.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    let queue_status: Vec<Value> = state
        .queue
        .get_queue_status()
        .into_iter()
        .map(|(department, depth)| json!({ "department": department, "depth": depth }))
        .collect();

    Json(json!({
        "status": "ok",
        "active_sessions": state.sessions.active_session_count(),
        "queue": queue_status,
    }))
}
