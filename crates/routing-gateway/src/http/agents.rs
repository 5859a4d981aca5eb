//! Agent-operator REST API (§6): registration, presence, performance, and
//! queue introspection. Notification delivery itself is a WebSocket
//! concern (`crate::ws::agent_handler`), not this module's.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use routing_core::model::{AgentStatus, Department, HumanAgent};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;

use crate::app::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterAgentRequest {
    pub agent_id: String,
    pub name: String,
    pub email: Option<String>,
    pub departments: Vec<Department>,
    pub max_concurrent: Option<u32>,
    pub skills: Option<Vec<String>>,
}

pub async fn register_agent(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterAgentRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let mut agent = HumanAgent::new(req.agent_id, req.name, req.departments);
    agent.email = req.email;
    if let Some(max_concurrent) = req.max_concurrent {
        agent.max_concurrent = max_concurrent;
    }
    if let Some(skills) = req.skills {
        agent.skills = skills;
    }

    state.queue.register_agent(agent).await.map_err(|e| {
        warn!(error = %e, "agent registration failed");
        (StatusCode::CONFLICT, Json(json!({ "error": e.code(), "message": e.to_string() })))
    })?;

    Ok(Json(json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AgentStatus,
}

pub async fn update_agent_status(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.queue.update_agent_status(&agent_id, req.status).await.map_err(|e| {
        (StatusCode::NOT_FOUND, Json(json!({ "error": e.code(), "message": e.to_string() })))
    })?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn agent_performance(
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> Result<Json<HumanAgent>, (StatusCode, Json<Value>)> {
    state
        .queue
        .get_agent_performance(&agent_id)
        .map(Json)
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({ "error": "UNKNOWN_AGENT" }))))
}

#[derive(Debug, Deserialize)]
pub struct QueueStatusQuery {
    #[serde(default)]
    pub department: Option<Department>,
}

pub async fn queue_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QueueStatusQuery>,
) -> Json<Value> {
    let status = state.queue.get_queue_status();
    let filtered: Vec<Value> = status
        .into_iter()
        .filter(|(department, _)| query.department.map(|d| d == *department).unwrap_or(true))
        .map(|(department, depth)| json!({ "department": department, "depth": depth }))
        .collect();
    Json(json!({ "queues": filtered }))
}

#[derive(Debug, Deserialize)]
pub struct CompleteConversationRequest {
    #[serde(default = "default_success")]
    pub success: bool,
}

fn default_success() -> bool {
    true
}

pub async fn complete_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(req): Json<CompleteConversationRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    state.queue.complete(&conversation_id, req.success).await.map_err(|e| {
        (StatusCode::NOT_FOUND, Json(json!({ "error": e.code(), "message": e.to_string() })))
    })?;
    Ok(Json(json!({ "ok": true })))
}
