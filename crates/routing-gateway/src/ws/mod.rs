//! The two WebSocket surfaces: the embeddable web-chat widget (`/ws/chat`)
//! and the per-agent notification push stream (`/ws/agents/:agent_id`).
//! Both are thin — inbound web-chat frames are handed to the same
//! `dispatch::dispatch_inbound` pipeline every other transport uses;
//! outbound frames on either socket are just drained from an
//! `mpsc::UnboundedReceiver` registered with the relevant sink map.

use std::sync::Arc;

use axum::{
    extract::{ws::Message, ws::WebSocket, Path, State, WebSocketUpgrade},
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use routing_core::model::new_conversation_id;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::app::AppState;
use crate::dispatch::dispatch_inbound;

pub async fn webchat_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_webchat(socket, state))
}

async fn handle_webchat(socket: WebSocket, state: Arc<AppState>) {
    let session_id = new_conversation_id();
    let (outbound_tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.webchat.register_session(session_id.clone(), outbound_tx);

    info!(session_id = %session_id, "web chat socket connected");
    let (mut sink, mut stream) = socket.split();

    let forward = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else { continue };
        let envelope = serde_json::json!({ "session_id": session_id, "text": text.as_str() });
        let raw = serde_json::to_vec(&envelope).unwrap_or_default();

        let Some(connector) = state.channels.get("webchat") else {
            warn!("webchat connector not registered");
            continue;
        };
        match connector.normalize(&raw) {
            Ok(message) => {
                let tracker = state.tasks.clone();
                let state = state.clone();
                tracker.spawn(async move { dispatch_inbound(&state, message).await });
            }
            Err(e) => warn!(error = %e, "failed to normalize web chat frame"),
        }
    }

    state.webchat.deregister_session(&session_id);
    forward.abort();
    info!(session_id = %session_id, "web chat socket disconnected");
}

pub async fn agent_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(agent_id): Path<String>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_agent_socket(socket, state, agent_id))
}

async fn handle_agent_socket(socket: WebSocket, state: Arc<AppState>, agent_id: String) {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    state.notifier.register(agent_id.clone(), tx);
    info!(agent_id = %agent_id, "agent notification socket connected");

    let (mut sink, mut stream) = socket.split();
    let forward = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames on this socket are not part of the protocol (agents act
    // through the REST API); drain them so the connection stays open and
    // closes promptly when the client disconnects.
    while stream.next().await.is_some() {}

    state.notifier.deregister(&agent_id);
    forward.abort();
    info!(agent_id = %agent_id, "agent notification socket disconnected");
}
