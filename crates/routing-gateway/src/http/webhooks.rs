//! One ingress handler per transport (§6). Each POST handler verifies the
//! request, normalizes it, and spawns `dispatch::dispatch_inbound` so the
//! webhook response returns immediately rather than waiting on routing,
//! AI, or outbound send latency — matching the non-blocking pipeline shape
//! other connectors in this workspace use for inbound handling.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use routing_channels::WebhookVerification;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::app::AppState;
use crate::dispatch::dispatch_inbound;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "authorization")?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

fn unauthorized(reason: impl Into<String>) -> (StatusCode, Json<Value>) {
    let reason = reason.into();
    warn!(reason = %reason, "webhook authentication failed");
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "unauthorized", "reason": reason })))
}

/// Verifies via the named connector, then normalizes and dispatches the
/// body in a detached task. Returns 200 immediately on acceptance.
async fn accept_signed_body(
    state: &Arc<AppState>,
    channel: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let connector = state
        .channels
        .get(channel)
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({"error": "unknown channel"}))))?;

    connector
        .verify_webhook(&WebhookVerification::SignedBody {
            raw_body: body.to_vec(),
            signature_header: header_str(headers, "x-hub-signature-256").map(str::to_string),
        })
        .map_err(|e| unauthorized(e.to_string()))?;

    let message = connector
        .normalize(&body)
        .map_err(|e| (StatusCode::OK, Json(json!({"ok": true, "note": e.to_string()}))))?;

    let tracker = state.tasks.clone();
    let state = state.clone();
    tracker.spawn(async move { dispatch_inbound(&state, message).await });
    Ok(Json(json!({"ok": true})))
}

// ── WhatsApp ─────────────────────────────────────────────────────────────

pub async fn whatsapp_handshake(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, (StatusCode, Json<Value>)> {
    meta_handshake(&state, "whatsapp", params)
}

pub async fn whatsapp_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    accept_signed_body(&state, "whatsapp", &headers, body).await
}

// ── Messenger (Facebook) ─────────────────────────────────────────────────

pub async fn facebook_handshake(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, (StatusCode, Json<Value>)> {
    meta_handshake(&state, "facebook", params)
}

pub async fn facebook_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    accept_signed_body(&state, "facebook", &headers, body).await
}

// ── Instagram ────────────────────────────────────────────────────────────

pub async fn instagram_handshake(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<String, (StatusCode, Json<Value>)> {
    meta_handshake(&state, "instagram", params)
}

pub async fn instagram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    accept_signed_body(&state, "instagram", &headers, body).await
}

fn meta_handshake(
    state: &Arc<AppState>,
    channel: &str,
    params: HashMap<String, String>,
) -> Result<String, (StatusCode, Json<Value>)> {
    let connector = state
        .channels
        .get(channel)
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({"error": "unknown channel"}))))?;

    let verify_token = params.get("hub.verify_token").cloned().unwrap_or_default();
    let challenge = params.get("hub.challenge").cloned().unwrap_or_default();

    let echoed = connector
        .verify_webhook(&WebhookVerification::ChallengeEcho { verify_token, challenge })
        .map_err(|e| unauthorized(e.to_string()))?;

    info!(channel, "subscription handshake verified");
    Ok(echoed.unwrap_or_default())
}

// ── Telegram ─────────────────────────────────────────────────────────────

pub async fn telegram_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let connector = state
        .channels
        .get("telegram")
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({"error": "unknown channel"}))))?;

    connector
        .verify_webhook(&WebhookVerification::SecretHeader {
            secret_header: header_str(&headers, "x-telegram-bot-api-secret-token").map(str::to_string),
        })
        .map_err(|e| unauthorized(e.to_string()))?;

    let message = connector
        .normalize(&body)
        .map_err(|e| (StatusCode::OK, Json(json!({"ok": true, "note": e.to_string()}))))?;

    let tracker = state.tasks.clone();
    let state = state.clone();
    tracker.spawn(async move { dispatch_inbound(&state, message).await });
    Ok(Json(json!({"ok": true})))
}

// ── SMS ──────────────────────────────────────────────────────────────────

pub async fn sms_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let connector = state
        .channels
        .get("sms")
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({"error": "unknown channel"}))))?;

    connector
        .verify_webhook(&WebhookVerification::SecretHeader {
            secret_header: header_str(&headers, "x-webhook-secret").map(str::to_string),
        })
        .map_err(|e| unauthorized(e.to_string()))?;

    let message = connector
        .normalize(&body)
        .map_err(|e| (StatusCode::OK, Json(json!({"ok": true, "note": e.to_string()}))))?;

    let tracker = state.tasks.clone();
    let state = state.clone();
    tracker.spawn(async move { dispatch_inbound(&state, message).await });
    Ok(Json(json!({"ok": true})))
}

// ── Email ────────────────────────────────────────────────────────────────

pub async fn email_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let connector = state
        .channels
        .get("email")
        .ok_or_else(|| (StatusCode::NOT_FOUND, Json(json!({"error": "unknown channel"}))))?;

    connector
        .verify_webhook(&WebhookVerification::BearerToken { token: bearer_token(&headers) })
        .map_err(|e| unauthorized(e.to_string()))?;

    let message = connector
        .normalize(&body)
        .map_err(|e| (StatusCode::OK, Json(json!({"ok": true, "note": e.to_string()}))))?;

    let tracker = state.tasks.clone();
    let state = state.clone();
    tracker.spawn(async move { dispatch_inbound(&state, message).await });
    Ok(Json(json!({"ok": true})))
}
