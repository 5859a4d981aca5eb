use async_trait::async_trait;
use chrono::Utc;
use routing_core::model::{Channel as ChannelTag, NormalizedMessage};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::channel::{Channel, WebhookVerification};
use crate::error::{ChannelError, Result};
use crate::types::{DeliveryReceipt, MediaKind, MediaSource};
use crate::webhook;

/// Web chat has no transport SDK — delivery is a direct push onto the
/// session's own WebSocket, owned by the Gateway's `ws` layer. This
/// connector holds one outbound channel per active session id, registered
/// by the Gateway when a socket connects and removed on disconnect.
pub struct WebChatConnector {
    jwt_secret: String,
    sinks: dashmap::DashMap<String, mpsc::UnboundedSender<String>>,
}

impl WebChatConnector {
    pub fn new(jwt_secret: String) -> Self {
        Self {
            jwt_secret,
            sinks: dashmap::DashMap::new(),
        }
    }

    pub fn register_session(&self, session_id: String, sink: mpsc::UnboundedSender<String>) {
        self.sinks.insert(session_id, sink);
    }

    pub fn deregister_session(&self, session_id: &str) {
        self.sinks.remove(session_id);
    }

    fn push(&self, to: &str, payload: Value) -> Result<DeliveryReceipt> {
        let sink = self
            .sinks
            .get(to)
            .ok_or_else(|| ChannelError::TransportError(format!("no open socket for session {to}")))?;
        sink.send(payload.to_string())
            .map_err(|e| ChannelError::TransportError(e.to_string()))?;
        Ok(DeliveryReceipt {
            transport_message_id: routing_core::model::new_conversation_id(),
        })
    }
}

#[async_trait]
impl Channel for WebChatConnector {
    fn name(&self) -> &'static str {
        "webchat"
    }

    fn normalize(&self, raw_body: &[u8]) -> Result<NormalizedMessage> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
        let session_id = payload["session_id"]
            .as_str()
            .ok_or_else(|| ChannelError::MalformedPayload("missing session_id".into()))?
            .to_string();
        let text = payload["text"]
            .as_str()
            .ok_or_else(|| ChannelError::MalformedPayload("missing text".into()))?
            .to_string();

        Ok(NormalizedMessage {
            message_id: routing_core::model::new_conversation_id(),
            channel: ChannelTag::Webchat,
            user_id: session_id.clone(),
            username: payload["display_name"].as_str().map(|s| s.to_string()),
            text,
            timestamp: Utc::now(),
            attachments: Vec::new(),
            channel_user_id: session_id.clone(),
            channel_conversation_id: session_id,
            raw: payload,
        })
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<DeliveryReceipt> {
        self.push(to, serde_json::json!({ "type": "text", "text": text }))
    }

    async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        let url = match source {
            MediaSource::Url(url) => url,
            MediaSource::Blob(_) => return Err(ChannelError::TransportError("raw blob not supported over webchat".into())),
        };
        self.push(
            to,
            serde_json::json!({ "type": "media", "kind": format!("{kind:?}").to_lowercase(), "url": url, "caption": caption }),
        )
    }

    async fn send_quick_replies(&self, to: &str, text: &str, choices: &[String]) -> Result<DeliveryReceipt> {
        self.push(to, serde_json::json!({ "type": "quick_replies", "text": text, "choices": choices }))
    }

    async fn send_typing(&self, to: &str) {
        let _ = self.push(to, serde_json::json!({ "type": "typing" }));
    }

    async fn mark_read(&self, _conversation_id: &str) {
        // No read-receipt concept in the web chat widget.
    }

    fn verify_webhook(&self, verification: &WebhookVerification) -> Result<Option<String>> {
        webhook::verify(&self.jwt_secret, verification)
    }
}

/// Lets the Gateway hold an `Arc<WebChatConnector>` for direct
/// `register_session`/`deregister_session` calls from the WS layer while
/// also registering the same instance with `ChannelManager` as a `Channel`.
#[async_trait]
impl Channel for std::sync::Arc<WebChatConnector> {
    fn name(&self) -> &'static str {
        self.as_ref().name()
    }

    fn normalize(&self, raw_body: &[u8]) -> Result<NormalizedMessage> {
        self.as_ref().normalize(raw_body)
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<DeliveryReceipt> {
        self.as_ref().send_text(to, text).await
    }

    async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        self.as_ref().send_media(to, kind, source, caption).await
    }

    async fn send_quick_replies(&self, to: &str, text: &str, choices: &[String]) -> Result<DeliveryReceipt> {
        self.as_ref().send_quick_replies(to, text, choices).await
    }

    async fn send_typing(&self, to: &str) {
        self.as_ref().send_typing(to).await
    }

    async fn mark_read(&self, conversation_id: &str) {
        self.as_ref().mark_read(conversation_id).await
    }

    fn verify_webhook(&self, verification: &WebhookVerification) -> Result<Option<String>> {
        self.as_ref().verify_webhook(verification)
    }
}
