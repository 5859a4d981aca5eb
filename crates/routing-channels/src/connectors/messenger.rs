use async_trait::async_trait;
use chrono::Utc;
use routing_core::model::{Channel as ChannelTag, NormalizedMessage};
use serde_json::Value;

use crate::channel::{Channel, WebhookVerification};
use crate::error::{ChannelError, Result};
use crate::types::{DeliveryReceipt, MediaKind, MediaSource};
use crate::webhook;

const QUICK_REPLY_CAP: usize = 13;

/// Shares the `me/messages` Graph API shape and HMAC verification with
/// WhatsApp's connector; kept as its own type since Messenger's payload
/// envelope (`sender.id` / `recipient.id`) differs from WhatsApp's.
pub struct MessengerConnector {
    page_access_token: String,
    app_secret: String,
    http: reqwest::Client,
}

impl MessengerConnector {
    pub fn new(page_access_token: String, app_secret: String) -> Self {
        Self {
            page_access_token,
            app_secret,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, body: Value) -> Result<DeliveryReceipt> {
        let resp = self
            .http
            .post("https://graph.facebook.com/v20.0/me/messages")
            .query(&[("access_token", self.page_access_token.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::TransportError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ChannelError::TransportError(resp.status().to_string()));
        }
        let parsed: Value = resp.json().await.unwrap_or(Value::Null);
        Ok(DeliveryReceipt {
            transport_message_id: parsed["message_id"].as_str().unwrap_or_default().to_string(),
        })
    }
}

#[async_trait]
impl Channel for MessengerConnector {
    fn name(&self) -> &'static str {
        "facebook"
    }

    fn normalize(&self, raw_body: &[u8]) -> Result<NormalizedMessage> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
        let messaging = payload["entry"][0]["messaging"][0].clone();
        let text = messaging["message"]["text"].as_str();
        let Some(text) = text else {
            return Err(ChannelError::UnsupportedEvent("no message.text, likely a postback/read event".into()));
        };
        let sender = messaging["sender"]["id"]
            .as_str()
            .ok_or_else(|| ChannelError::MalformedPayload("missing sender.id".into()))?
            .to_string();
        let mid = messaging["message"]["mid"].as_str().unwrap_or_default().to_string();

        Ok(NormalizedMessage {
            message_id: mid,
            channel: ChannelTag::Facebook,
            user_id: sender.clone(),
            username: None,
            text: text.to_string(),
            timestamp: Utc::now(),
            attachments: Vec::new(),
            channel_user_id: sender.clone(),
            channel_conversation_id: sender,
            raw: payload,
        })
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<DeliveryReceipt> {
        self.post(serde_json::json!({
            "recipient": { "id": to },
            "message": { "text": text },
        }))
        .await
    }

    async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        source: MediaSource,
        _caption: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        let type_key = match kind {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "file",
        };
        let url = match source {
            MediaSource::Url(url) => url,
            MediaSource::Blob(_) => return Err(ChannelError::TransportError("raw blob not supported".into())),
        };
        self.post(serde_json::json!({
            "recipient": { "id": to },
            "message": { "attachment": { "type": type_key, "payload": { "url": url } } },
        }))
        .await
    }

    async fn send_quick_replies(&self, to: &str, text: &str, choices: &[String]) -> Result<DeliveryReceipt> {
        if choices.len() > QUICK_REPLY_CAP {
            let numbered = choices
                .iter()
                .enumerate()
                .map(|(i, c)| format!("{}. {c}", i + 1))
                .collect::<Vec<_>>()
                .join("\n");
            return self.send_text(to, &format!("{text}\n{numbered}")).await;
        }
        let quick_replies: Vec<Value> = choices
            .iter()
            .map(|c| serde_json::json!({ "content_type": "text", "title": c, "payload": c }))
            .collect();
        self.post(serde_json::json!({
            "recipient": { "id": to },
            "message": { "text": text, "quick_replies": quick_replies },
        }))
        .await
    }

    async fn send_typing(&self, to: &str) {
        let _ = self
            .post(serde_json::json!({ "recipient": { "id": to }, "sender_action": "typing_on" }))
            .await;
    }

    async fn mark_read(&self, conversation_id: &str) {
        let _ = self
            .post(serde_json::json!({ "recipient": { "id": conversation_id }, "sender_action": "mark_seen" }))
            .await;
    }

    fn verify_webhook(&self, verification: &WebhookVerification) -> Result<Option<String>> {
        webhook::verify(&self.app_secret, verification)
    }
}
