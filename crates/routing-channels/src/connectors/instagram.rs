use async_trait::async_trait;
use chrono::Utc;
use routing_core::model::{Channel as ChannelTag, NormalizedMessage};
use serde_json::Value;

use crate::channel::{Channel, WebhookVerification};
use crate::error::{ChannelError, Result};
use crate::types::{DeliveryReceipt, MediaKind, MediaSource};
use crate::webhook;

const QUICK_REPLY_CAP: usize = 13;

/// Instagram DM connector — same Graph API shape and verification as
/// Messenger, against the `ig_id` messaging endpoint.
pub struct InstagramConnector {
    ig_account_id: String,
    access_token: String,
    app_secret: String,
    http: reqwest::Client,
}

impl InstagramConnector {
    pub fn new(ig_account_id: String, access_token: String, app_secret: String) -> Self {
        Self {
            ig_account_id,
            access_token,
            app_secret,
            http: reqwest::Client::new(),
        }
    }

    async fn post(&self, body: Value) -> Result<DeliveryReceipt> {
        let url = format!("https://graph.facebook.com/v20.0/{}/messages", self.ig_account_id);
        let resp = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
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
impl Channel for InstagramConnector {
    fn name(&self) -> &'static str {
        "instagram"
    }

    fn normalize(&self, raw_body: &[u8]) -> Result<NormalizedMessage> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
        let messaging = payload["entry"][0]["messaging"][0].clone();
        let text = messaging["message"]["text"].as_str();
        let Some(text) = text else {
            return Err(ChannelError::UnsupportedEvent("no message.text in Instagram event".into()));
        };
        let sender = messaging["sender"]["id"]
            .as_str()
            .ok_or_else(|| ChannelError::MalformedPayload("missing sender.id".into()))?
            .to_string();
        let mid = messaging["message"]["mid"].as_str().unwrap_or_default().to_string();

        Ok(NormalizedMessage {
            message_id: mid,
            channel: ChannelTag::Instagram,
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
        self.post(serde_json::json!({ "recipient": { "id": to }, "message": { "text": text } }))
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
        self.post(serde_json::json!({ "recipient": { "id": to }, "message": { "text": text, "quick_replies": quick_replies } }))
            .await
    }

    async fn send_typing(&self, _to: &str) {
        // Instagram's Graph messaging API has no typing-indicator action; no-op.
    }

    async fn mark_read(&self, _conversation_id: &str) {
        // No standalone mark-read call in the Instagram messaging API.
    }

    fn verify_webhook(&self, verification: &WebhookVerification) -> Result<Option<String>> {
        webhook::verify(&self.app_secret, verification)
    }
}
