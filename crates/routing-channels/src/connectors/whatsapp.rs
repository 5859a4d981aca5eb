use async_trait::async_trait;
use chrono::Utc;
use routing_core::model::{Attachment, AttachmentKind, Channel as ChannelTag, NormalizedMessage};
use serde_json::Value;
use tracing::warn;

use crate::channel::{Channel, WebhookVerification};
use crate::error::{ChannelError, Result};
use crate::types::{DeliveryReceipt, MediaKind, MediaSource};
use crate::webhook;

const QUICK_REPLY_CAP: usize = 3;

/// WhatsApp Cloud API connector — one of the two reference transports
/// implemented in full (§4.1). Talks to Meta's Graph `messages` endpoint.
pub struct WhatsAppConnector {
    phone_number_id: String,
    access_token: String,
    app_secret: String,
    verify_token: String,
    http: reqwest::Client,
}

impl WhatsAppConnector {
    pub fn new(phone_number_id: String, access_token: String, app_secret: String, verify_token: String) -> Self {
        Self {
            phone_number_id,
            access_token,
            app_secret,
            verify_token,
            http: reqwest::Client::new(),
        }
    }

    fn graph_url(&self) -> String {
        format!("https://graph.facebook.com/v20.0/{}/messages", self.phone_number_id)
    }

    async fn post(&self, body: Value) -> Result<DeliveryReceipt> {
        let resp = self
            .http
            .post(self.graph_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::TransportError(e.to_string()))?;

        if resp.status().is_client_error() && resp.status().as_u16() != 429 {
            return Err(ChannelError::PermanentRejection(resp.status().to_string()));
        }
        if !resp.status().is_success() {
            return Err(ChannelError::TransportError(resp.status().to_string()));
        }

        let parsed: Value = resp.json().await.unwrap_or(Value::Null);
        let message_id = parsed["messages"][0]["id"].as_str().unwrap_or_default().to_string();
        Ok(DeliveryReceipt {
            transport_message_id: message_id,
        })
    }
}

#[async_trait]
impl Channel for WhatsAppConnector {
    fn name(&self) -> &'static str {
        "whatsapp"
    }

    fn normalize(&self, raw_body: &[u8]) -> Result<NormalizedMessage> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;

        let entry = payload["entry"][0]["changes"][0]["value"].clone();
        let message = entry["messages"][0].clone();
        if message.is_null() {
            return Err(ChannelError::UnsupportedEvent("no messages[] in payload, likely a status update".into()));
        }

        let from = message["from"]
            .as_str()
            .ok_or_else(|| ChannelError::MalformedPayload("missing from".into()))?
            .to_string();
        let message_id = message["id"]
            .as_str()
            .ok_or_else(|| ChannelError::MalformedPayload("missing id".into()))?
            .to_string();
        let kind = message["type"].as_str().unwrap_or("text");

        let (text, attachments) = match kind {
            "text" => (message["text"]["body"].as_str().unwrap_or_default().to_string(), vec![]),
            "image" | "video" | "audio" | "voice" | "document" | "sticker" => {
                let attachment_kind = match kind {
                    "image" => AttachmentKind::Image,
                    "video" => AttachmentKind::Video,
                    "audio" => AttachmentKind::Audio,
                    "voice" => AttachmentKind::Voice,
                    "document" => AttachmentKind::Document,
                    _ => AttachmentKind::Sticker,
                };
                let remote_id = message[kind]["id"].as_str().unwrap_or_default().to_string();
                let attachment = Attachment {
                    kind: attachment_kind,
                    remote_id,
                    metadata: message[kind].clone(),
                };
                let placeholder = attachment.placeholder_text();
                (placeholder, vec![attachment])
            }
            "location" => {
                let attachment = Attachment {
                    kind: AttachmentKind::Location,
                    remote_id: String::new(),
                    metadata: serde_json::json!({
                        "lat": message["location"]["latitude"],
                        "lon": message["location"]["longitude"],
                    }),
                };
                let placeholder = attachment.placeholder_text();
                (placeholder, vec![attachment])
            }
            other => {
                return Err(ChannelError::UnsupportedEvent(format!("unhandled message type {other}")));
            }
        };

        let username = entry["contacts"][0]["profile"]["name"].as_str().map(|s| s.to_string());

        Ok(NormalizedMessage {
            message_id,
            channel: ChannelTag::Whatsapp,
            user_id: from.clone(),
            username,
            text,
            timestamp: Utc::now(),
            attachments,
            channel_user_id: from.clone(),
            channel_conversation_id: from,
            raw: payload,
        })
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<DeliveryReceipt> {
        self.post(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "text",
            "text": { "body": text },
        }))
        .await
    }

    async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        let type_key = match kind {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        };
        let link = match source {
            MediaSource::Url(url) => url,
            MediaSource::Blob(_) => {
                return Err(ChannelError::TransportError(
                    "raw blob upload not supported, pass a URL".into(),
                ))
            }
        };
        let mut media = serde_json::json!({ "link": link });
        if let (Some(caption), true) = (caption, matches!(kind, MediaKind::Image | MediaKind::Video | MediaKind::Document)) {
            media["caption"] = Value::String(caption.to_string());
        }
        let receipt = self
            .post(serde_json::json!({
                "messaging_product": "whatsapp",
                "to": to,
                "type": type_key,
                type_key: media,
            }))
            .await?;

        if caption.is_some() && matches!(kind, MediaKind::Audio) {
            self.send_text(to, caption.unwrap()).await?;
        }
        Ok(receipt)
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

        let buttons: Vec<Value> = choices
            .iter()
            .enumerate()
            .map(|(i, c)| {
                serde_json::json!({
                    "type": "reply",
                    "reply": { "id": format!("choice_{i}"), "title": c }
                })
            })
            .collect();

        self.post(serde_json::json!({
            "messaging_product": "whatsapp",
            "to": to,
            "type": "interactive",
            "interactive": {
                "type": "button",
                "body": { "text": text },
                "action": { "buttons": buttons },
            },
        }))
        .await
    }

    async fn send_typing(&self, _to: &str) {
        // WhatsApp Cloud API has no typing-indicator endpoint; best-effort no-op.
    }

    async fn mark_read(&self, message_id: &str) {
        let result = self
            .post(serde_json::json!({
                "messaging_product": "whatsapp",
                "status": "read",
                "message_id": message_id,
            }))
            .await;
        if let Err(e) = result {
            warn!(error = %e, message_id, "failed to mark WhatsApp message as read");
        }
    }

    fn verify_webhook(&self, verification: &WebhookVerification) -> Result<Option<String>> {
        match verification {
            WebhookVerification::ChallengeEcho { verify_token, challenge } => {
                webhook::verify_challenge_echo(&self.verify_token, verify_token, challenge)
            }
            other => webhook::verify(&self.app_secret, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector() -> WhatsAppConnector {
        WhatsAppConnector::new("pn-1".into(), "token".into(), "secret".into(), "verify-tok".into())
    }

    #[test]
    fn normalizes_text_message() {
        let payload = serde_json::json!({
            "entry": [{
                "changes": [{
                    "value": {
                        "contacts": [{ "profile": { "name": "Ana" } }],
                        "messages": [{
                            "from": "521555000111",
                            "id": "wamid.ABC",
                            "type": "text",
                            "text": { "body": "Hola" }
                        }]
                    }
                }]
            }]
        });
        let msg = connector().normalize(payload.to_string().as_bytes()).unwrap();
        assert_eq!(msg.text, "Hola");
        assert_eq!(msg.channel_conversation_id, "521555000111");
        assert_eq!(msg.username.as_deref(), Some("Ana"));
    }

    #[test]
    fn status_update_payload_is_unsupported_event() {
        let payload = serde_json::json!({
            "entry": [{ "changes": [{ "value": { "statuses": [{"id": "x"}] } }] }]
        });
        let err = connector().normalize(payload.to_string().as_bytes()).unwrap_err();
        assert_eq!(err.code(), "UNSUPPORTED_EVENT");
    }

    #[test]
    fn challenge_echo_matches_configured_token() {
        let v = WebhookVerification::ChallengeEcho {
            verify_token: "verify-tok".to_string(),
            challenge: "12345".to_string(),
        };
        assert_eq!(connector().verify_webhook(&v).unwrap().as_deref(), Some("12345"));
    }
}
