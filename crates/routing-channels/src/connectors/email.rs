use async_trait::async_trait;
use chrono::Utc;
use routing_core::model::{Channel as ChannelTag, NormalizedMessage};
use serde_json::Value;

use crate::channel::{Channel, WebhookVerification};
use crate::error::{ChannelError, Result};
use crate::types::{DeliveryReceipt, MediaKind, MediaSource};
use crate::webhook;

/// Inbound-parse-webhook style connector. Outbound send is a transactional
/// email API call; template rendering is explicitly out of scope (§1) so
/// `send_text`'s body is sent as-is.
pub struct EmailConnector {
    from_address: String,
    api_key: String,
    bearer_token: String,
    send_endpoint: String,
    http: reqwest::Client,
}

impl EmailConnector {
    pub fn new(from_address: String, api_key: String, bearer_token: String, send_endpoint: String) -> Self {
        Self {
            from_address,
            api_key,
            bearer_token,
            send_endpoint,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Channel for EmailConnector {
    fn name(&self) -> &'static str {
        "email"
    }

    fn normalize(&self, raw_body: &[u8]) -> Result<NormalizedMessage> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
        let from = payload["from"]
            .as_str()
            .ok_or_else(|| ChannelError::MalformedPayload("missing from".into()))?
            .to_string();
        let text = payload["text"].as_str().unwrap_or_default().to_string();
        let message_id = payload["message_id"].as_str().unwrap_or_default().to_string();

        Ok(NormalizedMessage {
            message_id,
            channel: ChannelTag::Email,
            user_id: from.clone(),
            username: payload["from_name"].as_str().map(|s| s.to_string()),
            text,
            timestamp: Utc::now(),
            attachments: Vec::new(),
            channel_user_id: from.clone(),
            channel_conversation_id: from,
            raw: payload,
        })
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<DeliveryReceipt> {
        let resp = self
            .http
            .post(&self.send_endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "from": self.from_address,
                "to": to,
                "text": text,
            }))
            .send()
            .await
            .map_err(|e| ChannelError::TransportError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ChannelError::TransportError(resp.status().to_string()));
        }
        let parsed: Value = resp.json().await.unwrap_or(Value::Null);
        Ok(DeliveryReceipt {
            transport_message_id: parsed["id"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn send_media(
        &self,
        _to: &str,
        _kind: MediaKind,
        _source: MediaSource,
        _caption: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        Err(ChannelError::PermanentRejection("attachment sending not supported".into()))
    }

    async fn send_quick_replies(&self, to: &str, text: &str, choices: &[String]) -> Result<DeliveryReceipt> {
        let numbered = choices
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {c}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        self.send_text(to, &format!("{text}\n{numbered}")).await
    }

    async fn send_typing(&self, _to: &str) {
        // No typing-indicator concept over email.
    }

    async fn mark_read(&self, _conversation_id: &str) {
        // No read-receipt concept over inbound email.
    }

    fn verify_webhook(&self, verification: &WebhookVerification) -> Result<Option<String>> {
        webhook::verify(&self.bearer_token, verification)
    }
}
