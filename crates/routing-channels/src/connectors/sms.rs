use async_trait::async_trait;
use chrono::Utc;
use routing_core::model::{Channel as ChannelTag, NormalizedMessage};
use serde_json::Value;

use crate::channel::{Channel, WebhookVerification};
use crate::error::{ChannelError, Result};
use crate::types::{DeliveryReceipt, MediaKind, MediaSource};
use crate::webhook;

/// Generic SMS-provider connector (Twilio-shaped form POST and HMAC
/// verification; any provider with the same shared-secret signature scheme
/// can be swapped in without touching the Router or Agent).
pub struct SmsConnector {
    from_number: String,
    account_sid: String,
    auth_token: String,
    shared_secret: String,
    http: reqwest::Client,
}

impl SmsConnector {
    pub fn new(from_number: String, account_sid: String, auth_token: String, shared_secret: String) -> Self {
        Self {
            from_number,
            account_sid,
            auth_token,
            shared_secret,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Channel for SmsConnector {
    fn name(&self) -> &'static str {
        "sms"
    }

    fn normalize(&self, raw_body: &[u8]) -> Result<NormalizedMessage> {
        let payload: Value = serde_json::from_slice(raw_body)
            .map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;
        let from = payload["From"]
            .as_str()
            .ok_or_else(|| ChannelError::MalformedPayload("missing From".into()))?
            .to_string();
        let text = payload["Body"].as_str().unwrap_or_default().to_string();
        let message_id = payload["MessageSid"].as_str().unwrap_or_default().to_string();

        Ok(NormalizedMessage {
            message_id,
            channel: ChannelTag::Sms,
            user_id: from.clone(),
            username: None,
            text,
            timestamp: Utc::now(),
            attachments: Vec::new(),
            channel_user_id: from.clone(),
            channel_conversation_id: from,
            raw: payload,
        })
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<DeliveryReceipt> {
        let url = format!("https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json", self.account_sid);
        let resp = self
            .http
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", self.from_number.as_str()), ("To", to), ("Body", text)])
            .send()
            .await
            .map_err(|e| ChannelError::TransportError(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ChannelError::TransportError(resp.status().to_string()));
        }
        let parsed: Value = resp.json().await.unwrap_or(Value::Null);
        Ok(DeliveryReceipt {
            transport_message_id: parsed["sid"].as_str().unwrap_or_default().to_string(),
        })
    }

    async fn send_media(
        &self,
        _to: &str,
        _kind: MediaKind,
        _source: MediaSource,
        _caption: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        Err(ChannelError::PermanentRejection("MMS media attachments are not supported".into()))
    }

    async fn send_quick_replies(&self, to: &str, text: &str, choices: &[String]) -> Result<DeliveryReceipt> {
        // SMS has no interactive affordance; always falls back to numbered text.
        let numbered = choices
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. {c}", i + 1))
            .collect::<Vec<_>>()
            .join("\n");
        self.send_text(to, &format!("{text}\n{numbered}")).await
    }

    async fn send_typing(&self, _to: &str) {
        // No typing-indicator concept over SMS.
    }

    async fn mark_read(&self, _conversation_id: &str) {
        // No read-receipt concept over SMS.
    }

    fn verify_webhook(&self, verification: &WebhookVerification) -> Result<Option<String>> {
        webhook::verify(&self.shared_secret, verification)
    }
}
