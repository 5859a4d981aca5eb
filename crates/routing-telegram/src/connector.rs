use async_trait::async_trait;
use routing_channels::{Channel, ChannelError, DeliveryReceipt, MediaKind, MediaSource, Result, WebhookVerification};
use routing_channels::webhook;
use routing_core::model::{Channel as ChannelTag, NormalizedMessage};
use teloxide::prelude::*;
use teloxide::types::{InputFile, KeyboardButton, KeyboardMarkup, Update, UpdateKind};
use tracing::warn;

const QUICK_REPLY_ROWS_MAX: usize = 8;

/// Telegram connector — the second of the two reference transports
/// implemented in full (§4.1). Inbound updates are decoded directly from
/// the webhook body via teloxide's own `Update` type; outbound sends go
/// through a `teloxide::Bot`.
pub struct TelegramConnector {
    bot: Bot,
    secret_token: String,
}

impl TelegramConnector {
    pub fn new(token: String, secret_token: String) -> Self {
        Self {
            bot: Bot::new(token),
            secret_token,
        }
    }

    fn chat_id(&self, to: &str) -> Result<ChatId> {
        to.parse::<i64>()
            .map(ChatId)
            .map_err(|_| ChannelError::MalformedPayload(format!("invalid chat id {to}")))
    }
}

#[async_trait]
impl Channel for TelegramConnector {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn normalize(&self, raw_body: &[u8]) -> Result<NormalizedMessage> {
        let update: Update = serde_json::from_slice(raw_body).map_err(|e| ChannelError::MalformedPayload(e.to_string()))?;

        let UpdateKind::Message(msg) = update.kind else {
            return Err(ChannelError::UnsupportedEvent("update is not a Message".into()));
        };
        if msg.from().map(|u| u.is_bot).unwrap_or(false) {
            return Err(ChannelError::UnsupportedEvent("message is from a bot".into()));
        }

        let chat_id = msg.chat.id.0.to_string();
        let text = msg.text().or(msg.caption()).unwrap_or_default().to_string();
        let username = msg.from().and_then(|u| u.username.clone());

        Ok(NormalizedMessage {
            message_id: msg.id.0.to_string(),
            channel: ChannelTag::Telegram,
            user_id: chat_id.clone(),
            username,
            text,
            timestamp: msg.date,
            attachments: Vec::new(),
            channel_user_id: chat_id.clone(),
            channel_conversation_id: chat_id,
            raw: serde_json::to_value(&update).unwrap_or(serde_json::Value::Null),
        })
    }

    async fn send_text(&self, to: &str, text: &str) -> Result<DeliveryReceipt> {
        let chat_id = self.chat_id(to)?;
        let sent = self
            .bot
            .send_message(chat_id, text)
            .await
            .map_err(|e| ChannelError::TransportError(e.to_string()))?;
        Ok(DeliveryReceipt {
            transport_message_id: sent.id.0.to_string(),
        })
    }

    async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt> {
        let chat_id = self.chat_id(to)?;
        let url = match source {
            MediaSource::Url(url) => url,
            MediaSource::Blob(_) => return Err(ChannelError::TransportError("raw blob upload not supported".into())),
        };
        let input = InputFile::url(url.parse().map_err(|_| ChannelError::MalformedPayload("invalid media url".into()))?);

        let result = match kind {
            MediaKind::Image => {
                let mut req = self.bot.send_photo(chat_id, input);
                if let Some(c) = caption {
                    req = req.caption(c);
                }
                req.await.map(|m| m.id)
            }
            MediaKind::Video => {
                let mut req = self.bot.send_video(chat_id, input);
                if let Some(c) = caption {
                    req = req.caption(c);
                }
                req.await.map(|m| m.id)
            }
            MediaKind::Audio => {
                let mut req = self.bot.send_audio(chat_id, input);
                if let Some(c) = caption {
                    req = req.caption(c);
                }
                req.await.map(|m| m.id)
            }
            MediaKind::Document => {
                let mut req = self.bot.send_document(chat_id, input);
                if let Some(c) = caption {
                    req = req.caption(c);
                }
                req.await.map(|m| m.id)
            }
        };

        let message_id = result.map_err(|e| ChannelError::TransportError(e.to_string()))?;
        Ok(DeliveryReceipt {
            transport_message_id: message_id.0.to_string(),
        })
    }

    async fn send_quick_replies(&self, to: &str, text: &str, choices: &[String]) -> Result<DeliveryReceipt> {
        let chat_id = self.chat_id(to)?;
        let rows: Vec<Vec<KeyboardButton>> = choices
            .iter()
            .take(QUICK_REPLY_ROWS_MAX)
            .map(|c| vec![KeyboardButton::new(c)])
            .collect();
        let keyboard = KeyboardMarkup::new(rows).resize_keyboard();

        let sent = self
            .bot
            .send_message(chat_id, text)
            .reply_markup(keyboard)
            .await
            .map_err(|e| ChannelError::TransportError(e.to_string()))?;
        Ok(DeliveryReceipt {
            transport_message_id: sent.id.0.to_string(),
        })
    }

    async fn send_typing(&self, to: &str) {
        if let Ok(chat_id) = self.chat_id(to) {
            if let Err(e) = self.bot.send_chat_action(chat_id, teloxide::types::ChatAction::Typing).await {
                warn!(error = %e, "failed to send Telegram typing indicator");
            }
        }
    }

    async fn mark_read(&self, _message_or_conversation_id: &str) {
        // Telegram has no explicit read-receipt API for bots.
    }

    fn verify_webhook(&self, verification: &WebhookVerification) -> Result<Option<String>> {
        webhook::verify(&self.secret_token, verification)
    }
}
