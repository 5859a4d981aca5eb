use serde::{Deserialize, Serialize};

/// Kind passed to `send_media`; distinct from `AttachmentKind` (inbound has
/// more variants than outbound can target).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Document,
}

/// Where the media bytes live — a connector fetches `Url` itself if its
/// transport API requires raw bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MediaSource {
    Url(String),
    Blob(Vec<u8>),
}

/// Returned by every outbound send; `transport_message_id` lets the Gateway
/// correlate delivery receipts/read events that arrive later via webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub transport_message_id: String,
}

/// Per-transport quick-reply cap, referenced by connectors when deciding
/// whether to fall back to a numbered text list (§4.1).
pub fn quick_reply_cap(channel: routing_core::model::Channel) -> Option<usize> {
    use routing_core::model::Channel::*;
    match channel {
        Whatsapp => Some(3),
        Telegram => None,
        Facebook => Some(13),
        Instagram => Some(13),
        Webchat => None,
        Sms | Email => Some(0),
    }
}
