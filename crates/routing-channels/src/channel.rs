use async_trait::async_trait;
use routing_core::model::NormalizedMessage;

use crate::error::Result;
use crate::types::{DeliveryReceipt, MediaKind, MediaSource};

/// The shape of whatever a transport sends the webhook endpoint, reduced to
/// what verification needs. The Gateway's HTTP layer builds one of these
/// from the raw request before calling `verify_webhook`.
#[derive(Debug, Clone)]
pub enum WebhookVerification {
    /// WhatsApp/Messenger/Instagram subscription handshake (`GET` with
    /// `hub.verify_token` + `hub.challenge`).
    ChallengeEcho { verify_token: String, challenge: String },
    /// HMAC-signed raw body (Messenger/Instagram `X-Hub-Signature-256`,
    /// SMS provider signature).
    SignedBody {
        raw_body: Vec<u8>,
        signature_header: Option<String>,
    },
    /// Shared-secret header, compared directly (Telegram's
    /// `X-Telegram-Bot-Api-Secret-Token`).
    SecretHeader { secret_header: Option<String> },
    /// Bearer token in `Authorization` (web chat JWT, email inbound-parse).
    BearerToken { token: Option<String> },
}

/// Common interface implemented by every channel connector (§4.1). Object-safe
/// so `ChannelManager` can store a heterogeneous collection of connectors.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Stable lowercase identifier, used as the `ChannelManager` key and
    /// matching `routing_core::model::Channel::as_str()`.
    fn name(&self) -> &'static str;

    /// Parses one webhook delivery into a canonical message. Returns
    /// `Err(UnsupportedEvent)` for deliveries that are not user messages
    /// (delivery receipts, typing events, etc.) — callers should drop these
    /// silently rather than treat them as failures.
    fn normalize(&self, raw_body: &[u8]) -> Result<NormalizedMessage>;

    async fn send_text(&self, to: &str, text: &str) -> Result<DeliveryReceipt>;

    async fn send_media(
        &self,
        to: &str,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt>;

    /// Falls back to a numbered text list when `choices.len()` exceeds the
    /// transport's quick-reply cap (`types::quick_reply_cap`).
    async fn send_quick_replies(&self, to: &str, text: &str, choices: &[String]) -> Result<DeliveryReceipt>;

    /// Best-effort; must never return an error that aborts the caller.
    async fn send_typing(&self, to: &str);

    /// Idempotent; must never return an error that aborts the caller.
    async fn mark_read(&self, message_or_conversation_id: &str);

    /// Returns `Ok(Some(challenge))` for a subscription handshake that must
    /// be echoed back verbatim, `Ok(None)` for an accepted POST delivery.
    fn verify_webhook(&self, verification: &WebhookVerification) -> Result<Option<String>>;
}
