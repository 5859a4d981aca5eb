use std::collections::HashMap;

use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use crate::channel::Channel;
use crate::error::ChannelError;
use crate::types::{DeliveryReceipt, MediaKind, MediaSource};

const SEND_RETRY_BASE_SECS: u64 = 1;
const SEND_RETRY_MAX_ATTEMPTS: u32 = 3;
const JITTER_FRACTION: f64 = 0.10;

/// Registry of connectors keyed by `Channel::name()`. Owns the send-retry
/// policy (§5: timeout + exponential backoff up to N attempts, default 3)
/// so connectors themselves stay free of retry logic.
pub struct ChannelManager {
    channels: HashMap<&'static str, Box<dyn Channel>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    pub fn register(&mut self, channel: Box<dyn Channel>) {
        let name = channel.name();
        info!(channel = name, "registering channel connector");
        self.channels.insert(name, channel);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Channel> {
        self.channels.get(name).map(|b| b.as_ref())
    }

    /// Sends text with retry; logs and gives up after exhausting attempts
    /// rather than propagating, matching §5's "does not crash the session".
    pub async fn send_text_with_retry(&self, channel: &str, to: &str, text: &str) -> Option<DeliveryReceipt> {
        let Some(connector) = self.get(channel) else {
            error!(channel, "no connector registered");
            return None;
        };

        let mut delay_secs = SEND_RETRY_BASE_SECS;
        for attempt in 1..=SEND_RETRY_MAX_ATTEMPTS {
            match connector.send_text(to, text).await {
                Ok(receipt) => return Some(receipt),
                Err(e) if !e.is_retryable() || attempt == SEND_RETRY_MAX_ATTEMPTS => {
                    error!(channel, attempt, error = %e, "send failed, giving up");
                    return None;
                }
                Err(e) => {
                    let total = delay_secs + jitter_secs(delay_secs);
                    warn!(channel, attempt, error = %e, retry_after_secs = total, "send failed, retrying");
                    sleep(Duration::from_secs(total)).await;
                    delay_secs *= 2;
                }
            }
        }
        None
    }

    pub async fn send_media(
        &self,
        channel: &str,
        to: &str,
        kind: MediaKind,
        source: MediaSource,
        caption: Option<&str>,
    ) -> Result<DeliveryReceipt, ChannelError> {
        let connector = self
            .get(channel)
            .ok_or_else(|| ChannelError::ConfigError(format!("no connector registered for {channel}")))?;
        connector.send_media(to, kind, source, caption).await
    }

    pub async fn send_quick_replies(
        &self,
        channel: &str,
        to: &str,
        text: &str,
        choices: &[String],
    ) -> Result<DeliveryReceipt, ChannelError> {
        let connector = self
            .get(channel)
            .ok_or_else(|| ChannelError::ConfigError(format!("no connector registered for {channel}")))?;
        connector.send_quick_replies(to, text, choices).await
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

fn jitter_secs(base_secs: u64) -> u64 {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let max_jitter = ((base_secs as f64) * JITTER_FRACTION) as u64;
    if max_jitter == 0 {
        return 0;
    }
    (nanos as u64) % max_jitter
}
