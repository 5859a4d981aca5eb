pub mod channel;
pub mod connectors;
pub mod error;
pub mod manager;
pub mod types;
pub mod webhook;

pub use channel::{Channel, WebhookVerification};
pub use error::{ChannelError, Result};
pub use manager::ChannelManager;
pub use types::{quick_reply_cap, DeliveryReceipt, MediaKind, MediaSource};
