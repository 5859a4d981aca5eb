use thiserror::Error;

/// Error kinds for the data model and the pure Router. Distinct from
/// transport/channel errors (`routing_channels::ChannelError`) and queue
/// errors (`routing_queue::QueueError`), which wrap this where they call in.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("configuration error: {0}")]
    Config(String),

    /// The Router's pipeline reached a state its own invariants say is
    /// unreachable (§4.2: "cannot fail except for internal invariant
    /// violations"). Callers are expected to handle this exhaustively but
    /// never observe it in practice.
    #[error("internal invariant violation: {0}")]
    InvariantViolation(String),
}

impl CoreError {
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Config(_) => "CONFIG_ERROR",
            CoreError::InvariantViolation(_) => "INTERNAL_INVARIANT_VIOLATION",
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
