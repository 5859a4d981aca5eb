use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("unsupported event, ignored: {0}")]
    UnsupportedEvent(String),
    #[error("transport error (retryable): {0}")]
    TransportError(String),
    #[error("permanently rejected: {0}")]
    PermanentRejection(String),
    #[error("webhook verification failed: {0}")]
    Unauthorized(String),
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl ChannelError {
    pub fn code(&self) -> &'static str {
        match self {
            ChannelError::MalformedPayload(_) => "MALFORMED_PAYLOAD",
            ChannelError::UnsupportedEvent(_) => "UNSUPPORTED_EVENT",
            ChannelError::TransportError(_) => "TRANSPORT_ERROR",
            ChannelError::PermanentRejection(_) => "PERMANENT_REJECTION",
            ChannelError::Unauthorized(_) => "UNAUTHORIZED",
            ChannelError::ConfigError(_) => "CONFIG_ERROR",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ChannelError::TransportError(_))
    }
}

pub type Result<T> = std::result::Result<T, ChannelError>;
