use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Channel(#[from] routing_channels::ChannelError),
    #[error(transparent)]
    Queue(#[from] routing_queue::QueueError),
    #[error(transparent)]
    Core(#[from] routing_core::CoreError),
}

impl GatewayError {
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "CONFIG_ERROR",
            GatewayError::Channel(e) => e.code(),
            GatewayError::Queue(e) => e.code(),
            GatewayError::Core(e) => e.code(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
