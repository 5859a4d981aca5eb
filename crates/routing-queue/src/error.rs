use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("agent already registered: {0}")]
    DuplicateAgent(String),
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    #[error("unknown conversation: {0}")]
    UnknownConversation(String),
    #[error("escalation failed: {0}")]
    EscalationFailed(String),
}

impl QueueError {
    pub fn code(&self) -> &'static str {
        match self {
            QueueError::DuplicateAgent(_) => "DUPLICATE_AGENT",
            QueueError::UnknownAgent(_) => "UNKNOWN_AGENT",
            QueueError::UnknownConversation(_) => "UNKNOWN_CONVERSATION",
            QueueError::EscalationFailed(_) => "ESCALATION_FAILED",
        }
    }
}

pub type Result<T> = std::result::Result<T, QueueError>;
