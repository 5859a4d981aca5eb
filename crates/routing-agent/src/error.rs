use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("chatbot backend error: {0}")]
    ChatbotUnavailable(String),
}

impl AgentError {
    pub fn code(&self) -> &'static str {
        match self {
            AgentError::ChatbotUnavailable(_) => "CHATBOT_UNAVAILABLE",
        }
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
