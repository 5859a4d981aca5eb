pub mod agent;
pub mod chatbot;
pub mod error;
pub mod extraction;
pub mod state;
pub mod texts;

pub use agent::{process_message, qualification_attempts_exhausted, AgentOutput};
pub use chatbot::{ChatbotClient, ChatbotResponse, StubChatbot};
pub use error::{AgentError, Result};
pub use state::{AgentState, SalesAgentSession};
