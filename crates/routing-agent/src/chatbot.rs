use async_trait::async_trait;
use routing_core::model::{ConversationContext, Intent};

/// Answer produced by the general-purpose chatbot the Agent delegates
/// content questions to. `confidence` below `ai_confidence_threshold` is one
/// of the Agent's escalation triggers (§4.3).
#[derive(Debug, Clone)]
pub struct ChatbotResponse {
    pub text: String,
    pub confidence: f64,
    pub intent: Intent,
}

/// External collaborator boundary for the chatbot NLP backend — explicitly
/// out of scope per §1 ("chatbot NLP model internals"). Anything behind
/// this trait may be swapped for a real model-backed service without
/// touching the Agent's state machine.
#[async_trait]
pub trait ChatbotClient: Send + Sync {
    async fn answer(&self, message: &str, context: &ConversationContext) -> ChatbotResponse;
}

/// Deterministic stand-in used in tests and as the default when no external
/// chatbot endpoint is configured. Always reports full confidence so it
/// never itself triggers the low-confidence escalation path.
pub struct StubChatbot;

#[async_trait]
impl ChatbotClient for StubChatbot {
    async fn answer(&self, message: &str, _context: &ConversationContext) -> ChatbotResponse {
        ChatbotResponse {
            text: format!("Gracias por su mensaje: \"{message}\". Permítame ayudarle con eso."),
            confidence: 1.0,
            intent: Intent::Unknown,
        }
    }
}
