use std::sync::LazyLock;

use regex::Regex;
use routing_core::model::{ContactInfo, ConversationContext, Intent};

use crate::chatbot::ChatbotClient;
use crate::extraction::extract_qualification_data;
use crate::state::{AgentState, SalesAgentSession};
use crate::texts;

static ESCALATION_TRIGGER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bhablar con (una persona|un humano|un agente)\b",
        r"(?i)\bquiero hablar con alguien\b",
        r"(?i)\bno (me )?(entiendes|entiende)\b",
        r"(?i)\besto no (funciona|sirve)\b",
        r"(?i)\bquiero (un reembolso|cancelar todo)\b",
        r"(?i)\bes(toy)? (muy )?(molesto|enojado|frustrado)\b",
        r"(?i)\bincreíble\b.*\b(servicio|respuesta)\b",
        r"(?i)\bnadie me (ayuda|responde)\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

static CLOSING_SIGNAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\bquiero reservar\b",
        r"(?i)\bc[oó]mo (pago|reservo)\b",
        r"(?i)\bestoy list[oa] para (reservar|pagar)\b",
        r"(?i)\bvamos a (reservarlo|hacerlo)\b",
        r"(?i)\bd[oó]nde firmo\b",
    ]
    .iter()
    .map(|p| Regex::new(p).unwrap())
    .collect()
});

const MAX_QUALIFICATION_ATTEMPTS: u32 = 3;
const MAX_SALES_ATTEMPTS: u32 = 5;
const AI_CONFIDENCE_THRESHOLD: f64 = 0.5;

fn escalation_trigger_matched(message: &str) -> bool {
    ESCALATION_TRIGGER_PATTERNS.iter().any(|p| p.is_match(message))
}

fn closing_signal_matched(message: &str) -> bool {
    CLOSING_SIGNAL_PATTERNS.iter().any(|p| p.is_match(message))
}

/// Reply produced by one turn of the Agent's state machine.
#[derive(Debug, Clone)]
pub struct AgentOutput {
    pub reply_text: String,
    pub intent: Intent,
    pub suggested_quick_replies: Vec<String>,
    pub escalate: bool,
    pub escalation_reason: Option<String>,
}

impl AgentOutput {
    fn reply(text: impl Into<String>, intent: Intent) -> Self {
        Self {
            reply_text: text.into(),
            intent,
            suggested_quick_replies: Vec::new(),
            escalate: false,
            escalation_reason: None,
        }
    }

    fn escalation(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reply_text: text.into(),
            intent: Intent::Unknown,
            suggested_quick_replies: Vec::new(),
            escalate: true,
            escalation_reason: Some(reason.into()),
        }
    }
}

/// One turn of the AI Sales Agent, mirroring `process_sales_conversation`'s
/// top-level dispatch: explicit escalation request, then a closing signal,
/// then the active state's own handling.
pub async fn process_message(
    message: &str,
    session: &mut SalesAgentSession,
    context: &ConversationContext,
    chatbot: &dyn ChatbotClient,
    sales_attempts: u32,
) -> AgentOutput {
    if escalation_trigger_matched(message) {
        session.state = AgentState::EscalationRequested;
        return AgentOutput::escalation(texts::escalation_response(), texts::ESCALATION_TRIGGER_REASON);
    }

    if closing_signal_matched(message) && !matches!(session.state, AgentState::Qualifying) {
        session.state = AgentState::Closing;
    }

    match session.state {
        AgentState::Closing => handle_closing(session, &context.contact_info),
        AgentState::Qualifying => handle_qualifying(message, session, sales_attempts),
        AgentState::SmallTalk | AgentState::Answering => {
            handle_answering(message, session, context, chatbot, sales_attempts).await
        }
        AgentState::EscalationRequested => {
            AgentOutput::escalation(texts::escalation_response(), texts::ESCALATION_TRIGGER_REASON)
        }
    }
}

fn handle_closing(session: &mut SalesAgentSession, contact_info: &ContactInfo) -> AgentOutput {
    if !session.qualification.is_qualified {
        session.state = AgentState::Qualifying;
        let question = texts::next_qualification_question(&session.qualification, 0);
        return AgentOutput::reply(question, Intent::Quote);
    }

    if !contact_info.has_email_or_phone() {
        return AgentOutput::reply(texts::request_contact_info(), Intent::Quote);
    }

    if session.qualification.is_high_value() {
        return AgentOutput::escalation(texts::closing_prompt(&session.qualification), texts::HIGH_VALUE_ESCALATION_REASON);
    }

    AgentOutput::reply(texts::simple_closing_response(), Intent::Booking)
}

fn handle_qualifying(message: &str, session: &mut SalesAgentSession, attempts: u32) -> AgentOutput {
    extract_qualification_data(message, &mut session.qualification);
    session.qualification.recompute_score();

    if session.qualification.is_qualified {
        session.state = AgentState::Closing;
        return AgentOutput::reply(texts::closing_prompt(&session.qualification), Intent::Quote);
    }

    if qualification_attempts_exhausted(attempts) {
        return AgentOutput::escalation(texts::escalation_response(), texts::ATTEMPTS_EXHAUSTED_REASON);
    }

    let question = texts::next_qualification_question(&session.qualification, context_attempt(session));
    AgentOutput::reply(question, Intent::Quote)
}

fn context_attempt(session: &SalesAgentSession) -> u32 {
    // Rotation only needs a cheap varying counter; derive it from how much
    // qualification data is already known so repeated prompts on the same
    // missing field still vary turn to turn within a conversation.
    session.qualification.destinations.len() as u32
        + session.qualification.group_size.unwrap_or(0)
        + session.qualification.decision_maker as u32
}

async fn handle_answering(
    message: &str,
    session: &mut SalesAgentSession,
    context: &ConversationContext,
    chatbot: &dyn ChatbotClient,
    sales_attempts: u32,
) -> AgentOutput {
    let response = chatbot.answer(message, context).await;

    if response.confidence < AI_CONFIDENCE_THRESHOLD
        || (message.contains('?') && context.question_count > 3)
    {
        return AgentOutput::escalation(texts::escalation_response(), texts::LOW_CONFIDENCE_REASON);
    }

    extract_qualification_data(message, &mut session.qualification);
    session.qualification.recompute_score();

    if session.qualification.is_qualified && matches!(session.state, AgentState::SmallTalk) {
        session.state = AgentState::Closing;
        return AgentOutput::reply(texts::closing_prompt(&session.qualification), Intent::Quote);
    }

    if sales_attempts >= MAX_SALES_ATTEMPTS {
        return AgentOutput::escalation(response.text, texts::ATTEMPTS_EXHAUSTED_REASON);
    }

    session.state = AgentState::Answering;
    let reply = format!("{} {}", response.text, texts::push_phrase(sales_attempts));
    AgentOutput::reply(reply, response.intent)
}

/// Whether the Agent's own qualification attempt budget (distinct from the
/// Router's `max_ai_attempts`) has been exhausted for a session still stuck
/// in `Qualifying`.
pub fn qualification_attempts_exhausted(attempts: u32) -> bool {
    attempts >= MAX_QUALIFICATION_ATTEMPTS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chatbot::StubChatbot;
    use routing_core::model::{ConversationContext, RoutingMode, SessionKey};

    fn ctx() -> ConversationContext {
        ConversationContext::new(
            SessionKey::new(routing_core::model::Channel::Whatsapp, "123"),
            "user-1",
            RoutingMode::AiFirst,
        )
    }

    #[tokio::test]
    async fn escalation_trigger_short_circuits_everything() {
        let mut session = SalesAgentSession::default();
        let chatbot = StubChatbot;
        let out = process_message("quiero hablar con una persona", &mut session, &ctx(), &chatbot, 0).await;
        assert!(out.escalate);
        assert!(matches!(session.state, AgentState::EscalationRequested));
    }

    #[tokio::test]
    async fn closing_signal_without_qualification_starts_qualifying() {
        let mut session = SalesAgentSession::default();
        let chatbot = StubChatbot;
        let out = process_message("quiero reservar", &mut session, &ctx(), &chatbot, 0).await;
        assert!(!out.escalate);
        assert!(matches!(session.state, AgentState::Qualifying));
    }

    #[tokio::test]
    async fn qualifying_state_extracts_and_advances_to_closing_once_scored() {
        let mut session = SalesAgentSession {
            state: AgentState::Qualifying,
            ..Default::default()
        };
        session.qualification.budget_range = Some("5000".to_string());
        session.qualification.destinations = vec!["cancún".to_string()];
        session.qualification.group_size = Some(2);
        session.qualification.decision_maker = true;
        let chatbot = StubChatbot;
        let out = process_message(
            "para la próxima semana",
            &mut session,
            &ctx(),
            &chatbot,
            0,
        )
        .await;
        assert!(!out.escalate);
        assert!(matches!(session.state, AgentState::Closing));
    }

    #[tokio::test]
    async fn high_value_closing_escalates_instead_of_closing_simply() {
        let mut session = SalesAgentSession {
            state: AgentState::Closing,
            ..Default::default()
        };
        session.qualification.is_qualified = true;
        session.qualification.group_size = Some(8);
        let mut context = ctx();
        context.contact_info.email = Some("cliente@example.com".to_string());
        let chatbot = StubChatbot;
        let out = process_message("sí, adelante", &mut session, &context, &chatbot, 0).await;
        assert!(out.escalate);
        assert_eq!(out.escalation_reason.as_deref(), Some(texts::HIGH_VALUE_ESCALATION_REASON));
    }

    #[tokio::test]
    async fn closing_without_contact_info_asks_for_it_and_stays_in_closing() {
        let mut session = SalesAgentSession {
            state: AgentState::Closing,
            ..Default::default()
        };
        session.qualification.is_qualified = true;
        let chatbot = StubChatbot;
        let out = process_message("sí, adelante", &mut session, &ctx(), &chatbot, 0).await;
        assert!(!out.escalate);
        assert_eq!(out.reply_text, texts::request_contact_info());
        assert!(matches!(session.state, AgentState::Closing));
    }

    #[tokio::test]
    async fn sales_attempts_exhausted_escalates() {
        let mut session = SalesAgentSession::default();
        let chatbot = StubChatbot;
        let out = process_message("cuéntame más", &mut session, &ctx(), &chatbot, MAX_SALES_ATTEMPTS).await;
        assert!(out.escalate);
        assert_eq!(out.escalation_reason.as_deref(), Some(texts::ATTEMPTS_EXHAUSTED_REASON));
    }
}
