use routing_core::model::SalesQualification;

/// Agent-side conversation state. `EscalationRequested` is terminal from the
/// Agent's own perspective — the Gateway re-routes to a human and the
/// session's sales state is then dropped/reset together with its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    SmallTalk,
    Qualifying,
    Answering,
    Closing,
    EscalationRequested,
}

impl Default for AgentState {
    fn default() -> Self {
        AgentState::SmallTalk
    }
}

/// Per-session state owned by the AI Sales Agent, kept alongside (not
/// inside) `ConversationContext` the way the source keeps `sales_qualifications`
/// as a sibling map to `active_contexts`.
#[derive(Debug, Clone, Default)]
pub struct SalesAgentSession {
    pub state: AgentState,
    pub qualification: SalesQualification,
}
