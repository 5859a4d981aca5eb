use async_trait::async_trait;
use dashmap::DashMap;
use routing_core::model::QueuedConversation;
use routing_queue::{AgentNotifier, NotifyError};
use tokio::sync::mpsc;
use tracing::warn;

/// Per-agent push stream registry (§6: per-agent notification channel).
/// An agent's sink is registered when its WS/SSE connection opens and
/// removed on disconnect; `HumanAgentQueue` holds this behind the
/// `AgentNotifier` trait so it never depends on axum directly.
pub struct GatewayNotifier {
    sinks: DashMap<String, mpsc::UnboundedSender<String>>,
}

impl GatewayNotifier {
    pub fn new() -> Self {
        Self { sinks: DashMap::new() }
    }

    pub fn register(&self, agent_id: String, sink: mpsc::UnboundedSender<String>) {
        self.sinks.insert(agent_id, sink);
    }

    pub fn deregister(&self, agent_id: &str) {
        self.sinks.remove(agent_id);
    }
}

impl Default for GatewayNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentNotifier for GatewayNotifier {
    async fn notify_new_conversation(
        &self,
        agent_id: &str,
        conversation: &QueuedConversation,
    ) -> Result<(), NotifyError> {
        let Some(sink) = self.sinks.get(agent_id) else {
            warn!(agent_id, "agent has no open notification stream, will surface on reconnect");
            return Err(NotifyError(agent_id.to_string()));
        };
        let event = serde_json::json!({
            "type": "new_conversation",
            "conversation_id": conversation.conversation_id,
            "department": conversation.department,
            "priority": conversation.priority,
            "ai_summary": conversation.ai_summary,
            "customer_mood": conversation.customer_mood,
        });
        if sink.send(event.to_string()).is_err() {
            warn!(agent_id, "agent notification stream closed, dropping event");
            return Err(NotifyError(agent_id.to_string()));
        }
        Ok(())
    }
}
