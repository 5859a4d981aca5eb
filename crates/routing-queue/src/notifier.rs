use async_trait::async_trait;
use routing_core::model::QueuedConversation;
use thiserror::Error;

/// Boundary to the Gateway's per-agent push stream (§6). Notification
/// delivery is best-effort: a failed notify never revokes an assignment,
/// the Queue simply surfaces the conversation again on the agent's next
/// reconnect (the Gateway's concern, not this crate's).
#[async_trait]
pub trait AgentNotifier: Send + Sync {
    async fn notify_new_conversation(
        &self,
        agent_id: &str,
        conversation: &QueuedConversation,
    ) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
#[error("agent notification stream unavailable for {0}")]
pub struct NotifyError(pub String);

/// Default used in tests and wherever no push transport is wired up yet.
pub struct NoopNotifier;

#[async_trait]
impl AgentNotifier for NoopNotifier {
    async fn notify_new_conversation(
        &self,
        _agent_id: &str,
        _conversation: &QueuedConversation,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}
