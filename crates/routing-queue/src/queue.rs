use chrono::Utc;
use dashmap::DashMap;
use routing_core::model::{
    AgentStatus, ConversationContext, CustomerMood, Department, HumanAgent, QueuedConversation,
};
use tracing::{info, instrument, warn};

use crate::error::{QueueError, Result};
use crate::notifier::AgentNotifier;

const NOTIFY_RETRY_ATTEMPTS: u32 = 3;
const WAIT_TIME_EMA_ALPHA: f64 = 0.1;
/// Elevated priority assigned to a conversation enqueued for a department
/// with zero registered agents (§7 EscalationFailed fallback).
const ESCALATION_FALLBACK_PRIORITY: u8 = 1;
/// Sentinel agent id the on-call channel is registered under.
const ON_CALL_AGENT_ID: &str = "on-call";

/// Per-department priority queue + agent registry + active-conversation map.
/// Assignment-affecting operations (enqueue, status transitions, complete)
/// serialize on `assign_lock` since they move a record across two or three
/// maps atomically; individual reads go straight through the `DashMap`s.
pub struct HumanAgentQueue {
    agents: DashMap<String, HumanAgent>,
    queues: DashMap<Department, Vec<QueuedConversation>>,
    active: DashMap<String, QueuedConversation>,
    average_wait_s: DashMap<Department, f64>,
    assign_lock: tokio::sync::Mutex<()>,
    notifier: Box<dyn AgentNotifier>,
}

impl HumanAgentQueue {
    pub fn new(notifier: Box<dyn AgentNotifier>) -> Self {
        Self {
            agents: DashMap::new(),
            queues: DashMap::new(),
            active: DashMap::new(),
            average_wait_s: DashMap::new(),
            assign_lock: tokio::sync::Mutex::new(()),
            notifier,
        }
    }

    /// Idempotent by id: re-registering with identical parameters is a
    /// no-op; re-registering with different parameters is rejected rather
    /// than silently overwriting an agent mid-assignment.
    #[instrument(skip(self))]
    pub async fn register_agent(&self, agent: HumanAgent) -> Result<()> {
        if let Some(existing) = self.agents.get(&agent.agent_id) {
            if existing.name == agent.name
                && existing.departments == agent.departments
                && existing.max_concurrent == agent.max_concurrent
            {
                return Ok(());
            }
            return Err(QueueError::DuplicateAgent(agent.agent_id.clone()));
        }
        self.agents.insert(agent.agent_id.clone(), agent);
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn update_agent_status(&self, agent_id: &str, status: AgentStatus) -> Result<()> {
        let departments = {
            let mut entry = self
                .agents
                .get_mut(agent_id)
                .ok_or_else(|| QueueError::UnknownAgent(agent_id.to_string()))?;
            entry.status = status;
            entry.last_activity_at = Utc::now();
            entry.departments.clone()
        };

        if matches!(status, AgentStatus::Available) {
            for department in departments {
                self.assign_pending(department).await;
            }
        }
        Ok(())
    }

    #[instrument(skip(self, context))]
    pub async fn enqueue(
        &self,
        conversation_id: String,
        context: &ConversationContext,
        department: Department,
        priority: u8,
        ai_summary: Option<String>,
    ) -> QueuedConversation {
        let _guard = self.assign_lock.lock().await;

        let has_registered_agents = self.agents.iter().any(|a| a.serves(department));
        let priority = if has_registered_agents {
            priority
        } else {
            let err = QueueError::EscalationFailed(format!("{department:?} has no registered agents"));
            warn!(department = ?department, error = %err, "enqueuing with elevated priority and notifying on-call channel");
            ESCALATION_FALLBACK_PRIORITY
        };

        let queue_len = self.queues.get(&department).map(|q| q.len()).unwrap_or(0) as f64;
        let capacity = self.available_capacity(department);
        let average_wait = self.average_wait_s.get(&department).map(|v| *v).unwrap_or(300.0);
        let estimated_wait_s = estimate_wait(capacity, queue_len, priority, average_wait);

        let record = QueuedConversation {
            conversation_id,
            session_key: context.session_key.clone(),
            department,
            priority,
            queued_at: Utc::now(),
            estimated_wait_s,
            assigned_agent_id: None,
            ai_summary,
            customer_mood: determine_customer_mood(context),
        };

        self.queues.entry(department).or_default().push(record.clone());
        self.sort_queue(department);

        if !has_registered_agents {
            self.notify_with_retry(ON_CALL_AGENT_ID, &record).await;
        }
        self.try_assign_one(department).await;
        record
    }

    #[instrument(skip(self))]
    pub async fn complete(&self, conversation_id: &str, success: bool) -> Result<()> {
        let _guard = self.assign_lock.lock().await;

        let (agent_id, department) = {
            let (_, record) = self
                .active
                .remove(conversation_id)
                .ok_or_else(|| QueueError::UnknownConversation(conversation_id.to_string()))?;
            let agent_id = record
                .assigned_agent_id
                .clone()
                .ok_or_else(|| QueueError::UnknownConversation(conversation_id.to_string()))?;
            (agent_id, record.department)
        };

        let still_busy = {
            let mut agent = self
                .agents
                .get_mut(&agent_id)
                .ok_or_else(|| QueueError::UnknownAgent(agent_id.clone()))?;
            agent.current_conversation_ids.retain(|id| id != conversation_id);
            agent.total_conversations += 1;
            if success {
                agent.successful_closures += 1;
            }
            if agent.current_conversation_ids.is_empty() {
                agent.status = AgentStatus::Available;
            }
            !agent.current_conversation_ids.is_empty()
        };

        if !still_busy {
            self.assign_pending(department).await;
        }
        Ok(())
    }

    pub fn get_queue_status(&self) -> Vec<(Department, usize)> {
        Department::all()
            .into_iter()
            .map(|d| (d, self.queues.get(&d).map(|q| q.len()).unwrap_or(0)))
            .collect()
    }

    pub fn get_agent_performance(&self, agent_id: &str) -> Option<HumanAgent> {
        self.agents.get(agent_id).map(|a| a.clone())
    }

    fn available_capacity(&self, department: Department) -> f64 {
        self.agents
            .iter()
            .filter(|a| a.serves(department) && matches!(a.status, AgentStatus::Available | AgentStatus::Busy))
            .map(|a| (a.max_concurrent as i64 - a.current_conversation_ids.len() as i64).max(0) as f64)
            .sum()
    }

    fn sort_queue(&self, department: Department) {
        if let Some(mut q) = self.queues.get_mut(&department) {
            q.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.queued_at.cmp(&b.queued_at)));
        }
    }

    async fn assign_pending(&self, department: Department) {
        loop {
            let remaining = self.queues.get(&department).map(|q| q.len()).unwrap_or(0);
            if remaining == 0 || self.available_capacity(department) <= 0.0 {
                break;
            }
            if !self.try_assign_one(department).await {
                break;
            }
        }
    }

    async fn try_assign_one(&self, department: Department) -> bool {
        let Some(agent_id) = self.find_available_agent(department) else {
            return false;
        };

        let record = {
            let Some(mut queue) = self.queues.get_mut(&department) else {
                return false;
            };
            if queue.is_empty() {
                return false;
            }
            queue.remove(0)
        };

        let wait_observed = (Utc::now() - record.queued_at).num_milliseconds() as f64 / 1000.0;
        self.update_wait_time_metrics(department, wait_observed);

        let mut record = record;
        record.assigned_agent_id = Some(agent_id.clone());

        if let Some(mut agent) = self.agents.get_mut(&agent_id) {
            agent.current_conversation_ids.push(record.conversation_id.clone());
            agent.status = AgentStatus::Busy;
        }

        self.active.insert(record.conversation_id.clone(), record.clone());
        self.notify_with_retry(&agent_id, &record).await;
        true
    }

    fn find_available_agent(&self, department: Department) -> Option<String> {
        let mut candidates: Vec<HumanAgent> = self
            .agents
            .iter()
            .filter(|a| {
                a.serves(department) && matches!(a.status, AgentStatus::Available | AgentStatus::Busy) && a.has_capacity()
            })
            .map(|a| a.clone())
            .collect();

        candidates.sort_by(|a, b| {
            a.current_conversation_ids
                .len()
                .cmp(&b.current_conversation_ids.len())
                .then(b.performance_rating.partial_cmp(&a.performance_rating).unwrap())
                .then(a.average_response_time_s.partial_cmp(&b.average_response_time_s).unwrap())
                .then(a.agent_id.cmp(&b.agent_id))
        });
        candidates.into_iter().next().map(|a| a.agent_id)
    }

    fn update_wait_time_metrics(&self, department: Department, observed_s: f64) {
        let mut entry = self.average_wait_s.entry(department).or_insert(observed_s);
        *entry = WAIT_TIME_EMA_ALPHA * observed_s + (1.0 - WAIT_TIME_EMA_ALPHA) * *entry;
    }

    async fn notify_with_retry(&self, agent_id: &str, conversation: &QueuedConversation) {
        for attempt in 1..=NOTIFY_RETRY_ATTEMPTS {
            match self.notifier.notify_new_conversation(agent_id, conversation).await {
                Ok(()) => {
                    info!(agent_id, attempt, "notified agent of new conversation");
                    return;
                }
                Err(e) if attempt < NOTIFY_RETRY_ATTEMPTS => {
                    warn!(agent_id, attempt, error = %e, "agent notification failed, retrying");
                }
                Err(e) => {
                    warn!(agent_id, attempts = attempt, error = %e, "failed to notify agent after retries, assignment stands");
                }
            }
        }
    }
}

fn estimate_wait(capacity: f64, queue_len: f64, priority: u8, average_wait_s: f64) -> f64 {
    if capacity <= 0.0 {
        return average_wait_s * (1.0 + queue_len);
    }
    let base = (queue_len / capacity.max(1.0)) * 60.0;
    let priority_factor = (6.0 - priority as f64) / 5.0;
    base * priority_factor
}

fn determine_customer_mood(context: &ConversationContext) -> CustomerMood {
    use routing_core::model::CustomerType;
    if matches!(context.customer_type, CustomerType::Vip) {
        return CustomerMood::Expectant;
    }
    if matches!(context.customer_type, CustomerType::TimeWaster) {
        return CustomerMood::Undecided;
    }
    if context.purchase_signals > 3 {
        return CustomerMood::Enthusiastic;
    }
    if context.message_count > 10 && context.purchase_signals < 2 {
        return CustomerMood::Frustrated;
    }
    if context.question_count > 5 && context.purchase_signals == 0 {
        return CustomerMood::Curious;
    }
    CustomerMood::Neutral
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use routing_core::model::{Channel, RoutingMode, SessionKey};

    fn ctx() -> ConversationContext {
        ConversationContext::new(SessionKey::new(Channel::Whatsapp, "1"), "u1", RoutingMode::AiFirst)
    }

    fn agent(id: &str, dept: Department) -> HumanAgent {
        HumanAgent::new(id, "Agent", vec![dept])
    }

    #[tokio::test]
    async fn register_is_idempotent_for_identical_params() {
        let q = HumanAgentQueue::new(Box::new(crate::notifier::NoopNotifier));
        q.register_agent(agent("a1", Department::Sales)).await.unwrap();
        q.register_agent(agent("a1", Department::Sales)).await.unwrap();
    }

    #[tokio::test]
    async fn register_rejects_conflicting_redefinition() {
        let q = HumanAgentQueue::new(Box::new(crate::notifier::NoopNotifier));
        q.register_agent(agent("a1", Department::Sales)).await.unwrap();
        let err = q.register_agent(agent("a1", Department::VipService)).await.unwrap_err();
        assert_eq!(err.code(), "DUPLICATE_AGENT");
    }

    #[tokio::test]
    async fn enqueue_assigns_immediately_when_agent_available() {
        let q = HumanAgentQueue::new(Box::new(crate::notifier::NoopNotifier));
        q.register_agent(agent("a1", Department::Sales)).await.unwrap();
        q.update_agent_status("a1", AgentStatus::Available).await.unwrap();

        let rec = q.enqueue("conv-1".to_string(), &ctx(), Department::Sales, 3, None).await;
        assert!(q.queues.get(&Department::Sales).map(|v| v.is_empty()).unwrap_or(true));
        assert!(q.active.contains_key(&rec.conversation_id));
    }

    #[tokio::test]
    async fn enqueue_without_agent_stays_queued() {
        let q = HumanAgentQueue::new(Box::new(crate::notifier::NoopNotifier));
        let rec = q.enqueue("conv-1".to_string(), &ctx(), Department::Sales, 3, None).await;
        assert!(rec.assigned_agent_id.is_none());
        assert_eq!(q.queues.get(&Department::Sales).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn enqueue_with_zero_registered_agents_escalates_priority_and_notifies_on_call() {
        let notifier = Arc::new(RecordingNotifier::default());
        let q = HumanAgentQueue::new(Box::new(notifier.clone()));

        let rec = q.enqueue("conv-1".to_string(), &ctx(), Department::Sales, 5, None).await;
        assert_eq!(rec.priority, ESCALATION_FALLBACK_PRIORITY);
        assert_eq!(notifier.calls_for(ON_CALL_AGENT_ID), 1);
    }

    #[tokio::test]
    async fn enqueue_with_registered_agent_keeps_requested_priority() {
        let q = HumanAgentQueue::new(Box::new(crate::notifier::NoopNotifier));
        q.register_agent(agent("a1", Department::Sales)).await.unwrap();

        let rec = q.enqueue("conv-1".to_string(), &ctx(), Department::Sales, 5, None).await;
        assert_eq!(rec.priority, 5);
    }

    #[tokio::test]
    async fn notify_with_retry_gives_up_after_configured_attempts() {
        let notifier = Arc::new(AlwaysFailNotifier::default());
        let q = HumanAgentQueue::new(Box::new(notifier.clone()));
        q.register_agent(agent("a1", Department::Sales)).await.unwrap();
        q.update_agent_status("a1", AgentStatus::Available).await.unwrap();

        q.enqueue("conv-1".to_string(), &ctx(), Department::Sales, 3, None).await;
        assert_eq!(notifier.attempts(), NOTIFY_RETRY_ATTEMPTS);
    }

    #[tokio::test]
    async fn notify_with_retry_stops_once_a_retry_succeeds() {
        let notifier = Arc::new(FailTwiceThenSucceedNotifier::default());
        let q = HumanAgentQueue::new(Box::new(notifier.clone()));
        q.register_agent(agent("a1", Department::Sales)).await.unwrap();
        q.update_agent_status("a1", AgentStatus::Available).await.unwrap();

        q.enqueue("conv-1".to_string(), &ctx(), Department::Sales, 3, None).await;
        assert_eq!(notifier.attempts(), 3);
    }

    #[derive(Default)]
    struct RecordingNotifier {
        calls: std::sync::Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        fn calls_for(&self, agent_id: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|a| a.as_str() == agent_id).count()
        }
    }

    #[async_trait::async_trait]
    impl crate::notifier::AgentNotifier for Arc<RecordingNotifier> {
        async fn notify_new_conversation(
            &self,
            agent_id: &str,
            _conversation: &QueuedConversation,
        ) -> std::result::Result<(), crate::notifier::NotifyError> {
            self.calls.lock().unwrap().push(agent_id.to_string());
            Ok(())
        }
    }

    #[derive(Default)]
    struct AlwaysFailNotifier {
        attempts: std::sync::atomic::AtomicU32,
    }

    impl AlwaysFailNotifier {
        fn attempts(&self) -> u32 {
            self.attempts.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl crate::notifier::AgentNotifier for Arc<AlwaysFailNotifier> {
        async fn notify_new_conversation(
            &self,
            agent_id: &str,
            _conversation: &QueuedConversation,
        ) -> std::result::Result<(), crate::notifier::NotifyError> {
            self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Err(crate::notifier::NotifyError(agent_id.to_string()))
        }
    }

    #[derive(Default)]
    struct FailTwiceThenSucceedNotifier {
        attempts: std::sync::atomic::AtomicU32,
    }

    impl FailTwiceThenSucceedNotifier {
        fn attempts(&self) -> u32 {
            self.attempts.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl crate::notifier::AgentNotifier for Arc<FailTwiceThenSucceedNotifier> {
        async fn notify_new_conversation(
            &self,
            agent_id: &str,
            _conversation: &QueuedConversation,
        ) -> std::result::Result<(), crate::notifier::NotifyError> {
            let n = self.attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
            if n < 3 {
                Err(crate::notifier::NotifyError(agent_id.to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test]
    async fn complete_frees_agent_and_assigns_next_pending() {
        let q = HumanAgentQueue::new(Box::new(crate::notifier::NoopNotifier));
        q.register_agent(agent("a1", Department::Sales)).await.unwrap();
        {
            let mut a = q.agents.get_mut("a1").unwrap();
            a.max_concurrent = 1;
        }
        q.update_agent_status("a1", AgentStatus::Available).await.unwrap();

        let first = q.enqueue("conv-1".to_string(), &ctx(), Department::Sales, 3, None).await;
        let _second = q.enqueue("conv-2".to_string(), &ctx(), Department::Sales, 3, None).await;
        assert_eq!(q.queues.get(&Department::Sales).unwrap().len(), 1);

        q.complete(&first.conversation_id, true).await.unwrap();
        assert!(q.queues.get(&Department::Sales).map(|v| v.is_empty()).unwrap_or(true));
        assert!(q.active.contains_key("conv-2"));
    }

    #[test]
    fn vip_customer_mood_is_expectant() {
        let mut context = ctx();
        context.customer_type = routing_core::model::CustomerType::Vip;
        assert_eq!(determine_customer_mood(&context), CustomerMood::Expectant);
    }
}
