use std::sync::Arc;

use dashmap::DashMap;
use routing_agent::SalesAgentSession;
use routing_core::model::{ConversationContext, RoutingMode, SessionKey};
use tokio::sync::Mutex;

/// Owns every `ConversationContext` and `SalesAgentSession` in the process.
/// §5 requires each session be behind exactly one lock held for the
/// duration of one message's processing — this registry is where that
/// lock lives. Looking a session up and locking it are separate steps, so
/// two different sessions never contend on the same mutex.
pub struct SessionRegistry {
    contexts: DashMap<SessionKey, Arc<Mutex<ConversationContext>>>,
    sales: DashMap<SessionKey, Arc<Mutex<SalesAgentSession>>>,
    default_routing_mode: RoutingMode,
}

impl SessionRegistry {
    pub fn new(default_routing_mode: RoutingMode) -> Self {
        Self {
            contexts: DashMap::new(),
            sales: DashMap::new(),
            default_routing_mode,
        }
    }

    /// Returns the session's context lock, creating a fresh one on first
    /// contact from this `user_id`.
    pub fn context_for(&self, key: &SessionKey, user_id: &str) -> Arc<Mutex<ConversationContext>> {
        self.contexts
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Mutex::new(ConversationContext::new(
                    key.clone(),
                    user_id,
                    self.default_routing_mode,
                )))
            })
            .clone()
    }

    /// Returns the session's sales-qualification lock, created empty on
    /// first contact. Kept separate from the context lock per §4.3 — the
    /// Sales Agent acquires this only while already holding the context lock.
    pub fn sales_for(&self, key: &SessionKey) -> Arc<Mutex<SalesAgentSession>> {
        self.sales.entry(key.clone()).or_default().clone()
    }

    /// Drops both locks for sessions idle past `idle_ttl`, run periodically
    /// by the eviction task. A session already locked by an in-flight
    /// message is skipped this pass rather than waited on.
    pub async fn evict_idle(&self, idle_ttl: chrono::Duration) -> usize {
        let now = chrono::Utc::now();
        let mut evicted = Vec::new();
        for entry in self.contexts.iter() {
            let key = entry.key().clone();
            let Ok(ctx) = entry.value().try_lock() else {
                continue;
            };
            if ctx.is_idle(now, idle_ttl) {
                evicted.push(key);
            }
        }
        for key in &evicted {
            self.contexts.remove(key);
            self.sales.remove(key);
        }
        evicted.len()
    }

    pub fn active_session_count(&self) -> usize {
        self.contexts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routing_core::model::Channel;

    #[tokio::test]
    async fn evicts_only_idle_sessions() {
        let registry = SessionRegistry::new(RoutingMode::AiFirst);
        let key = SessionKey::new(Channel::Whatsapp, "123");
        let ctx = registry.context_for(&key, "u1");
        {
            let mut locked = ctx.lock().await;
            locked.last_activity_at = chrono::Utc::now() - chrono::Duration::hours(2);
        }
        let evicted = registry.evict_idle(chrono::Duration::seconds(3600)).await;
        assert_eq!(evicted, 1);
        assert_eq!(registry.active_session_count(), 0);
    }

    #[tokio::test]
    async fn leaves_fresh_sessions_alone() {
        let registry = SessionRegistry::new(RoutingMode::AiFirst);
        let key = SessionKey::new(Channel::Whatsapp, "123");
        registry.context_for(&key, "u1");
        let evicted = registry.evict_idle(chrono::Duration::seconds(3600)).await;
        assert_eq!(evicted, 0);
    }
}
