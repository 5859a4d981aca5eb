use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use routing_agent::{ChatbotClient, StubChatbot};
use routing_channels::ChannelManager;
use routing_channels::connectors::WebChatConnector;
use routing_core::{IntelligentRouter, RoutingConfig};
use routing_queue::HumanAgentQueue;
use routing_telegram::TelegramConnector;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::notify::GatewayNotifier;
use crate::session::SessionRegistry;

/// Central shared state, handed to every Axum handler as `Arc<AppState>`.
pub struct AppState {
    pub config: RoutingConfig,
    pub router: IntelligentRouter,
    pub sessions: SessionRegistry,
    pub channels: ChannelManager,
    pub queue: Arc<HumanAgentQueue>,
    pub chatbot: Arc<dyn ChatbotClient>,
    pub notifier: Arc<GatewayNotifier>,
    /// Kept alongside `channels` so the `/ws/chat` handler can register and
    /// deregister sockets directly (`ChannelManager` only exposes `&dyn Channel`).
    pub webchat: Arc<WebChatConnector>,
    /// Cancelled once shutdown begins; `dispatch_inbound` checks this before
    /// starting work on a newly-arrived message so nothing new enters the
    /// pipeline during drain.
    pub shutdown: CancellationToken,
    /// Tracks every detached `dispatch_inbound` task so shutdown can wait for
    /// in-flight messages to finish rather than dropping them mid-processing
    /// (a dropped enqueue could otherwise leave a queued record half-assigned).
    pub tasks: TaskTracker,
}

impl AppState {
    pub fn new(config: RoutingConfig) -> Self {
        let router = IntelligentRouter::new(config.routing.clone());
        let sessions = SessionRegistry::new(config.routing.routing_mode_default);

        // `notifier` is the handle the `/ws/agents` route registers per-agent
        // sinks on; the Queue needs its own owned `Box<dyn AgentNotifier>`, so
        // it gets a thin adapter wrapping a clone of the same Arc.
        let notifier = Arc::new(GatewayNotifier::new());
        let queue = Arc::new(HumanAgentQueue::new(Box::new(ArcNotifier(notifier.clone()))));

        let webchat = Arc::new(WebChatConnector::new(
            config
                .channels
                .webchat
                .as_ref()
                .map(|c| c.jwt_secret.clone())
                .unwrap_or_default(),
        ));

        let mut channels = ChannelManager::new();
        channels.register(Box::new(Arc::clone(&webchat)));
        register_configured_channels(&mut channels, &config);

        let chatbot: Arc<dyn ChatbotClient> = Arc::new(StubChatbot);

        Self {
            config,
            router,
            sessions,
            channels,
            queue,
            chatbot,
            notifier,
            webchat,
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        }
    }
}

/// Adapts a shared `GatewayNotifier` into an owned `AgentNotifier` the Queue
/// can hold in its `Box<dyn AgentNotifier>` without taking ownership of it.
struct ArcNotifier(Arc<GatewayNotifier>);

#[async_trait::async_trait]
impl routing_queue::AgentNotifier for ArcNotifier {
    async fn notify_new_conversation(
        &self,
        agent_id: &str,
        conversation: &routing_core::model::QueuedConversation,
    ) -> Result<(), routing_queue::NotifyError> {
        self.0.notify_new_conversation(agent_id, conversation).await
    }
}

fn register_configured_channels(channels: &mut ChannelManager, config: &RoutingConfig) {
    use routing_channels::connectors::{EmailConnector, InstagramConnector, MessengerConnector, SmsConnector, WhatsAppConnector};

    if let Some(c) = &config.channels.whatsapp {
        channels.register(Box::new(WhatsAppConnector::new(
            c.phone_number_id.clone(),
            c.access_token.clone(),
            c.app_secret.clone(),
            c.verify_token.clone(),
        )));
    }
    if let Some(c) = &config.channels.telegram {
        channels.register(Box::new(TelegramConnector::new(
            c.bot_token.clone(),
            c.secret_token.clone(),
        )));
    }
    if let Some(c) = &config.channels.facebook {
        channels.register(Box::new(MessengerConnector::new(
            c.page_access_token.clone(),
            c.app_secret.clone(),
        )));
    }
    if let Some(c) = &config.channels.instagram {
        channels.register(Box::new(InstagramConnector::new(
            c.ig_account_id.clone(),
            c.access_token.clone(),
            c.app_secret.clone(),
        )));
    }
    if let Some(c) = &config.channels.sms {
        channels.register(Box::new(SmsConnector::new(
            c.from_number.clone(),
            c.account_sid.clone(),
            c.auth_token.clone(),
            c.shared_secret.clone(),
        )));
    }
    if let Some(c) = &config.channels.email {
        channels.register(Box::new(EmailConnector::new(
            c.from_address.clone(),
            c.api_key.clone(),
            c.bearer_token.clone(),
            c.send_endpoint.clone(),
        )));
    }
}

/// Assembles the full Axum router: one webhook path per transport (§6),
/// the agent-operator REST API, and the two WebSocket endpoints.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/webhook/whatsapp", get(crate::http::webhooks::whatsapp_handshake).post(crate::http::webhooks::whatsapp_webhook))
        .route("/webhook/telegram", post(crate::http::webhooks::telegram_webhook))
        .route("/webhook/facebook", get(crate::http::webhooks::facebook_handshake).post(crate::http::webhooks::facebook_webhook))
        .route("/webhook/instagram", get(crate::http::webhooks::instagram_handshake).post(crate::http::webhooks::instagram_webhook))
        .route("/webhook/sms", post(crate::http::webhooks::sms_webhook))
        .route("/webhook/email", post(crate::http::webhooks::email_webhook))
        .route("/ws/chat", get(crate::ws::webchat_handler))
        .route("/ws/agents/{agent_id}", get(crate::ws::agent_handler))
        .route("/agents/register", post(crate::http::agents::register_agent))
        .route("/agents/{agent_id}/status", post(crate::http::agents::update_agent_status))
        .route("/agents/{agent_id}/performance", get(crate::http::agents::agent_performance))
        .route("/queue/status", get(crate::http::agents::queue_status))
        .route("/conversations/{conversation_id}/complete", post(crate::http::agents::complete_conversation))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
