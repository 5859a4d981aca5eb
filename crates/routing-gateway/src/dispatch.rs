use routing_agent::extraction::extract_qualification_data;
use routing_core::model::{
    new_conversation_id, AgentKind, CustomerType, HistoryEntry, MessageSender, NormalizedMessage,
    RoutingAction,
};
use routing_core::router::SessionSnapshot;
use tracing::{error, info, instrument};

use crate::app::AppState;
use crate::summary::generate_conversation_summary;

/// A purchase-qualified conversation that the Router has cleared for AI
/// handling (`allow_escalation`) is handed to the Sales Agent's state
/// machine instead of the general chatbot once it shows real buying
/// intent. This gate is a Gateway-level decision, not the Router's — the
/// Router (§4.2) only ever decides department/action/priority, never which
/// AI backend answers.
const SALES_AGENT_PURCHASE_SIGNAL_THRESHOLD: u64 = 2;

/// The single entry point for one inbound message on any transport. Resolves
/// the session, runs it through the Router, applies the result, and drives
/// whichever downstream (AI or human queue) the decision names. Holds the
/// session's context lock for the whole call, per §5.
#[instrument(skip(state, message), fields(channel = %message.channel, conversation = %message.channel_conversation_id))]
pub async fn dispatch_inbound(state: &AppState, message: NormalizedMessage) {
    if state.shutdown.is_cancelled() {
        info!("shutdown in progress, dropping newly-arrived message");
        return;
    }

    let key = message.session_key();
    let text = message.routable_text();
    let channel_name = message.channel.as_str();
    let to = message.channel_conversation_id.clone();

    let ctx_lock = state.sessions.context_for(&key, &message.user_id);
    let mut ctx = ctx_lock.lock().await;

    if ctx.display_name.is_none() {
        ctx.display_name = message.username.clone();
    }
    ctx.push_history(HistoryEntry {
        sender: MessageSender::User,
        text: text.clone(),
        intent: ctx.intent,
        sentiment: None,
        at: message.timestamp,
    });

    let snapshot = SessionSnapshot {
        contact_info: ctx.contact_info.clone(),
        message_count: ctx.message_count,
        question_count: ctx.question_count,
        purchase_signals: ctx.purchase_signals,
        time_waster_score: ctx.time_waster_score,
        customer_type: ctx.customer_type,
        routing_mode: ctx.routing_mode,
        ai_attempts: ctx.ai_attempts,
        vip_flag: matches!(ctx.customer_type, CustomerType::Vip),
    };

    let update = match state.router.route(&text, &snapshot) {
        Ok(update) => update,
        Err(e) => {
            error!(error = %e, "router pipeline failed, dropping message");
            return;
        }
    };

    ctx.contact_info = update.contact_info;
    ctx.intent = update.intent;
    ctx.department = update.department;
    ctx.purchase_signals += update.purchase_signal_delta;
    ctx.time_waster_score = update.time_waster_score;
    ctx.customer_type = update.customer_type;
    ctx.message_count += 1;
    if text.contains('?') {
        ctx.question_count += 1;
    }
    ctx.last_activity_at = message.timestamp;

    let decision = update.decision;
    ctx.priority = decision.priority;
    ctx.current_agent_kind = decision.suggested_agent_kind.unwrap_or(AgentKind::None);

    info!(
        intent = %ctx.intent,
        department = %ctx.department,
        action = ?decision.action,
        "routed message"
    );

    match decision.action {
        RoutingAction::RouteToAi => {
            ctx.ai_attempts += 1;
            let sales_eligible =
                decision.allow_escalation && ctx.purchase_signals >= SALES_AGENT_PURCHASE_SIGNAL_THRESHOLD;

            if sales_eligible {
                let sales_lock = state.sessions.sales_for(&key);
                let mut sales = sales_lock.lock().await;
                extract_qualification_data(&text, &mut sales.qualification);
                sales.qualification.recompute_score();

                let output = routing_agent::process_message(
                    &text,
                    &mut sales,
                    &ctx,
                    state.chatbot.as_ref(),
                    ctx.ai_attempts,
                )
                .await;

                ctx.push_history(HistoryEntry {
                    sender: MessageSender::Ai,
                    text: output.reply_text.clone(),
                    intent: output.intent,
                    sentiment: None,
                    at: chrono::Utc::now(),
                });

                reply(state, channel_name, &to, &output.reply_text, &output.suggested_quick_replies).await;

                if output.escalate {
                    ctx.escalated = true;
                    ctx.escalation_reason = output.escalation_reason;
                    enqueue_for_human(state, &ctx, decision.department, decision.priority).await;
                }
            } else {
                let response = state.chatbot.answer(&text, &ctx).await;
                ctx.push_history(HistoryEntry {
                    sender: MessageSender::Ai,
                    text: response.text.clone(),
                    intent: response.intent,
                    sentiment: None,
                    at: chrono::Utc::now(),
                });
                reply(state, channel_name, &to, &response.text, &[]).await;
            }
        }
        RoutingAction::RouteToHuman | RoutingAction::EscalateToHuman => {
            ctx.escalated = matches!(decision.action, RoutingAction::EscalateToHuman);
            if ctx.escalated {
                ctx.escalation_reason = Some(decision.reason.clone());
            }
            let queued = enqueue_for_human(state, &ctx, decision.department, decision.priority).await;
            reply(state, channel_name, &to, &wait_ack_text(queued.estimated_wait_s), &[]).await;
        }
    }
}

async fn enqueue_for_human(
    state: &AppState,
    ctx: &routing_core::model::ConversationContext,
    department: routing_core::model::Department,
    priority: u8,
) -> routing_core::model::QueuedConversation {
    let conversation_id = new_conversation_id();
    let summary = generate_conversation_summary(ctx);
    state
        .queue
        .enqueue(conversation_id, ctx, department, priority, Some(summary))
        .await
}

async fn reply(state: &AppState, channel: &str, to: &str, text: &str, quick_replies: &[String]) {
    if quick_replies.is_empty() {
        state.channels.send_text_with_retry(channel, to, text).await;
    } else if let Err(e) = state.channels.send_quick_replies(channel, to, text, quick_replies).await {
        error!(channel, error = %e, "quick-reply send failed, falling back to plain text");
        state.channels.send_text_with_retry(channel, to, text).await;
    }
}

fn wait_ack_text(estimated_wait_s: f64) -> String {
    let minutes = (estimated_wait_s / 60.0).ceil().max(1.0) as i64;
    format!(
        "Un momento, le conectamos con un agente. Tiempo estimado de espera: {minutes} minuto(s)."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_ack_rounds_up_to_whole_minutes() {
        assert!(wait_ack_text(61.0).contains("2 minuto"));
        assert!(wait_ack_text(0.0).contains("1 minuto"));
    }
}
