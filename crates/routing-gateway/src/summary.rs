use routing_core::model::ConversationContext;

/// Builds the short free-text summary attached to a `QueuedConversation`
/// (§4.4, `ai_summary`), capped at 2 KiB per the data-model invariant.
/// Grounded on the original's `_generate_conversation_summary`.
pub fn generate_conversation_summary(context: &ConversationContext) -> String {
    let mut parts = vec![format!(
        "Intención: {}, departamento: {}",
        context.intent, context.department
    )];

    if context.contact_info.has_email_or_phone() {
        parts.push("contacto ya recolectado".to_string());
    }
    if context.purchase_signals > 0 {
        parts.push(format!("{} señales de compra", context.purchase_signals));
    }
    if let Some(reason) = &context.escalation_reason {
        parts.push(format!("escalado: {reason}"));
    }

    let recent: Vec<String> = context
        .history
        .iter()
        .rev()
        .take(3)
        .map(|h| format!("{:?}: {}", h.sender, h.text))
        .collect();
    if !recent.is_empty() {
        parts.push(format!("últimos mensajes: {}", recent.join(" | ")));
    }

    let mut summary = parts.join("; ");
    const MAX_BYTES: usize = 2048;
    if summary.len() > MAX_BYTES {
        summary.truncate(MAX_BYTES);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use routing_core::model::{Channel, RoutingMode, SessionKey};

    #[test]
    fn summary_mentions_intent_and_department() {
        let ctx = ConversationContext::new(SessionKey::new(Channel::Whatsapp, "1"), "u1", RoutingMode::AiFirst);
        let summary = generate_conversation_summary(&ctx);
        assert!(summary.contains("Intención"));
    }
}
