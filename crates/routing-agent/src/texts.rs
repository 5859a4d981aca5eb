use routing_core::model::SalesQualification;

/// Rotates through a small set of phrasings keyed by a monotonically
/// increasing counter, so repeated prompts on the same field are not
/// verbatim-identical (§4.3).
fn pick<'a>(options: &[&'a str], counter: u32) -> &'a str {
    options[(counter as usize) % options.len()]
}

/// Returns the next qualification question to ask, in the priority order
/// destination > timeline > group size > budget > specific needs, and the
/// rotation counter used to select its phrasing.
pub fn next_qualification_question(qualification: &SalesQualification, attempt: u32) -> String {
    if qualification.destinations.is_empty() {
        return pick(
            &[
                "¿A qué destino le gustaría viajar?",
                "Cuénteme, ¿qué destino tiene en mente?",
            ],
            attempt,
        )
        .to_string();
    }
    if matches!(qualification.timeline, routing_core::model::Timeline::Unknown) {
        return pick(
            &[
                "¿Para cuándo estaría planeando el viaje?",
                "¿Tiene ya una fecha aproximada en mente?",
            ],
            attempt,
        )
        .to_string();
    }
    if qualification.group_size.is_none() {
        return pick(
            &[
                "¿Cuántas personas viajarían?",
                "¿Viaja solo, en pareja, o con más personas?",
            ],
            attempt,
        )
        .to_string();
    }
    if qualification.budget_range.is_none() {
        return pick(
            &[
                "¿Con qué presupuesto cuenta para este viaje?",
                "¿Tiene un rango de presupuesto en mente?",
            ],
            attempt,
        )
        .to_string();
    }
    pick(
        &[
            "¿Hay algo específico que le gustaría incluir en su viaje?",
            "¿Alguna necesidad particular que debamos tener en cuenta?",
        ],
        attempt,
    )
    .to_string()
}

/// A short phrase nudging the customer toward booking, used when the Agent
/// has already delegated content questions to the chatbot.
pub fn push_phrase(attempt: u32) -> &'static str {
    pick(
        &[
            "Si gusta, puedo ayudarle a reservar ahora mismo.",
            "¿Le gustaría que avancemos con la reserva?",
            "Puedo preparar una cotización formal cuando usted diga.",
            "Este es un buen momento para asegurar su lugar.",
        ],
        attempt,
    )
}

pub fn summarize_needs(qualification: &SalesQualification) -> String {
    let mut parts = Vec::new();
    if !qualification.destinations.is_empty() {
        parts.push(format!("destino(s): {}", qualification.destinations.join(", ")));
    }
    if !matches!(qualification.timeline, routing_core::model::Timeline::Unknown) {
        parts.push(format!("fecha: {}", qualification.timeline.as_str()));
    }
    if let Some(n) = qualification.group_size {
        parts.push(format!("{n} persona(s)"));
    }
    if let Some(budget) = &qualification.budget_range {
        parts.push(format!("presupuesto: {budget}"));
    }
    if parts.is_empty() {
        "sin detalles adicionales".to_string()
    } else {
        parts.join("; ")
    }
}

pub fn closing_prompt(qualification: &SalesQualification) -> String {
    format!(
        "Con base en lo que me comenta ({}), tengo una propuesta que le puede interesar. \
         ¿Me confirma su nombre y un correo o teléfono para enviarle los detalles?",
        summarize_needs(qualification)
    )
}

pub const HIGH_VALUE_ESCALATION_REASON: &str = "lead de alto valor, requiere seguimiento personalizado";
pub const ESCALATION_TRIGGER_REASON: &str = "el cliente solicitó hablar con una persona";
pub const LOW_CONFIDENCE_REASON: &str = "el chatbot no tiene suficiente confianza en su respuesta";
pub const ATTEMPTS_EXHAUSTED_REASON: &str = "se agotaron los intentos de calificación del agente de ventas";

pub fn escalation_response() -> &'static str {
    "Permítame conectarle con uno de nuestros agentes para darle una atención más personalizada."
}

pub fn simple_closing_response() -> &'static str {
    "Perfecto, ¡muchas gracias! Un agente se pondrá en contacto con usted en breve para finalizar los detalles."
}

pub fn request_contact_info() -> &'static str {
    "Para enviarle los detalles, ¿me puede compartir un correo electrónico o un número de teléfono?"
}
