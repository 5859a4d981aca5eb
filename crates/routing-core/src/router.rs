use std::sync::LazyLock;

use regex::Regex;

use crate::config::RoutingRulesConfig;
use crate::error::Result;
use crate::model::{
    ContactInfo, CustomerType, Department, Intent, RoutingDecision, RoutingMode,
};

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static pattern must compile"))
        .collect()
}

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap()
});
static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\+?\d{1,3}[-.\s]?)?\(?\d{1,4}\)?[-.\s]?\d{1,4}[-.\s]?\d{1,9}").unwrap()
});
static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(me llamo|mi nombre es|soy)\s+([A-ZÁÉÍÓÚÑ][a-záéíóúñ]+(?:\s+[A-ZÁÉÍÓÚÑ][a-záéíóúñ]+)*)")
        .unwrap()
});

static INTENT_PATTERNS: LazyLock<[(Intent, Vec<Regex>); 6]> = LazyLock::new(|| {
    [
        (
            Intent::Booking,
            compile_all(&[
                r"\b(reservar|apartar|reserva|booking|book)\b",
                r"\b(quiero viajar|necesito viaje|viajar)\b",
                r"\b(disponibilidad para|cuándo puedo)\b",
                r"\b(confirmar|lo tomo|me interesa definitivo)\b",
            ]),
        ),
        (
            Intent::Quote,
            compile_all(&[
                r"\b(cotización|cotizar|presupuesto|precio)\b",
                r"\b(cuánto cuesta|cuánto sale|qué precio)\b",
                r"\b(para grupo|para empresa|corporativo)\b",
                r"\b(paquete para|viaje para)\b",
            ]),
        ),
        (
            Intent::Info,
            compile_all(&[
                r"\b(información|informar|detalles|saber)\b",
                r"\b(qué incluye|qué trae|qué tiene)\b",
                r"\b(horarios|itinerario|programa)\b",
                r"\b(cómo es|cómo funciona)\b",
            ]),
        ),
        (
            Intent::Complaint,
            compile_all(&[
                r"\b(queja|reclamo|problema|mal)\b",
                r"\b(no funciona|no sirve|pesimo|pésimo)\b",
                r"\b(devolver dinero|reembolso)\b",
                r"\b(insatisfecho|molesto|enojado)\b",
            ]),
        ),
        (
            Intent::Modification,
            compile_all(&[
                r"\b(modificar|cambiar|actualizar)\b",
                r"\b(cambio de fecha|cambiar fecha)\b",
                r"\b(cambio de nombre|cambiar nombre)\b",
            ]),
        ),
        (
            Intent::Cancellation,
            compile_all(&[
                r"\b(cancelar|anular|desistir)\b",
                r"\b(ya no puedo|no voy a poder)\b",
                r"\b(devolver|reintegro)\b",
            ]),
        ),
    ]
});

/// Ties in intent scoring break by this fixed priority order (highest first).
const INTENT_PRIORITY: [Intent; 8] = [
    Intent::Booking,
    Intent::Quote,
    Intent::Complaint,
    Intent::Modification,
    Intent::Cancellation,
    Intent::Info,
    Intent::Question,
    Intent::Browsing,
];

static DEPARTMENT_PATTERNS: LazyLock<[(Department, Vec<Regex>); 4]> = LazyLock::new(|| {
    [
        (
            Department::CustomerService,
            compile_all(&[
                r"\b(mi reserva|mi viaje|mi booking)\b",
                r"\b(modificar reserva|cambiar reserva)\b",
                r"\b(problema con|ayuda con)\b",
                r"\b(servicio al cliente|atención)\b",
            ]),
        ),
        (
            Department::GroupsQuotes,
            compile_all(&[
                r"\b(grupo|grupos|grupal)\b",
                r"\b(empresa|empresarial|corporativo)\b",
                r"\b(cotización para|presupuesto para)\b",
                r"\b(\d{2,})\s+personas?\b",
                r"\b(evento|convención|congreso)\b",
            ]),
        ),
        (
            Department::GeneralInfo,
            compile_all(&[
                r"\b(información|informar|info)\b",
                r"\b(qué es|cómo funciona|explicar)\b",
                r"\b(horarios|abierto|cerrado)\b",
                r"\b(ubicación|dónde están|dirección)\b",
            ]),
        ),
        (
            Department::Sales,
            compile_all(&[
                r"\b(comprar|adquirir|contratar)\b",
                r"\b(quiero reservar|deseo viajar)\b",
                r"\b(estoy interesado|me interesa)\b",
                r"\b(listo para|proceder con)\b",
            ]),
        ),
    ]
});

static PURCHASE_SIGNAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"\b(quiero|necesito|busco)\b.*\b(viajar|viaje|tour)\b",
        r"\b(cuándo puedo|disponibilidad)\b",
        r"\b(confirmar|reservar|apartar)\b",
        r"\b(lo tomo|me conviene|perfecto)\b",
        r"\b(proceder|siguiente paso|continuar)\b",
        r"\b(pagar|payment|tarjeta)\b",
        r"\b(urgente|pronto|rápido)\b",
    ])
});

static TIME_WASTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile_all(&[
        r"\b(solo preguntaba|solo quería saber)\b",
        r"\b(tal vez|quizás|no sé)\b",
        r"\b(solo info|solo información)\b",
        r"\b(más adelante|otro día|después)\b",
        r"\b(estoy viendo|estoy mirando)\b",
        r"\b(solo curiosidad|por curiosidad)\b",
    ])
});

static GROUP_SIZE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s+personas?").unwrap());

/// Per-pipeline-run scoring deltas the Gateway applies back to the session
/// context, plus the classification fields derived by this step. The
/// Router never mutates a `ConversationContext` directly — it is pure over
/// `(message, session_snapshot, config)` as §4.2 requires.
#[derive(Debug, Clone)]
pub struct RoutingUpdate {
    pub contact_info: ContactInfo,
    pub intent: Intent,
    pub department: Department,
    pub purchase_signal_delta: u64,
    pub time_waster_score: f64,
    pub customer_type: CustomerType,
    pub decision: RoutingDecision,
}

/// Immutable snapshot of the session fields the Router needs. The Gateway
/// builds this from the locked `ConversationContext` and applies the
/// resulting `RoutingUpdate` back under the same lock.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub contact_info: ContactInfo,
    pub message_count: u64,
    pub question_count: u64,
    pub purchase_signals: u64,
    pub time_waster_score: f64,
    pub customer_type: CustomerType,
    pub routing_mode: RoutingMode,
    pub ai_attempts: u32,
    pub vip_flag: bool,
}

/// Pure scoring/classification engine. Holds only configuration — no
/// per-session mutable state (the source's singleton `active_conversations`
/// map is intentionally not replicated; see §9 "Singletons removed").
#[derive(Debug, Clone)]
pub struct IntelligentRouter {
    config: RoutingRulesConfig,
}

impl IntelligentRouter {
    pub fn new(config: RoutingRulesConfig) -> Self {
        Self { config }
    }

    /// Runs the full 7-step pipeline described in §4.2 and returns the
    /// scoring deltas plus the routing decision. Never performs I/O.
    pub fn route(&self, message: &str, snapshot: &SessionSnapshot) -> Result<RoutingUpdate> {
        let lower = message.to_lowercase();

        // 1. Contact extraction — never overwrite a previously verified value.
        let mut contact_info = snapshot.contact_info.clone();
        self.extract_contact_info(message, &mut contact_info);

        // 2. Intent classification.
        let intent = self.classify_intent(&lower);

        // 3. Department classification.
        let department = self.classify_department(&lower, intent);

        // 4. Purchase-signal update (monotonically non-decreasing).
        let purchase_signal_delta = self.purchase_score(&lower);
        let purchase_signals = snapshot.purchase_signals + purchase_signal_delta;

        // 5. Time-waster score update (never decreases within a session).
        let question_count = if message.contains('?') {
            snapshot.question_count + 1
        } else {
            snapshot.question_count
        };
        let message_count = snapshot.message_count + 1;
        let time_waster_score = self.time_waster_score(
            snapshot.time_waster_score,
            &lower,
            message.contains('?'),
            question_count,
            purchase_signals,
            message_count,
            contact_info.has_any(),
        );

        // 6. Customer-type reclassification.
        let customer_type = self.classify_customer_type(
            &lower,
            snapshot.vip_flag,
            time_waster_score,
            purchase_signals,
            snapshot.customer_type,
        );

        // 7. Routing decision.
        let decision = self.determine_routing(
            customer_type,
            intent,
            department,
            purchase_signals,
            &contact_info,
            snapshot.routing_mode,
            snapshot.ai_attempts,
        );

        Ok(RoutingUpdate {
            contact_info,
            intent,
            department,
            purchase_signal_delta,
            time_waster_score,
            customer_type,
            decision,
        })
    }

    fn extract_contact_info(&self, message: &str, contact_info: &mut ContactInfo) {
        let mut extracted = false;

        if contact_info.email.is_none() {
            if let Some(m) = EMAIL_PATTERN.find(message) {
                contact_info.email = Some(m.as_str().to_string());
                extracted = true;
            }
        }
        if contact_info.phone.is_none() {
            if let Some(m) = PHONE_PATTERN.find(message) {
                contact_info.phone = Some(m.as_str().to_string());
                extracted = true;
            }
        }
        if contact_info.name.is_none() {
            if let Some(c) = NAME_PATTERN.captures(message) {
                if let Some(name) = c.get(2) {
                    contact_info.name = Some(name.as_str().to_string());
                    extracted = true;
                }
            }
        }
        if extracted && contact_info.collected_at.is_none() {
            contact_info.collected_at = Some(chrono::Utc::now());
        }
    }

    fn classify_intent(&self, lower: &str) -> Intent {
        let mut best = Intent::Unknown;
        let mut best_score = 0usize;

        for (intent, patterns) in INTENT_PATTERNS.iter() {
            let score = patterns.iter().filter(|p| p.is_match(lower)).count();
            if score > best_score {
                best_score = score;
                best = *intent;
            } else if score == best_score && score > 0 {
                // Tie — keep whichever ranks higher in the fixed priority order.
                let current_rank = INTENT_PRIORITY.iter().position(|i| *i == best);
                let candidate_rank = INTENT_PRIORITY.iter().position(|i| i == intent);
                if let (Some(cur), Some(cand)) = (current_rank, candidate_rank) {
                    if cand < cur {
                        best = *intent;
                    }
                }
            }
        }

        best
    }

    fn classify_department(&self, lower: &str, intent: Intent) -> Department {
        for (department, patterns) in DEPARTMENT_PATTERNS.iter() {
            if patterns.iter().any(|p| p.is_match(lower)) {
                return *department;
            }
        }

        match intent {
            Intent::Booking => Department::Sales,
            Intent::Quote => Department::GroupsQuotes,
            Intent::Info => Department::GeneralInfo,
            Intent::Complaint | Intent::Modification | Intent::Cancellation => {
                Department::CustomerService
            }
            _ => Department::GeneralInfo,
        }
    }

    fn purchase_score(&self, lower: &str) -> u64 {
        PURCHASE_SIGNAL_PATTERNS
            .iter()
            .filter(|p| p.is_match(lower))
            .count() as u64
    }

    #[allow(clippy::too_many_arguments)]
    fn time_waster_score(
        &self,
        prior_score: f64,
        lower: &str,
        has_question_mark: bool,
        question_count: u64,
        purchase_signals: u64,
        message_count: u64,
        has_contact_field: bool,
    ) -> f64 {
        let mut score = prior_score;

        if has_question_mark && question_count > 5 && purchase_signals == 0 {
            score += 0.5;
        }

        for pattern in TIME_WASTER_PATTERNS.iter() {
            if pattern.is_match(lower) {
                score += 1.0;
            }
        }

        if message_count > 8 && !has_contact_field {
            score += 1.5;
        }

        if message_count > 15 && purchase_signals < 2 {
            score += 2.0;
        }

        score
    }

    fn classify_customer_type(
        &self,
        lower: &str,
        vip_flag: bool,
        time_waster_score: f64,
        purchase_signals: u64,
        prior_type: CustomerType,
    ) -> CustomerType {
        if vip_flag || self.config.vip_keywords.iter().any(|kw| lower.contains(kw.as_str())) {
            return CustomerType::Vip;
        }

        if let Some(c) = GROUP_SIZE_PATTERN.captures(lower) {
            if let Some(n) = c.get(1).and_then(|m| m.as_str().parse::<u64>().ok()) {
                if n >= 10 {
                    return CustomerType::Group;
                }
            }
        }

        if time_waster_score >= self.config.time_waster_threshold {
            return CustomerType::TimeWaster;
        }

        if purchase_signals >= 2 {
            return CustomerType::Potential;
        }

        prior_type
    }

    #[allow(clippy::too_many_arguments)]
    fn determine_routing(
        &self,
        customer_type: CustomerType,
        intent: Intent,
        department: Department,
        purchase_signals: u64,
        contact_info: &ContactInfo,
        routing_mode: RoutingMode,
        ai_attempts: u32,
    ) -> RoutingDecision {
        if customer_type == CustomerType::Vip {
            return RoutingDecision::to_human(Department::VipService, 1, "VIP customer");
        }

        if intent == Intent::Complaint {
            return RoutingDecision::to_human(Department::CustomerService, 2, "Complaint");
        }

        if customer_type == CustomerType::Group {
            return RoutingDecision::to_human(Department::GroupsQuotes, 3, "Group booking");
        }

        if customer_type == CustomerType::TimeWaster {
            return RoutingDecision::to_ai(department, false, "Time waster detected");
        }

        if purchase_signals >= 3 {
            if contact_info.has_email_or_phone() {
                return match routing_mode {
                    RoutingMode::AiFirst | RoutingMode::Hybrid => {
                        if ai_attempts < self.config.max_ai_attempts {
                            RoutingDecision::to_ai(
                                department,
                                true,
                                "High purchase intent, AI qualifying",
                            )
                        } else {
                            RoutingDecision::escalate(
                                Department::Sales,
                                2,
                                "AI attempts exhausted, escalating to sales",
                            )
                        }
                    }
                    // `ai_only` stays on the AI path even past attempt limits —
                    // it has explicitly opted out of human handoff (DESIGN.md).
                    RoutingMode::AiOnly => RoutingDecision::to_ai(
                        department,
                        false,
                        "High purchase intent, ai_only mode keeps session on AI",
                    ),
                    RoutingMode::HumanDirect => {
                        RoutingDecision::to_human(Department::Sales, 2, "High purchase intent, human_direct mode")
                    }
                };
            }

            return RoutingDecision::to_ai(department, true, "High purchase intent, missing contact")
                .with_hint("collect_contact");
        }

        if intent == Intent::Info && department == Department::GeneralInfo {
            return RoutingDecision::to_ai(department, false, "General info request");
        }

        RoutingDecision::to_ai(department, true, "Default AI routing")
    }
}

impl ContactInfo {
    fn has_any(&self) -> bool {
        self.email.is_some() || self.phone.is_some() || self.name.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoutingAction;

    fn router() -> IntelligentRouter {
        IntelligentRouter::new(RoutingRulesConfig::default())
    }

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            contact_info: ContactInfo::default(),
            message_count: 0,
            question_count: 0,
            purchase_signals: 0,
            time_waster_score: 0.0,
            customer_type: CustomerType::New,
            routing_mode: RoutingMode::AiFirst,
            ai_attempts: 0,
            vip_flag: false,
        }
    }

    // Scenario 1: greeting only.
    #[test]
    fn greeting_routes_to_ai_general_info() {
        let update = router().route("Hola, buenos días", &snapshot()).unwrap();
        assert_eq!(update.decision.action, RoutingAction::RouteToAi);
        assert!(update.decision.allow_escalation);
        assert_eq!(update.decision.department, Department::GeneralInfo);
        assert_eq!(update.customer_type, CustomerType::New);
        assert_eq!(update.purchase_signal_delta, 0);
    }

    // Scenario 2: complaint.
    #[test]
    fn complaint_routes_to_human_customer_service() {
        let update = router()
            .route("Tengo una queja, el tour fue pésimo", &snapshot())
            .unwrap();
        assert_eq!(update.decision.action, RoutingAction::RouteToHuman);
        assert_eq!(update.decision.department, Department::CustomerService);
        assert_eq!(update.decision.priority, 2);
    }

    // Scenario 3: group quote.
    #[test]
    fn group_quote_routes_to_groups_quotes() {
        let update = router()
            .route(
                "Somos 25 personas, queremos cotización para Cancún",
                &snapshot(),
            )
            .unwrap();
        assert_eq!(update.customer_type, CustomerType::Group);
        assert_eq!(update.decision.department, Department::GroupsQuotes);
        assert_eq!(update.decision.priority, 3);
        assert!(update.purchase_signal_delta >= 0);
    }

    // Scenario 4: time waster accumulation.
    #[test]
    fn time_waster_sequence_routes_to_ai_without_escalation() {
        let r = router();
        let mut snap = snapshot();
        for i in 0..10u64 {
            let update = r
                .route("solo preguntaba, tal vez más adelante?", &snap)
                .unwrap();
            snap.message_count = i + 1;
            snap.question_count = if i + 1 > 5 { snap.question_count + 1 } else { 0 };
            snap.purchase_signals += update.purchase_signal_delta;
            snap.time_waster_score = update.time_waster_score;
            snap.customer_type = update.customer_type;
            snap.contact_info = update.contact_info.clone();
        }
        assert!(snap.time_waster_score >= 7.0);
        assert_eq!(snap.customer_type, CustomerType::TimeWaster);
    }

    #[test]
    fn vip_short_circuits_to_vip_service_priority_one() {
        let mut snap = snapshot();
        snap.vip_flag = true;
        let update = router().route("Hola", &snap).unwrap();
        assert_eq!(update.decision.action, RoutingAction::RouteToHuman);
        assert_eq!(update.decision.department, Department::VipService);
        assert_eq!(update.decision.priority, 1);
    }

    #[test]
    fn email_and_name_extracted_and_never_overwritten() {
        let r = router();
        let mut snap = snapshot();
        let update = r
            .route("soy Juan Perez, mi correo es juan@example.com", &snap)
            .unwrap();
        assert_eq!(update.contact_info.email.as_deref(), Some("juan@example.com"));
        assert_eq!(update.contact_info.name.as_deref(), Some("Juan Perez"));

        snap.contact_info = update.contact_info;
        let update2 = r.route("mi correo es otro@example.com", &snap).unwrap();
        assert_eq!(
            update2.contact_info.email.as_deref(),
            Some("juan@example.com"),
            "previously extracted email must not be overwritten"
        );
    }

    #[test]
    fn ai_first_escalates_once_attempts_exhausted() {
        let mut snap = snapshot();
        snap.contact_info.email = Some("a@b.com".to_string());
        snap.purchase_signals = 3;
        snap.ai_attempts = 3;
        let update = router().route("quiero reservar ahora", &snap).unwrap();
        assert_eq!(update.decision.action, RoutingAction::EscalateToHuman);
        assert_eq!(update.decision.department, Department::Sales);
    }
}
