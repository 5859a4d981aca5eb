use std::sync::LazyLock;

use regex::Regex;

use routing_core::model::{SalesQualification, Timeline};

static BUDGET_RANGE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bentre\s+\$?(\d+[\d,]*)\s+y\s+\$?(\d+[\d,]*)\b").unwrap());
static BUDGET_AMOUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\$?\s*(\d+[\d,]*)\s*(?:mil|k|dólares|pesos)?").unwrap());
static GROUP_SIZE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s*personas?\b").unwrap());
static DECISION_MAKER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(yo decido|soy quien|es mi decisión)\b").unwrap());

const TIMELINE_KEYWORDS: &[(Timeline, &[&str])] = &[
    (
        Timeline::Immediate,
        &["esta semana", "este fin de semana", "mañana", "hoy", "urgente"],
    ),
    (
        Timeline::OneToTwoWeeks,
        &["próxima semana", "siguiente semana", "en una semana", "en dos semanas"],
    ),
    (
        Timeline::OneToThreeMonths,
        &[
            "próximo mes",
            "siguiente mes",
            "en un mes",
            "en dos meses",
            "en tres meses",
        ],
    ),
    (
        Timeline::MoreThanThreeMonths,
        &["más adelante", "todavía no", "estoy planeando", "fin de año"],
    ),
];

const COMMON_DESTINATIONS: &[&str] = &[
    "cancún",
    "riviera maya",
    "playa del carmen",
    "tulum",
    "puerto vallarta",
    "los cabos",
    "acapulco",
    "caribe",
    "europa",
    "asia",
    "sudamérica",
];

/// Extracts qualification fields from one message, mutating `qualification`
/// in place. Mirrors §4.3's field-by-field rules: first match wins per
/// field, existing values are not overwritten within this pass either
/// (callers only extract once per incoming message).
pub fn extract_qualification_data(message: &str, qualification: &mut SalesQualification) {
    let lower = message.to_lowercase();

    if qualification.budget_range.is_none() {
        if let Some(c) = BUDGET_RANGE_PATTERN.captures(&lower) {
            qualification.budget_range = Some(c.get(0).unwrap().as_str().to_string());
        } else if let Some(m) = BUDGET_AMOUNT_PATTERN.find(&lower) {
            if m.as_str().chars().any(|c| c.is_ascii_digit()) {
                qualification.budget_range = Some(m.as_str().trim().to_string());
            }
        }
    }

    if matches!(qualification.timeline, Timeline::Unknown) {
        'outer: for (timeline, keywords) in TIMELINE_KEYWORDS {
            for kw in *keywords {
                if lower.contains(kw) {
                    qualification.timeline = *timeline;
                    break 'outer;
                }
            }
        }
    }

    if qualification.group_size.is_none() {
        if let Some(c) = GROUP_SIZE_PATTERN.captures(&lower) {
            qualification.group_size = c.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
        } else if ["solo", "individual", "yo solo"].iter().any(|kw| lower.contains(kw)) {
            qualification.group_size = Some(1);
        } else if ["pareja", "dos personas", "mi esposa", "mi esposo"]
            .iter()
            .any(|kw| lower.contains(kw))
        {
            qualification.group_size = Some(2);
        } else if ["familia", "mis hijos", "con niños"].iter().any(|kw| lower.contains(kw)) {
            qualification.group_size = Some(4);
        }
    }

    for dest in COMMON_DESTINATIONS {
        if lower.contains(dest) && !qualification.destinations.iter().any(|d| d == dest) {
            qualification.destinations.push(dest.to_string());
        }
    }

    if !qualification.decision_maker && DECISION_MAKER_PATTERN.is_match(&lower) {
        qualification.decision_maker = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_group_size_and_destination() {
        let mut q = SalesQualification::default();
        extract_qualification_data("Somos 4 personas, queremos ir a Cancún", &mut q);
        assert_eq!(q.group_size, Some(4));
        assert_eq!(q.destinations, vec!["cancún".to_string()]);
    }

    #[test]
    fn solo_keyword_implies_group_size_one() {
        let mut q = SalesQualification::default();
        extract_qualification_data("Viajo solo", &mut q);
        assert_eq!(q.group_size, Some(1));
    }

    #[test]
    fn timeline_keyword_maps_to_immediate() {
        let mut q = SalesQualification::default();
        extract_qualification_data("Quiero viajar urgente", &mut q);
        assert_eq!(q.timeline, Timeline::Immediate);
    }

    #[test]
    fn decision_maker_phrase_detected() {
        let mut q = SalesQualification::default();
        extract_qualification_data("Yo decido el destino", &mut q);
        assert!(q.decision_maker);
    }
}
