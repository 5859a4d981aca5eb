use std::collections::VecDeque;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chat transport a message or connector belongs to. Closed tagged union —
/// new transports require a new variant and exhaustive handling everywhere
/// this is matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Whatsapp,
    Telegram,
    Facebook,
    Instagram,
    Webchat,
    Sms,
    Email,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Whatsapp => "whatsapp",
            Channel::Telegram => "telegram",
            Channel::Facebook => "facebook",
            Channel::Instagram => "instagram",
            Channel::Webchat => "webchat",
            Channel::Sms => "sms",
            Channel::Email => "email",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `(channel, channel_conversation_id)` — the only thing that identifies a
/// session. Unique within a channel by construction of the connector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub channel: Channel,
    pub channel_conversation_id: String,
}

impl SessionKey {
    pub fn new(channel: Channel, channel_conversation_id: impl Into<String>) -> Self {
        Self {
            channel,
            channel_conversation_id: channel_conversation_id.into(),
        }
    }

    pub fn format(&self) -> String {
        format!("{}:{}", self.channel, self.channel_conversation_id)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    Video,
    Audio,
    Voice,
    Document,
    Location,
    Contact,
    Sticker,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub remote_id: String,
    pub metadata: serde_json::Value,
}

impl Attachment {
    /// Placeholder text so the Router can always operate on a non-empty
    /// string, per the connector design rules.
    pub fn placeholder_text(&self) -> String {
        match self.kind {
            AttachmentKind::Image => "[image]".to_string(),
            AttachmentKind::Video => "[video]".to_string(),
            AttachmentKind::Audio => "[audio]".to_string(),
            AttachmentKind::Voice => "[voice]".to_string(),
            AttachmentKind::Document => "[document]".to_string(),
            AttachmentKind::Sticker => "[sticker]".to_string(),
            AttachmentKind::Contact => "[contact]".to_string(),
            AttachmentKind::Location => {
                if let (Some(lat), Some(lon)) = (
                    self.metadata.get("lat").and_then(|v| v.as_f64()),
                    self.metadata.get("lon").and_then(|v| v.as_f64()),
                ) {
                    format!("[location: {lat},{lon}]")
                } else {
                    "[location]".to_string()
                }
            }
        }
    }
}

/// Immutable inbound message normalized from any transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub message_id: String,
    pub channel: Channel,
    pub user_id: String,
    pub username: Option<String>,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    pub attachments: Vec<Attachment>,
    pub channel_user_id: String,
    pub channel_conversation_id: String,
    pub raw: serde_json::Value,
}

impl NormalizedMessage {
    pub fn session_key(&self) -> SessionKey {
        SessionKey::new(self.channel, self.channel_conversation_id.clone())
    }

    /// The text the Router operates on: the message text itself, or the
    /// attachment placeholder(s) joined together when text is empty.
    pub fn routable_text(&self) -> String {
        if !self.text.trim().is_empty() {
            return self.text.clone();
        }
        self.attachments
            .iter()
            .map(Attachment::placeholder_text)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    CustomerService,
    GroupsQuotes,
    GeneralInfo,
    Sales,
    TechnicalSupport,
    VipService,
    #[default]
    Unknown,
}

impl Department {
    pub fn as_str(&self) -> &'static str {
        match self {
            Department::CustomerService => "customer_service",
            Department::GroupsQuotes => "groups_quotes",
            Department::GeneralInfo => "general_info",
            Department::Sales => "sales",
            Department::TechnicalSupport => "technical_support",
            Department::VipService => "vip_service",
            Department::Unknown => "unknown",
        }
    }

    pub fn all() -> [Department; 6] {
        [
            Department::CustomerService,
            Department::GroupsQuotes,
            Department::GeneralInfo,
            Department::Sales,
            Department::TechnicalSupport,
            Department::VipService,
        ]
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Booking,
    Quote,
    Info,
    Complaint,
    Modification,
    Cancellation,
    Question,
    Browsing,
    #[default]
    Unknown,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Booking => "booking",
            Intent::Quote => "quote",
            Intent::Info => "info",
            Intent::Complaint => "complaint",
            Intent::Modification => "modification",
            Intent::Cancellation => "cancellation",
            Intent::Question => "question",
            Intent::Browsing => "browsing",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CustomerType {
    #[default]
    New,
    Returning,
    Vip,
    Group,
    Potential,
    TimeWaster,
}

impl CustomerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerType::New => "new",
            CustomerType::Returning => "returning",
            CustomerType::Vip => "vip",
            CustomerType::Group => "group",
            CustomerType::Potential => "potential",
            CustomerType::TimeWaster => "time_waster",
        }
    }
}

impl fmt::Display for CustomerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// `ai_only` and `hybrid` are reserved by the source spec; this implementation
/// treats `ai_only` as `ai_first` without the human-escalation branch and
/// `hybrid` as equivalent to `ai_first` for routing purposes (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMode {
    #[default]
    AiFirst,
    HumanDirect,
    AiOnly,
    Hybrid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Ai,
    Human,
    #[default]
    None,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContactInfo {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub language: Option<String>,
    pub verified: bool,
    pub collected_at: Option<DateTime<Utc>>,
}

impl ContactInfo {
    pub fn has_email_or_phone(&self) -> bool {
        self.email.is_some() || self.phone.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageSender {
    User,
    Ai,
    Human,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: MessageSender,
    pub text: String,
    pub intent: Intent,
    pub sentiment: Option<String>,
    pub at: DateTime<Utc>,
}

/// Default cap on `ConversationContext::history` — a ring buffer, oldest
/// entries are discarded once the bound is reached.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Mutable per-session state. Owned exclusively by the Gateway; every other
/// component only ever sees it through a lock held by the Gateway for the
/// duration of one message's processing (see §5 of the specification).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub session_key: SessionKey,
    pub user_id: String,
    pub display_name: Option<String>,
    pub department: Department,
    pub intent: Intent,
    pub customer_type: CustomerType,
    pub routing_mode: RoutingMode,
    pub current_agent_kind: AgentKind,
    pub current_agent_id: Option<String>,
    pub contact_info: ContactInfo,
    pub message_count: u64,
    pub question_count: u64,
    pub purchase_signals: u64,
    pub ai_attempts: u32,
    pub time_waster_score: f64,
    pub priority: u8,
    pub escalated: bool,
    pub escalation_reason: Option<String>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    pub history: VecDeque<HistoryEntry>,
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

impl ConversationContext {
    pub fn new(session_key: SessionKey, user_id: impl Into<String>, routing_mode: RoutingMode) -> Self {
        let now = Utc::now();
        Self {
            session_key,
            user_id: user_id.into(),
            display_name: None,
            department: Department::default(),
            intent: Intent::default(),
            customer_type: CustomerType::default(),
            routing_mode,
            current_agent_kind: AgentKind::default(),
            current_agent_id: None,
            contact_info: ContactInfo::default(),
            message_count: 0,
            question_count: 0,
            purchase_signals: 0,
            ai_attempts: 0,
            time_waster_score: 0.0,
            priority: 3,
            escalated: false,
            escalation_reason: None,
            resolved: false,
            created_at: now,
            last_activity_at: now,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            history: VecDeque::new(),
        }
    }

    pub fn push_history(&mut self, entry: HistoryEntry) {
        if self.history.len() >= self.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    pub fn is_idle(&self, now: DateTime<Utc>, idle_ttl: chrono::Duration) -> bool {
        now - self.last_activity_at >= idle_ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Timeline {
    Immediate,
    #[serde(rename = "1-2w")]
    OneToTwoWeeks,
    #[serde(rename = "1-3m")]
    OneToThreeMonths,
    #[serde(rename = ">3m")]
    MoreThanThreeMonths,
    #[default]
    Unknown,
}

impl Timeline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeline::Immediate => "immediate",
            Timeline::OneToTwoWeeks => "1-2w",
            Timeline::OneToThreeMonths => "1-3m",
            Timeline::MoreThanThreeMonths => ">3m",
            Timeline::Unknown => "unknown",
        }
    }
}

/// Per-session derived lead-fitness record.
/// Invariant: `is_qualified <=> qualification_score >= 6.0` (P3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SalesQualification {
    pub budget_range: Option<String>,
    pub timeline: Timeline,
    pub decision_maker: bool,
    pub group_size: Option<u32>,
    pub destinations: Vec<String>,
    pub specific_needs: Vec<String>,
    pub qualification_score: f64,
    pub ready_to_buy: bool,
    pub is_qualified: bool,
}

impl SalesQualification {
    /// Recomputes `qualification_score` from the currently-known fields and
    /// sets `is_qualified` to match, preserving the P3 invariant.
    pub fn recompute_score(&mut self) {
        let mut score = 0.0;
        if self.budget_range.is_some() {
            score += 2.5;
        }
        if !matches!(self.timeline, Timeline::Unknown) {
            score += 2.0;
            if matches!(self.timeline, Timeline::Immediate) {
                score += 1.0;
            }
        }
        if self.group_size.is_some() {
            score += 1.5;
        }
        if !self.destinations.is_empty() {
            score += 1.5;
        }
        if self.decision_maker {
            score += 1.5;
        }
        self.qualification_score = score.min(10.0);
        self.is_qualified = self.qualification_score >= 6.0;
    }

    /// The original implementation's "high value" check: a loose substring
    /// match on the free-text budget field. Retained verbatim per §9 — a
    /// known weak classifier, not strengthened here.
    pub fn is_high_value(&self) -> bool {
        let group_high = self.group_size.map(|n| n > 5).unwrap_or(false);
        let budget_high = self
            .budget_range
            .as_deref()
            .map(|b| {
                let lower = b.to_lowercase();
                ["mil", "k", ",000"].iter().any(|kw| lower.contains(kw))
            })
            .unwrap_or(false);
        group_high || budget_high
    }
}

/// Pure result value produced by the Router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingAction {
    RouteToAi,
    RouteToHuman,
    EscalateToHuman,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub action: RoutingAction,
    pub department: Department,
    pub priority: u8,
    pub allow_escalation: bool,
    pub reason: String,
    pub estimated_wait_s: Option<f64>,
    pub suggested_quick_replies: Vec<String>,
    pub suggested_agent_kind: Option<AgentKind>,
    /// Hint surfaced when routing to AI with missing contact info, e.g.
    /// `collect_contact` — advisory only, the Router never blocks on it.
    pub hint: Option<String>,
}

impl RoutingDecision {
    pub fn to_ai(department: Department, allow_escalation: bool, reason: impl Into<String>) -> Self {
        Self {
            action: RoutingAction::RouteToAi,
            department,
            priority: 3,
            allow_escalation,
            reason: reason.into(),
            estimated_wait_s: None,
            suggested_quick_replies: Vec::new(),
            suggested_agent_kind: Some(AgentKind::Ai),
            hint: None,
        }
    }

    pub fn to_human(department: Department, priority: u8, reason: impl Into<String>) -> Self {
        Self {
            action: RoutingAction::RouteToHuman,
            department,
            priority,
            allow_escalation: false,
            reason: reason.into(),
            estimated_wait_s: None,
            suggested_quick_replies: Vec::new(),
            suggested_agent_kind: Some(AgentKind::Human),
            hint: None,
        }
    }

    pub fn escalate(department: Department, priority: u8, reason: impl Into<String>) -> Self {
        Self {
            action: RoutingAction::EscalateToHuman,
            department,
            priority,
            allow_escalation: false,
            reason: reason.into(),
            estimated_wait_s: None,
            suggested_quick_replies: Vec::new(),
            suggested_agent_kind: Some(AgentKind::Human),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Mints a fresh, time-sortable conversation id — used where the Gateway
/// needs an id independent of any transport-native identifier.
pub fn new_conversation_id() -> String {
    Uuid::now_v7().to_string()
}

/// Human agent availability, as reported by the agent (or their operator
/// tooling) via the REST API — never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Offline,
    Available,
    Busy,
    Away,
}

/// A human agent registered with the Queue. `current_conversation_ids` is
/// capped at `max_concurrent` by the Queue's assignment logic, never here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanAgent {
    pub agent_id: String,
    pub name: String,
    pub email: Option<String>,
    pub departments: Vec<Department>,
    pub status: AgentStatus,
    pub current_conversation_ids: Vec<String>,
    pub max_concurrent: u32,
    pub skills: Vec<String>,
    pub performance_rating: f64,
    pub total_conversations: u64,
    pub successful_closures: u64,
    pub average_response_time_s: f64,
    pub last_activity_at: DateTime<Utc>,
}

impl HumanAgent {
    pub fn new(agent_id: impl Into<String>, name: impl Into<String>, departments: Vec<Department>) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            email: None,
            departments,
            status: AgentStatus::Offline,
            current_conversation_ids: Vec::new(),
            max_concurrent: 3,
            skills: Vec::new(),
            performance_rating: 5.0,
            total_conversations: 0,
            successful_closures: 0,
            average_response_time_s: 0.0,
            last_activity_at: Utc::now(),
        }
    }

    pub fn has_capacity(&self) -> bool {
        (self.current_conversation_ids.len() as u32) < self.max_concurrent
    }

    pub fn serves(&self, department: Department) -> bool {
        self.departments.contains(&department)
    }
}

/// Coarse affect signal attached to a queued conversation for the receiving
/// agent's benefit. Derived once at enqueue time from the context snapshot,
/// per §4.4 — never re-derived afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomerMood {
    Expectant,
    Enthusiastic,
    Curious,
    Frustrated,
    Undecided,
    Angry,
    Neutral,
}

/// A conversation waiting for a human agent. Ordered by `(priority, queued_at)`
/// ascending — lower priority number and earlier arrival go first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedConversation {
    pub conversation_id: String,
    pub session_key: SessionKey,
    pub department: Department,
    pub priority: u8,
    pub queued_at: DateTime<Utc>,
    pub estimated_wait_s: f64,
    pub assigned_agent_id: Option<String>,
    pub ai_summary: Option<String>,
    pub customer_mood: CustomerMood,
}
