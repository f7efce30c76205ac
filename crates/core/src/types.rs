use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CampaignError, CampaignResult};

/// Longest follow-up delay accepted in a cadence, in days.
pub const MAX_FOLLOW_UP_DELAY_DAYS: u32 = 365;

// ─── Campaign ───────────────────────────────────────────────────────────────

/// Lifecycle status of a campaign. Campaigns are never hard-deleted; they
/// only move between these states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    #[default]
    Draft,
    Active,
    Paused,
    Completed,
}

impl CampaignStatus {
    /// Soft status transitions permitted for a campaign.
    pub fn can_transition_to(self, to: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, to),
            (Draft, Active) | (Active, Paused) | (Paused, Active) | (Active, Completed) | (Paused, Completed)
        )
    }

    /// Whether prospects of a campaign in this status may be contacted.
    pub fn accepts_contact(self) -> bool {
        matches!(self, CampaignStatus::Draft | CampaignStatus::Active)
    }
}

/// Follow-up cadence: day offsets between successive contact attempts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CadenceConfig {
    #[serde(default = "default_follow_up_delays")]
    pub follow_up_delays: Vec<u32>,
    #[serde(default = "default_follow_up_enabled")]
    pub follow_up_enabled: bool,
}

fn default_follow_up_delays() -> Vec<u32> {
    vec![7, 14, 21]
}
fn default_follow_up_enabled() -> bool {
    true
}

impl Default for CadenceConfig {
    fn default() -> Self {
        Self {
            follow_up_delays: default_follow_up_delays(),
            follow_up_enabled: default_follow_up_enabled(),
        }
    }
}

impl CadenceConfig {
    pub fn new(follow_up_delays: Vec<u32>, follow_up_enabled: bool) -> Self {
        Self {
            follow_up_delays,
            follow_up_enabled,
        }
    }

    /// Every delay must be at least one day so a scheduled follow-up is
    /// always strictly later than the contact that scheduled it.
    pub fn validate(&self) -> CampaignResult<()> {
        for (idx, delay) in self.follow_up_delays.iter().enumerate() {
            if *delay == 0 || *delay > MAX_FOLLOW_UP_DELAY_DAYS {
                return Err(CampaignError::Validation(format!(
                    "follow-up delay #{} must be between 1 and {} days, got {}",
                    idx, MAX_FOLLOW_UP_DELAY_DAYS, delay
                )));
            }
        }
        Ok(())
    }

    /// Delay for the given stage index, or `None` when follow-up is disabled
    /// or the list is too short.
    pub fn delay_for(&self, stage_index: usize) -> Option<Duration> {
        if !self.follow_up_enabled {
            return None;
        }
        self.follow_up_delays
            .get(stage_index)
            .map(|days| Duration::days(i64::from(*days)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateStyle {
    Friendly,
    #[default]
    Professional,
    Collaborative,
    Authoritative,
    Casual,
    Academic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonalizationLevel {
    Basic,
    #[default]
    Medium,
    High,
    AiDeep,
}

/// Template and personalization settings. Only the email composer reads
/// these; the lifecycle engine carries them through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateConfig {
    #[serde(default)]
    pub template_style: TemplateStyle,
    #[serde(default)]
    pub personalization_level: PersonalizationLevel,
    #[serde(default)]
    pub target_keywords: Vec<String>,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub anchor_text: Option<String>,
    #[serde(default)]
    pub from_name: String,
    #[serde(default)]
    pub signature: Option<String>,
}

/// An outreach or content-distribution campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: Uuid,
    pub name: String,
    pub status: CampaignStatus,
    pub cadence: CadenceConfig,
    pub template: TemplateConfig,
    pub stats: StatsBlock,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ─── Stats ──────────────────────────────────────────────────────────────────

/// Names of the monotonic counters held in a [`StatsBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterKey {
    EmailsSent,
    EmailsDelivered,
    EmailsOpened,
    EmailsReplied,
    PositiveResponses,
    NegativeResponses,
    NeutralResponses,
    LinksAcquired,
}

impl CounterKey {
    pub const ALL: [CounterKey; 8] = [
        CounterKey::EmailsSent,
        CounterKey::EmailsDelivered,
        CounterKey::EmailsOpened,
        CounterKey::EmailsReplied,
        CounterKey::PositiveResponses,
        CounterKey::NegativeResponses,
        CounterKey::NeutralResponses,
        CounterKey::LinksAcquired,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CounterKey::EmailsSent => "emails_sent",
            CounterKey::EmailsDelivered => "emails_delivered",
            CounterKey::EmailsOpened => "emails_opened",
            CounterKey::EmailsReplied => "emails_replied",
            CounterKey::PositiveResponses => "positive_responses",
            CounterKey::NegativeResponses => "negative_responses",
            CounterKey::NeutralResponses => "neutral_responses",
            CounterKey::LinksAcquired => "links_acquired",
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CounterKey {
    type Err = CampaignError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CounterKey::ALL
            .iter()
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| CampaignError::Validation(format!("unknown stats counter '{}'", s)))
    }
}

/// Running totals for a campaign plus the two derived percentages.
///
/// The rates are private and recomputed after every mutation and on
/// deserialization, so a stored rate is never taken as ground truth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredStats")]
pub struct StatsBlock {
    pub emails_sent: u64,
    pub emails_delivered: u64,
    pub emails_opened: u64,
    pub emails_replied: u64,
    pub positive_responses: u64,
    pub negative_responses: u64,
    pub neutral_responses: u64,
    pub links_acquired: u64,
    response_rate: f64,
    conversion_rate: f64,
}

/// Wire shape of a stats block; any rates present in the input are ignored.
#[derive(Deserialize)]
struct StoredStats {
    #[serde(default)]
    emails_sent: u64,
    #[serde(default)]
    emails_delivered: u64,
    #[serde(default)]
    emails_opened: u64,
    #[serde(default)]
    emails_replied: u64,
    #[serde(default)]
    positive_responses: u64,
    #[serde(default)]
    negative_responses: u64,
    #[serde(default)]
    neutral_responses: u64,
    #[serde(default)]
    links_acquired: u64,
}

impl From<StoredStats> for StatsBlock {
    fn from(s: StoredStats) -> Self {
        let mut stats = StatsBlock {
            emails_sent: s.emails_sent,
            emails_delivered: s.emails_delivered,
            emails_opened: s.emails_opened,
            emails_replied: s.emails_replied,
            positive_responses: s.positive_responses,
            negative_responses: s.negative_responses,
            neutral_responses: s.neutral_responses,
            links_acquired: s.links_acquired,
            response_rate: 0.0,
            conversion_rate: 0.0,
        };
        stats.recompute();
        stats
    }
}

impl StatsBlock {
    pub fn counter(&self, key: CounterKey) -> u64 {
        match key {
            CounterKey::EmailsSent => self.emails_sent,
            CounterKey::EmailsDelivered => self.emails_delivered,
            CounterKey::EmailsOpened => self.emails_opened,
            CounterKey::EmailsReplied => self.emails_replied,
            CounterKey::PositiveResponses => self.positive_responses,
            CounterKey::NegativeResponses => self.negative_responses,
            CounterKey::NeutralResponses => self.neutral_responses,
            CounterKey::LinksAcquired => self.links_acquired,
        }
    }

    fn counter_mut(&mut self, key: CounterKey) -> &mut u64 {
        match key {
            CounterKey::EmailsSent => &mut self.emails_sent,
            CounterKey::EmailsDelivered => &mut self.emails_delivered,
            CounterKey::EmailsOpened => &mut self.emails_opened,
            CounterKey::EmailsReplied => &mut self.emails_replied,
            CounterKey::PositiveResponses => &mut self.positive_responses,
            CounterKey::NegativeResponses => &mut self.negative_responses,
            CounterKey::NeutralResponses => &mut self.neutral_responses,
            CounterKey::LinksAcquired => &mut self.links_acquired,
        }
    }

    /// Adds `by` to a counter and refreshes the derived rates.
    pub fn increment(&mut self, key: CounterKey, by: u64) {
        let counter = self.counter_mut(key);
        *counter = counter.saturating_add(by);
        self.recompute();
    }

    /// Replies per sent email, as a percentage.
    pub fn response_rate(&self) -> f64 {
        self.response_rate
    }

    /// Acquired links per sent email, as a percentage.
    pub fn conversion_rate(&self) -> f64 {
        self.conversion_rate
    }

    pub fn recompute(&mut self) {
        self.response_rate = percentage(self.emails_replied, self.emails_sent);
        self.conversion_rate = percentage(self.links_acquired, self.emails_sent);
    }
}

/// `numerator / denominator * 100`, defined as 0 for an empty denominator.
pub fn percentage(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

// ─── Prospects ──────────────────────────────────────────────────────────────

/// Contact progress of a prospect, in forward order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    #[default]
    Discovered,
    Researching,
    ReadyToContact,
    InitialSent,
    #[serde(rename = "follow_up_1")]
    FollowUp1,
    #[serde(rename = "follow_up_2")]
    FollowUp2,
    #[serde(rename = "follow_up_3")]
    FollowUp3,
}

impl ContactStatus {
    pub const ALL: [ContactStatus; 7] = [
        ContactStatus::Discovered,
        ContactStatus::Researching,
        ContactStatus::ReadyToContact,
        ContactStatus::InitialSent,
        ContactStatus::FollowUp1,
        ContactStatus::FollowUp2,
        ContactStatus::FollowUp3,
    ];

    /// States that wait for a further scheduled stage.
    pub const AWAITING_NEXT_STAGE: [ContactStatus; 3] = [
        ContactStatus::InitialSent,
        ContactStatus::FollowUp1,
        ContactStatus::FollowUp2,
    ];

    /// Position in the forward order, starting at 0.
    pub fn ordinal(self) -> u8 {
        match self {
            ContactStatus::Discovered => 0,
            ContactStatus::Researching => 1,
            ContactStatus::ReadyToContact => 2,
            ContactStatus::InitialSent => 3,
            ContactStatus::FollowUp1 => 4,
            ContactStatus::FollowUp2 => 5,
            ContactStatus::FollowUp3 => 6,
        }
    }

    pub fn is_awaiting_next_stage(self) -> bool {
        Self::AWAITING_NEXT_STAGE.contains(&self)
    }

    /// Whether at least one contact attempt has been made.
    pub fn is_contacted(self) -> bool {
        self.ordinal() >= ContactStatus::InitialSent.ordinal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContactStatus::Discovered => "discovered",
            ContactStatus::Researching => "researching",
            ContactStatus::ReadyToContact => "ready_to_contact",
            ContactStatus::InitialSent => "initial_sent",
            ContactStatus::FollowUp1 => "follow_up_1",
            ContactStatus::FollowUp2 => "follow_up_2",
            ContactStatus::FollowUp3 => "follow_up_3",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classified reply outcome stored on a prospect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    #[default]
    #[serde(rename = "none")]
    Unanswered,
    Positive,
    Negative,
    Neutral,
}

/// Outcome of classifying one reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Positive,
    Negative,
    Neutral,
}

impl ResponseType {
    /// Counter incremented alongside `emails_replied` for this outcome.
    pub fn counter(self) -> CounterKey {
        match self {
            ResponseType::Positive => CounterKey::PositiveResponses,
            ResponseType::Negative => CounterKey::NegativeResponses,
            ResponseType::Neutral => CounterKey::NeutralResponses,
        }
    }
}

impl From<ResponseType> for ResponseStatus {
    fn from(t: ResponseType) -> Self {
        match t {
            ResponseType::Positive => ResponseStatus::Positive,
            ResponseType::Negative => ResponseStatus::Negative,
            ResponseType::Neutral => ResponseStatus::Neutral,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NextAction {
    SendContentProposal,
    MarkNotInterested,
    WaitForClarification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentAnalysis {
    pub interested: bool,
    pub requires_follow_up: bool,
    pub specific_requirements: Vec<String>,
    pub timeline: String,
}

/// Structured verdict for an inbound reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub response_type: ResponseType,
    pub sentiment_score: f64,
    pub matched_keyword: Option<String>,
    pub intent_analysis: IntentAnalysis,
    pub next_action: NextAction,
}

/// Opaque research output attached to a prospect.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResearchPayload(pub serde_json::Value);

/// Prospect as submitted by a caller, before it is assigned an identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawProspect {
    pub contact_name: String,
    pub contact_email: String,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub contact_title: Option<String>,
}

impl RawProspect {
    pub fn validate(&self) -> CampaignResult<()> {
        if self.contact_name.trim().is_empty() {
            return Err(CampaignError::Validation(
                "prospect contact_name must not be empty".to_string(),
            ));
        }
        let email = self.contact_email.trim();
        let well_formed = email
            .split_once('@')
            .map(|(local, host)| !local.is_empty() && host.contains('.') && !host.starts_with('.'))
            .unwrap_or(false);
        if !well_formed || email.contains(char::is_whitespace) {
            return Err(CampaignError::Validation(format!(
                "prospect contact_email '{}' is not a valid address",
                self.contact_email
            )));
        }
        Ok(())
    }
}

/// A contact being nurtured by an outreach campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub contact_name: String,
    pub contact_email: String,
    pub domain: Option<String>,
    pub company_name: Option<String>,
    pub contact_title: Option<String>,
    pub contact_status: ContactStatus,
    pub response_status: ResponseStatus,
    pub last_contact_at: Option<DateTime<Utc>>,
    pub next_follow_up_at: Option<DateTime<Utc>>,
    pub research: Option<ResearchPayload>,
    pub response_data: Option<ClassificationResult>,
    pub link_acquired: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Prospect {
    /// Builds a freshly discovered prospect from validated caller input.
    pub fn discovered(campaign_id: Uuid, raw: RawProspect, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            contact_name: raw.contact_name.trim().to_string(),
            contact_email: raw.contact_email.trim().to_lowercase(),
            domain: raw.domain,
            company_name: raw.company_name,
            contact_title: raw.contact_title,
            contact_status: ContactStatus::Discovered,
            response_status: ResponseStatus::Unanswered,
            last_contact_at: None,
            next_follow_up_at: None,
            research: None,
            response_data: None,
            link_acquired: false,
            created_at: now,
            updated_at: now,
        }
    }
}

// ─── Messages ───────────────────────────────────────────────────────────────

/// One discrete contact attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Initial,
    #[serde(rename = "follow_up_1")]
    FollowUp1,
    #[serde(rename = "follow_up_2")]
    FollowUp2,
    #[serde(rename = "follow_up_3")]
    FollowUp3,
}

impl MessageKind {
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Initial,
        MessageKind::FollowUp1,
        MessageKind::FollowUp2,
        MessageKind::FollowUp3,
    ];

    /// Status a prospect must hold before this stage may be sent.
    pub fn predecessor(self) -> ContactStatus {
        match self {
            MessageKind::Initial => ContactStatus::ReadyToContact,
            MessageKind::FollowUp1 => ContactStatus::InitialSent,
            MessageKind::FollowUp2 => ContactStatus::FollowUp1,
            MessageKind::FollowUp3 => ContactStatus::FollowUp2,
        }
    }

    /// Status a prospect holds once this stage has been sent.
    pub fn resulting_status(self) -> ContactStatus {
        match self {
            MessageKind::Initial => ContactStatus::InitialSent,
            MessageKind::FollowUp1 => ContactStatus::FollowUp1,
            MessageKind::FollowUp2 => ContactStatus::FollowUp2,
            MessageKind::FollowUp3 => ContactStatus::FollowUp3,
        }
    }

    /// Index into the cadence list for the wait that follows this stage.
    /// The final stage has no further wait.
    pub fn cadence_index(self) -> Option<usize> {
        match self {
            MessageKind::Initial => Some(0),
            MessageKind::FollowUp1 => Some(1),
            MessageKind::FollowUp2 => Some(2),
            MessageKind::FollowUp3 => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Initial => "initial",
            MessageKind::FollowUp1 => "follow_up_1",
            MessageKind::FollowUp2 => "follow_up_2",
            MessageKind::FollowUp3 => "follow_up_3",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    #[default]
    Queued,
    Sent,
    Delivered,
}

/// Provider-reported delivery progress for a sent message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryEvent {
    Delivered,
    Opened,
}

impl DeliveryEvent {
    pub fn counter(self) -> CounterKey {
        match self {
            DeliveryEvent::Delivered => CounterKey::EmailsDelivered,
            DeliveryEvent::Opened => CounterKey::EmailsOpened,
        }
    }
}

/// Durable evidence that a stage was dispatched. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: Uuid,
    pub prospect_id: Uuid,
    pub campaign_id: Uuid,
    pub kind: MessageKind,
    pub subject: String,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub delivery_status: DeliveryStatus,
    pub provider_ref: String,
}

// ─── Content distribution ───────────────────────────────────────────────────

/// An external publishing destination taking part in rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub id: String,
    pub name: String,
    pub priority: u32,
    #[serde(default = "default_destination_enabled")]
    pub enabled: bool,
}

fn default_destination_enabled() -> bool {
    true
}

impl Destination {
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
            enabled: true,
        }
    }
}

/// A successful publish, keyed by canonical destination id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRecord {
    pub id: Uuid,
    pub campaign_id: Uuid,
    pub destination_id: String,
    pub title: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
}
