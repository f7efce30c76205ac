//! Record store seam: persistence for campaigns, prospects, message records
//! and publish records.
//!
//! Every change to a campaign, its stats or a prospect goes through one of
//! the atomic primitives below (`modify_*` or `compare_and_update_prospect`)
//! so overlapping cycles and concurrent edits cannot lose updates.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::CampaignResult;
use crate::types::{Campaign, ContactStatus, MessageRecord, Prospect, PublishRecord, StatsBlock};

/// Filtered scan over prospects. Empty `statuses` matches every status.
#[derive(Debug, Clone, Default)]
pub struct ProspectFilter {
    pub campaign_id: Option<Uuid>,
    pub statuses: Vec<ContactStatus>,
    /// Only prospects with `next_follow_up_at <= due_before`.
    pub due_before: Option<DateTime<Utc>>,
}

impl ProspectFilter {
    pub fn for_campaign(campaign_id: Uuid) -> Self {
        Self {
            campaign_id: Some(campaign_id),
            ..Default::default()
        }
    }

    /// Prospects waiting on a follow-up whose due time has passed.
    pub fn due_follow_ups(now: DateTime<Utc>) -> Self {
        Self {
            campaign_id: None,
            statuses: ContactStatus::AWAITING_NEXT_STAGE.to_vec(),
            due_before: Some(now),
        }
    }

    pub fn matches(&self, prospect: &Prospect) -> bool {
        if let Some(campaign_id) = self.campaign_id {
            if prospect.campaign_id != campaign_id {
                return false;
            }
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&prospect.contact_status) {
            return false;
        }
        if let Some(due_before) = self.due_before {
            match prospect.next_follow_up_at {
                Some(due) if due <= due_before => {}
                _ => return false,
            }
        }
        true
    }
}

/// The fields a conditional prospect update must still observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProspectGuard {
    pub contact_status: ContactStatus,
    pub next_follow_up_at: Option<DateTime<Utc>>,
}

impl ProspectGuard {
    pub fn of(prospect: &Prospect) -> Self {
        Self {
            contact_status: prospect.contact_status,
            next_follow_up_at: prospect.next_follow_up_at,
        }
    }

    pub fn matches(&self, prospect: &Prospect) -> bool {
        prospect.contact_status == self.contact_status
            && prospect.next_follow_up_at == self.next_follow_up_at
    }
}

pub type CampaignMutation<'a> = &'a (dyn Fn(&mut Campaign) -> CampaignResult<()> + Send + Sync);
pub type StatsMutation<'a> = &'a (dyn Fn(&StatsBlock) -> CampaignResult<StatsBlock> + Send + Sync);
pub type ProspectMutation<'a> = &'a (dyn Fn(&mut Prospect) -> CampaignResult<()> + Send + Sync);

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert_campaign(&self, campaign: Campaign) -> CampaignResult<()>;

    async fn get_campaign(&self, id: Uuid) -> CampaignResult<Option<Campaign>>;

    /// Atomic read-modify-write of a campaign's configuration and status. A
    /// mutation error leaves the record untouched. Stats keep their stored
    /// value; they only change through `modify_campaign_stats`.
    async fn modify_campaign(&self, id: Uuid, mutation: CampaignMutation<'_>) -> CampaignResult<Campaign>;

    /// Atomic read-modify-write of one campaign's stats block.
    async fn modify_campaign_stats(&self, id: Uuid, mutation: StatsMutation<'_>) -> CampaignResult<StatsBlock>;

    async fn insert_prospects(&self, prospects: Vec<Prospect>) -> CampaignResult<()>;

    async fn get_prospect(&self, id: Uuid) -> CampaignResult<Option<Prospect>>;

    /// Atomic read-modify-write of one prospect. A mutation error leaves the
    /// stored record untouched.
    async fn modify_prospect(&self, id: Uuid, mutation: ProspectMutation<'_>) -> CampaignResult<Prospect>;

    /// Apply `mutation` only if the stored record still matches `expected`.
    /// Returns `None` (and writes nothing) when the guard no longer holds.
    /// Fields the mutation leaves alone keep their stored values.
    async fn compare_and_update_prospect(
        &self,
        id: Uuid,
        expected: &ProspectGuard,
        mutation: ProspectMutation<'_>,
    ) -> CampaignResult<Option<Prospect>>;

    async fn scan_prospects(&self, filter: &ProspectFilter) -> CampaignResult<Vec<Prospect>>;

    async fn insert_message(&self, message: MessageRecord) -> CampaignResult<()>;

    async fn list_messages(&self, campaign_id: Uuid) -> CampaignResult<Vec<MessageRecord>>;

    async fn messages_for_prospect(&self, prospect_id: Uuid) -> CampaignResult<Vec<MessageRecord>>;

    async fn insert_publish_record(&self, record: PublishRecord) -> CampaignResult<()>;

    async fn list_publish_records(&self, campaign_id: Uuid) -> CampaignResult<Vec<PublishRecord>>;
}
