//! In-memory record store backed by DashMap.
//!
//! Production: replace with PostgreSQL (sqlx) or similar ACID store. The
//! atomic primitives map onto row-level `UPDATE ... WHERE` statements.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::store::{
    CampaignMutation, ProspectFilter, ProspectGuard, ProspectMutation, RecordStore, StatsMutation,
};
use autopilot_core::types::{Campaign, MessageRecord, Prospect, PublishRecord, StatsBlock};

/// Thread-safe store for campaigns, prospects, message records and publish
/// records. Campaign and prospect updates hold the DashMap shard lock for
/// the whole read-modify-write.
pub struct InMemoryStore {
    campaigns: DashMap<Uuid, Campaign>,
    prospects: DashMap<Uuid, Prospect>,
    messages: RwLock<Vec<MessageRecord>>,
    publish_records: RwLock<Vec<PublishRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        info!("Record store initialized (in-memory, development mode)");
        Self {
            campaigns: DashMap::new(),
            prospects: DashMap::new(),
            messages: RwLock::new(Vec::new()),
            publish_records: RwLock::new(Vec::new()),
        }
    }

    pub fn campaign_count(&self) -> usize {
        self.campaigns.len()
    }

    pub fn prospect_count(&self) -> usize {
        self.prospects.len()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    // ─── Campaigns ─────────────────────────────────────────────────────────

    async fn insert_campaign(&self, campaign: Campaign) -> CampaignResult<()> {
        match self.campaigns.entry(campaign.id) {
            Entry::Occupied(_) => Err(CampaignError::Store(format!(
                "campaign {} already exists",
                campaign.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(campaign);
                Ok(())
            }
        }
    }

    async fn get_campaign(&self, id: Uuid) -> CampaignResult<Option<Campaign>> {
        Ok(self.campaigns.get(&id).map(|r| r.value().clone()))
    }

    async fn modify_campaign(&self, id: Uuid, mutation: CampaignMutation<'_>) -> CampaignResult<Campaign> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| CampaignError::not_found("campaign", id))?;
        let mut draft = entry.value().clone();
        mutation(&mut draft)?;
        draft.id = id;
        draft.stats = entry.value().stats.clone();
        *entry.value_mut() = draft.clone();
        Ok(draft)
    }

    async fn modify_campaign_stats(&self, id: Uuid, mutation: StatsMutation<'_>) -> CampaignResult<StatsBlock> {
        let mut entry = self
            .campaigns
            .get_mut(&id)
            .ok_or_else(|| CampaignError::not_found("campaign", id))?;
        let next = mutation(&entry.value().stats)?;
        entry.value_mut().stats = next.clone();
        Ok(next)
    }

    // ─── Prospects ─────────────────────────────────────────────────────────

    async fn insert_prospects(&self, prospects: Vec<Prospect>) -> CampaignResult<()> {
        if let Some(dup) = prospects.iter().find(|p| self.prospects.contains_key(&p.id)) {
            return Err(CampaignError::Store(format!("prospect {} already exists", dup.id)));
        }
        let count = prospects.len();
        for prospect in prospects {
            self.prospects.insert(prospect.id, prospect);
        }
        debug!(count = count, "Prospects stored");
        Ok(())
    }

    async fn get_prospect(&self, id: Uuid) -> CampaignResult<Option<Prospect>> {
        Ok(self.prospects.get(&id).map(|r| r.value().clone()))
    }

    async fn modify_prospect(&self, id: Uuid, mutation: ProspectMutation<'_>) -> CampaignResult<Prospect> {
        let mut entry = self
            .prospects
            .get_mut(&id)
            .ok_or_else(|| CampaignError::not_found("prospect", id))?;
        let mut draft = entry.value().clone();
        mutation(&mut draft)?;
        *entry.value_mut() = draft.clone();
        Ok(draft)
    }

    async fn compare_and_update_prospect(
        &self,
        id: Uuid,
        expected: &ProspectGuard,
        mutation: ProspectMutation<'_>,
    ) -> CampaignResult<Option<Prospect>> {
        let mut entry = self
            .prospects
            .get_mut(&id)
            .ok_or_else(|| CampaignError::not_found("prospect", id))?;
        if !expected.matches(entry.value()) {
            return Ok(None);
        }
        let mut draft = entry.value().clone();
        mutation(&mut draft)?;
        *entry.value_mut() = draft.clone();
        Ok(Some(draft))
    }

    async fn scan_prospects(&self, filter: &ProspectFilter) -> CampaignResult<Vec<Prospect>> {
        let mut prospects: Vec<Prospect> = self
            .prospects
            .iter()
            .filter(|r| filter.matches(r.value()))
            .map(|r| r.value().clone())
            .collect();
        prospects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(prospects)
    }

    // ─── Message records ───────────────────────────────────────────────────

    async fn insert_message(&self, message: MessageRecord) -> CampaignResult<()> {
        let mut messages = self.messages.write();
        if messages
            .iter()
            .any(|m| m.prospect_id == message.prospect_id && m.kind == message.kind)
        {
            return Err(CampaignError::StateConflict(format!(
                "{} already recorded for prospect {}",
                message.kind, message.prospect_id
            )));
        }
        messages.push(message);
        Ok(())
    }

    async fn list_messages(&self, campaign_id: Uuid) -> CampaignResult<Vec<MessageRecord>> {
        Ok(self
            .messages
            .read()
            .iter()
            .filter(|m| m.campaign_id == campaign_id)
            .cloned()
            .collect())
    }

    async fn messages_for_prospect(&self, prospect_id: Uuid) -> CampaignResult<Vec<MessageRecord>> {
        Ok(self
            .messages
            .read()
            .iter()
            .filter(|m| m.prospect_id == prospect_id)
            .cloned()
            .collect())
    }

    // ─── Publish records ───────────────────────────────────────────────────

    async fn insert_publish_record(&self, record: PublishRecord) -> CampaignResult<()> {
        self.publish_records.write().push(record);
        Ok(())
    }

    async fn list_publish_records(&self, campaign_id: Uuid) -> CampaignResult<Vec<PublishRecord>> {
        Ok(self
            .publish_records
            .read()
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}
