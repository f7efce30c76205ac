use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::store::RecordStore;
use autopilot_core::types::StatsBlock;

use crate::stats::{apply_delta, StatsDelta};

/// Applies counter deltas to stored campaigns through the store's atomic
/// read-modify-write, so concurrent updates to one campaign never lose an
/// increment.
#[derive(Clone)]
pub struct StatsAggregator {
    store: Arc<dyn RecordStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn apply(&self, campaign_id: Uuid, delta: &StatsDelta) -> CampaignResult<StatsBlock> {
        if delta.is_empty() {
            return self
                .store
                .get_campaign(campaign_id)
                .await?
                .map(|c| c.stats)
                .ok_or_else(|| CampaignError::not_found("campaign", campaign_id));
        }

        let mutation = |current: &StatsBlock| -> CampaignResult<StatsBlock> {
            Ok(apply_delta(current, delta))
        };
        let stats = self.store.modify_campaign_stats(campaign_id, &mutation).await?;

        for (key, by) in delta.iter() {
            metrics::counter!("stats.deltas_applied", "counter" => key.as_str()).increment(by);
        }
        debug!(
            campaign_id = %campaign_id,
            emails_sent = stats.emails_sent,
            response_rate = stats.response_rate(),
            "Campaign stats updated"
        );
        Ok(stats)
    }
}
