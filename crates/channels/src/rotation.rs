//! Least-used-first rotation across publishing destinations.
//!
//! Usage counts are never cached: they are recomputed from the campaign's
//! publish records on every selection, so a failed publish (which writes no
//! record) can never skew the rotation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::store::RecordStore;
use autopilot_core::types::{Destination, PublishRecord};

const ALIASES: &[(&str, &str)] = &[
    ("telegraph.ph", "telegraph"),
    ("telegra.ph", "telegraph"),
    ("write.as", "writeas"),
    ("medium.com", "medium"),
    ("dev.to", "devto"),
    ("linkedin.com", "linkedin"),
    ("hashnode.com", "hashnode"),
    ("hashnode.dev", "hashnode"),
    ("substack.com", "substack"),
];

/// Canonical form of a destination id: trimmed, lower-cased, without scheme
/// or `www.` prefix, with legacy domain spellings folded to their short id.
pub fn normalize_destination_id(raw: &str) -> String {
    let mut id = raw.trim().to_lowercase();
    for prefix in ["https://", "http://", "www."] {
        if let Some(rest) = id.strip_prefix(prefix) {
            id = rest.to_string();
        }
    }
    let id = id.trim_end_matches('/');
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == id)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| id.to_string())
}

/// Publish count per canonical destination id.
pub fn usage_counts(records: &[PublishRecord]) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for record in records {
        *counts
            .entry(normalize_destination_id(&record.destination_id))
            .or_insert(0) += 1;
    }
    counts
}

/// Pick the enabled destination with the lowest usage count. Ties go to the
/// lowest priority value, then to declaration order.
pub fn select(destinations: &[Destination], usage: &HashMap<String, u64>) -> CampaignResult<String> {
    select_excluding(destinations, usage, &HashSet::new())
}

/// As [`select`], skipping destinations already tried in this cycle.
pub fn select_excluding(
    destinations: &[Destination],
    usage: &HashMap<String, u64>,
    excluded: &HashSet<String>,
) -> CampaignResult<String> {
    destinations
        .iter()
        .enumerate()
        .filter(|(_, d)| d.enabled)
        .map(|(idx, d)| (idx, d, normalize_destination_id(&d.id)))
        .filter(|(_, _, id)| !excluded.contains(id))
        .min_by_key(|(idx, d, id)| (usage.get(id).copied().unwrap_or(0), d.priority, *idx))
        .map(|(_, _, id)| id)
        .ok_or_else(|| {
            CampaignError::Configuration(if excluded.is_empty() {
                "no enabled publishing destination".to_string()
            } else {
                "every enabled publishing destination failed this cycle".to_string()
            })
        })
}

/// Progress of one publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    Selected,
    Publishing,
    Published,
    Failed,
}

/// One destination's attempt within a publish cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishAttempt {
    pub destination_id: String,
    pub state: PublishState,
    pub url: Option<String>,
    pub error: Option<String>,
}

impl PublishAttempt {
    pub fn selected(destination_id: String) -> Self {
        Self {
            destination_id,
            state: PublishState::Selected,
            url: None,
            error: None,
        }
    }

    fn advance(&mut self, from: PublishState, to: PublishState) -> CampaignResult<()> {
        if self.state != from {
            return Err(CampaignError::StateConflict(format!(
                "publish attempt for {} is {:?}, expected {:?}",
                self.destination_id, self.state, from
            )));
        }
        self.state = to;
        Ok(())
    }

    pub fn start(&mut self) -> CampaignResult<()> {
        self.advance(PublishState::Selected, PublishState::Publishing)
    }

    pub fn succeed(&mut self, url: String) -> CampaignResult<()> {
        self.advance(PublishState::Publishing, PublishState::Published)?;
        self.url = Some(url);
        Ok(())
    }

    pub fn fail(&mut self, error: impl ToString) -> CampaignResult<()> {
        self.advance(PublishState::Publishing, PublishState::Failed)?;
        self.error = Some(error.to_string());
        Ok(())
    }
}

/// Rotation over a fixed destination catalog, with usage read from the
/// record store.
#[derive(Clone)]
pub struct RotationSelector {
    store: Arc<dyn RecordStore>,
    destinations: Arc<Vec<Destination>>,
}

impl RotationSelector {
    pub fn new(store: Arc<dyn RecordStore>, destinations: Vec<Destination>) -> Self {
        Self {
            store,
            destinations: Arc::new(destinations),
        }
    }

    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    pub async fn usage(&self, campaign_id: Uuid) -> CampaignResult<HashMap<String, u64>> {
        let records = self.store.list_publish_records(campaign_id).await?;
        Ok(usage_counts(&records))
    }

    pub async fn select(&self, campaign_id: Uuid) -> CampaignResult<String> {
        self.select_excluding(campaign_id, &HashSet::new()).await
    }

    pub async fn select_excluding(
        &self,
        campaign_id: Uuid,
        excluded: &HashSet<String>,
    ) -> CampaignResult<String> {
        let usage = self.usage(campaign_id).await?;
        let chosen = select_excluding(&self.destinations, &usage, excluded)?;
        debug!(
            campaign_id = %campaign_id,
            destination = %chosen,
            uses = usage.get(&chosen).copied().unwrap_or(0),
            "Publishing destination selected"
        );
        metrics::counter!("rotation.selected", "destination" => chosen.clone()).increment(1);
        Ok(chosen)
    }
}
