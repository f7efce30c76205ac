use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use autopilot_analytics::{CampaignPerformance, StatsAggregator, StatsDelta};
use autopilot_channels::dispatch::SendGridSettings;
use autopilot_channels::{
    EmailComposer, HeuristicResearcher, RotationSelector, SendGridDispatcher, SimulatedPublisher,
    TemplateContentGenerator,
};
use autopilot_core::channels::{
    ContentGenerator, DestinationPublisher, MessageDispatcher, ProspectResearcher,
};
use autopilot_core::config::AppConfig;
use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::event_bus::{make_event, noop_sink, EventSink, EventType};
use autopilot_core::store::{ProspectFilter, RecordStore};
use autopilot_core::types::{
    CadenceConfig, Campaign, CampaignStatus, ClassificationResult, CounterKey, DeliveryEvent,
    MessageRecord, Prospect, RawProspect, StatsBlock, TemplateConfig,
};
use autopilot_lifecycle::{FollowUpScheduler, ProspectStateMachine, ResponseClassifier};

use crate::research::ResearchQueue;

/// Outbound collaborators the engine drives.
#[derive(Clone)]
pub struct Collaborators {
    pub dispatcher: Arc<dyn MessageDispatcher>,
    pub publisher: Arc<dyn DestinationPublisher>,
    pub content: Arc<dyn ContentGenerator>,
    pub researcher: Arc<dyn ProspectResearcher>,
}

impl Collaborators {
    /// The built-in providers: SendGrid dispatch, template content, the
    /// default-catalog publisher and heuristic research.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            dispatcher: Arc::new(SendGridDispatcher::new(SendGridSettings::new(
                config.dispatch.from_email.clone(),
                "Outreach Team",
            ))),
            publisher: Arc::new(SimulatedPublisher::default()),
            content: Arc::new(TemplateContentGenerator::new()),
            researcher: Arc::new(HeuristicResearcher::new()),
        }
    }
}

/// Runtime knobs distilled from [`AppConfig`].
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub max_concurrent_prospects: usize,
    pub claim_lease: chrono::Duration,
    pub dispatch_timeout: Duration,
    /// Total dispatch attempts per stage within one call, 1 or 2.
    pub dispatch_attempts: u32,
    pub publish_timeout: Duration,
    pub research_timeout: Duration,
    pub default_cadence: CadenceConfig,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent_prospects: config.scheduler.max_concurrent_prospects.max(1),
            claim_lease: chrono::Duration::seconds(config.scheduler.claim_lease_secs.max(1) as i64),
            dispatch_timeout: Duration::from_millis(config.dispatch.timeout_ms),
            dispatch_attempts: config.dispatch.max_attempts.clamp(1, 2),
            publish_timeout: Duration::from_millis(config.publish.timeout_ms),
            research_timeout: Duration::from_millis(config.publish.timeout_ms),
            default_cadence: CadenceConfig::new(
                config.outreach.default_follow_up_delays.clone(),
                config.outreach.default_follow_up_enabled,
            ),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Input for a new campaign. A missing cadence takes the configured default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    #[serde(default)]
    pub cadence: Option<CadenceConfig>,
    #[serde(default)]
    pub template: TemplateConfig,
}

/// Orchestrates campaigns and prospects over the record store and the
/// outbound collaborators. Cheap to clone; all state lives behind `Arc`s.
#[derive(Clone)]
pub struct CampaignEngine {
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) collaborators: Collaborators,
    pub(crate) state_machine: Arc<ProspectStateMachine>,
    pub(crate) scheduler: FollowUpScheduler,
    pub(crate) classifier: Arc<ResponseClassifier>,
    pub(crate) aggregator: StatsAggregator,
    pub(crate) rotation: RotationSelector,
    pub(crate) composer: Arc<EmailComposer>,
    pub(crate) settings: EngineSettings,
    pub(crate) research_queue: Option<ResearchQueue>,
    pub(crate) event_sink: Arc<dyn EventSink>,
}

impl std::fmt::Debug for CampaignEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CampaignEngine")
            .field("settings", &self.settings)
            .field("research_queue", &self.research_queue.is_some())
            .finish()
    }
}

impl CampaignEngine {
    pub fn new(config: &AppConfig, store: Arc<dyn RecordStore>, collaborators: Collaborators) -> Self {
        Self {
            scheduler: FollowUpScheduler::new(store.clone()),
            aggregator: StatsAggregator::new(store.clone()),
            rotation: RotationSelector::new(store.clone(), config.distribution.destinations.clone()),
            classifier: Arc::new(ResponseClassifier::new(&config.classifier)),
            state_machine: Arc::new(ProspectStateMachine::new()),
            composer: Arc::new(EmailComposer::new()),
            settings: EngineSettings::from_config(config),
            research_queue: None,
            event_sink: noop_sink(),
            store,
            collaborators,
        }
    }

    /// Attach an event sink for lifecycle events.
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Enqueue research for every prospect added from now on.
    pub fn with_research_queue(mut self, queue: ResearchQueue) -> Self {
        self.research_queue = Some(queue);
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub async fn create_campaign(&self, req: CreateCampaign) -> CampaignResult<Campaign> {
        let name = req.name.trim();
        if name.is_empty() {
            return Err(CampaignError::Validation("campaign name must not be empty".to_string()));
        }
        let cadence = req.cadence.unwrap_or_else(|| self.settings.default_cadence.clone());
        cadence.validate()?;

        let now = Utc::now();
        let campaign = Campaign {
            id: Uuid::new_v4(),
            name: name.to_string(),
            status: CampaignStatus::Draft,
            cadence,
            template: req.template,
            stats: StatsBlock::default(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_campaign(campaign.clone()).await?;

        info!(campaign_id = %campaign.id, name = %campaign.name, "Campaign created");
        self.event_sink
            .emit(make_event(EventType::CampaignCreated, Some(campaign.id), None));
        Ok(campaign)
    }

    pub async fn get_campaign(&self, id: Uuid) -> CampaignResult<Campaign> {
        self.store
            .get_campaign(id)
            .await?
            .ok_or_else(|| CampaignError::not_found("campaign", id))
    }

    /// Move a campaign to `status`. The transition check runs inside the
    /// store's atomic update, so concurrent edits cannot revert each other.
    pub async fn update_campaign_status(&self, id: Uuid, status: CampaignStatus) -> CampaignResult<Campaign> {
        let previous = OnceLock::new();
        let now = Utc::now();
        let change = |c: &mut Campaign| -> CampaignResult<()> {
            if c.status == status {
                return Ok(());
            }
            if !c.status.can_transition_to(status) {
                return Err(CampaignError::StateConflict(format!(
                    "campaign {} cannot move from {:?} to {:?}",
                    id, c.status, status
                )));
            }
            let _ = previous.set(c.status);
            c.status = status;
            c.updated_at = now;
            Ok(())
        };
        let updated = self.store.modify_campaign(id, &change).await?;

        if let Some(from) = previous.get() {
            info!(campaign_id = %id, from = ?from, to = ?status, "Campaign status changed");
            self.event_sink.emit(
                make_event(EventType::CampaignStatusChanged, Some(id), None)
                    .with_detail(format!("{:?}", status)),
            );
        }
        Ok(updated)
    }

    /// Replace the follow-up cadence. Due times already scheduled keep their
    /// value; the new cadence applies from the next contact on. Status is
    /// left as stored.
    pub async fn update_cadence(&self, id: Uuid, cadence: CadenceConfig) -> CampaignResult<Campaign> {
        cadence.validate()?;
        let now = Utc::now();
        let replace = |c: &mut Campaign| -> CampaignResult<()> {
            c.cadence = cadence.clone();
            c.updated_at = now;
            Ok(())
        };
        let updated = self.store.modify_campaign(id, &replace).await?;
        info!(
            campaign_id = %id,
            delays = ?updated.cadence.follow_up_delays,
            enabled = updated.cadence.follow_up_enabled,
            "Campaign cadence updated"
        );
        Ok(updated)
    }

    // ─── Prospects ─────────────────────────────────────────────────────────

    /// Validate and store a batch of prospects. An invalid entry rejects the
    /// whole batch before anything is written.
    pub async fn add_prospects(&self, campaign_id: Uuid, raw: Vec<RawProspect>) -> CampaignResult<Vec<Prospect>> {
        let campaign = self.get_campaign(campaign_id).await?;
        if campaign.status == CampaignStatus::Completed {
            return Err(CampaignError::StateConflict(format!(
                "campaign {} is completed",
                campaign_id
            )));
        }
        for (idx, entry) in raw.iter().enumerate() {
            entry.validate().map_err(|e| match e {
                CampaignError::Validation(msg) => {
                    CampaignError::Validation(format!("prospect #{}: {}", idx, msg))
                }
                other => other,
            })?;
        }

        let now = Utc::now();
        let prospects: Vec<Prospect> = raw
            .into_iter()
            .map(|r| Prospect::discovered(campaign_id, r, now))
            .collect();
        self.store.insert_prospects(prospects.clone()).await?;

        info!(campaign_id = %campaign_id, count = prospects.len(), "Prospects added");
        self.event_sink.emit(
            make_event(EventType::ProspectsAdded, Some(campaign_id), None)
                .with_detail(prospects.len().to_string()),
        );

        if let Some(queue) = &self.research_queue {
            for prospect in &prospects {
                queue.enqueue(prospect.id);
            }
        }
        Ok(prospects)
    }

    pub async fn get_prospect(&self, id: Uuid) -> CampaignResult<Prospect> {
        self.store
            .get_prospect(id)
            .await?
            .ok_or_else(|| CampaignError::not_found("prospect", id))
    }

    pub async fn list_prospects(&self, campaign_id: Uuid) -> CampaignResult<Vec<Prospect>> {
        self.get_campaign(campaign_id).await?;
        self.store
            .scan_prospects(&ProspectFilter::for_campaign(campaign_id))
            .await
    }

    pub async fn list_messages(&self, campaign_id: Uuid) -> CampaignResult<Vec<MessageRecord>> {
        self.get_campaign(campaign_id).await?;
        self.store.list_messages(campaign_id).await
    }

    // ─── Replies & stats ───────────────────────────────────────────────────

    /// Classify an inbound reply, store it on the prospect and count it.
    pub async fn record_inbound_response(&self, prospect_id: Uuid, text: &str) -> CampaignResult<ClassificationResult> {
        if text.trim().is_empty() {
            return Err(CampaignError::Validation("reply text must not be empty".to_string()));
        }
        let classification = self.classifier.classify(text);
        let now = Utc::now();

        let mutation = |p: &mut Prospect| -> CampaignResult<()> {
            self.state_machine
                .record_response(p, classification.response_type.into(), now);
            p.response_data = Some(classification.clone());
            Ok(())
        };
        let prospect = self.store.modify_prospect(prospect_id, &mutation).await?;

        let delta = StatsDelta::new()
            .with(CounterKey::EmailsReplied, 1)
            .with(classification.response_type.counter(), 1);
        self.aggregator.apply(prospect.campaign_id, &delta).await?;

        metrics::counter!(
            "classifier.responses",
            "type" => format!("{:?}", classification.response_type).to_lowercase()
        )
        .increment(1);
        info!(
            prospect_id = %prospect_id,
            campaign_id = %prospect.campaign_id,
            response_type = ?classification.response_type,
            sentiment = classification.sentiment_score,
            "Reply classified"
        );
        self.event_sink.emit(
            make_event(EventType::ResponseClassified, Some(prospect.campaign_id), Some(prospect_id))
                .with_detail(format!("{:?}", classification.response_type)),
        );
        Ok(classification)
    }

    /// Apply externally reported counter increments, e.g. from a provider
    /// webhook batch.
    pub async fn apply_stats_delta(&self, campaign_id: Uuid, delta: &StatsDelta) -> CampaignResult<StatsBlock> {
        self.aggregator.apply(campaign_id, delta).await
    }

    pub async fn record_delivery_event(&self, campaign_id: Uuid, event: DeliveryEvent) -> CampaignResult<StatsBlock> {
        self.aggregator
            .apply(campaign_id, &StatsDelta::single(event.counter(), 1))
            .await
    }

    /// Flag a prospect as having placed the backlink. Each prospect counts
    /// once; a repeat is a state conflict.
    pub async fn record_link_acquired(&self, prospect_id: Uuid) -> CampaignResult<Prospect> {
        let now = Utc::now();
        let mutation = |p: &mut Prospect| -> CampaignResult<()> {
            if p.link_acquired {
                return Err(CampaignError::StateConflict(format!(
                    "link for prospect {} already recorded",
                    p.id
                )));
            }
            p.link_acquired = true;
            p.updated_at = now;
            Ok(())
        };
        let prospect = self.store.modify_prospect(prospect_id, &mutation).await?;
        self.aggregator
            .apply(prospect.campaign_id, &StatsDelta::single(CounterKey::LinksAcquired, 1))
            .await?;

        info!(prospect_id = %prospect_id, campaign_id = %prospect.campaign_id, "Link acquired");
        self.event_sink.emit(make_event(
            EventType::LinkAcquired,
            Some(prospect.campaign_id),
            Some(prospect_id),
        ));
        Ok(prospect)
    }

    pub async fn campaign_performance(&self, campaign_id: Uuid) -> CampaignResult<CampaignPerformance> {
        let prospects = self.list_prospects(campaign_id).await?;
        let messages = self.store.list_messages(campaign_id).await?;
        Ok(CampaignPerformance::compute(&prospects, &messages))
    }

    /// Move a Draft campaign to Active on its first contact.
    pub(crate) async fn activate_if_draft(&self, campaign: &Campaign) {
        if campaign.status != CampaignStatus::Draft {
            return;
        }
        if let Err(e) = self.update_campaign_status(campaign.id, CampaignStatus::Active).await {
            warn!(campaign_id = %campaign.id, error = %e, "Could not activate campaign");
        }
    }
}
