#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use uuid::Uuid;

use autopilot_channels::{SimulatedPublisher, TemplateContentGenerator};
use autopilot_core::channels::{
    DestinationPublisher, DispatchReceipt, MessageDispatcher, ProspectResearcher,
};
use autopilot_core::config::AppConfig;
use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::event_bus::CaptureSink;
use autopilot_core::store::{
    CampaignMutation, ProspectFilter, ProspectGuard, ProspectMutation, RecordStore, StatsMutation,
};
use autopilot_core::types::{
    CadenceConfig, Campaign, DeliveryStatus, MessageKind, MessageRecord, Prospect, PublishRecord,
    RawProspect, ResearchPayload, StatsBlock,
};
use autopilot_engine::{CampaignEngine, Collaborators, CreateCampaign};
use autopilot_store::InMemoryStore;

// ─── Doubles ────────────────────────────────────────────────────────────────

/// Dispatcher that accepts everything except recipients marked as failing.
#[derive(Default)]
pub struct ScriptedDispatcher {
    failing: Mutex<HashSet<String>>,
    transient: Mutex<HashMap<String, u32>>,
    attempts: Mutex<HashMap<String, u32>>,
    delivered: Mutex<Vec<(String, String)>>,
    delay: Mutex<Option<Duration>>,
}

impl ScriptedDispatcher {
    pub fn fail_for(&self, email: &str) {
        self.failing.lock().insert(email.to_string());
    }

    /// Fail the next `times` calls for `email`, then accept again.
    pub fn fail_next(&self, email: &str, times: u32) {
        self.transient.lock().insert(email.to_string(), times);
    }

    pub fn recover(&self, email: &str) {
        self.failing.lock().remove(email);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Calls made for `email`, failed ones included.
    pub fn attempts_for(&self, email: &str) -> u32 {
        self.attempts.lock().get(email).copied().unwrap_or(0)
    }

    pub fn delivered_to(&self, email: &str) -> usize {
        self.delivered.lock().iter().filter(|(to, _)| to == email).count()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().len()
    }
}

#[async_trait]
impl MessageDispatcher for ScriptedDispatcher {
    async fn send(&self, to: &str, subject: &str, _body: &str) -> CampaignResult<DispatchReceipt> {
        *self.attempts.lock().entry(to.to_string()).or_insert(0) += 1;
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(left) = self.transient.lock().get_mut(to).filter(|left| **left > 0) {
            *left -= 1;
            return Err(CampaignError::TransientDispatch(format!("mailbox {} busy", to)));
        }
        if self.failing.lock().contains(to) {
            return Err(CampaignError::TransientDispatch(format!("mailbox {} unavailable", to)));
        }
        self.delivered.lock().push((to.to_string(), subject.to_string()));
        Ok(DispatchReceipt {
            provider_ref: format!("test-{}", Uuid::new_v4()),
            status: DeliveryStatus::Sent,
        })
    }
}

/// Researcher that fails a fixed number of times before succeeding.
#[derive(Default)]
pub struct FlakyResearcher {
    failures_left: AtomicU32,
    calls: AtomicU32,
}

impl FlakyResearcher {
    pub fn failing(times: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(times),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProspectResearcher for FlakyResearcher {
    async fn research(&self, prospect: &Prospect) -> CampaignResult<ResearchPayload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures_left.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_left.store(remaining - 1, Ordering::SeqCst);
            return Err(CampaignError::TransientDispatch("research provider busy".into()));
        }
        Ok(ResearchPayload(serde_json::json!({
            "website_analysis": {"recent_posts": [format!("Notes from {}", prospect.contact_name)]}
        })))
    }
}

/// Publisher that rejects a configured set of destinations.
#[derive(Default)]
pub struct FailingPublisher {
    rejected: HashSet<String>,
    inner: SimulatedPublisher,
}

impl FailingPublisher {
    pub fn rejecting(destinations: &[&str]) -> Self {
        Self {
            rejected: destinations.iter().map(|d| d.to_string()).collect(),
            inner: SimulatedPublisher::default(),
        }
    }
}

#[async_trait]
impl DestinationPublisher for FailingPublisher {
    async fn publish(&self, title: &str, content: &str, destination_id: &str) -> CampaignResult<String> {
        if self.rejected.contains(destination_id) {
            return Err(CampaignError::TransientDispatch(format!("{} returned 503", destination_id)));
        }
        self.inner.publish(title, content, destination_id).await
    }
}

/// In-memory store whose plain campaign reads are slow, widening any window
/// between a read and a later write.
pub struct SlowReadStore {
    pub inner: InMemoryStore,
    pub read_delay: Duration,
}

#[async_trait]
impl RecordStore for SlowReadStore {
    async fn insert_campaign(&self, campaign: Campaign) -> CampaignResult<()> {
        self.inner.insert_campaign(campaign).await
    }

    async fn get_campaign(&self, id: Uuid) -> CampaignResult<Option<Campaign>> {
        let campaign = self.inner.get_campaign(id).await;
        tokio::time::sleep(self.read_delay).await;
        campaign
    }

    async fn modify_campaign(&self, id: Uuid, mutation: CampaignMutation<'_>) -> CampaignResult<Campaign> {
        self.inner.modify_campaign(id, mutation).await
    }

    async fn modify_campaign_stats(&self, id: Uuid, mutation: StatsMutation<'_>) -> CampaignResult<StatsBlock> {
        self.inner.modify_campaign_stats(id, mutation).await
    }

    async fn insert_prospects(&self, prospects: Vec<Prospect>) -> CampaignResult<()> {
        self.inner.insert_prospects(prospects).await
    }

    async fn get_prospect(&self, id: Uuid) -> CampaignResult<Option<Prospect>> {
        self.inner.get_prospect(id).await
    }

    async fn modify_prospect(&self, id: Uuid, mutation: ProspectMutation<'_>) -> CampaignResult<Prospect> {
        self.inner.modify_prospect(id, mutation).await
    }

    async fn compare_and_update_prospect(
        &self,
        id: Uuid,
        expected: &ProspectGuard,
        mutation: ProspectMutation<'_>,
    ) -> CampaignResult<Option<Prospect>> {
        self.inner.compare_and_update_prospect(id, expected, mutation).await
    }

    async fn scan_prospects(&self, filter: &ProspectFilter) -> CampaignResult<Vec<Prospect>> {
        self.inner.scan_prospects(filter).await
    }

    async fn insert_message(&self, message: MessageRecord) -> CampaignResult<()> {
        self.inner.insert_message(message).await
    }

    async fn list_messages(&self, campaign_id: Uuid) -> CampaignResult<Vec<MessageRecord>> {
        self.inner.list_messages(campaign_id).await
    }

    async fn messages_for_prospect(&self, prospect_id: Uuid) -> CampaignResult<Vec<MessageRecord>> {
        self.inner.messages_for_prospect(prospect_id).await
    }

    async fn insert_publish_record(&self, record: PublishRecord) -> CampaignResult<()> {
        self.inner.insert_publish_record(record).await
    }

    async fn list_publish_records(&self, campaign_id: Uuid) -> CampaignResult<Vec<PublishRecord>> {
        self.inner.list_publish_records(campaign_id).await
    }
}

// ─── Harness ────────────────────────────────────────────────────────────────

pub struct Harness {
    pub engine: CampaignEngine,
    pub store: Arc<InMemoryStore>,
    pub dispatcher: Arc<ScriptedDispatcher>,
    pub researcher: Arc<FlakyResearcher>,
    pub sink: Arc<CaptureSink>,
}

pub fn harness() -> Harness {
    harness_with(AppConfig::default(), FailingPublisher::default())
}

pub fn harness_with(config: AppConfig, publisher: FailingPublisher) -> Harness {
    let store = Arc::new(InMemoryStore::new());
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let researcher = Arc::new(FlakyResearcher::default());
    let sink = Arc::new(CaptureSink::new());
    let collaborators = Collaborators {
        dispatcher: dispatcher.clone(),
        publisher: Arc::new(publisher),
        content: Arc::new(TemplateContentGenerator::with_variant(1)),
        researcher: researcher.clone(),
    };
    let engine = CampaignEngine::new(&config, store.clone(), collaborators).with_event_sink(sink.clone());
    Harness {
        engine,
        store,
        dispatcher,
        researcher,
        sink,
    }
}

pub async fn campaign(engine: &CampaignEngine, delays: Vec<u32>) -> Campaign {
    engine
        .create_campaign(CreateCampaign {
            name: "Link outreach".into(),
            cadence: Some(CadenceConfig::new(delays, true)),
            ..Default::default()
        })
        .await
        .expect("create campaign")
}

pub fn raw(email: &str) -> RawProspect {
    let local = email.split('@').next().unwrap_or("contact");
    RawProspect {
        contact_name: format!("{} Example", local),
        contact_email: email.to_string(),
        domain: email.split('@').nth(1).map(str::to_string),
        ..Default::default()
    }
}

/// A prospect that received its initial contact at `sent_at`.
pub async fn contacted(engine: &CampaignEngine, campaign_id: Uuid, email: &str, sent_at: DateTime<Utc>) -> Prospect {
    let prospect = engine
        .add_prospects(campaign_id, vec![raw(email)])
        .await
        .expect("add prospect")
        .remove(0);
    engine.research_prospect(prospect.id).await.expect("research");
    engine
        .send_contact(prospect.id, MessageKind::Initial, None, sent_at)
        .await
        .expect("initial contact");
    engine.get_prospect(prospect.id).await.expect("reload")
}
