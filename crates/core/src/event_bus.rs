//! Lifecycle event bus: trait for emitting campaign events from any module.
//!
//! Components accept an `Arc<dyn EventSink>` and report what happened to
//! campaigns and prospects (contacts sent, replies classified, content
//! published). Sinks decide where the events go.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use parking_lot::Mutex;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    CampaignCreated,
    CampaignStatusChanged,
    ProspectsAdded,
    ResearchStarted,
    ResearchCompleted,
    ResearchFailed,
    ContactSent,
    ContactFailed,
    ResponseClassified,
    LinkAcquired,
    DestinationSelected,
    ContentPublished,
    PublishFailed,
}

/// A single lifecycle event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignEvent {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub campaign_id: Option<Uuid>,
    pub prospect_id: Option<Uuid>,
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl CampaignEvent {
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Trait for emitting lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CampaignEvent);
}

/// No-op sink for modules that don't need event emission.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn emit(&self, _event: CampaignEvent) {}
}

/// Sink that keeps every event in memory, in emission order.
#[derive(Default)]
pub struct CaptureSink {
    events: Mutex<Vec<CampaignEvent>>,
}

impl CaptureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CampaignEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }

    pub fn count_type(&self, event_type: EventType) -> usize {
        self.events.lock().iter().filter(|e| e.event_type == event_type).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for CaptureSink {
    fn emit(&self, event: CampaignEvent) {
        self.events.lock().push(event);
    }
}

/// Convenience builder for creating a `CampaignEvent`.
pub fn make_event(
    event_type: EventType,
    campaign_id: Option<Uuid>,
    prospect_id: Option<Uuid>,
) -> CampaignEvent {
    CampaignEvent {
        event_id: Uuid::new_v4(),
        event_type,
        campaign_id,
        prospect_id,
        detail: None,
        timestamp: Utc::now(),
    }
}

pub fn noop_sink() -> Arc<dyn EventSink> {
    Arc::new(NoOpSink)
}

pub fn capture_sink() -> Arc<CaptureSink> {
    Arc::new(CaptureSink::new())
}
