//! Outbound collaborator seams: message dispatch, content generation,
//! destination publishing and prospect research.
//!
//! The engine only sees these traits. Concrete providers live in
//! `autopilot-channels`; tests supply scripted doubles.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CampaignResult;
use crate::types::{DeliveryStatus, Prospect, ResearchPayload};

/// Provider acknowledgement for a dispatched message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub provider_ref: String,
    pub status: DeliveryStatus,
}

/// Sends one message to one recipient.
///
/// Failures are reported as `CampaignError::TransientDispatch`.
#[async_trait]
pub trait MessageDispatcher: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> CampaignResult<DispatchReceipt>;
}

/// Topic triple a piece of distributed content is written around.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBrief {
    pub keyword: String,
    pub anchor_text: String,
    pub target_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub title: String,
    pub content: String,
    /// Which prompt variant produced the text (1-based).
    pub prompt_variant: u8,
}

#[async_trait]
pub trait ContentGenerator: Send + Sync {
    async fn generate(&self, brief: &ContentBrief) -> CampaignResult<GeneratedContent>;
}

/// Publishes content to an external destination and returns its public URL.
#[async_trait]
pub trait DestinationPublisher: Send + Sync {
    async fn publish(&self, title: &str, content: &str, destination_id: &str) -> CampaignResult<String>;
}

/// Gathers background on a prospect before first contact.
#[async_trait]
pub trait ProspectResearcher: Send + Sync {
    async fn research(&self, prospect: &Prospect) -> CampaignResult<ResearchPayload>;
}
