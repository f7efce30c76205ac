use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use autopilot_core::types::{
    percentage, ContactStatus, MessageKind, MessageRecord, Prospect, ResponseStatus,
};

/// Prospect-level performance of one campaign. Unlike the running
/// [`StatsBlock`](autopilot_core::types::StatsBlock) rates these are
/// computed over contacted prospects rather than sent emails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignPerformance {
    pub total_prospects: u64,
    pub contacted_prospects: u64,
    pub responded_prospects: u64,
    pub positive_responses: u64,
    pub links_acquired: u64,
    pub response_rate: f64,
    pub positive_response_rate: f64,
    pub conversion_rate: f64,
    pub total_emails_sent: u64,
    pub prospects_by_status: BTreeMap<ContactStatus, u64>,
    pub emails_by_kind: BTreeMap<String, u64>,
}

impl CampaignPerformance {
    pub fn compute(prospects: &[Prospect], messages: &[MessageRecord]) -> Self {
        let contacted: Vec<&Prospect> = prospects
            .iter()
            .filter(|p| p.contact_status.is_contacted())
            .collect();
        let contacted_prospects = contacted.len() as u64;
        let responded_prospects = contacted
            .iter()
            .filter(|p| p.response_status != ResponseStatus::Unanswered)
            .count() as u64;
        let positive_responses = contacted
            .iter()
            .filter(|p| p.response_status == ResponseStatus::Positive)
            .count() as u64;
        let links_acquired = contacted.iter().filter(|p| p.link_acquired).count() as u64;

        let mut prospects_by_status = BTreeMap::new();
        for p in prospects {
            *prospects_by_status.entry(p.contact_status).or_insert(0) += 1;
        }

        let mut emails_by_kind: BTreeMap<String, u64> = MessageKind::ALL
            .iter()
            .map(|k| (k.as_str().to_string(), 0))
            .collect();
        for m in messages {
            *emails_by_kind.entry(m.kind.as_str().to_string()).or_insert(0) += 1;
        }

        Self {
            total_prospects: prospects.len() as u64,
            contacted_prospects,
            responded_prospects,
            positive_responses,
            links_acquired,
            response_rate: percentage(responded_prospects, contacted_prospects),
            positive_response_rate: percentage(positive_responses, contacted_prospects),
            conversion_rate: percentage(links_acquired, contacted_prospects),
            total_emails_sent: messages.len() as u64,
            prospects_by_status,
            emails_by_kind,
        }
    }
}
