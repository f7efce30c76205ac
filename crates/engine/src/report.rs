use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use autopilot_core::error::{CampaignError, ErrorKind};
use autopilot_core::types::MessageKind;

/// What happened to one due prospect during a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FollowUpOutcome {
    Sent {
        message_id: Uuid,
        next_follow_up_at: Option<DateTime<Utc>>,
    },
    /// Another cycle claimed or advanced the prospect first.
    Skipped { reason: String },
    Failed { error_kind: ErrorKind, error: String },
}

impl FollowUpOutcome {
    pub fn failed(err: &CampaignError) -> Self {
        FollowUpOutcome::Failed {
            error_kind: err.kind(),
            error: err.to_string(),
        }
    }

    pub fn is_sent(&self) -> bool {
        matches!(self, FollowUpOutcome::Sent { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FollowUpResult {
    pub prospect_id: Uuid,
    /// `None` when the prospect could not be resolved to a stage.
    pub stage: Option<MessageKind>,
    pub outcome: FollowUpOutcome,
}

/// Summary of one `process_due_follow_ups` call. `processed` counts
/// prospects that were actually contacted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub processed: usize,
    pub total_due: usize,
    pub results: Vec<FollowUpResult>,
}

impl CycleReport {
    pub fn from_results(total_due: usize, mut results: Vec<FollowUpResult>) -> Self {
        results.sort_by_key(|r| r.prospect_id);
        Self {
            processed: results.iter().filter(|r| r.outcome.is_sent()).count(),
            total_due,
            results,
        }
    }

    pub fn result_for(&self, prospect_id: Uuid) -> Option<&FollowUpResult> {
        self.results.iter().find(|r| r.prospect_id == prospect_id)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FollowUpResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, FollowUpOutcome::Failed { .. }))
    }
}
