//! Campaign orchestration: campaign and prospect operations, the follow-up
//! cycle, reply handling, content distribution and background research.

pub mod distribution;
pub mod engine;
mod followup;
pub mod report;
pub mod research;

pub use distribution::PublishOutcome;
pub use engine::{CampaignEngine, Collaborators, CreateCampaign, EngineSettings};
pub use report::{CycleReport, FollowUpOutcome, FollowUpResult};
pub use research::{spawn_research_workers, BackoffPolicy, ResearchJob, ResearchQueue};
