//! Prospect lifecycle: the contact state machine, follow-up scheduling and
//! reply classification for outreach campaigns.

pub mod classifier;
pub mod scheduler;
pub mod state_machine;

pub use classifier::ResponseClassifier;
pub use scheduler::{next_stage, DueProspect, DueScan, FollowUpScheduler};
pub use state_machine::{ProspectStateMachine, SentMessage, StateTransition, TransitionTrigger};
