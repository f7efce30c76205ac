//! Outbound channels for outreach campaigns.
//!
//! Dispatch: sends composed emails through the SendGrid provider.
//! Distribution: generates content and rotates it across publishing destinations.

pub mod content;
pub mod dispatch;
pub mod publisher;
pub mod research;
pub mod rotation;
pub mod templates;

pub use content::TemplateContentGenerator;
pub use dispatch::SendGridDispatcher;
pub use publisher::SimulatedPublisher;
pub use research::HeuristicResearcher;
pub use rotation::{normalize_destination_id, usage_counts, PublishAttempt, PublishState, RotationSelector};
pub use templates::{ComposedEmail, EmailComposer};
