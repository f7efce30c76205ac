//! Campaign statistics: sparse counter deltas, their atomic application to
//! stored campaigns and prospect-level performance figures.

pub mod aggregator;
pub mod performance;
pub mod stats;

pub use aggregator::StatsAggregator;
pub use performance::CampaignPerformance;
pub use stats::{apply_delta, StatsDelta};
