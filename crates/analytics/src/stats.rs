use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::types::{CounterKey, StatsBlock};

/// Sparse set of non-negative counter increments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatsDelta {
    increments: BTreeMap<CounterKey, u64>,
}

impl StatsDelta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(key: CounterKey, by: u64) -> Self {
        Self::new().with(key, by)
    }

    /// Adds `by` to the increment for `key`.
    pub fn with(mut self, key: CounterKey, by: u64) -> Self {
        let entry = self.increments.entry(key).or_insert(0);
        *entry = entry.saturating_add(by);
        self
    }

    /// Validates an untyped counter map, as received over the wire.
    ///
    /// Unknown counter names and negative increments are rejected outright;
    /// nothing is partially applied.
    pub fn from_raw(raw: &HashMap<String, i64>) -> CampaignResult<Self> {
        let mut delta = Self::new();
        for (name, value) in raw {
            let key: CounterKey = name.parse()?;
            let by = u64::try_from(*value).map_err(|_| {
                CampaignError::Validation(format!(
                    "stats counter '{}' cannot decrease (got {})",
                    name, value
                ))
            })?;
            delta = delta.with(key, by);
        }
        Ok(delta)
    }

    pub fn get(&self, key: CounterKey) -> u64 {
        self.increments.get(&key).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.increments.values().all(|v| *v == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (CounterKey, u64)> + '_ {
        self.increments.iter().map(|(k, v)| (*k, *v))
    }

    /// Combined delta equivalent to applying `self` then `other`.
    pub fn merge(&self, other: &StatsDelta) -> StatsDelta {
        other
            .iter()
            .fold(self.clone(), |acc, (key, by)| acc.with(key, by))
    }
}

/// Pure application of a delta: counters are added, then both rates are
/// recomputed from the updated totals.
pub fn apply_delta(stats: &StatsBlock, delta: &StatsDelta) -> StatsBlock {
    let mut next = stats.clone();
    for (key, by) in delta.iter() {
        next.increment(key, by);
    }
    next.recompute();
    next
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_rate_after_delta() {
        let delta = StatsDelta::new()
            .with(CounterKey::EmailsSent, 5)
            .with(CounterKey::EmailsReplied, 2);
        let stats = apply_delta(&StatsBlock::default(), &delta);
        assert_eq!(stats.emails_sent, 5);
        assert_eq!(stats.emails_replied, 2);
        assert_eq!(stats.response_rate(), 40.0);
        assert_eq!(stats.conversion_rate(), 0.0);
    }

    #[test]
    fn test_rates_use_updated_sent_total() {
        let start = apply_delta(
            &StatsBlock::default(),
            &StatsDelta::new()
                .with(CounterKey::EmailsSent, 1)
                .with(CounterKey::EmailsReplied, 1),
        );
        assert_eq!(start.response_rate(), 100.0);

        let next = apply_delta(&start, &StatsDelta::single(CounterKey::EmailsSent, 3));
        assert_eq!(next.response_rate(), 25.0);
    }

    #[test]
    fn test_sequential_equals_merged() {
        let a = StatsDelta::new()
            .with(CounterKey::EmailsSent, 4)
            .with(CounterKey::LinksAcquired, 1);
        let b = StatsDelta::new()
            .with(CounterKey::EmailsSent, 2)
            .with(CounterKey::EmailsReplied, 3)
            .with(CounterKey::PositiveResponses, 2);

        let base = apply_delta(&StatsBlock::default(), &StatsDelta::single(CounterKey::EmailsSent, 2));
        let sequential = apply_delta(&apply_delta(&base, &a), &b);
        let merged = apply_delta(&base, &a.merge(&b));
        let reversed = apply_delta(&apply_delta(&base, &b), &a);

        assert_eq!(sequential, merged);
        assert_eq!(sequential, reversed);
        assert_eq!(sequential.emails_sent, 8);
        assert_eq!(sequential.conversion_rate(), 12.5);
    }

    #[test]
    fn test_counters_never_decrease() {
        let base = apply_delta(&StatsBlock::default(), &StatsDelta::single(CounterKey::EmailsOpened, 7));
        let next = apply_delta(&base, &StatsDelta::new());
        for key in CounterKey::ALL {
            assert!(next.counter(key) >= base.counter(key));
        }
    }

    #[test]
    fn test_from_raw_validation() {
        let mut raw = HashMap::new();
        raw.insert("emails_sent".to_string(), 2);
        raw.insert("emails_opened".to_string(), 1);
        let delta = StatsDelta::from_raw(&raw).unwrap();
        assert_eq!(delta.get(CounterKey::EmailsSent), 2);
        assert_eq!(delta.get(CounterKey::EmailsOpened), 1);
        assert_eq!(delta.get(CounterKey::LinksAcquired), 0);

        let mut unknown = HashMap::new();
        unknown.insert("emails_bounced".to_string(), 1);
        assert!(matches!(
            StatsDelta::from_raw(&unknown),
            Err(CampaignError::Validation(_))
        ));

        let mut negative = HashMap::new();
        negative.insert("emails_sent".to_string(), -1);
        assert!(matches!(
            StatsDelta::from_raw(&negative),
            Err(CampaignError::Validation(_))
        ));
    }

    #[test]
    fn test_empty_delta() {
        assert!(StatsDelta::new().is_empty());
        assert!(StatsDelta::single(CounterKey::EmailsSent, 0).is_empty());
        assert!(!StatsDelta::single(CounterKey::EmailsSent, 1).is_empty());
    }
}
