use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::store::{ProspectFilter, RecordStore};
use autopilot_core::types::{
    CadenceConfig, Campaign, ContactStatus, MessageKind, Prospect, ResponseStatus,
};

/// Follow-up stage a prospect in `status` would receive next. Only the
/// awaiting states have a scheduled successor; the initial contact is sent
/// explicitly.
pub fn next_stage(status: ContactStatus) -> Option<MessageKind> {
    match status {
        ContactStatus::InitialSent => Some(MessageKind::FollowUp1),
        ContactStatus::FollowUp1 => Some(MessageKind::FollowUp2),
        ContactStatus::FollowUp2 => Some(MessageKind::FollowUp3),
        _ => None,
    }
}

/// Wait that follows a successful `sent` stage.
pub fn follow_up_delay(cadence: &CadenceConfig, sent: MessageKind) -> Option<Duration> {
    sent.cadence_index().and_then(|idx| cadence.delay_for(idx))
}

pub fn next_follow_up_at(
    cadence: &CadenceConfig,
    sent: MessageKind,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    follow_up_delay(cadence, sent).map(|delay| now + delay)
}

/// Whether `prospect` qualifies for its next follow-up at `now`.
pub fn is_due(prospect: &Prospect, campaign: &Campaign, now: DateTime<Utc>) -> bool {
    let elapsed = matches!(prospect.next_follow_up_at, Some(due) if due <= now);
    elapsed
        && prospect.contact_status.is_awaiting_next_stage()
        && prospect.response_status != ResponseStatus::Negative
        && campaign.cadence.follow_up_enabled
        && campaign.status.accepts_contact()
}

/// A prospect selected for its next stage, with the campaign it was judged
/// against.
#[derive(Debug, Clone)]
pub struct DueProspect {
    pub prospect: Prospect,
    pub campaign: Arc<Campaign>,
    pub stage: MessageKind,
}

/// Result of one scan. `unresolved` holds prospects that matched the store
/// filter but whose campaign could not be resolved.
#[derive(Debug, Default)]
pub struct DueScan {
    pub due: Vec<DueProspect>,
    pub unresolved: Vec<(Uuid, CampaignError)>,
}

/// Selects prospects whose next contact time has passed.
#[derive(Clone)]
pub struct FollowUpScheduler {
    store: Arc<dyn RecordStore>,
}

impl FollowUpScheduler {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Scan for due prospects. Each owning campaign is loaded once per call.
    pub async fn due_prospects(&self, now: DateTime<Utc>) -> CampaignResult<DueScan> {
        let candidates = self
            .store
            .scan_prospects(&ProspectFilter::due_follow_ups(now))
            .await?;

        let mut campaigns: HashMap<Uuid, Option<Arc<Campaign>>> = HashMap::new();
        let mut scan = DueScan::default();

        for prospect in candidates {
            let campaign = match campaigns.get(&prospect.campaign_id) {
                Some(cached) => cached.clone(),
                None => {
                    let loaded = self.store.get_campaign(prospect.campaign_id).await?.map(Arc::new);
                    campaigns.insert(prospect.campaign_id, loaded.clone());
                    loaded
                }
            };

            let Some(campaign) = campaign else {
                warn!(
                    prospect_id = %prospect.id,
                    campaign_id = %prospect.campaign_id,
                    "Due prospect references a missing campaign"
                );
                scan.unresolved.push((
                    prospect.id,
                    CampaignError::Configuration(format!(
                        "campaign {} for prospect {} not found",
                        prospect.campaign_id, prospect.id
                    )),
                ));
                continue;
            };

            if !is_due(&prospect, &campaign, now) {
                continue;
            }
            let Some(stage) = next_stage(prospect.contact_status) else {
                continue;
            };
            scan.due.push(DueProspect {
                prospect,
                campaign,
                stage,
            });
        }

        debug!(
            due = scan.due.len(),
            unresolved = scan.unresolved.len(),
            "Follow-up scan complete"
        );
        metrics::counter!("outreach.cycle_due").increment(scan.due.len() as u64);
        Ok(scan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_core::types::{CampaignStatus, RawProspect, StatsBlock, TemplateConfig};
    use autopilot_store::InMemoryStore;

    fn campaign(cadence: CadenceConfig, status: CampaignStatus) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: Uuid::new_v4(),
            name: "Backlinks Q3".to_string(),
            status,
            cadence,
            template: TemplateConfig::default(),
            stats: StatsBlock::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn prospect(
        campaign_id: Uuid,
        status: ContactStatus,
        due: Option<DateTime<Utc>>,
        response: ResponseStatus,
    ) -> Prospect {
        let mut p = Prospect::discovered(
            campaign_id,
            RawProspect {
                contact_name: "Morgan".into(),
                contact_email: "morgan@example.org".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        p.contact_status = status;
        p.next_follow_up_at = due;
        p.response_status = response;
        p
    }

    #[test]
    fn test_next_stage_total() {
        for status in ContactStatus::ALL {
            let stage = next_stage(status);
            assert_eq!(stage, next_stage(status));
            match stage {
                Some(kind) => assert_eq!(kind.predecessor(), status),
                None => assert!(!status.is_awaiting_next_stage()),
            }
        }
    }

    #[test]
    fn test_follow_up_delay_by_stage() {
        let cadence = CadenceConfig::new(vec![7, 14, 21], true);
        assert_eq!(follow_up_delay(&cadence, MessageKind::Initial), Some(Duration::days(7)));
        assert_eq!(follow_up_delay(&cadence, MessageKind::FollowUp1), Some(Duration::days(14)));
        assert_eq!(follow_up_delay(&cadence, MessageKind::FollowUp2), Some(Duration::days(21)));
        assert_eq!(follow_up_delay(&cadence, MessageKind::FollowUp3), None);

        let short = CadenceConfig::new(vec![3], true);
        assert_eq!(follow_up_delay(&short, MessageKind::FollowUp1), None);
    }

    #[test]
    fn test_next_follow_up_uses_now_as_base() {
        let cadence = CadenceConfig::new(vec![7, 14, 21], true);
        let t0 = Utc::now();
        let now = t0 + Duration::days(8);
        assert_eq!(
            next_follow_up_at(&cadence, MessageKind::FollowUp1, now),
            Some(t0 + Duration::days(22))
        );
    }

    #[test]
    fn test_is_due_rules() {
        let now = Utc::now();
        let past = Some(now - Duration::hours(1));
        let c = campaign(CadenceConfig::default(), CampaignStatus::Active);

        assert!(is_due(
            &prospect(c.id, ContactStatus::InitialSent, past, ResponseStatus::Unanswered),
            &c,
            now
        ));
        // A positive or neutral reply does not stop the cadence.
        assert!(is_due(
            &prospect(c.id, ContactStatus::FollowUp1, past, ResponseStatus::Neutral),
            &c,
            now
        ));
        assert!(!is_due(
            &prospect(c.id, ContactStatus::InitialSent, past, ResponseStatus::Negative),
            &c,
            now
        ));
        assert!(!is_due(
            &prospect(c.id, ContactStatus::FollowUp3, past, ResponseStatus::Unanswered),
            &c,
            now
        ));
        assert!(!is_due(
            &prospect(
                c.id,
                ContactStatus::InitialSent,
                Some(now + Duration::seconds(1)),
                ResponseStatus::Unanswered
            ),
            &c,
            now
        ));

        let disabled = campaign(CadenceConfig::new(vec![7], false), CampaignStatus::Active);
        assert!(!is_due(
            &prospect(disabled.id, ContactStatus::InitialSent, past, ResponseStatus::Unanswered),
            &disabled,
            now
        ));

        let paused = campaign(CadenceConfig::default(), CampaignStatus::Paused);
        assert!(!is_due(
            &prospect(paused.id, ContactStatus::InitialSent, past, ResponseStatus::Unanswered),
            &paused,
            now
        ));
    }

    #[tokio::test]
    async fn test_due_prospects_scan() {
        let store = Arc::new(InMemoryStore::new());
        let now = Utc::now();
        let past = Some(now - Duration::days(1));

        let c = campaign(CadenceConfig::default(), CampaignStatus::Active);
        store.insert_campaign(c.clone()).await.unwrap();

        let due = prospect(c.id, ContactStatus::FollowUp1, past, ResponseStatus::Unanswered);
        let declined = prospect(c.id, ContactStatus::InitialSent, past, ResponseStatus::Negative);
        let orphan = prospect(Uuid::new_v4(), ContactStatus::InitialSent, past, ResponseStatus::Unanswered);
        store
            .insert_prospects(vec![due.clone(), declined.clone(), orphan.clone()])
            .await
            .unwrap();

        let scheduler = FollowUpScheduler::new(store);
        let scan = scheduler.due_prospects(now).await.unwrap();

        assert_eq!(scan.due.len(), 1);
        assert_eq!(scan.due[0].prospect.id, due.id);
        assert_eq!(scan.due[0].stage, MessageKind::FollowUp2);
        assert_eq!(scan.due[0].campaign.id, c.id);

        assert_eq!(scan.unresolved.len(), 1);
        assert_eq!(scan.unresolved[0].0, orphan.id);
        assert!(matches!(scan.unresolved[0].1, CampaignError::Configuration(_)));
    }
}
