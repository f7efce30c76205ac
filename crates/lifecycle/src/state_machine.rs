use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use autopilot_core::channels::DispatchReceipt;
use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::types::{
    Campaign, ContactStatus, MessageKind, MessageRecord, Prospect, ResearchPayload,
    ResponseStatus,
};

use crate::scheduler;

/// Event that moves a prospect between contact states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "trigger", content = "stage")]
pub enum TransitionTrigger {
    BeginResearch,
    ResearchCompleted,
    ResearchFailed,
    ContactSent(MessageKind),
}

/// Describes a single valid state transition for a prospect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub from: ContactStatus,
    pub to: ContactStatus,
    pub trigger: TransitionTrigger,
}

/// A message the dispatcher has already accepted.
#[derive(Debug, Clone, Copy)]
pub struct SentMessage<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub receipt: &'a DispatchReceipt,
}

/// Guards the prospect lifecycle with one finite transition table. Every
/// contact-status change in the workspace goes through [`Self::transition`].
#[derive(Debug, Clone)]
pub struct ProspectStateMachine {
    transitions: Vec<StateTransition>,
}

impl ProspectStateMachine {
    pub fn new() -> Self {
        let mut transitions = vec![
            StateTransition {
                from: ContactStatus::Discovered,
                to: ContactStatus::Researching,
                trigger: TransitionTrigger::BeginResearch,
            },
            StateTransition {
                from: ContactStatus::Researching,
                to: ContactStatus::ReadyToContact,
                trigger: TransitionTrigger::ResearchCompleted,
            },
            // Failed research returns the prospect to the pool for a retry.
            StateTransition {
                from: ContactStatus::Researching,
                to: ContactStatus::Discovered,
                trigger: TransitionTrigger::ResearchFailed,
            },
        ];
        transitions.extend(MessageKind::ALL.iter().map(|kind| StateTransition {
            from: kind.predecessor(),
            to: kind.resulting_status(),
            trigger: TransitionTrigger::ContactSent(*kind),
        }));

        Self { transitions }
    }

    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    /// Target state for `trigger` applied in `from`, if the table allows it.
    pub fn target(&self, from: ContactStatus, trigger: TransitionTrigger) -> Option<ContactStatus> {
        self.transitions
            .iter()
            .find(|t| t.from == from && t.trigger == trigger)
            .map(|t| t.to)
    }

    pub fn transition(&self, from: ContactStatus, trigger: TransitionTrigger) -> CampaignResult<ContactStatus> {
        self.target(from, trigger).ok_or_else(|| {
            CampaignError::StateConflict(format!(
                "cannot apply {:?} to a prospect in state {}",
                trigger, from
            ))
        })
    }

    pub fn begin_research(&self, prospect: &mut Prospect, now: DateTime<Utc>) -> CampaignResult<()> {
        prospect.contact_status =
            self.transition(prospect.contact_status, TransitionTrigger::BeginResearch)?;
        prospect.updated_at = now;
        Ok(())
    }

    pub fn complete_research(
        &self,
        prospect: &mut Prospect,
        payload: ResearchPayload,
        now: DateTime<Utc>,
    ) -> CampaignResult<()> {
        prospect.contact_status =
            self.transition(prospect.contact_status, TransitionTrigger::ResearchCompleted)?;
        prospect.research = Some(payload);
        prospect.updated_at = now;
        Ok(())
    }

    pub fn fail_research(&self, prospect: &mut Prospect, now: DateTime<Utc>) -> CampaignResult<()> {
        prospect.contact_status =
            self.transition(prospect.contact_status, TransitionTrigger::ResearchFailed)?;
        prospect.updated_at = now;
        Ok(())
    }

    /// Advance the prospect to `kind` after a confirmed dispatch and return
    /// the message record that evidences it.
    ///
    /// The due time for the next stage is `now + cadence[stage_index]` when
    /// a further stage exists and follow-up is enabled; otherwise it is
    /// cleared. Nothing is mutated on error.
    pub fn record_contact_sent(
        &self,
        prospect: &mut Prospect,
        campaign: &Campaign,
        kind: MessageKind,
        message: SentMessage<'_>,
        now: DateTime<Utc>,
    ) -> CampaignResult<MessageRecord> {
        if prospect.campaign_id != campaign.id {
            return Err(CampaignError::Validation(format!(
                "prospect {} does not belong to campaign {}",
                prospect.id, campaign.id
            )));
        }
        let next_status =
            self.transition(prospect.contact_status, TransitionTrigger::ContactSent(kind))?;

        prospect.contact_status = next_status;
        prospect.last_contact_at = Some(now);
        prospect.next_follow_up_at = scheduler::next_follow_up_at(&campaign.cadence, kind, now);
        prospect.updated_at = now;

        Ok(MessageRecord {
            id: Uuid::new_v4(),
            prospect_id: prospect.id,
            campaign_id: campaign.id,
            kind,
            subject: message.subject.to_string(),
            body: message.body.to_string(),
            sent_at: now,
            delivery_status: message.receipt.status,
            provider_ref: message.receipt.provider_ref.clone(),
        })
    }

    /// Record a reply outcome. Accepted at any stage and never touches the
    /// contact status.
    pub fn record_response(&self, prospect: &mut Prospect, response: ResponseStatus, now: DateTime<Utc>) {
        prospect.response_status = response;
        prospect.updated_at = now;
    }
}

impl Default for ProspectStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autopilot_core::types::{
        CadenceConfig, CampaignStatus, DeliveryStatus, RawProspect, StatsBlock, TemplateConfig,
    };
    use chrono::Duration;

    fn campaign(delays: Vec<u32>, enabled: bool) -> Campaign {
        let now = Utc::now();
        Campaign {
            id: Uuid::new_v4(),
            name: "Guest posts".to_string(),
            status: CampaignStatus::Active,
            cadence: CadenceConfig::new(delays, enabled),
            template: TemplateConfig::default(),
            stats: StatsBlock::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn prospect_in(campaign: &Campaign, status: ContactStatus) -> Prospect {
        let mut p = Prospect::discovered(
            campaign.id,
            RawProspect {
                contact_name: "Avery".into(),
                contact_email: "avery@example.com".into(),
                ..Default::default()
            },
            Utc::now(),
        );
        p.contact_status = status;
        p
    }

    fn receipt() -> DispatchReceipt {
        DispatchReceipt {
            provider_ref: "sg-123".to_string(),
            status: DeliveryStatus::Queued,
        }
    }

    fn all_triggers() -> Vec<TransitionTrigger> {
        let mut triggers = vec![
            TransitionTrigger::BeginResearch,
            TransitionTrigger::ResearchCompleted,
            TransitionTrigger::ResearchFailed,
        ];
        triggers.extend(MessageKind::ALL.iter().map(|k| TransitionTrigger::ContactSent(*k)));
        triggers
    }

    #[test]
    fn test_contact_transitions_only_move_forward() {
        let sm = ProspectStateMachine::new();
        for from in ContactStatus::ALL {
            for trigger in all_triggers() {
                match sm.target(from, trigger) {
                    Some(to) if trigger == TransitionTrigger::ResearchFailed => {
                        assert_eq!(from, ContactStatus::Researching);
                        assert_eq!(to, ContactStatus::Discovered);
                    }
                    Some(to) => {
                        assert_eq!(to.ordinal(), from.ordinal() + 1, "{:?} from {}", trigger, from);
                    }
                    None => {
                        assert!(matches!(
                            sm.transition(from, trigger),
                            Err(CampaignError::StateConflict(_))
                        ));
                    }
                }
            }
        }
    }

    #[test]
    fn test_each_state_has_one_contact_successor() {
        let sm = ProspectStateMachine::new();
        for from in ContactStatus::ALL {
            let successors: Vec<_> = MessageKind::ALL
                .iter()
                .filter_map(|k| sm.target(from, TransitionTrigger::ContactSent(*k)))
                .collect();
            let expected = usize::from(from.ordinal() >= 2 && from != ContactStatus::FollowUp3);
            assert_eq!(successors.len(), expected, "state {}", from);
        }
    }

    #[test]
    fn test_research_lifecycle() {
        let sm = ProspectStateMachine::new();
        let c = campaign(vec![7, 14, 21], true);
        let mut p = prospect_in(&c, ContactStatus::Discovered);
        let now = Utc::now();

        sm.begin_research(&mut p, now).unwrap();
        assert_eq!(p.contact_status, ContactStatus::Researching);

        sm.fail_research(&mut p, now).unwrap();
        assert_eq!(p.contact_status, ContactStatus::Discovered);

        sm.begin_research(&mut p, now).unwrap();
        let payload = ResearchPayload(serde_json::json!({"industry": "marketing"}));
        sm.complete_research(&mut p, payload.clone(), now).unwrap();
        assert_eq!(p.contact_status, ContactStatus::ReadyToContact);
        assert_eq!(p.research, Some(payload));

        // Research cannot restart once the prospect is ready.
        assert!(sm.begin_research(&mut p, now).is_err());
        assert_eq!(p.contact_status, ContactStatus::ReadyToContact);
    }

    #[test]
    fn test_record_contact_sent_schedules_next_stage() {
        let sm = ProspectStateMachine::new();
        let c = campaign(vec![7, 14, 21], true);
        let mut p = prospect_in(&c, ContactStatus::ReadyToContact);
        let now = Utc::now();
        let r = receipt();

        let record = sm
            .record_contact_sent(
                &mut p,
                &c,
                MessageKind::Initial,
                SentMessage { subject: "Hello", body: "Body", receipt: &r },
                now,
            )
            .unwrap();

        assert_eq!(p.contact_status, ContactStatus::InitialSent);
        assert_eq!(p.last_contact_at, Some(now));
        assert_eq!(p.next_follow_up_at, Some(now + Duration::days(7)));
        assert_eq!(record.kind, MessageKind::Initial);
        assert_eq!(record.prospect_id, p.id);
        assert_eq!(record.provider_ref, "sg-123");
        assert_eq!(record.sent_at, now);
    }

    #[test]
    fn test_final_stage_clears_due_time() {
        let sm = ProspectStateMachine::new();
        let c = campaign(vec![7, 14, 21], true);
        let mut p = prospect_in(&c, ContactStatus::FollowUp2);
        p.next_follow_up_at = Some(Utc::now());
        let r = receipt();

        sm.record_contact_sent(
            &mut p,
            &c,
            MessageKind::FollowUp3,
            SentMessage { subject: "s", body: "b", receipt: &r },
            Utc::now(),
        )
        .unwrap();

        assert_eq!(p.contact_status, ContactStatus::FollowUp3);
        assert_eq!(p.next_follow_up_at, None);
    }

    #[test]
    fn test_short_cadence_or_disabled_stops_scheduling() {
        let sm = ProspectStateMachine::new();
        let r = receipt();

        let short = campaign(vec![7], true);
        let mut p = prospect_in(&short, ContactStatus::InitialSent);
        sm.record_contact_sent(
            &mut p,
            &short,
            MessageKind::FollowUp1,
            SentMessage { subject: "s", body: "b", receipt: &r },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(p.next_follow_up_at, None);

        let disabled = campaign(vec![7, 14, 21], false);
        let mut q = prospect_in(&disabled, ContactStatus::ReadyToContact);
        sm.record_contact_sent(
            &mut q,
            &disabled,
            MessageKind::Initial,
            SentMessage { subject: "s", body: "b", receipt: &r },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(q.contact_status, ContactStatus::InitialSent);
        assert_eq!(q.next_follow_up_at, None);
    }

    #[test]
    fn test_out_of_order_contact_is_conflict() {
        let sm = ProspectStateMachine::new();
        let c = campaign(vec![7, 14, 21], true);
        let mut p = prospect_in(&c, ContactStatus::InitialSent);
        let before = p.clone();
        let r = receipt();

        let err = sm
            .record_contact_sent(
                &mut p,
                &c,
                MessageKind::FollowUp2,
                SentMessage { subject: "s", body: "b", receipt: &r },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, CampaignError::StateConflict(_)));
        assert_eq!(p, before);
    }

    #[test]
    fn test_foreign_campaign_rejected() {
        let sm = ProspectStateMachine::new();
        let c = campaign(vec![7], true);
        let other = campaign(vec![7], true);
        let mut p = prospect_in(&c, ContactStatus::ReadyToContact);
        let r = receipt();

        let err = sm
            .record_contact_sent(
                &mut p,
                &other,
                MessageKind::Initial,
                SentMessage { subject: "s", body: "b", receipt: &r },
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, CampaignError::Validation(_)));
    }

    #[test]
    fn test_response_never_changes_contact_status() {
        let sm = ProspectStateMachine::new();
        let c = campaign(vec![7], true);
        for status in ContactStatus::ALL {
            let mut p = prospect_in(&c, status);
            sm.record_response(&mut p, ResponseStatus::Negative, Utc::now());
            assert_eq!(p.contact_status, status);
            assert_eq!(p.response_status, ResponseStatus::Negative);
        }
    }
}
