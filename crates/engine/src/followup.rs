//! Contact dispatch and the follow-up cycle.
//!
//! A due prospect is claimed before its dispatch by pushing
//! `next_follow_up_at` forward by the claim lease with a conditional update.
//! The stage is only advanced after the dispatcher accepted the message, and
//! only through a second conditional update against the claimed record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use autopilot_analytics::StatsDelta;
use autopilot_channels::ComposedEmail;
use autopilot_core::channels::DispatchReceipt;
use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::event_bus::{make_event, EventType};
use autopilot_core::store::ProspectGuard;
use autopilot_core::types::{
    Campaign, CounterKey, MessageKind, MessageRecord, Prospect, ResponseStatus,
};
use autopilot_lifecycle::scheduler::is_due;
use autopilot_lifecycle::{DueProspect, SentMessage, TransitionTrigger};

use crate::engine::CampaignEngine;
use crate::report::{CycleReport, FollowUpOutcome, FollowUpResult};

impl CampaignEngine {
    /// Run one follow-up cycle at `now`.
    ///
    /// Only the initial scan can fail the call; every per-prospect error is
    /// captured in the report.
    pub async fn process_due_follow_ups(&self, now: DateTime<Utc>) -> CampaignResult<CycleReport> {
        let scan = self.scheduler.due_prospects(now).await?;
        let total_due = scan.due.len() + scan.unresolved.len();

        let mut results: Vec<FollowUpResult> = scan
            .unresolved
            .into_iter()
            .map(|(prospect_id, err)| FollowUpResult {
                prospect_id,
                stage: None,
                outcome: FollowUpOutcome::failed(&err),
            })
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent_prospects));
        let mut tasks = JoinSet::new();
        for due in scan.due {
            let engine = self.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let prospect_id = due.prospect.id;
                let stage = due.stage;
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => engine.follow_up_one(due, now).await,
                    Err(e) => FollowUpOutcome::failed(&CampaignError::Internal(e.into())),
                };
                FollowUpResult {
                    prospect_id,
                    stage: Some(stage),
                    outcome,
                }
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!(error = %e, "Follow-up task aborted"),
            }
        }

        let report = CycleReport::from_results(total_due, results);
        info!(
            total_due = report.total_due,
            processed = report.processed,
            failed = report.failures().count(),
            "Follow-up cycle complete"
        );
        Ok(report)
    }

    async fn follow_up_one(&self, due: DueProspect, now: DateTime<Utc>) -> FollowUpOutcome {
        let DueProspect {
            prospect,
            campaign,
            stage,
        } = due;

        // The campaign may have been paused while this task waited for a permit.
        let campaign = match self.get_campaign(campaign.id).await {
            Ok(current) => current,
            Err(e) => return FollowUpOutcome::failed(&e),
        };

        let lease_until = now + self.settings.claim_lease;
        let take_lease = |p: &mut Prospect| -> CampaignResult<()> {
            if !is_due(p, &campaign, now) {
                return Err(CampaignError::StateConflict(format!(
                    "prospect {} is no longer eligible for {}",
                    p.id, stage
                )));
            }
            p.next_follow_up_at = Some(lease_until);
            Ok(())
        };
        let claimed = match self
            .store
            .compare_and_update_prospect(prospect.id, &ProspectGuard::of(&prospect), &take_lease)
            .await
        {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                debug!(prospect_id = %prospect.id, stage = ?stage, "Prospect claimed elsewhere");
                return FollowUpOutcome::Skipped {
                    reason: "prospect was claimed or advanced by another cycle".to_string(),
                };
            }
            Err(CampaignError::StateConflict(reason)) => {
                debug!(prospect_id = %prospect.id, stage = ?stage, reason = %reason, "Prospect no longer due");
                return FollowUpOutcome::Skipped { reason };
            }
            Err(e) => return FollowUpOutcome::failed(&e),
        };
        let claim = ProspectGuard::of(&claimed);

        let email = self.composer.compose(&claimed, &campaign, stage, None);
        let receipt = match self.dispatch_with_retry(&claimed, stage, &email).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.release_claim(&claim, prospect.id, prospect.next_follow_up_at)
                    .await;
                return FollowUpOutcome::failed(&e);
            }
        };

        match self
            .commit_contact(&claim, &claimed, &campaign, stage, &email, &receipt, now)
            .await
        {
            Ok((record, next_follow_up_at)) => FollowUpOutcome::Sent {
                message_id: record.id,
                next_follow_up_at,
            },
            Err(e) => FollowUpOutcome::failed(&e),
        }
    }

    /// Restore the scanned due time so the prospect stays due where it was.
    /// Skipped if anything else touched the prospect meanwhile.
    async fn release_claim(
        &self,
        claim: &ProspectGuard,
        prospect_id: Uuid,
        original_due: Option<DateTime<Utc>>,
    ) {
        let restore = |p: &mut Prospect| -> CampaignResult<()> {
            p.next_follow_up_at = original_due;
            Ok(())
        };
        match self
            .store
            .compare_and_update_prospect(prospect_id, claim, &restore)
            .await
        {
            Ok(Some(_)) => debug!(prospect_id = %prospect_id, "Claim released"),
            Ok(None) => warn!(prospect_id = %prospect_id, "Claim overtaken before release"),
            Err(e) => warn!(prospect_id = %prospect_id, error = %e, "Could not release claim"),
        }
    }

    /// Send one stage to a prospect right away, outside the cycle. Used for
    /// the initial contact and for manual follow-ups; `custom_message`
    /// replaces the composed body.
    pub async fn send_contact(
        &self,
        prospect_id: Uuid,
        kind: MessageKind,
        custom_message: Option<&str>,
        now: DateTime<Utc>,
    ) -> CampaignResult<MessageRecord> {
        let prospect = self.get_prospect(prospect_id).await?;
        let campaign = self.get_campaign(prospect.campaign_id).await?;

        if prospect.response_status == ResponseStatus::Negative {
            return Err(CampaignError::StateConflict(format!(
                "prospect {} declined further contact",
                prospect_id
            )));
        }
        if !campaign.status.accepts_contact() {
            return Err(CampaignError::StateConflict(format!(
                "campaign {} is {:?}",
                campaign.id, campaign.status
            )));
        }
        self.state_machine
            .transition(prospect.contact_status, TransitionTrigger::ContactSent(kind))?;

        let guard = ProspectGuard::of(&prospect);
        let email = self.composer.compose(&prospect, &campaign, kind, custom_message);
        let receipt = self.dispatch_with_retry(&prospect, kind, &email).await?;

        let (record, _) = self
            .commit_contact(&guard, &prospect, &campaign, kind, &email, &receipt, now)
            .await?;
        if kind == MessageKind::Initial {
            self.activate_if_draft(&campaign).await;
        }
        Ok(record)
    }

    /// Dispatch with a per-call timeout and at most one retry for retryable
    /// failures.
    pub(crate) async fn dispatch_with_retry(
        &self,
        prospect: &Prospect,
        kind: MessageKind,
        email: &ComposedEmail,
    ) -> CampaignResult<DispatchReceipt> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let sent = timeout(
                self.settings.dispatch_timeout,
                self.collaborators
                    .dispatcher
                    .send(&prospect.contact_email, &email.subject, &email.body),
            )
            .await
            .unwrap_or_else(|_| {
                Err(CampaignError::TransientDispatch(format!(
                    "dispatch timed out after {}ms",
                    self.settings.dispatch_timeout.as_millis()
                )))
            });

            match sent {
                Ok(receipt) => return Ok(receipt),
                Err(e) if e.is_retryable() && attempt < self.settings.dispatch_attempts => {
                    warn!(
                        prospect_id = %prospect.id,
                        stage = ?kind,
                        attempt = attempt,
                        error = %e,
                        "Dispatch failed, retrying"
                    );
                }
                Err(e) => {
                    warn!(
                        prospect_id = %prospect.id,
                        campaign_id = %prospect.campaign_id,
                        stage = ?kind,
                        error = %e,
                        "Dispatch failed"
                    );
                    metrics::counter!("outreach.dispatch_failed", "stage" => kind.as_str()).increment(1);
                    self.event_sink.emit(
                        make_event(EventType::ContactFailed, Some(prospect.campaign_id), Some(prospect.id))
                            .with_detail(kind.as_str()),
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Advance the prospect past `kind`, guarded by `expected`, then store the
    /// message record and count the send.
    ///
    /// When the guard no longer holds the message was still delivered: its
    /// record is kept if no record exists for that stage yet, and the call
    /// reports a state conflict.
    #[allow(clippy::too_many_arguments)]
    async fn commit_contact(
        &self,
        expected: &ProspectGuard,
        snapshot: &Prospect,
        campaign: &Campaign,
        kind: MessageKind,
        email: &ComposedEmail,
        receipt: &DispatchReceipt,
        now: DateTime<Utc>,
    ) -> CampaignResult<(MessageRecord, Option<DateTime<Utc>>)> {
        let message = SentMessage {
            subject: &email.subject,
            body: &email.body,
            receipt,
        };
        let record = self.state_machine.record_contact_sent(
            &mut snapshot.clone(),
            campaign,
            kind,
            message,
            now,
        )?;
        let advance = |p: &mut Prospect| -> CampaignResult<()> {
            self.state_machine
                .record_contact_sent(p, campaign, kind, message, now)
                .map(|_| ())
        };

        let advanced = self
            .store
            .compare_and_update_prospect(snapshot.id, expected, &advance)
            .await?;
        let Some(advanced) = advanced else {
            warn!(
                prospect_id = %record.prospect_id,
                stage = ?kind,
                "Prospect changed during dispatch; stage not advanced"
            );
            if let Err(e) = self.store_message(&record).await {
                warn!(prospect_id = %record.prospect_id, error = %e, "Dispatched message not recorded");
            }
            return Err(CampaignError::StateConflict(format!(
                "prospect {} changed while {} was in flight",
                record.prospect_id, kind
            )));
        };
        let next_follow_up_at = advanced.next_follow_up_at;

        self.store_message(&record).await?;

        metrics::counter!("outreach.contact_sent", "stage" => kind.as_str()).increment(1);
        info!(
            prospect_id = %record.prospect_id,
            campaign_id = %record.campaign_id,
            stage = ?kind,
            next_follow_up_at = ?next_follow_up_at,
            "Contact sent"
        );
        self.event_sink.emit(
            make_event(EventType::ContactSent, Some(record.campaign_id), Some(record.prospect_id))
                .with_detail(kind.as_str()),
        );
        Ok((record, next_follow_up_at))
    }

    async fn store_message(&self, record: &MessageRecord) -> CampaignResult<()> {
        self.store.insert_message(record.clone()).await?;
        self.aggregator
            .apply(record.campaign_id, &StatsDelta::single(CounterKey::EmailsSent, 1))
            .await?;
        Ok(())
    }
}
