//! Prospect research, run on demand or by background workers.
//!
//! Newly added prospects are pushed onto a bounded [`ResearchQueue`]. Workers
//! take jobs off the queue, run the researcher and requeue retryable failures
//! after an exponential backoff with random jitter, so a large batch spreads
//! out instead of hitting the research provider all at once.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use autopilot_core::config::ResearchConfig;
use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::event_bus::{make_event, EventType};
use autopilot_core::types::{ContactStatus, Prospect};

use crate::engine::CampaignEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResearchJob {
    pub prospect_id: Uuid,
    /// 1-based attempt number.
    pub attempt: u32,
}

/// Retry schedule for failed research jobs.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max_jitter: Duration,
    pub max_attempts: u32,
}

impl BackoffPolicy {
    pub fn from_config(config: &ResearchConfig) -> Self {
        Self {
            base: Duration::from_millis(config.base_backoff_ms),
            max_jitter: Duration::from_millis(config.max_jitter_ms),
            max_attempts: config.max_attempts.max(1),
        }
    }

    /// Wait before retrying after `attempt` failed: `base * 2^(attempt-1)`
    /// plus up to `max_jitter` of random delay.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self.base.saturating_mul(1u32 << exponent);
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        backoff + jitter
    }

    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

/// Producer side of the research queue.
#[derive(Debug, Clone)]
pub struct ResearchQueue {
    sender: mpsc::Sender<ResearchJob>,
}

impl ResearchQueue {
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<ResearchJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Queue a first attempt. A full or closed queue drops the job with a
    /// warning; the prospect stays `Discovered` and can be researched
    /// explicitly.
    pub fn enqueue(&self, prospect_id: Uuid) -> bool {
        self.push(ResearchJob {
            prospect_id,
            attempt: 1,
        })
    }

    fn push(&self, job: ResearchJob) -> bool {
        match self.sender.try_send(job) {
            Ok(()) => true,
            Err(e) => {
                warn!(prospect_id = %job.prospect_id, error = %e, "Research job dropped");
                metrics::counter!("research.dropped").increment(1);
                false
            }
        }
    }
}

/// Start `workers` tasks draining `receiver`. Workers stop once every
/// strong [`ResearchQueue`] handle is dropped and the queue is empty. An
/// `engine` with the queue attached is such a handle, so hand the workers
/// an engine built before `with_research_queue`.
pub fn spawn_research_workers(
    engine: CampaignEngine,
    queue: &ResearchQueue,
    receiver: mpsc::Receiver<ResearchJob>,
    policy: BackoffPolicy,
    workers: usize,
) -> Vec<JoinHandle<()>> {
    let receiver = Arc::new(Mutex::new(receiver));
    let policy = Arc::new(policy);
    // Retries hold a weak sender so the workers alone never keep the queue open.
    let retry = queue.sender.downgrade();

    (0..workers.max(1))
        .map(|worker| {
            let engine = engine.clone();
            let receiver = receiver.clone();
            let policy = policy.clone();
            let retry = retry.clone();
            tokio::spawn(async move {
                debug!(worker = worker, "Research worker started");
                loop {
                    let job = receiver.lock().await.recv().await;
                    let Some(job) = job else { break };
                    run_job(&engine, &policy, &retry, job).await;
                }
                debug!(worker = worker, "Research worker stopped");
            })
        })
        .collect()
}

async fn run_job(
    engine: &CampaignEngine,
    policy: &BackoffPolicy,
    retry: &mpsc::WeakSender<ResearchJob>,
    job: ResearchJob,
) {
    let err = match engine.research_prospect(job.prospect_id).await {
        Ok(_) => return,
        Err(e) => e,
    };
    if !err.is_retryable() || !policy.should_retry(job.attempt) {
        error!(
            prospect_id = %job.prospect_id,
            attempt = job.attempt,
            error = %err,
            "Research abandoned"
        );
        metrics::counter!("research.abandoned").increment(1);
        return;
    }

    let delay = policy.delay_for(job.attempt);
    warn!(
        prospect_id = %job.prospect_id,
        attempt = job.attempt,
        delay_ms = delay.as_millis() as u64,
        error = %err,
        "Research failed, requeueing"
    );
    let next = ResearchJob {
        prospect_id: job.prospect_id,
        attempt: job.attempt + 1,
    };
    let retry = retry.clone();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        match retry.upgrade() {
            Some(sender) => {
                if let Err(e) = sender.send(next).await {
                    warn!(prospect_id = %next.prospect_id, error = %e, "Research retry dropped");
                }
            }
            None => warn!(prospect_id = %next.prospect_id, "Research queue closed before retry"),
        }
    });
}

impl CampaignEngine {
    /// Research one prospect now: `Discovered -> Researching`, run the
    /// researcher, then `ReadyToContact` on success or back to `Discovered`
    /// on failure.
    pub async fn research_prospect(&self, prospect_id: Uuid) -> CampaignResult<Prospect> {
        let begin = |p: &mut Prospect| -> CampaignResult<()> {
            self.state_machine.begin_research(p, Utc::now())
        };
        let prospect = self.store.modify_prospect(prospect_id, &begin).await?;
        self.event_sink.emit(make_event(
            EventType::ResearchStarted,
            Some(prospect.campaign_id),
            Some(prospect_id),
        ));

        let researched = timeout(
            self.settings.research_timeout,
            self.collaborators.researcher.research(&prospect),
        )
        .await
        .unwrap_or_else(|_| {
            Err(CampaignError::TransientDispatch(
                "research timed out".to_string(),
            ))
        });

        match researched {
            Ok(payload) => {
                let complete = |p: &mut Prospect| -> CampaignResult<()> {
                    self.state_machine
                        .complete_research(p, payload.clone(), Utc::now())
                };
                let prospect = self.store.modify_prospect(prospect_id, &complete).await?;
                info!(
                    prospect_id = %prospect_id,
                    campaign_id = %prospect.campaign_id,
                    "Prospect research completed"
                );
                metrics::counter!("research.completed").increment(1);
                self.event_sink.emit(make_event(
                    EventType::ResearchCompleted,
                    Some(prospect.campaign_id),
                    Some(prospect_id),
                ));
                Ok(prospect)
            }
            Err(e) => {
                let fail = |p: &mut Prospect| -> CampaignResult<()> {
                    if p.contact_status != ContactStatus::Researching {
                        return Ok(());
                    }
                    self.state_machine.fail_research(p, Utc::now())
                };
                if let Err(reset) = self.store.modify_prospect(prospect_id, &fail).await {
                    warn!(prospect_id = %prospect_id, error = %reset, "Could not reset prospect after failed research");
                }
                warn!(prospect_id = %prospect_id, error = %e, "Prospect research failed");
                metrics::counter!("research.failed").increment(1);
                self.event_sink.emit(
                    make_event(EventType::ResearchFailed, Some(prospect.campaign_id), Some(prospect_id))
                        .with_detail(e.to_string()),
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_without_jitter() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(100),
            max_jitter: Duration::ZERO,
            max_attempts: 3,
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn test_jitter_bounded() {
        let policy = BackoffPolicy {
            base: Duration::from_millis(50),
            max_jitter: Duration::from_millis(20),
            max_attempts: 2,
        };
        for _ in 0..50 {
            let delay = policy.delay_for(1);
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(70));
        }
    }

    #[tokio::test]
    async fn test_full_queue_drops_job() {
        let (queue, _receiver) = ResearchQueue::bounded(1);
        assert!(queue.enqueue(Uuid::new_v4()));
        assert!(!queue.enqueue(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn test_workers_stop_when_queue_dropped() {
        use crate::engine::Collaborators;
        use autopilot_core::config::AppConfig;
        use autopilot_store::InMemoryStore;

        let config = AppConfig::default();
        let engine = CampaignEngine::new(
            &config,
            Arc::new(InMemoryStore::new()),
            Collaborators::from_config(&config),
        );
        let (queue, receiver) = ResearchQueue::bounded(4);
        let handles = spawn_research_workers(
            engine.clone(),
            &queue,
            receiver,
            BackoffPolicy::from_config(&config.research),
            2,
        );
        let serving = engine.with_research_queue(queue);
        drop(serving);

        for handle in handles {
            timeout(Duration::from_secs(1), handle)
                .await
                .expect("worker still running")
                .unwrap();
        }
    }
}
