use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use autopilot_channels::PublishAttempt;
use autopilot_core::channels::{ContentBrief, GeneratedContent};
use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::event_bus::{make_event, EventType};
use autopilot_core::types::PublishRecord;

use crate::engine::CampaignEngine;

/// Result of a successful publish cycle, including the destinations that
/// failed before one accepted the content.
#[derive(Debug, Clone, Serialize)]
pub struct PublishOutcome {
    pub record: PublishRecord,
    pub content: GeneratedContent,
    pub attempts: Vec<PublishAttempt>,
}

impl CampaignEngine {
    /// Least-used enabled destination for the campaign.
    pub async fn select_publish_destination(&self, campaign_id: Uuid) -> CampaignResult<String> {
        self.get_campaign(campaign_id).await?;
        let destination = self.rotation.select(campaign_id).await?;
        self.event_sink.emit(
            make_event(EventType::DestinationSelected, Some(campaign_id), None)
                .with_detail(destination.clone()),
        );
        Ok(destination)
    }

    /// Generate one piece of content and publish it to the least-used
    /// destination, falling through to the next least-used on failure. Each
    /// destination is tried at most once per call and only a successful
    /// publish is recorded.
    pub async fn publish_content(&self, campaign_id: Uuid, brief: ContentBrief) -> CampaignResult<PublishOutcome> {
        self.get_campaign(campaign_id).await?;

        let content = timeout(
            self.settings.publish_timeout,
            self.collaborators.content.generate(&brief),
        )
        .await
        .unwrap_or_else(|_| {
            Err(CampaignError::TransientDispatch(
                "content generation timed out".to_string(),
            ))
        })?;

        let mut tried: HashSet<String> = HashSet::new();
        let mut attempts: Vec<PublishAttempt> = Vec::new();

        loop {
            let destination = match self.rotation.select_excluding(campaign_id, &tried).await {
                Ok(destination) => destination,
                Err(CampaignError::Configuration(_)) if !attempts.is_empty() => {
                    let last_error = attempts
                        .last()
                        .and_then(|a| a.error.clone())
                        .unwrap_or_default();
                    return Err(CampaignError::TransientDispatch(format!(
                        "all {} destinations failed, last error: {}",
                        attempts.len(),
                        last_error
                    )));
                }
                Err(e) => return Err(e),
            };
            tried.insert(destination.clone());

            let mut attempt = PublishAttempt::selected(destination.clone());
            attempt.start()?;

            let published = timeout(
                self.settings.publish_timeout,
                self.collaborators
                    .publisher
                    .publish(&content.title, &content.content, &destination),
            )
            .await
            .unwrap_or_else(|_| {
                Err(CampaignError::TransientDispatch(format!(
                    "publish to {} timed out",
                    destination
                )))
            });

            match published {
                Ok(url) => {
                    attempt.succeed(url.clone())?;
                    let record = PublishRecord {
                        id: Uuid::new_v4(),
                        campaign_id,
                        destination_id: destination.clone(),
                        title: content.title.clone(),
                        url,
                        published_at: Utc::now(),
                    };
                    self.store.insert_publish_record(record.clone()).await?;
                    attempts.push(attempt);

                    metrics::counter!("distribution.published", "destination" => destination.clone())
                        .increment(1);
                    info!(
                        campaign_id = %campaign_id,
                        destination = %destination,
                        url = %record.url,
                        variant = content.prompt_variant,
                        "Content distributed"
                    );
                    self.event_sink.emit(
                        make_event(EventType::ContentPublished, Some(campaign_id), None)
                            .with_detail(destination),
                    );
                    return Ok(PublishOutcome {
                        record,
                        content,
                        attempts,
                    });
                }
                Err(e) => {
                    warn!(
                        campaign_id = %campaign_id,
                        destination = %destination,
                        error = %e,
                        "Publish failed, trying next destination"
                    );
                    metrics::counter!("distribution.failed", "destination" => destination.clone())
                        .increment(1);
                    self.event_sink.emit(
                        make_event(EventType::PublishFailed, Some(campaign_id), None)
                            .with_detail(destination),
                    );
                    attempt.fail(&e)?;
                    attempts.push(attempt);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::engine::{Collaborators, CreateCampaign};
    use autopilot_channels::{PublishState, TemplateContentGenerator};
    use autopilot_core::config::AppConfig;
    use autopilot_core::types::Destination;
    use autopilot_store::InMemoryStore;

    fn engine(destinations: Vec<Destination>) -> CampaignEngine {
        let mut config = AppConfig::default();
        config.distribution.destinations = destinations;
        let mut collaborators = Collaborators::from_config(&config);
        collaborators.content = Arc::new(TemplateContentGenerator::with_variant(2));
        CampaignEngine::new(&config, Arc::new(InMemoryStore::new()), collaborators)
    }

    fn brief() -> ContentBrief {
        ContentBrief {
            keyword: "outreach".into(),
            anchor_text: "outreach guide".into(),
            target_url: "https://example.com/guide".into(),
        }
    }

    async fn campaign_id(engine: &CampaignEngine) -> Uuid {
        engine
            .create_campaign(CreateCampaign {
                name: "Distribution".into(),
                ..Default::default()
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_publishes_round_robin() {
        let engine = engine(AppConfig::default().distribution.destinations);
        let id = campaign_id(&engine).await;

        let first = engine.publish_content(id, brief()).await.unwrap();
        let second = engine.publish_content(id, brief()).await.unwrap();
        assert_eq!(first.record.destination_id, "telegraph");
        assert_eq!(second.record.destination_id, "writeas");
        assert_eq!(first.content.prompt_variant, 2);
        assert_eq!(engine.select_publish_destination(id).await.unwrap(), "medium");
    }

    #[tokio::test]
    async fn test_unknown_destination_falls_through() {
        let engine = engine(vec![
            Destination::new("ghost-blog", "Ghost", 1),
            Destination::new("devto", "Dev.to", 2),
        ]);
        let id = campaign_id(&engine).await;

        let outcome = engine.publish_content(id, brief()).await.unwrap();
        assert_eq!(outcome.record.destination_id, "devto");
        assert_eq!(outcome.attempts.len(), 2);
        assert_eq!(outcome.attempts[0].state, PublishState::Failed);
        assert_eq!(outcome.attempts[1].state, PublishState::Published);

        let records = engine.store().list_publish_records(id).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn test_all_destinations_failing() {
        let engine = engine(vec![Destination::new("ghost-blog", "Ghost", 1)]);
        let id = campaign_id(&engine).await;
        assert!(matches!(
            engine.publish_content(id, brief()).await,
            Err(CampaignError::TransientDispatch(_))
        ));
        assert!(engine.store().list_publish_records(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_enabled_destination() {
        let engine = engine(vec![]);
        let id = campaign_id(&engine).await;
        assert!(matches!(
            engine.select_publish_destination(id).await,
            Err(CampaignError::Configuration(_))
        ));
    }
}
