//! Destination publisher for the default catalog.
//!
//! Builds the public URL each platform would assign to a new post. Real
//! platform clients (Telegraph API, Medium integration tokens, ...) slot in
//! behind the same [`DestinationPublisher`] trait.

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use autopilot_core::channels::DestinationPublisher;
use autopilot_core::error::{CampaignError, CampaignResult};

use crate::rotation::normalize_destination_id;

pub struct SimulatedPublisher {
    author: String,
}

impl SimulatedPublisher {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
        }
    }

    fn url_for(&self, destination: &str, slug: &str) -> Option<String> {
        let author = slugify(&self.author);
        let url = match destination {
            "telegraph" => format!("https://telegra.ph/{}", slug),
            "writeas" => format!("https://write.as/{}/{}", author, slug),
            "medium" => format!("https://medium.com/@{}/{}", author, slug),
            "devto" => format!("https://dev.to/{}/{}", author, slug),
            "linkedin" => format!("https://www.linkedin.com/pulse/{}", slug),
            "hashnode" => format!("https://{}.hashnode.dev/{}", author, slug),
            "substack" => format!("https://{}.substack.com/p/{}", author, slug),
            _ => return None,
        };
        Some(url)
    }
}

impl Default for SimulatedPublisher {
    fn default() -> Self {
        Self::new("autopilot")
    }
}

#[async_trait]
impl DestinationPublisher for SimulatedPublisher {
    async fn publish(&self, title: &str, content: &str, destination_id: &str) -> CampaignResult<String> {
        if title.trim().is_empty() || content.trim().is_empty() {
            return Err(CampaignError::Validation(
                "cannot publish empty title or content".to_string(),
            ));
        }
        let destination = normalize_destination_id(destination_id);
        let slug = format!("{}-{}", slugify(title), Utc::now().format("%m-%d"));
        let url = self.url_for(&destination, &slug).ok_or_else(|| {
            CampaignError::Configuration(format!("no publisher for destination '{}'", destination))
        })?;

        info!(destination = %destination, url = %url, "Content published");
        Ok(url)
    }
}

/// Lower-case ASCII words joined by single hyphens.
pub fn slugify(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("The Ultimate Guide to SEO!"), "the-ultimate-guide-to-seo");
        assert_eq!(slugify("  --  "), "");
    }

    #[tokio::test]
    async fn test_publish_builds_platform_url() {
        let publisher = SimulatedPublisher::new("Growth Team");
        let url = publisher
            .publish("Link Building 101", "Body text", "Medium.com")
            .await
            .unwrap();
        assert!(url.starts_with("https://medium.com/@growth-team/link-building-101-"));

        let url = publisher.publish("Hello", "Body", "telegraph").await.unwrap();
        assert!(url.starts_with("https://telegra.ph/hello-"));
    }

    #[tokio::test]
    async fn test_unknown_destination() {
        let publisher = SimulatedPublisher::default();
        let err = publisher.publish("t", "c", "myspace").await.unwrap_err();
        assert!(matches!(err, CampaignError::Configuration(_)));
    }
}
