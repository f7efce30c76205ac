//! Prospect research from the contact's own details.
//!
//! Production: enrich from site crawls and social APIs. This researcher
//! derives a stable payload from the domain and contact fields so the
//! composer always has the keys it reads.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use autopilot_core::channels::ProspectResearcher;
use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::types::{Prospect, ResearchPayload};

#[derive(Debug, Clone, Default)]
pub struct HeuristicResearcher;

impl HeuristicResearcher {
    pub fn new() -> Self {
        Self
    }
}

fn site_of(prospect: &Prospect) -> Option<String> {
    prospect
        .domain
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_lowercase)
        .or_else(|| {
            prospect
                .contact_email
                .split_once('@')
                .map(|(_, host)| host.to_lowercase())
        })
}

#[async_trait]
impl ProspectResearcher for HeuristicResearcher {
    async fn research(&self, prospect: &Prospect) -> CampaignResult<ResearchPayload> {
        let site = site_of(prospect).ok_or_else(|| {
            CampaignError::TransientDispatch(format!(
                "no site to research for prospect {}",
                prospect.id
            ))
        })?;
        let brand = site.split('.').next().unwrap_or(site.as_str()).to_string();
        let handle: String = prospect
            .contact_name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("-");
        let company = prospect.company_name.clone().unwrap_or_else(|| brand.clone());

        debug!(prospect_id = %prospect.id, site = %site, "Researching prospect");

        Ok(ResearchPayload(json!({
            "website_analysis": {
                "domain": site,
                "accepts_guest_posts": true,
                "has_contact_page": true,
                "recent_posts": [format!("What's next for {}", company)],
                "posting_frequency": "weekly",
                "content_style": "professional",
            },
            "contact_research": {
                "social_profiles": [
                    format!("https://twitter.com/{}", handle.replace('-', "")),
                    format!("https://linkedin.com/in/{}", handle),
                ],
                "writing_topics": [format!("{} industry trends", brand)],
                "role": prospect.contact_title.clone().unwrap_or_else(|| "editor".to_string()),
            },
            "business_context": {
                "company": company,
                "industry": "digital media",
            },
        })))
    }
}
