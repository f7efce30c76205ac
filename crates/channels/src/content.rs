use async_trait::async_trait;
use rand::Rng;
use tracing::debug;

use autopilot_core::channels::{ContentBrief, ContentGenerator, GeneratedContent};
use autopilot_core::error::{CampaignError, CampaignResult};

/// Number of prompt variants the generator rotates through.
pub const PROMPT_VARIANTS: u8 = 3;

/// Template-driven content generator. Each call picks one of three prompt
/// variants (long-form article, how-to guide, listicle) at random unless a
/// variant is pinned.
#[derive(Debug, Clone, Default)]
pub struct TemplateContentGenerator {
    pinned_variant: Option<u8>,
}

impl TemplateContentGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always use `variant` (1-based, clamped to the available range).
    pub fn with_variant(variant: u8) -> Self {
        Self {
            pinned_variant: Some(variant.clamp(1, PROMPT_VARIANTS)),
        }
    }

    fn render(variant: u8, brief: &ContentBrief) -> (String, String) {
        let keyword = brief.keyword.trim();
        let link = format!("[{}]({})", brief.anchor_text.trim(), brief.target_url.trim());
        let topic = title_case(keyword);

        match variant {
            1 => (
                format!("The Complete Guide to {}", topic),
                format!(
                    "# The Complete Guide to {topic}\n\n\
                     {topic} has moved from a niche concern to a core part of how teams grow. \
                     This guide walks through what matters, what to skip and where to start.\n\n\
                     ## Why {keyword} matters\n\n\
                     Teams that invest in {keyword} early compound the benefit over time. \
                     For a deeper walkthrough, see {link}.\n\n\
                     ## Getting started\n\n\
                     Start small, measure what changes and keep the feedback loop short.\n\n\
                     ## Conclusion\n\n\
                     {topic} rewards consistency more than intensity."
                ),
            ),
            2 => (
                format!("How to Get Results with {}", topic),
                format!(
                    "# How to Get Results with {topic}\n\n\
                     1. Define the outcome you want from {keyword}.\n\
                     2. Audit what you already have.\n\
                     3. Pick one change and ship it this week.\n\
                     4. Review the numbers after two weeks.\n\n\
                     A worked example of each step is available at {link}.\n\n\
                     Repeat the loop until the gains flatten, then pick the next lever."
                ),
            ),
            _ => (
                format!("7 {} Lessons Worth Knowing", topic),
                format!(
                    "# 7 {topic} Lessons Worth Knowing\n\n\
                     - Fundamentals beat tactics.\n\
                     - Measure before you optimise {keyword}.\n\
                     - Borrow what works: {link} collects proven patterns.\n\
                     - Write for people first.\n\
                     - Small, frequent improvements add up.\n\
                     - Revisit old work.\n\
                     - Share what you learn."
                ),
            ),
        }
    }
}

#[async_trait]
impl ContentGenerator for TemplateContentGenerator {
    async fn generate(&self, brief: &ContentBrief) -> CampaignResult<GeneratedContent> {
        if brief.keyword.trim().is_empty() || brief.anchor_text.trim().is_empty() {
            return Err(CampaignError::Validation(
                "content brief needs a keyword and anchor text".to_string(),
            ));
        }
        let url = brief.target_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(CampaignError::Validation(format!(
                "content brief target_url '{}' must be an http(s) URL",
                brief.target_url
            )));
        }

        let variant = self
            .pinned_variant
            .unwrap_or_else(|| rand::thread_rng().gen_range(1..=PROMPT_VARIANTS));
        let (title, content) = Self::render(variant, brief);
        debug!(variant = variant, keyword = %brief.keyword, "Content generated");

        Ok(GeneratedContent {
            title,
            content,
            prompt_variant: variant,
        })
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brief() -> ContentBrief {
        ContentBrief {
            keyword: "link building".into(),
            anchor_text: "our link building playbook".into(),
            target_url: "https://example.com/playbook".into(),
        }
    }

    #[tokio::test]
    async fn test_every_variant_embeds_link() {
        for variant in 1..=PROMPT_VARIANTS {
            let generated = TemplateContentGenerator::with_variant(variant)
                .generate(&brief())
                .await
                .unwrap();
            assert_eq!(generated.prompt_variant, variant);
            assert!(generated.title.contains("Link Building"));
            assert!(generated
                .content
                .contains("[our link building playbook](https://example.com/playbook)"));
        }
    }

    #[tokio::test]
    async fn test_random_variant_in_range() {
        let generator = TemplateContentGenerator::new();
        for _ in 0..20 {
            let generated = generator.generate(&brief()).await.unwrap();
            assert!((1..=PROMPT_VARIANTS).contains(&generated.prompt_variant));
        }
    }

    #[tokio::test]
    async fn test_invalid_brief() {
        let generator = TemplateContentGenerator::new();
        let mut bad = brief();
        bad.target_url = "example.com".into();
        assert!(matches!(
            generator.generate(&bad).await,
            Err(CampaignError::Validation(_))
        ));
    }

    #[test]
    fn test_pinned_variant_clamped() {
        assert_eq!(TemplateContentGenerator::with_variant(9).pinned_variant, Some(3));
        assert_eq!(TemplateContentGenerator::with_variant(0).pinned_variant, Some(1));
    }
}
