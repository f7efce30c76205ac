//! Outreach email composition.
//!
//! Subject lines follow the campaign's template style; bodies follow its
//! personalization level and draw on the prospect's research payload when
//! present. A caller-supplied message always replaces the generated body.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use autopilot_core::types::{
    Campaign, MessageKind, PersonalizationLevel, Prospect, ResearchPayload, TemplateStyle,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposedEmail {
    pub subject: String,
    pub body: String,
}

/// Research fields the templates read, with fallbacks for missing keys.
struct ResearchView<'a> {
    payload: Option<&'a Value>,
}

impl<'a> ResearchView<'a> {
    fn new(research: Option<&'a ResearchPayload>) -> Self {
        Self {
            payload: research.map(|r| &r.0),
        }
    }

    fn text(&self, pointer: &str) -> Option<&'a str> {
        self.payload
            .and_then(|p| p.pointer(pointer))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    fn recent_post(&self) -> Option<&'a str> {
        self.text("/website_analysis/recent_posts/0")
    }

    fn writing_topic(&self) -> Option<&'a str> {
        self.text("/contact_research/writing_topics/0")
    }

    fn industry(&self) -> Option<&'a str> {
        self.text("/business_context/industry")
    }

    fn posting_frequency(&self) -> &'a str {
        self.text("/website_analysis/posting_frequency").unwrap_or("regular")
    }
}

#[derive(Debug, Clone, Default)]
pub struct EmailComposer;

impl EmailComposer {
    pub fn new() -> Self {
        Self
    }

    pub fn compose(
        &self,
        prospect: &Prospect,
        campaign: &Campaign,
        kind: MessageKind,
        custom_message: Option<&str>,
    ) -> ComposedEmail {
        let name = first_name(&prospect.contact_name);
        let company = prospect
            .company_name
            .as_deref()
            .or(prospect.domain.as_deref())
            .unwrap_or("your site");

        let base_subject = subject_for(campaign.template.template_style, name, company);
        let subject = match kind {
            MessageKind::Initial => base_subject,
            _ => format!("Re: {}", base_subject),
        };

        let body = match custom_message.map(str::trim).filter(|m| !m.is_empty()) {
            Some(message) => message.to_string(),
            None => {
                let research = ResearchView::new(prospect.research.as_ref());
                let text = match kind {
                    MessageKind::Initial => initial_body(campaign, name, company, &research),
                    _ => follow_up_body(campaign, kind, name, company),
                };
                format!("{}\n\n{}", text, sign_off(campaign))
            }
        };

        ComposedEmail { subject, body }
    }
}

fn first_name(contact_name: &str) -> &str {
    contact_name.split_whitespace().next().unwrap_or("there")
}

fn keywords(campaign: &Campaign, separator: &str) -> String {
    if campaign.template.target_keywords.is_empty() {
        "content marketing".to_string()
    } else {
        campaign.template.target_keywords.join(separator)
    }
}

fn subject_for(style: TemplateStyle, name: &str, company: &str) -> String {
    match style {
        TemplateStyle::Friendly => format!("Hey {}, loved your recent article!", name),
        TemplateStyle::Professional => format!("Partnership opportunity for {}", company),
        TemplateStyle::Collaborative => format!("Quick collaboration idea for {}", name),
        TemplateStyle::Authoritative => format!("Proven strategy that could help {}", company),
        TemplateStyle::Casual => format!("Quick question, {}", name),
        TemplateStyle::Academic => format!("Research-backed contribution for {}", company),
    }
}

fn initial_body(campaign: &Campaign, name: &str, company: &str, research: &ResearchView<'_>) -> String {
    let level = campaign.template.personalization_level;
    let primary_keyword = campaign
        .template
        .target_keywords
        .first()
        .map(String::as_str)
        .unwrap_or("content strategy");

    let basic = format!(
        "Hi {name},\n\n\
         I hope this email finds you well. I came across {company} and was impressed by the quality of your content.\n\n\
         I've written extensively about {topics} and would love to contribute to your platform.\n\n\
         Would you be interested in discussing a potential guest post opportunity?",
        topics = keywords(campaign, ", ")
    );

    let Some(post) = research.recent_post() else {
        return basic;
    };

    match level {
        PersonalizationLevel::Basic => basic,
        PersonalizationLevel::Medium => format!(
            "Hi {name},\n\n\
             I just read \"{post}\" and found your insights on {primary_keyword} particularly valuable.\n\n\
             As someone who specializes in {topics}, I've been following {company}'s content and believe there's a great opportunity to collaborate.\n\n\
             Would you be open to a brief discussion about a guest post?",
            topics = keywords(campaign, " and ")
        ),
        PersonalizationLevel::High | PersonalizationLevel::AiDeep => {
            let topic = research.writing_topic().unwrap_or(primary_keyword);
            let industry = research.industry().unwrap_or("your industry");
            let mut body = format!(
                "Hi {name},\n\n\
                 Your recent work on \"{post}\" caught my attention, especially your perspective on {topic}.\n\n\
                 I noticed {company} has been focusing on {industry} content, and given your {frequency} publishing schedule, you might be interested in a collaboration.\n\n\
                 I specialize in {topics} and would love to share insights that benefit your audience while contributing to your content goals.\n\n\
                 Would you be interested in a quick 10-minute call?",
                frequency = research.posting_frequency(),
                topics = keywords(campaign, ", ")
            );
            if level == PersonalizationLevel::AiDeep {
                body.push_str(&format!(
                    "\n\nP.S. I drafted an outline that builds directly on \"{post}\" so it slots into your existing series."
                ));
            }
            body
        }
    }
}

fn follow_up_body(campaign: &Campaign, kind: MessageKind, name: &str, company: &str) -> String {
    match kind {
        MessageKind::FollowUp1 => format!(
            "Hi {name},\n\n\
             Just following up on my earlier note about contributing a piece on {topics} to {company}. \
             Happy to send over a few topic ideas if that's easier.",
            topics = keywords(campaign, ", ")
        ),
        MessageKind::FollowUp2 => format!(
            "Hi {name},\n\n\
             I know inboxes get busy, so I'm bringing this back to the top. \
             I'd still love to write something useful for {company}'s readers."
        ),
        _ => format!(
            "Hi {name},\n\n\
             This will be my last note on this. If a guest post ever fits {company}'s plans, I'd be glad to help."
        ),
    }
}

fn sign_off(campaign: &Campaign) -> String {
    let from = if campaign.template.from_name.trim().is_empty() {
        "The Outreach Team"
    } else {
        campaign.template.from_name.trim()
    };
    match campaign.template.signature.as_deref().map(str::trim) {
        Some(signature) if !signature.is_empty() => format!("Best regards,\n{}\n{}", from, signature),
        _ => format!("Best regards,\n{}", from),
    }
}
