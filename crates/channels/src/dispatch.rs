//! SendGrid email dispatch.
//!
//! Builds the SendGrid v3 mail payload for each outreach message. Sending is
//! a stub: in production the payload is POSTed to
//! https://api.sendgrid.com/v3/mail/send and the `X-Message-Id` header becomes
//! the provider reference.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use autopilot_core::channels::{DispatchReceipt, MessageDispatcher};
use autopilot_core::error::{CampaignError, CampaignResult};
use autopilot_core::types::DeliveryStatus;

#[derive(Debug, Clone)]
pub struct SendGridSettings {
    pub from_email: String,
    pub from_name: String,
    pub open_tracking: bool,
    pub click_tracking: bool,
}

impl SendGridSettings {
    pub fn new(from_email: impl Into<String>, from_name: impl Into<String>) -> Self {
        Self {
            from_email: from_email.into(),
            from_name: from_name.into(),
            open_tracking: true,
            click_tracking: true,
        }
    }
}

/// SendGrid-backed [`MessageDispatcher`].
pub struct SendGridDispatcher {
    settings: SendGridSettings,
    /// Messages accepted per recipient address.
    sent_per_recipient: DashMap<String, u64>,
}

impl SendGridDispatcher {
    pub fn new(settings: SendGridSettings) -> Self {
        info!(
            from = %settings.from_email,
            open_tracking = settings.open_tracking,
            "SendGrid dispatcher initialized"
        );
        Self {
            settings,
            sent_per_recipient: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &SendGridSettings {
        &self.settings
    }

    pub fn sent_to(&self, recipient: &str) -> u64 {
        self.sent_per_recipient
            .get(&recipient.to_lowercase())
            .map(|c| *c.value())
            .unwrap_or(0)
    }

    fn payload(&self, to: &str, subject: &str, body: &str) -> serde_json::Value {
        serde_json::json!({
            "personalizations": [{
                "to": [{"email": to}],
            }],
            "from": {
                "email": self.settings.from_email,
                "name": self.settings.from_name
            },
            "subject": subject,
            "content": [{
                "type": "text/plain",
                "value": body
            }],
            "tracking_settings": {
                "click_tracking": {"enable": self.settings.click_tracking},
                "open_tracking": {"enable": self.settings.open_tracking}
            }
        })
    }
}

#[async_trait]
impl MessageDispatcher for SendGridDispatcher {
    async fn send(&self, to: &str, subject: &str, body: &str) -> CampaignResult<DispatchReceipt> {
        let to = to.trim();
        if to.is_empty() || !to.contains('@') {
            warn!(to = %to, "SendGrid rejected recipient");
            metrics::counter!("sendgrid.rejected").increment(1);
            return Err(CampaignError::TransientDispatch(format!(
                "recipient '{}' rejected by provider",
                to
            )));
        }

        let payload = self.payload(to, subject, body);
        debug!(
            to = %to,
            subject = %subject,
            bytes = payload.to_string().len(),
            "Sending email via SendGrid"
        );

        *self
            .sent_per_recipient
            .entry(to.to_lowercase())
            .or_insert(0) += 1;
        metrics::counter!("sendgrid.emails_sent").increment(1);

        Ok(DispatchReceipt {
            provider_ref: format!("sg-{}", uuid::Uuid::new_v4()),
            status: DeliveryStatus::Queued,
        })
    }
}
