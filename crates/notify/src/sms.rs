//! SMS delivery through the Twilio REST API.

use async_trait::async_trait;
use tracing::info;

use voltdesk_core::error::NotifyError;
use voltdesk_core::notify::Notifier;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Twilio credentials. All fields must be present for delivery to happen.
#[derive(Clone, Default)]
pub struct SmsSettings {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from_number: Option<String>,
}

impl std::fmt::Debug for SmsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmsSettings")
            .field("account_sid", &self.account_sid)
            .field("auth_token", &"[REDACTED]")
            .field("from_number", &self.from_number)
            .finish()
    }
}

/// SMS sender backed by the Twilio Messages endpoint.
pub struct SmsNotifier {
    settings: SmsSettings,
    client: reqwest::Client,
    api_base: String,
}

impl SmsNotifier {
    pub fn new(settings: SmsSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
            api_base: TWILIO_API_BASE.to_string(),
        }
    }

    /// Point at a different API host (tests).
    #[cfg(test)]
    fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.to_string();
        self
    }
}

#[async_trait]
impl Notifier for SmsNotifier {
    fn name(&self) -> &str {
        "sms"
    }

    async fn send(&self, recipient: &str, _subject: &str, body: &str) -> Result<(), NotifyError> {
        let (Some(sid), Some(token), Some(from)) = (
            &self.settings.account_sid,
            &self.settings.auth_token,
            &self.settings.from_number,
        ) else {
            return Err(NotifyError::NotConfigured("Twilio not configured".into()));
        };

        let url = format!("{}/Accounts/{}/Messages.json", self.api_base, sid);
        let response = self
            .client
            .post(&url)
            .basic_auth(sid, Some(token))
            .form(&[("To", recipient), ("From", from), ("Body", body)])
            .send()
            .await
            .map_err(|e| NotifyError::DeliveryFailed {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::DeliveryFailed {
                recipient: recipient.to_string(),
                reason: format!("Twilio returned {}", response.status()),
            });
        }

        info!(recipient = %recipient, "SMS delivered");
        Ok(())
    }
}
