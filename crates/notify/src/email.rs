//! SMTP email delivery via lettre.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::info;

use voltdesk_core::error::NotifyError;
use voltdesk_core::notify::Notifier;

/// SMTP settings. All fields must be present for delivery to happen.
#[derive(Clone, Default)]
pub struct EmailSettings {
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    /// Falls back to `smtp_user` when absent.
    pub from_address: Option<String>,
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_user", &self.smtp_user)
            .field("smtp_pass", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

/// Email sender over SMTP with STARTTLS.
pub struct EmailNotifier {
    settings: EmailSettings,
    mailer: Option<AsyncSmtpTransport<Tokio1Executor>>,
}

impl EmailNotifier {
    /// Build the notifier. Incomplete settings yield a sender that reports
    /// `NotConfigured` on every send instead of failing construction.
    pub fn new(settings: EmailSettings) -> Result<Self, NotifyError> {
        let mailer = match (&settings.smtp_host, &settings.smtp_user, &settings.smtp_pass) {
            (Some(host), Some(user), Some(pass)) => {
                let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
                    .map_err(|e| NotifyError::NotConfigured(format!("SMTP relay: {e}")))?
                    .port(settings.smtp_port)
                    .credentials(Credentials::new(user.clone(), pass.clone()))
                    .build();
                Some(transport)
            }
            _ => None,
        };
        Ok(Self { settings, mailer })
    }

    fn from_mailbox(&self) -> Result<Mailbox, NotifyError> {
        let from = self
            .settings
            .from_address
            .as_ref()
            .or(self.settings.smtp_user.as_ref())
            .ok_or_else(|| NotifyError::NotConfigured("no from address".into()))?;
        from.parse()
            .map_err(|e| NotifyError::NotConfigured(format!("bad from address: {e}")))
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        let Some(mailer) = &self.mailer else {
            return Err(NotifyError::NotConfigured("SMTP not configured".into()));
        };

        let to: Mailbox = recipient.parse().map_err(|e| NotifyError::DeliveryFailed {
            recipient: recipient.to_string(),
            reason: format!("bad recipient address: {e}"),
        })?;

        let message = Message::builder()
            .from(self.from_mailbox()?)
            .to(to)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| NotifyError::DeliveryFailed {
                recipient: recipient.to_string(),
                reason: format!("message build: {e}"),
            })?;

        mailer
            .send(message)
            .await
            .map_err(|e| NotifyError::DeliveryFailed {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })?;

        info!(recipient = %recipient, "Email delivered");
        Ok(())
    }
}
