//! Notification trait — out-of-band delivery of reset tokens.
//!
//! Senders are invoked fire-and-forget: a failed delivery is logged, never
//! surfaced to the HTTP caller.

use async_trait::async_trait;

use crate::error::NotifyError;

/// A one-way message sender (email, SMS).
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name for logging ("email", "sms").
    fn name(&self) -> &str;

    /// Deliver `body` to `recipient`. `subject` is ignored by transports
    /// without one.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}
