//! Out-of-band notification senders for VoltDesk.
//!
//! Reset tokens leave the system through these adapters, invoked
//! fire-and-forget by the gateway. An unconfigured sender is a logged no-op
//! (`NotifyError::NotConfigured`), never a request failure.

pub mod email;
pub mod sms;

pub use email::{EmailNotifier, EmailSettings};
pub use sms::{SmsNotifier, SmsSettings};
