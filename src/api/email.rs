//! Outbound email abstraction.
//!
//! Flows that need to notify a user (verification links, reset links,
//! email-change confirmations) build an `EmailMessage` and hand it to an
//! `EmailSender`. Delivery is best-effort: the handlers log a failure and
//! carry on, so a broken mail path never aborts an otherwise successful
//! registration or reset request.
//!
//! The default sender for local dev is `LogEmailSender`, which logs the
//! payload and returns `Ok(())`. A real deployment swaps in an SMTP or
//! API-backed implementation of the same trait.

use anyhow::Result;
use serde_json::json;
use tracing::{info, warn};

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub template: String,
    pub payload_json: String,
}

impl EmailMessage {
    /// Build a message carrying a single action link.
    ///
    /// The link embeds the plaintext token; it exists only in transit and
    /// is never persisted.
    #[must_use]
    pub fn with_link(to_email: &str, template: &str, link: &str) -> Self {
        let payload = json!({
            "email": to_email,
            "link": link,
        });
        Self {
            to_email: to_email.to_string(),
            template: template.to_string(),
            payload_json: payload.to_string(),
        }
    }
}

/// Email delivery abstraction used by the auth flows.
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error.
    fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the payload instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            template = %message.template,
            payload = %message.payload_json,
            "email send stub"
        );
        Ok(())
    }
}

/// Send a message, logging instead of failing the request on error.
pub(crate) fn send_best_effort(sender: &dyn EmailSender, message: &EmailMessage) {
    if let Err(err) = sender.send(message) {
        warn!(
            to_email = %message.to_email,
            template = %message.template,
            "Failed to send email: {err:#}"
        );
    }
}
