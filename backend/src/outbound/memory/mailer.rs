//! Recording mail transport.

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::info;

use crate::domain::ports::{MailError, Mailer};

/// A captured outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mail adapter that records every message and logs the delivery.
///
/// Stands in for the real transport in development and lets tests assert on
/// what would have been sent.
#[derive(Default)]
pub struct RecordingMailer {
    sent: RwLock<Vec<SentMail>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything sent so far.
    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.read().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!(to = %to, subject = %subject, "mail dispatched");
        self.sent.write().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
