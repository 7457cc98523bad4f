//! Driven port for the outbound mail transport.

use async_trait::async_trait;
use thiserror::Error as ThisError;

/// Failures surfaced by a mail transport adapter.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum MailError {
    #[error("mail transport unavailable: {0}")]
    Transient(String),
}

impl From<MailError> for crate::domain::Error {
    fn from(err: MailError) -> Self {
        crate::domain::Error::internal(err.to_string())
    }
}

/// Minimal mail transport used by the password-reset workflow.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Deliver a plain-text message.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}
