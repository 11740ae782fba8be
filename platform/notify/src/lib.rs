//! Outbound email.
//!
//! Two providers are wired: EmailJS for the templated application auto-reply
//! and Resend for recruitment decision mails. Both sit behind small clients so
//! the HTTP layer never builds provider payloads itself.

mod emailjs;
mod resend;
pub mod templates;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

pub use emailjs::{AutoReply, EMAILJS_ENDPOINT, EmailJsClient, EmailJsConfig};
pub use resend::{RESEND_ENDPOINT, ResendClient, ResendConfig};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotifyError {
    #[error("{0}")]
    NotConfigured(String),
    #[error("email transport failed: {0}")]
    Transport(String),
    #[error("email provider answered {status}")]
    Upstream { status: u16, detail: String },
}

/// Provider acknowledgement for a delivered message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Delivery {
    pub status: u16,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutgoingEmail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: OutgoingEmail) -> Result<Delivery, NotifyError>;

    fn name(&self) -> &'static str;
}

/// Used when no provider key is configured: the message only reaches the log.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<Delivery, NotifyError> {
        info!(to = %email.to, subject = %email.subject, "email provider disabled; message logged only");
        Ok(Delivery {
            status: 202,
            detail: "logged".into(),
        })
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Keeps every message in memory. Handy for tests and local demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl MemoryMailer {
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for MemoryMailer {
    async fn send(&self, email: OutgoingEmail) -> Result<Delivery, NotifyError> {
        self.sent.lock().await.push(email);
        Ok(Delivery {
            status: 200,
            detail: "stored".into(),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_mailer_records_messages() {
        let mailer = MemoryMailer::default();
        let email = OutgoingEmail {
            to: "ada@example.test".into(),
            subject: "Hello".into(),
            text: "Body".into(),
        };
        mailer.send(email.clone()).await.unwrap();
        assert_eq!(mailer.sent().await, vec![email]);
    }
}
