use async_trait::async_trait;
use serde_json::json;
use tracing::{info, warn};

use crate::{Delivery, Mailer, NotifyError, OutgoingEmail};

pub const RESEND_ENDPOINT: &str = "https://api.resend.com/emails";

#[derive(Clone, Debug)]
pub struct ResendConfig {
    pub api_key: String,
    pub from: String,
}

#[derive(Clone, Debug)]
pub struct ResendClient {
    http: reqwest::Client,
    config: ResendConfig,
}

impl ResendClient {
    pub fn new(config: ResendConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Mailer for ResendClient {
    async fn send(&self, email: OutgoingEmail) -> Result<Delivery, NotifyError> {
        let body = json!({
            "from": self.config.from,
            "to": [email.to],
            "subject": email.subject,
            "text": email.text,
        });
        let response = self
            .http
            .post(RESEND_ENDPOINT)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        if response_ok(status) {
            info!(status, "resend accepted message");
            Ok(Delivery { status, detail })
        } else {
            warn!(status, detail = %detail, "resend rejected message");
            Err(NotifyError::Upstream { status, detail })
        }
    }

    fn name(&self) -> &'static str {
        "resend"
    }
}

fn response_ok(status: u16) -> bool {
    (200..300).contains(&status)
}
