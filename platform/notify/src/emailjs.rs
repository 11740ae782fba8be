use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::{Delivery, NotifyError};

pub const EMAILJS_ENDPOINT: &str = "https://api.emailjs.com/api/v1.0/email/send";

#[derive(Clone, Debug, Default)]
pub struct EmailJsConfig {
    pub service_id: Option<String>,
    pub template_id: Option<String>,
    pub public_key: Option<String>,
    pub fallback_recipient: Option<String>,
    pub endpoint: Option<String>,
}

impl EmailJsConfig {
    pub fn is_configured(&self) -> bool {
        self.service_id.is_some() && self.template_id.is_some() && self.public_key.is_some()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback_recipient.is_some()
    }
}

/// Template parameters of the application auto-reply.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AutoReply {
    pub to_name: String,
    pub to_email: String,
    pub job_applied: String,
    pub application_id: String,
    pub summary: String,
}

impl AutoReply {
    pub fn message(&self) -> String {
        format!(
            "Hi {}, we received your application for {}. Application ID: {}",
            self.to_name, self.job_applied, self.application_id
        )
    }
}

#[derive(Clone, Debug)]
pub struct EmailJsClient {
    http: reqwest::Client,
    config: EmailJsConfig,
}

impl EmailJsClient {
    pub fn new(config: EmailJsConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &EmailJsConfig {
        &self.config
    }

    /// Use the configured fallback when the caller sent no recipient.
    pub fn resolve_recipient(&self, to_email: Option<String>) -> Option<String> {
        match to_email.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            Some(email) => Some(email),
            None => {
                let fallback = self.config.fallback_recipient.clone();
                if fallback.is_some() {
                    warn!("to_email missing; using fallback recipient");
                }
                fallback
            }
        }
    }

    pub fn payload(&self, reply: &AutoReply) -> Result<Value, NotifyError> {
        let (Some(service), Some(template), Some(key)) = (
            self.config.service_id.as_deref(),
            self.config.template_id.as_deref(),
            self.config.public_key.as_deref(),
        ) else {
            return Err(NotifyError::NotConfigured(
                "EmailJS environment variables missing. Please set EMAILJS_SERVICE_ID, \
                 EMAILJS_TEMPLATE_ID, EMAILJS_PUBLIC_KEY"
                    .into(),
            ));
        };
        Ok(json!({
            "service_id": service,
            "template_id": template,
            "user_id": key,
            "template_params": {
                "to_name": reply.to_name,
                "to_email": reply.to_email,
                "job_applied": reply.job_applied,
                "application_id": reply.application_id,
                "summary": reply.summary,
                "message": reply.message(),
            }
        }))
    }

    pub async fn send_auto_reply(&self, reply: &AutoReply) -> Result<Delivery, NotifyError> {
        let payload = self.payload(reply)?;
        let endpoint = self.config.endpoint.as_deref().unwrap_or(EMAILJS_ENDPOINT);
        let response = self
            .http
            .post(endpoint)
            .header("Origin", "http://localhost")
            .json(&payload)
            .send()
            .await
            .map_err(|err| NotifyError::Transport(err.to_string()))?;
        let status = response.status().as_u16();
        let detail = response.text().await.unwrap_or_default();
        if (200..300).contains(&status) {
            info!(status, to = %reply.to_email, "auto-reply sent");
            Ok(Delivery { status, detail })
        } else {
            warn!(status, detail = %detail, "EmailJS rejected auto-reply");
            Err(NotifyError::Upstream { status, detail })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply() -> AutoReply {
        AutoReply {
            to_name: "Ada".into(),
            to_email: "ada@example.test".into(),
            job_applied: "General".into(),
            application_id: "N/A".into(),
            summary: String::new(),
        }
    }

    fn configured() -> EmailJsConfig {
        EmailJsConfig {
            service_id: Some("svc".into()),
            template_id: Some("tpl".into()),
            public_key: Some("pk".into()),
            fallback_recipient: Some("hr@example.test".into()),
            endpoint: None,
        }
    }

    #[test]
    fn payload_carries_template_params_and_message() {
        let client = EmailJsClient::new(configured());
        let payload = client.payload(&reply()).unwrap();
        assert_eq!(payload["service_id"], "svc");
        assert_eq!(payload["user_id"], "pk");
        assert_eq!(
            payload["template_params"]["message"],
            "Hi Ada, we received your application for General. Application ID: N/A"
        );
    }

    #[test]
    fn unconfigured_client_refuses_payload() {
        let client = EmailJsClient::new(EmailJsConfig::default());
        assert!(matches!(
            client.payload(&reply()),
            Err(NotifyError::NotConfigured(_))
        ));
    }

    #[test]
    fn fallback_recipient_fills_blank_address() {
        let client = EmailJsClient::new(configured());
        assert_eq!(
            client.resolve_recipient(Some("  ".into())).as_deref(),
            Some("hr@example.test")
        );
        assert_eq!(
            client.resolve_recipient(Some("x@y.z".into())).as_deref(),
            Some("x@y.z")
        );
    }
}
