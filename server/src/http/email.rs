use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use platform_api::{ApiError, ApiResult};
use platform_notify::{AutoReply, NotifyError};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{AppState, extract::Payload};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/send-auto-reply", post(send_auto_reply))
        .route("/health", get(health))
}

#[derive(Debug, Default, Deserialize)]
struct AutoReplyRequest {
    to_name: Option<String>,
    to_email: Option<String>,
    job_applied: Option<String>,
    application_id: Option<String>,
    summary: Option<String>,
}

fn notify_error(err: NotifyError) -> ApiError {
    match err {
        NotifyError::NotConfigured(message) => ApiError::Misconfigured(message),
        NotifyError::Upstream { status, detail } => ApiError::Upstream { status, detail },
        NotifyError::Transport(detail) => ApiError::Upstream { status: 502, detail },
    }
}

fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

async fn send_auto_reply(
    State(state): State<AppState>,
    Payload(request): Payload<AutoReplyRequest>,
) -> ApiResult<Json<Value>> {
    let to_email = state.emailjs.resolve_recipient(request.to_email);
    let to_name = request
        .to_name
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let (Some(to_name), Some(to_email)) = (to_name, to_email) else {
        return Err(ApiError::bad_request("to_name and to_email are required"));
    };
    let reply = AutoReply {
        to_name,
        to_email,
        job_applied: or_default(request.job_applied, "General"),
        application_id: or_default(request.application_id, "N/A"),
        summary: or_default(request.summary, ""),
    };
    let delivery = state
        .emailjs
        .send_auto_reply(&reply)
        .await
        .map_err(notify_error)?;
    Ok(Json(json!({
        "ok": true,
        "status": delivery.status,
        "detail": delivery.detail,
    })))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let config = state.emailjs.config();
    let configured = config.is_configured();
    Json(json!({
        "ok": true,
        "service": "emailjs",
        "configured": configured,
        "hasFallback": config.has_fallback(),
        "message": if configured {
            "EmailJS is configured"
        } else {
            "EmailJS environment variables missing"
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_failures_keep_their_status() {
        let err = notify_error(NotifyError::Upstream {
            status: 422,
            detail: "bad template".into(),
        });
        assert_eq!(err.status().as_u16(), 422);

        let err = notify_error(NotifyError::Upstream {
            status: 503,
            detail: "down".into(),
        });
        assert_eq!(err.status().as_u16(), 502);

        let err = notify_error(NotifyError::NotConfigured("missing keys".into()));
        assert_eq!(err.status().as_u16(), 500);
    }

    #[test]
    fn blank_fields_take_defaults() {
        assert_eq!(or_default(Some("  ".into()), "General"), "General");
        assert_eq!(or_default(Some(" Backend ".into()), "General"), "Backend");
        assert_eq!(or_default(None, "N/A"), "N/A");
    }
}
