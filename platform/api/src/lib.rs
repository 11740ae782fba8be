use std::sync::Arc;

use async_graphql::{Error, ErrorExtensions};
use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::error;

/// Shared result type for service calls and handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// One failed check on a request payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Insufficient permissions")]
    Denied { required: String, role: String },
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error("Validation error")]
    Validation(Vec<FieldError>),
    #[error("{message}")]
    Conflict { message: String, field: String },
    #[error("{message}")]
    Rejected { code: &'static str, message: String },
    #[error("{detail}")]
    Upstream { status: u16, detail: String },
    #[error("{0}")]
    Misconfigured(String),
    #[error("internal server error")]
    Internal(Arc<anyhow::Error>),
}

impl ApiError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// A single-field validation failure.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }

    pub fn rejected(code: &'static str, message: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            message: message.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self::Internal(Arc::new(err))
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) | ApiError::Denied { .. } => "FORBIDDEN",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::InvalidInput(_) => "INVALID_INPUT",
            ApiError::Validation(_) => "VALIDATION",
            ApiError::Conflict { .. } => "CONFLICT",
            ApiError::Rejected { code, .. } => *code,
            ApiError::Upstream { .. } => "UPSTREAM",
            ApiError::Misconfigured(_) | ApiError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) | ApiError::Denied { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidInput(_)
            | ApiError::Validation(_)
            | ApiError::Conflict { .. }
            | ApiError::Rejected { .. } => StatusCode::BAD_REQUEST,
            ApiError::Upstream { status, .. } if *status >= 500 => StatusCode::BAD_GATEWAY,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Misconfigured(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body sent to REST clients. Internal causes never leave the process.
    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => json!({
                "message": self.to_string(),
                "errors": errors,
            }),
            ApiError::Denied { required, role } => json!({
                "message": self.to_string(),
                "required": required,
                "userRole": role,
            }),
            ApiError::Conflict { message, field } => json!({
                "message": message,
                "field": field,
            }),
            ApiError::Rejected { code, message } => json!({
                "message": message,
                "code": code,
            }),
            ApiError::Upstream { status, detail } => json!({
                "ok": false,
                "status": status,
                "detail": detail,
            }),
            _ => json!({ "message": self.to_string() }),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(value: anyhow::Error) -> Self {
        Self::internal(value)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::field("body", rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::field("path", rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::field("query", rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(cause) = &self {
            error!(error = ?cause, "internal error");
        }
        (self.status(), Json(self.body())).into_response()
    }
}

impl ErrorExtensions for ApiError {
    fn extend(&self) -> Error {
        let mut err = Error::new(self.to_string());
        err = err.extend_with(|_err, e| {
            e.set("code", self.code());
        });
        if let ApiError::Validation(errors) = self {
            let fields: Vec<String> = errors.iter().map(|e| e.field.clone()).collect();
            err = err.extend_with(|_err, e| {
                e.set("fields", fields.clone());
            });
        }
        err
    }
}

/// Convert any error into a GraphQL error payload while hiding internals.
pub fn internal_error(err: impl Into<anyhow::Error>) -> Error {
    ApiError::internal(err.into()).extend()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Value as GqlValue;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn internal_errors_are_masked() {
        let err = internal_error(anyhow::anyhow!("boom"));
        assert_eq!(err.message, "internal server error");
        let extra = err.extensions.as_ref().and_then(|map| map.get("code"));
        let code = extra.cloned();
        assert_eq!(code, Some(GqlValue::from("INTERNAL")));
    }

    #[tokio::test]
    async fn validation_errors_list_fields() {
        let err = ApiError::Validation(vec![
            FieldError::new("email", "Please provide a valid email address"),
            FieldError::new("password", "Password must be at least 6 characters long"),
        ]);
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation error");
        assert_eq!(body["errors"][1]["field"], "password");
    }

    #[tokio::test]
    async fn internal_response_hides_cause() {
        let (status, body) = body_json(ApiError::internal(anyhow::anyhow!("pg down"))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"message": "internal server error"}));
    }

    #[test]
    fn upstream_server_errors_become_bad_gateway() {
        let err = ApiError::Upstream {
            status: 503,
            detail: "unavailable".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        let err = ApiError::Upstream {
            status: 422,
            detail: "bad template".into(),
        };
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn rejected_uploads_carry_code() {
        let err = ApiError::rejected("INVALID_FILE_TYPE", "Invalid file type");
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_FILE_TYPE");
    }

    #[tokio::test]
    async fn missing_json_content_type_is_a_validation_error() {
        let err = ApiError::from(JsonRejection::from(
            axum::extract::rejection::MissingJsonContentType::default(),
        ));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Validation error");
        assert_eq!(body["errors"][0]["field"], "body");
    }

    #[tokio::test]
    async fn denied_reports_required_permission() {
        let err = ApiError::Denied {
            required: "payroll:write".into(),
            role: "EMPLOYEE".into(),
        };
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["required"], "payroll:write");
        assert_eq!(body["userRole"], "EMPLOYEE");
    }
}
