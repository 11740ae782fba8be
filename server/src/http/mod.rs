//! HTTP surface: router assembly, shared state and cross-cutting layers.
//!
//! Handlers live in one module per resource and stay thin: they extract the
//! caller, hand the payload to the matching `products_hr` service and shape
//! the JSON answer.

mod attendance;
mod audit;
mod auth;
mod candidates;
mod departments;
mod email;
mod employees;
pub mod extract;
mod interviews;
mod jobs;
mod leave;
mod onboarding;
mod payroll;
mod performance;
mod reports;
mod uploads;

use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use async_graphql_axum::{GraphQLRequest, GraphQLResponse};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Request, State},
    http::{self, HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use platform_authn::{TokenKind, TokenService};
use platform_db::DbPool;
use platform_notify::{EmailJsClient, LogMailer, Mailer, ResendClient};
use products_hr::Paged;
use products_hr::audit::{self as audit_trail, AuditEntry};
use products_hr::uploads::UploadStore;
use sea_orm::{ConnectionTrait, Statement};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    graphql::{self, SchemaType},
};
use extract::AuthUser;

/// Five 20 MiB documents plus multipart framing.
const MAX_BODY_BYTES: usize = 101 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub schema: SchemaType,
    pub config: Arc<AppConfig>,
    pub tokens: Arc<TokenService>,
    pub uploads: UploadStore,
    pub mailer: Arc<dyn Mailer>,
    pub emailjs: Arc<EmailJsClient>,
    pub default_org_id: Uuid,
}

impl AppState {
    pub fn new(db: DbPool, config: AppConfig, default_org_id: Uuid) -> Self {
        let mailer: Arc<dyn Mailer> = match config.resend.clone() {
            Some(resend) => Arc::new(ResendClient::new(resend)),
            None => Arc::new(LogMailer),
        };
        info!(provider = mailer.name(), "decision mails configured");
        Self {
            schema: graphql::build_schema(db.clone()),
            tokens: Arc::new(TokenService::new(config.tokens.clone())),
            uploads: UploadStore::new(config.upload_dir.clone()),
            emailjs: Arc::new(EmailJsClient::new(config.emailjs.clone())),
            mailer,
            config: Arc::new(config),
            default_org_id,
            db,
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "hrms server listening");
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

/// Credentialed CORS cannot answer with `*`, so a wildcard or empty list
/// echoes the caller's origin instead.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let wildcard = origins.is_empty() || origins.iter().any(|origin| origin == "*");
    let allow_origin = if wildcard {
        AllowOrigin::mirror_request()
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok()),
        )
    };
    CorsLayer::new()
        .allow_credentials(true)
        .allow_headers([http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/health", get(health_handler))
        .route("/graphql", post(graphql_handler))
        .nest("/api/auth", auth::routes())
        .nest("/api/employees", employees::routes())
        .nest("/api/departments", departments::routes())
        .nest("/api/attendance", attendance::routes())
        .nest("/api/leave-requests", leave::routes())
        .nest("/api/payroll", payroll::routes())
        .nest("/api/performance-reviews", performance::routes())
        .nest("/api/job-postings", jobs::routes())
        .nest("/api/candidates", candidates::routes())
        .nest("/api/interviews", interviews::routes())
        .nest("/api/onboarding", onboarding::routes())
        .nest("/api/reports", reports::routes())
        .nest("/api/uploads", uploads::routes())
        .nest("/api/files", uploads::file_routes())
        .nest("/api/email", email::routes())
        .nest("/api/audit-logs", audit::routes())
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), audit_mutations))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// Prefixes whose writes are not staff mutations and stay out of the trail.
const UNAUDITED: [&str; 4] = ["/api/auth", "/api/candidates", "/api/email", "/graphql"];

/// Account administration lives under `/api/auth` but is audited.
const AUDITED_ACCOUNTS: &str = "/api/auth/users";

fn is_audited_path(path: &str) -> bool {
    path.starts_with("/api/")
        && (path.starts_with(AUDITED_ACCOUNTS)
            || !UNAUDITED.iter().any(|prefix| path.starts_with(prefix)))
}

/// Append an audit row for every successful staff mutation. The write runs on
/// its own task; a failure is logged and never reaches the client.
async fn audit_mutations(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let auditable = audit_trail::action_for(method.as_str()).is_some() && is_audited_path(&path);
    let caller = auditable
        .then(|| extract::bearer_or_cookie(request.headers()))
        .flatten()
        .and_then(|token| state.tokens.verify(&token, TokenKind::Access).ok())
        .and_then(|claims| claims.org.map(|org| (org, claims.sub)));

    let response = next.run(request).await;

    if let Some((org_id, user_id)) = caller {
        if response.status().is_success() {
            let db = state.db.clone();
            let entry = AuditEntry {
                org_id,
                user_id,
                method: method.to_string(),
                path,
            };
            tokio::spawn(async move {
                if let Err(err) = audit_trail::record(&db, entry).await {
                    warn!(error = %err, "failed to write audit log");
                }
            });
        }
    }
    response
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "message": "Route not found" })),
    )
}

async fn graphql_handler(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    request: GraphQLRequest,
) -> GraphQLResponse {
    let request = request.into_inner().data(actor);
    state.schema.execute(request).await.into()
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let backend = state.db.get_database_backend();
    let db_ok = state
        .db
        .execute(Statement::from_string(backend, "SELECT 1".to_string()))
        .await
        .is_ok();
    Json(HealthResponse {
        status: "OK",
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now().to_rfc3339(),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    db_ok: bool,
    version: &'static str,
    timestamp: String,
}

/// `{ <key>: [...], pagination: {...} }`, the list envelope every resource uses.
pub(crate) fn paged<T: Serialize>(key: &str, page: Paged<T>) -> Json<Value> {
    let mut body = Map::new();
    body.insert(key.to_string(), json!(page.items));
    body.insert("pagination".into(), json!(page.pagination));
    Json(Value::Object(body))
}

/// `{ message, <key>: value }` for writes.
pub(crate) fn done<T: Serialize>(message: &str, key: &str, value: T) -> Json<Value> {
    let mut body = Map::new();
    body.insert("message".into(), json!(message));
    body.insert(key.to_string(), json!(value));
    Json(Value::Object(body))
}

pub(crate) fn message(message: &str) -> Json<Value> {
    Json(json!({ "message": message }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        signal(SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use axum::body::Body;
    use tower::{ServiceExt, service_fn};

    use super::*;

    async fn preflight(origins: &[String], origin: &str) -> Option<HeaderValue> {
        let service = ServiceBuilder::new()
            .layer(cors_layer(origins))
            .service(service_fn(|_: Request| async {
                Ok::<_, Infallible>(Response::new(Body::empty()))
            }));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/employees")
            .header(http::header::ORIGIN, origin)
            .header(http::header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let response = service.oneshot(request).await.unwrap();
        response
            .headers()
            .get(http::header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .cloned()
    }

    #[tokio::test]
    async fn wildcard_origins_echo_the_caller() {
        for origins in [vec![], vec!["*".to_string()]] {
            let allowed = preflight(&origins, "https://hr.example.com").await;
            assert_eq!(allowed.unwrap(), "https://hr.example.com");
        }
    }

    #[test]
    fn account_admin_is_audited_but_sessions_are_not() {
        assert!(is_audited_path("/api/auth/users/123/status"));
        assert!(!is_audited_path("/api/auth/login"));
        assert!(!is_audited_path("/api/candidates/apply"));
        assert!(is_audited_path("/api/interviews"));
        assert!(!is_audited_path("/graphql"));
    }

    #[tokio::test]
    async fn listed_origins_are_the_only_ones_allowed() {
        let origins = vec!["https://hr.example.com".to_string()];
        assert!(preflight(&origins, "https://hr.example.com").await.is_some());
        assert!(preflight(&origins, "https://evil.example.com").await.is_none());
    }
}
