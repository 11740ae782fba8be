use axum::{
    Json, Router,
    extract::State,
    routing::get,
};
use platform_api::ApiResult;
use products_hr::audit::{self, AuditQuery};
use serde_json::Value;

use super::{AppState, extract::{AuthUser, Query}, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new().route("/", get(list))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Value>> {
    let page = audit::recent(&state.db, &actor, query).await?;
    Ok(paged("auditLogs", page))
}
