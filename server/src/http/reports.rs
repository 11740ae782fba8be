use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use platform_api::ApiResult;
use products_hr::reports::{self, HistoryQuery, ReportInput};
use serde_json::Value;

use super::{AppState, done, extract::{AuthUser, Payload, Query}, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/history", get(history))
}

async fn generate(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<ReportInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let report = reports::generate(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        done("Report generated successfully", "report", report),
    ))
}

async fn history(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Value>> {
    let page = reports::history(&state.db, &actor, query).await?;
    Ok(paged("reports", page))
}
