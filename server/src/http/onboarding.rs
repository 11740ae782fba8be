use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use platform_api::ApiResult;
use products_hr::onboarding::{self, ConvertInput, TaskUpdateInput};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload}};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/convert", post(convert))
        .route("/ready", get(ready))
        .route("/history", get(history))
        .route("/{employee_id}", get(status))
        .route("/{employee_id}/tasks/{task_id}", put(update_task))
}

async fn convert(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<ConvertInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let conversion = onboarding::convert(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        done(
            "Candidate successfully converted to employee",
            "conversion",
            conversion,
        ),
    ))
}

async fn ready(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Value>> {
    let candidates = onboarding::ready(&state.db, &actor).await?;
    Ok(Json(json!({ "candidates": candidates })))
}

async fn history(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Value>> {
    let conversions = onboarding::history(&state.db, &actor).await?;
    Ok(Json(json!({ "conversions": conversions })))
}

async fn status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(employee_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let onboarding = onboarding::status(&state.db, &actor, employee_id).await?;
    Ok(Json(json!({ "onboarding": onboarding })))
}

async fn update_task(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path((employee_id, task_id)): Path<(Uuid, Uuid)>,
    Payload(input): Payload<TaskUpdateInput>,
) -> ApiResult<Json<Value>> {
    let onboarding =
        onboarding::update_task(&state.db, &actor, employee_id, task_id, input).await?;
    Ok(done("Onboarding task updated successfully", "onboarding", onboarding))
}
