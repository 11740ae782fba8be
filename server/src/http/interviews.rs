use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use platform_api::ApiResult;
use products_hr::interviews::{
    self, CancelInput, InterviewOutcome, InterviewQuery, RescheduleInput, ScheduleInput,
    StatusInput,
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload, Query}, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(schedule))
        .route("/{id}", get(show))
        .route("/{id}/status", put(update_status))
        .route("/{id}/reschedule", put(reschedule))
        .route("/{id}/cancel", put(cancel))
}

fn outcome_body(text: &str, outcome: InterviewOutcome) -> Json<Value> {
    Json(json!({
        "message": text,
        "interview": outcome.interview,
        "emailSent": outcome.email_sent,
    }))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<InterviewQuery>,
) -> ApiResult<Json<Value>> {
    let page = interviews::list(&state.db, &actor, query).await?;
    Ok(paged("interviews", page))
}

async fn show(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let interview = interviews::get(&state.db, &actor, id).await?;
    Ok(Json(json!({ "interview": interview })))
}

async fn schedule(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<ScheduleInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let outcome = interviews::schedule(
        &state.db,
        &actor,
        input,
        state.mailer.as_ref(),
        &state.config.company_name,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        outcome_body("Interview scheduled successfully", outcome),
    ))
}

async fn update_status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<StatusInput>,
) -> ApiResult<Json<Value>> {
    let interview = interviews::update_status(&state.db, &actor, id, input).await?;
    Ok(done("Interview status updated successfully", "interview", interview))
}

async fn reschedule(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<RescheduleInput>,
) -> ApiResult<Json<Value>> {
    let outcome = interviews::reschedule(
        &state.db,
        &actor,
        id,
        input,
        state.mailer.as_ref(),
        &state.config.company_name,
    )
    .await?;
    Ok(outcome_body("Interview rescheduled successfully", outcome))
}

async fn cancel(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    body: Option<Payload<CancelInput>>,
) -> ApiResult<Json<Value>> {
    let input = body.map(|Payload(input)| input).unwrap_or_default();
    let outcome = interviews::cancel(
        &state.db,
        &actor,
        id,
        input,
        state.mailer.as_ref(),
        &state.config.company_name,
    )
    .await?;
    Ok(outcome_body("Interview cancelled successfully", outcome))
}
