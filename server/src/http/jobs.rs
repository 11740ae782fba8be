use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use platform_api::ApiResult;
use products_hr::recruitment::{
    self, ApplicationStatusInput, JobPostingInput, JobQuery, PublicJobQuery,
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload, Query}, message, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/public", get(public_list))
        .route("/public/{id}", get(public_show))
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/publish", post(publish))
        .route("/{id}/close", post(close))
        .route("/{id}/applications", get(applications))
        .route("/applications/{application_id}/status", put(application_status))
}

async fn public_list(
    State(state): State<AppState>,
    Query(query): Query<PublicJobQuery>,
) -> ApiResult<Json<Value>> {
    let page = recruitment::public_list(&state.db, query).await?;
    Ok(paged("jobPostings", page))
}

async fn public_show(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    let job = recruitment::public_get(&state.db, id).await?;
    Ok(Json(json!({ "jobPosting": job })))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<JobQuery>,
) -> ApiResult<Json<Value>> {
    let page = recruitment::list(&state.db, &actor, query).await?;
    Ok(paged("jobPostings", page))
}

async fn show(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let job = recruitment::get(&state.db, &actor, id).await?;
    Ok(Json(json!({ "jobPosting": job })))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<JobPostingInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let job = recruitment::create(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        done("Job posting created successfully", "jobPosting", job),
    ))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<JobPostingInput>,
) -> ApiResult<Json<Value>> {
    let job = recruitment::update(&state.db, &actor, id, input).await?;
    Ok(done("Job posting updated successfully", "jobPosting", job))
}

async fn publish(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let job = recruitment::publish(&state.db, &actor, id).await?;
    Ok(done("Job posting published successfully", "jobPosting", job))
}

async fn close(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let job = recruitment::close(&state.db, &actor, id).await?;
    Ok(done("Job posting closed successfully", "jobPosting", job))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    recruitment::delete(&state.db, &actor, id).await?;
    Ok(message("Job posting deleted successfully"))
}

async fn applications(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let applications = recruitment::applications_for_job(&state.db, &actor, id).await?;
    Ok(Json(json!({ "applications": applications })))
}

async fn application_status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(application_id): Path<Uuid>,
    Payload(input): Payload<ApplicationStatusInput>,
) -> ApiResult<Json<Value>> {
    let decision = recruitment::update_application_status(
        &state.db,
        &actor,
        application_id,
        input,
        state.mailer.as_ref(),
        &state.config.company_name,
    )
    .await?;
    Ok(Json(json!({
        "message": "Application status updated successfully",
        "application": decision.application,
        "emailSent": decision.email_sent,
    })))
}
