use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::{get, post},
};
use platform_api::ApiResult;
use platform_notify::templates;
use products_hr::candidates::{
    self, ApplyInput, CandidateJobQuery, CandidateLoginInput, CandidateRegisterInput, PageQuery,
    ProfileInput,
};
use products_hr::recruitment;
use serde_json::{Value, json};
use tracing::warn;
use uuid::Uuid;

use super::{AppState, done, extract::{CandidateAuth, Path, Payload, Query}, paged, uploads::read_files};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/profile", get(profile).put(update_profile))
        .route("/resume", post(upload_resume))
        .route("/jobs", get(jobs))
        .route("/apply/{job_id}", post(apply))
        .route("/applications", get(applications))
}

async fn register(
    State(state): State<AppState>,
    Payload(input): Payload<CandidateRegisterInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let session = candidates::register(&state.db, &state.tokens, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Candidate registered successfully",
            "candidate": session.candidate,
            "token": session.token,
        })),
    ))
}

async fn login(
    State(state): State<AppState>,
    Payload(input): Payload<CandidateLoginInput>,
) -> ApiResult<Json<Value>> {
    let session = candidates::login(&state.db, &state.tokens, input).await?;
    Ok(Json(json!({
        "message": "Login successful",
        "candidate": session.candidate,
        "token": session.token,
    })))
}

async fn profile(State(state): State<AppState>, CandidateAuth(id): CandidateAuth) -> ApiResult<Json<Value>> {
    let candidate = candidates::profile(&state.db, id).await?;
    Ok(Json(json!({ "candidate": candidate })))
}

async fn update_profile(
    State(state): State<AppState>,
    CandidateAuth(id): CandidateAuth,
    Payload(input): Payload<ProfileInput>,
) -> ApiResult<Json<Value>> {
    let candidate = candidates::update_profile(&state.db, id, input).await?;
    Ok(done("Profile updated successfully", "candidate", candidate))
}

async fn upload_resume(
    State(state): State<AppState>,
    CandidateAuth(id): CandidateAuth,
    multipart: Multipart,
) -> ApiResult<Json<Value>> {
    let files = read_files(multipart, "resume").await?;
    let candidate = candidates::upload_resume(&state.db, &state.uploads, id, files).await?;
    Ok(Json(json!({
        "message": "Resume uploaded successfully",
        "resumePath": candidate.resume_path,
        "resumeOriginalName": candidate.resume_original_name,
    })))
}

async fn jobs(
    State(state): State<AppState>,
    CandidateAuth(_id): CandidateAuth,
    Query(query): Query<CandidateJobQuery>,
) -> ApiResult<Json<Value>> {
    let page = candidates::jobs(&state.db, query).await?;
    Ok(paged("jobs", page))
}

async fn apply(
    State(state): State<AppState>,
    CandidateAuth(id): CandidateAuth,
    Path(job_id): Path<Uuid>,
    body: Option<Payload<ApplyInput>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let input = body.map(|Payload(input)| input).unwrap_or_default();
    let application = candidates::apply(&state.db, id, job_id, input).await?;
    tokio::spawn(confirm_application(state.clone(), id, job_id));

    Ok((
        StatusCode::CREATED,
        done("Application submitted successfully", "application", application),
    ))
}

/// Best-effort confirmation mail; the application already stands.
async fn confirm_application(state: AppState, candidate_id: Uuid, job_id: Uuid) {
    let candidate = match candidates::profile(&state.db, candidate_id).await {
        Ok(candidate) => candidate,
        Err(err) => {
            warn!(error = %err, %candidate_id, "application confirmation skipped");
            return;
        }
    };
    let job = match recruitment::public_get(&state.db, job_id).await {
        Ok(job) => job,
        Err(err) => {
            warn!(error = %err, %job_id, "application confirmation skipped");
            return;
        }
    };
    let email = templates::application_received(
        &state.config.company_name,
        &job.job.title,
        &candidate.first_name,
        &candidate.email,
    );
    if let Err(err) = state.mailer.send(email).await {
        warn!(error = %err, "application confirmation not sent");
    }
}

async fn applications(
    State(state): State<AppState>,
    CandidateAuth(id): CandidateAuth,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let page = candidates::applications(&state.db, id, query).await?;
    Ok(paged("applications", page))
}
