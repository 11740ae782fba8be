use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use platform_api::ApiResult;
use products_hr::employees::{self, CreateEmployeeInput, EmployeeQuery, UpdateEmployeeInput};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload, Query}, message, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/stats/overview", get(stats))
        .route("/team/{manager_id}", get(team))
        .route("/{id}", get(show).put(update).delete(deactivate))
        .route("/{id}/performance", get(performance))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<EmployeeQuery>,
) -> ApiResult<Json<Value>> {
    let page = employees::list(&state.db, &actor, query).await?;
    Ok(paged("employees", page))
}

async fn show(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let employee = employees::get(&state.db, &actor, id).await?;
    Ok(Json(json!({ "employee": employee })))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<CreateEmployeeInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let created = employees::create(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Employee created successfully",
            "employee": created.employee,
            "username": created.username,
            "role": created.role,
            "temporaryPassword": created.temporary_password,
        })),
    ))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<UpdateEmployeeInput>,
) -> ApiResult<Json<Value>> {
    let employee = employees::update(&state.db, &actor, id, input).await?;
    Ok(done("Employee updated successfully", "employee", employee))
}

async fn deactivate(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    employees::deactivate(&state.db, &actor, id).await?;
    Ok(message("Employee deactivated successfully"))
}

async fn stats(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Value>> {
    let stats = employees::stats(&state.db, &actor).await?;
    Ok(Json(json!(stats)))
}

async fn team(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(manager_id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let team = employees::team(&state.db, &actor, manager_id).await?;
    Ok(Json(json!({ "teamMembers": team })))
}

async fn performance(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let performance = employees::performance(&state.db, &actor, id).await?;
    Ok(Json(json!(performance)))
}
