use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use platform_api::ApiResult;
use products_hr::departments::{self, DepartmentInput, DepartmentQuery};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload, Query}, message, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/hierarchy/tree", get(tree))
        .route("/{id}", get(show).put(update).delete(remove))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<DepartmentQuery>,
) -> ApiResult<Json<Value>> {
    let page = departments::list(&state.db, &actor, query).await?;
    Ok(paged("departments", page))
}

async fn show(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let department = departments::get(&state.db, &actor, id).await?;
    Ok(Json(json!({ "department": department })))
}

async fn tree(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Value>> {
    let tree = departments::tree(&state.db, &actor).await?;
    Ok(Json(json!(tree)))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<DepartmentInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let department = departments::create(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        done("Department created successfully", "department", department),
    ))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<DepartmentInput>,
) -> ApiResult<Json<Value>> {
    let department = departments::update(&state.db, &actor, id, input).await?;
    Ok(done("Department updated successfully", "department", department))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    departments::delete(&state.db, &actor, id).await?;
    Ok(message("Department deleted successfully"))
}
