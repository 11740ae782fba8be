use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use entity::leave_requests::Status;
use platform_api::ApiResult;
use products_hr::leave::{self, DecisionInput, LeaveInput, LeaveQuery, MyLeavesQuery};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload, Query}, message, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/my-leaves", get(mine))
        .route("/pending", get(pending))
        .route("/{id}", get(show).delete(remove))
        .route("/{id}/approve", put(decide))
        .route("/{id}/cancel", put(cancel))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PendingQuery {
    department_id: Option<Uuid>,
    page: Option<u64>,
    limit: Option<u64>,
}

async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<LeaveInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let request = leave::create(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        done("Leave request submitted successfully", "leaveRequest", request),
    ))
}

async fn mine(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<MyLeavesQuery>,
) -> ApiResult<Json<Value>> {
    let mine = leave::my_leaves(&state.db, &actor, query).await?;
    Ok(Json(json!({
        "leaveRequests": mine.requests.items,
        "pagination": mine.requests.pagination,
        "leaveBalance": mine.leave_balance,
        "summary": mine.summary,
    })))
}

async fn pending(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<PendingQuery>,
) -> ApiResult<Json<Value>> {
    let page = leave::pending(&state.db, &actor, query.department_id, query.page, query.limit).await?;
    Ok(paged("pendingRequests", page))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<LeaveQuery>,
) -> ApiResult<Json<Value>> {
    let page = leave::list(&state.db, &actor, query).await?;
    Ok(paged("leaveRequests", page))
}

async fn show(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let request = leave::get(&state.db, &actor, id).await?;
    Ok(Json(json!({ "leaveRequest": request })))
}

async fn decide(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<DecisionInput>,
) -> ApiResult<Json<Value>> {
    let decided = leave::decide(&state.db, &actor, id, input).await?;
    let text = match decided.request.status {
        Status::Approved => "Leave request approved successfully",
        _ => "Leave request rejected successfully",
    };
    Ok(done(text, "leaveRequest", decided))
}

async fn cancel(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let request = leave::cancel(&state.db, &actor, id).await?;
    Ok(done("Leave request cancelled successfully", "leaveRequest", request))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    leave::delete(&state.db, &actor, id).await?;
    Ok(message("Leave request deleted successfully"))
}
