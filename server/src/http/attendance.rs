use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};
use platform_api::ApiResult;
use products_hr::attendance::{
    self, AttendanceQuery, ClockInput, ManualAttendanceInput, MyAttendanceQuery,
    UpdateAttendanceInput,
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload, Query}, message, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/clock-in", post(clock_in))
        .route("/clock-out", post(clock_out))
        .route("/my-attendance", get(mine))
        .route("/{id}", put(update).delete(remove))
}

async fn clock_in(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    body: Option<Payload<ClockInput>>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let input = body.map(|Payload(input)| input).unwrap_or_default();
    let record = attendance::clock_in(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        done("Clocked in successfully", "attendance", record),
    ))
}

async fn clock_out(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    body: Option<Payload<ClockInput>>,
) -> ApiResult<Json<Value>> {
    let input = body.map(|Payload(input)| input).unwrap_or_default();
    let record = attendance::clock_out(&state.db, &actor, input).await?;
    Ok(done("Clocked out successfully", "attendance", record))
}

async fn mine(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<MyAttendanceQuery>,
) -> ApiResult<Json<Value>> {
    let mine = attendance::my_attendance(&state.db, &actor, query).await?;
    Ok(Json(json!({
        "attendance": mine.records.items,
        "pagination": mine.records.pagination,
        "summary": mine.summary,
    })))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<AttendanceQuery>,
) -> ApiResult<Json<Value>> {
    let page = attendance::list(&state.db, &actor, query).await?;
    Ok(paged("attendance", page))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<ManualAttendanceInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let record = attendance::create(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        done("Attendance record created successfully", "attendance", record),
    ))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<UpdateAttendanceInput>,
) -> ApiResult<Json<Value>> {
    let record = attendance::update(&state.db, &actor, id, input).await?;
    Ok(done("Attendance record updated successfully", "attendance", record))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    attendance::delete(&state.db, &actor, id).await?;
    Ok(message("Attendance record deleted successfully"))
}
