use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
};
use platform_api::ApiResult;
use products_hr::payroll::{
    self, CreatePayrollInput, MyPayrollQuery, PayrollQuery, ProcessInput, StatusInput,
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload, Query}, message};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/my-payroll", get(mine))
        .route("/process", post(process))
        .route("/{id}/status", put(update_status))
        .route("/{id}", delete(remove))
}

async fn mine(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<MyPayrollQuery>,
) -> ApiResult<Json<Value>> {
    let mine = payroll::my_payroll(&state.db, &actor, query).await?;
    Ok(Json(json!({
        "payrollRecords": mine.records.items,
        "pagination": mine.records.pagination,
        "yearlySummary": mine.yearly_summary,
    })))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<PayrollQuery>,
) -> ApiResult<Json<Value>> {
    let listing = payroll::list(&state.db, &actor, query).await?;
    Ok(Json(json!({
        "payrollRecords": listing.records.items,
        "pagination": listing.records.pagination,
        "summary": listing.summary,
    })))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<CreatePayrollInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let record = payroll::create(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        done("Payroll record created successfully", "payrollRecord", record),
    ))
}

async fn process(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<ProcessInput>,
) -> ApiResult<Json<Value>> {
    let outcome = payroll::process(&state.db, &actor, input).await?;
    Ok(Json(json!(outcome)))
}

async fn update_status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<StatusInput>,
) -> ApiResult<Json<Value>> {
    let record = payroll::update_status(&state.db, &actor, id, input).await?;
    Ok(done("Payroll status updated successfully", "payrollRecord", record))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    payroll::delete(&state.db, &actor, id).await?;
    Ok(message("Payroll record deleted successfully"))
}
