use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use platform_api::ApiResult;
use products_hr::performance::{
    self, CreateReviewInput, ReviewQuery, SelfRatingInput, UpdateReviewInput,
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload, Query}, message, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/my-reviews", get(mine))
        .route("/{id}", get(show).put(update).delete(remove))
        .route("/{id}/self-rating", post(self_rating))
}

async fn create(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<CreateReviewInput>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let review = performance::create(&state.db, &actor, input).await?;
    Ok((
        StatusCode::CREATED,
        done("Performance review created successfully", "review", review),
    ))
}

async fn list(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<ReviewQuery>,
) -> ApiResult<Json<Value>> {
    let page = performance::list(&state.db, &actor, query).await?;
    Ok(paged("reviews", page))
}

async fn mine(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Value>> {
    let mine = performance::my_reviews(&state.db, &actor).await?;
    Ok(Json(json!(mine)))
}

async fn show(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    let review = performance::get(&state.db, &actor, id).await?;
    Ok(Json(json!({ "review": review })))
}

async fn update(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<UpdateReviewInput>,
) -> ApiResult<Json<Value>> {
    let review = performance::update(&state.db, &actor, id, input).await?;
    Ok(done("Performance review updated successfully", "review", review))
}

async fn self_rating(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<SelfRatingInput>,
) -> ApiResult<Json<Value>> {
    let review = performance::self_rating(&state.db, &actor, id, input).await?;
    Ok(done("Self-rating submitted successfully", "review", review))
}

async fn remove(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    performance::delete(&state.db, &actor, id).await?;
    Ok(message("Performance review deleted successfully"))
}
