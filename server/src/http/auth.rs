use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use platform_api::{ApiError, ApiResult};
use platform_authn::{ACCESS_COOKIE, REFRESH_COOKIE, TokenPair};
use products_hr::auth::{self, AuthSession, ChangePasswordInput, LoginInput, RegisterInput};
use products_hr::users::{self, UserQuery, UserStatusInput};
use serde::Deserialize;
use serde_json::{Value, json};
use time::Duration as TimeDuration;
use uuid::Uuid;

use super::{AppState, done, extract::{AuthUser, Path, Payload, Query}, message, paged};

pub(super) fn routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh))
        .route("/me", get(me))
        .route("/change-password", post(change_password))
        .route("/permissions", get(permissions))
        .route("/users", get(list_users))
        .route("/users/{id}", delete(delete_user))
        .route("/users/{id}/status", put(user_status))
}

fn session_cookie(name: &'static str, value: String, max_age: chrono::Duration, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Strict)
        .max_age(TimeDuration::seconds(max_age.num_seconds()))
        .build()
}

fn with_session(jar: CookieJar, tokens: &TokenPair, secure: bool) -> CookieJar {
    jar.add(session_cookie(
        ACCESS_COOKIE,
        tokens.token.clone(),
        tokens.access_max_age,
        secure,
    ))
    .add(session_cookie(
        REFRESH_COOKIE,
        tokens.refresh_token.clone(),
        tokens.refresh_max_age,
        secure,
    ))
}

fn session_body(text: &str, session: &AuthSession) -> Json<Value> {
    Json(json!({
        "message": text,
        "user": session.user,
        "token": session.tokens.token,
        "refreshToken": session.tokens.refresh_token,
    }))
}

async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(input): Payload<RegisterInput>,
) -> ApiResult<impl IntoResponse> {
    let session = auth::register(&state.db, &state.tokens, state.default_org_id, input).await?;
    let jar = with_session(jar, &session.tokens, state.config.is_production());
    Ok((
        StatusCode::CREATED,
        jar,
        session_body("User registered successfully", &session),
    ))
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Payload(input): Payload<LoginInput>,
) -> ApiResult<impl IntoResponse> {
    let session = auth::login(&state.db, &state.tokens, input).await?;
    let jar = with_session(jar, &session.tokens, state.config.is_production());
    Ok((jar, session_body("Login successful", &session)))
}

async fn logout(jar: CookieJar) -> impl IntoResponse {
    let jar = jar
        .remove(Cookie::build((ACCESS_COOKIE, "")).path("/").build())
        .remove(Cookie::build((REFRESH_COOKIE, "")).path("/").build());
    (jar, message("Logout successful"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshBody {
    refresh_token: Option<String>,
}

async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Payload<RefreshBody>>,
) -> ApiResult<impl IntoResponse> {
    let from_body = body.and_then(|Payload(body)| body.refresh_token);
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or(from_body)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::unauthorized("Refresh token required"))?;
    let pair = auth::refresh(&state.db, &state.tokens, &token).await?;
    let jar = with_session(jar, &pair, state.config.is_production());
    Ok((
        jar,
        Json(json!({
            "message": "Token refreshed",
            "token": pair.token,
            "refreshToken": pair.refresh_token,
        })),
    ))
}

async fn me(State(state): State<AppState>, AuthUser(actor): AuthUser) -> ApiResult<Json<Value>> {
    let user = auth::profile(&state.db, &actor).await?;
    Ok(Json(json!({ "user": user })))
}

async fn change_password(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Payload(input): Payload<ChangePasswordInput>,
) -> ApiResult<Json<Value>> {
    auth::change_password(&state.db, &actor, input).await?;
    Ok(message("Password changed successfully"))
}

async fn permissions(AuthUser(actor): AuthUser) -> Json<auth::PermissionsView> {
    Json(auth::permissions(&actor))
}

async fn list_users(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Query(query): Query<UserQuery>,
) -> ApiResult<Json<Value>> {
    let page = users::list(&state.db, &actor, query).await?;
    Ok(paged("users", page))
}

async fn user_status(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
    Payload(input): Payload<UserStatusInput>,
) -> ApiResult<Json<Value>> {
    let user = users::set_status(&state.db, &actor, id, input).await?;
    let text = if user.user.is_active {
        "User activated successfully"
    } else {
        "User deactivated successfully"
    };
    Ok(done(text, "user", user))
}

async fn delete_user(
    State(state): State<AppState>,
    AuthUser(actor): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Value>> {
    users::delete(&state.db, &actor, id).await?;
    Ok(message("User deleted successfully"))
}
