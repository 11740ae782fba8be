//! Caller extraction for staff and candidate routes, plus payload extractors
//! whose rejections answer with the JSON error envelope.

use axum::extract::{FromRequest, FromRequestParts, OptionalFromRequest, Request};
use axum::http::{HeaderMap, header, request::Parts};
use axum_extra::extract::cookie::CookieJar;
use platform_api::ApiError;
use platform_authn::{ACCESS_COOKIE, TokenKind};
use products_hr::candidates::CANDIDATE_ROLE;
use products_hr::context::token_error;
use products_hr::{Actor, load_actor};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use super::AppState;

/// JSON request body. A missing field, a wrong type or a missing content type
/// is a 400 validation error.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Payload<T>(pub T);

/// An absent body (no `Content-Type`) is `None`; a malformed one is still an error.
impl<T, S> OptionalFromRequest<S> for Payload<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
        let body = <axum::Json<T> as OptionalFromRequest<S>>::from_request(req, state).await?;
        Ok(body.map(|axum::Json(value)| Payload(value)))
    }
}

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct Query<T>(pub T);

/// `Authorization: Bearer <t>` first, then the `token` cookie.
pub fn bearer_or_cookie(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());
    bearer.or_else(|| {
        CookieJar::from_headers(headers)
            .get(ACCESS_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|token| !token.is_empty())
    })
}

/// An authenticated staff member, re-read from the database on every request
/// so deactivation takes effect before the token expires.
#[derive(Clone, Debug)]
pub struct AuthUser(pub Actor);

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_or_cookie(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Access token required"))?;
        let claims = state
            .tokens
            .verify(&token, TokenKind::Access)
            .map_err(token_error)?;
        let actor = load_actor(&state.db, claims.sub).await?;
        Ok(AuthUser(actor))
    }
}

/// A candidate account holding a candidate token.
#[derive(Clone, Copy, Debug)]
pub struct CandidateAuth(pub Uuid);

impl FromRequestParts<AppState> for CandidateAuth {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_or_cookie(&parts.headers)
            .ok_or_else(|| ApiError::unauthorized("Access token required"))?;
        let claims = state
            .tokens
            .verify(&token, TokenKind::Candidate)
            .map_err(token_error)?;
        if claims.role != CANDIDATE_ROLE {
            return Err(ApiError::forbidden("Candidate access required"));
        }
        let candidate = products_hr::candidates::load_candidate(&state.db, claims.sub).await?;
        Ok(CandidateAuth(candidate.id))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("token=from-cookie"));
        assert_eq!(bearer_or_cookie(&headers).as_deref(), Some("from-cookie"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(bearer_or_cookie(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn blank_credentials_are_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_or_cookie(&headers), None);
    }
}
