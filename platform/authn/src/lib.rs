//! Platform authentication helpers.
//!
//! Staff sessions use a short-lived access token plus a refresh token signed
//! with a separate secret. Candidates get a single longer-lived token of their
//! own kind so it can never be replayed against staff routes.

use argon2::Argon2;
use argon2::password_hash::{
    PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng,
};
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub const ACCESS_COOKIE: &str = "token";
pub const REFRESH_COOKIE: &str = "refreshToken";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthnError {
    #[error("Token expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
    #[error("Invalid token type")]
    WrongKind,
    #[error("token encoding failed: {0}")]
    Encode(String),
    #[error("password hashing failed: {0}")]
    Hash(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
    Candidate,
}

#[derive(Clone, Debug)]
pub struct TokenConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_days: i64,
    pub candidate_ttl_days: i64,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            access_secret: "dev-access-secret-change-me".into(),
            refresh_secret: "dev-refresh-secret-change-me".into(),
            access_ttl_minutes: 15,
            refresh_ttl_days: 7,
            candidate_ttl_days: 7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<Uuid>,
    pub role: String,
    pub kind: TokenKind,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
    #[serde(skip)]
    pub access_max_age: Duration,
    #[serde(skip)]
    pub refresh_max_age: Duration,
}

#[derive(Clone)]
pub struct TokenService {
    config: TokenConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl_minutes", &self.config.access_ttl_minutes)
            .field("refresh_ttl_days", &self.config.refresh_ttl_days)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(config: TokenConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(config.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(config.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(config.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(config.refresh_secret.as_bytes()),
            config,
        }
    }

    pub fn config(&self) -> &TokenConfig {
        &self.config
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => Duration::minutes(self.config.access_ttl_minutes),
            TokenKind::Refresh => Duration::days(self.config.refresh_ttl_days),
            TokenKind::Candidate => Duration::days(self.config.candidate_ttl_days),
        }
    }

    pub fn issue(
        &self,
        kind: TokenKind,
        sub: Uuid,
        org: Option<Uuid>,
        role: &str,
    ) -> Result<String, AuthnError> {
        let now = Utc::now();
        let exp = now.checked_add_signed(self.ttl(kind)).unwrap_or(now);
        let claims = Claims {
            sub,
            org,
            role: role.to_string(),
            kind,
            exp: exp.timestamp().max(0) as usize,
            iat: now.timestamp().max(0) as usize,
        };
        let key = match kind {
            TokenKind::Refresh => &self.refresh_encoding,
            TokenKind::Access | TokenKind::Candidate => &self.access_encoding,
        };
        jsonwebtoken::encode(&Header::default(), &claims, key)
            .map_err(|err| AuthnError::Encode(err.to_string()))
    }

    /// Issue the access + refresh pair handed out on login, register and refresh.
    pub fn issue_pair(&self, sub: Uuid, org: Uuid, role: &str) -> Result<TokenPair, AuthnError> {
        Ok(TokenPair {
            token: self.issue(TokenKind::Access, sub, Some(org), role)?,
            refresh_token: self.issue(TokenKind::Refresh, sub, Some(org), role)?,
            access_max_age: self.ttl(TokenKind::Access),
            refresh_max_age: self.ttl(TokenKind::Refresh),
        })
    }

    pub fn verify(&self, token: &str, expected: TokenKind) -> Result<Claims, AuthnError> {
        let key = match expected {
            TokenKind::Refresh => &self.refresh_decoding,
            TokenKind::Access | TokenKind::Candidate => &self.access_decoding,
        };
        let claims = jsonwebtoken::decode::<Claims>(token, key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AuthnError::Expired,
                _ => AuthnError::Invalid,
            })?;
        if claims.kind != expected {
            return Err(AuthnError::WrongKind);
        }
        Ok(claims)
    }
}

pub fn hash_password(password: &str) -> Result<String, AuthnError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AuthnError::Hash(err.to_string()))
}

/// Constant-time check of a password against a stored PHC string.
pub fn verify_password(password: &str, stored: &str) -> bool {
    PasswordHash::new(stored)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> TokenService {
        TokenService::new(TokenConfig::default())
    }

    #[test]
    fn access_token_round_trips_claims() {
        let svc = service();
        let user = Uuid::new_v4();
        let org = Uuid::new_v4();
        let token = svc.issue(TokenKind::Access, user, Some(org), "HR").unwrap();
        let claims = svc.verify(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.org, Some(org));
        assert_eq!(claims.role, "HR");
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let svc = service();
        let pair = svc.issue_pair(Uuid::new_v4(), Uuid::new_v4(), "EMPLOYEE").unwrap();
        assert_eq!(
            svc.verify(&pair.refresh_token, TokenKind::Access),
            Err(AuthnError::Invalid)
        );
        assert!(svc.verify(&pair.refresh_token, TokenKind::Refresh).is_ok());
    }

    #[test]
    fn candidate_token_cannot_pass_as_staff() {
        let svc = service();
        let token = svc
            .issue(TokenKind::Candidate, Uuid::new_v4(), None, "CANDIDATE")
            .unwrap();
        assert_eq!(
            svc.verify(&token, TokenKind::Access),
            Err(AuthnError::WrongKind)
        );
    }

    #[test]
    fn expired_tokens_are_reported_as_expired() {
        let svc = TokenService::new(TokenConfig {
            access_ttl_minutes: -10,
            ..TokenConfig::default()
        });
        let token = svc
            .issue(TokenKind::Access, Uuid::new_v4(), None, "ADMIN")
            .unwrap();
        assert_eq!(svc.verify(&token, TokenKind::Access), Err(AuthnError::Expired));
    }

    #[test]
    fn tampered_tokens_are_invalid() {
        let svc = service();
        let token = svc
            .issue(TokenKind::Access, Uuid::new_v4(), None, "ADMIN")
            .unwrap();
        let other = TokenService::new(TokenConfig {
            access_secret: "another-secret".into(),
            ..TokenConfig::default()
        });
        assert_eq!(other.verify(&token, TokenKind::Access), Err(AuthnError::Invalid));
    }

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("Secret123").unwrap();
        assert!(verify_password("Secret123", &hash));
        assert!(!verify_password("secret123", &hash));
        assert!(!verify_password("Secret123", "not-a-hash"));
    }
}
