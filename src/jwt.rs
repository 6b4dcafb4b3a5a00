use std::sync::Arc;

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::authz::Role;
use crate::errors::{AppError, TokenError};
use crate::models::user::User;

const DEFAULT_COOKIE_NAME: &str = "access_token";

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
    pub refresh_exp_days: i64,
    pub cookie_name: String,
}

impl JwtConfig {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: Arc::new(secret.into()),
            exp_hours: 24,
            refresh_exp_days: 7,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
        }
    }

    pub fn from_env() -> Result<Self, AppError> {
        let secret = std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        let exp_hours = env_i64("JWT_EXP_HOURS", 24)?;
        let refresh_exp_days = env_i64("JWT_REFRESH_EXP_DAYS", 7)?;
        let cookie_name = std::env::var("AUTH_COOKIE_NAME").unwrap_or_else(|_| DEFAULT_COOKIE_NAME.to_string());

        Ok(Self {
            secret: Arc::new(secret.into_bytes()),
            exp_hours,
            refresh_exp_days,
            cookie_name,
        })
    }

    pub fn issue_access(&self, user: &User) -> Result<String, AppError> {
        self.encode(user, TokenKind::Access, Duration::hours(self.exp_hours))
    }

    pub fn issue_refresh(&self, user: &User) -> Result<String, AppError> {
        self.encode(user, TokenKind::Refresh, Duration::days(self.refresh_exp_days))
    }

    fn encode(&self, user: &User, kind: TokenKind, ttl: Duration) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            typ: kind,
            jti: Uuid::new_v4(),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        self.sign(&claims)
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, AppError> {
        jsonwebtoken::encode(&Header::default(), claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|err| AppError::internal(format!("failed to sign credential: {err}")))
    }

    /// Verify signature and expiry and require the given kind. Expiry is
    /// reported separately so clients know a refresh may help.
    pub fn decode(&self, token: &str, kind: TokenKind) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;

        let claims = jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                ErrorKind::ExpiredSignature => AppError::Token(TokenError::Expired),
                _ => AppError::Token(TokenError::Invalid),
            })?;

        if claims.typ != kind {
            return Err(AppError::Token(TokenError::Invalid));
        }

        Ok(claims)
    }
}

fn env_i64(key: &str, default: i64) -> Result<i64, AppError> {
    match std::env::var(key) {
        Ok(value) => value
            .parse::<i64>()
            .map_err(|_| AppError::configuration(format!("{key} must be a valid integer"))),
        Err(_) => Ok(default),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub typ: TokenKind,
    pub jti: Uuid,
    pub exp: i64,
    pub iat: i64,
}

/// Pull the credential from `Authorization: Bearer <token>`, falling back to
/// the named cookie.
pub fn extract_credential<'a>(headers: &'a HeaderMap, cookie_name: &str) -> Option<&'a str> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    bearer.or_else(|| {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .filter(|(name, _)| name.trim() == cookie_name)
            .map(|(_, value)| unquote(value.trim()))
            .find(|value| !value.is_empty())
    })
}

/// Cookie values may be sent as `name="value"`.
fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(value)
}

/// Revocation-list key for a credential. Raw tokens are never stored.
pub fn fingerprint(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// The verified caller, attached to the request by the gate.
#[derive(Debug, Clone, Serialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    #[serde(skip)]
    pub fingerprint: String,
    #[serde(skip)]
    pub expires_at: i64,
}

impl AuthUser {
    pub fn from_claims(claims: Claims, token: &str) -> Self {
        Self {
            user_id: claims.sub,
            name: claims.name,
            email: claims.email,
            role: claims.role,
            fingerprint: fingerprint(token),
            expires_at: claims.exp,
        }
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AppError::MissingCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authz::AccountStatus;
    use axum::http::HeaderValue;

    fn user(role: Role) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            role,
            status: AccountStatus::Active,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn access_token_round_trips_identity() {
        let cfg = JwtConfig::new("secret");
        let u = user(Role::Employee);
        let token = cfg.issue_access(&u).unwrap();
        let claims = cfg.decode(&token, TokenKind::Access).unwrap();
        assert_eq!(claims.sub, u.id);
        assert_eq!(claims.role, Role::Employee);
        assert_eq!(claims.email, "ada@example.com");
    }

    #[test]
    fn refresh_token_is_not_an_access_token() {
        let cfg = JwtConfig::new("secret");
        let token = cfg.issue_refresh(&user(Role::User)).unwrap();
        let err = cfg.decode(&token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, AppError::Token(TokenError::Invalid)));
    }

    #[test]
    fn expired_is_distinguished_from_invalid() {
        let cfg = JwtConfig::new("secret");
        let u = user(Role::User);
        let past = Utc::now() - Duration::hours(3);
        let claims = Claims {
            sub: u.id,
            name: u.name,
            email: u.email,
            role: u.role,
            typ: TokenKind::Access,
            jti: Uuid::new_v4(),
            exp: past.timestamp(),
            iat: (past - Duration::hours(1)).timestamp(),
        };
        let token = cfg.sign(&claims).unwrap();
        let err = cfg.decode(&token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, AppError::Token(TokenError::Expired)));

        let other = JwtConfig::new("other-secret");
        let token = other.issue_access(&user(Role::User)).unwrap();
        let err = cfg.decode(&token, TokenKind::Access).unwrap_err();
        assert!(matches!(err, AppError::Token(TokenError::Invalid)));
    }

    #[test]
    fn credential_from_bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer header-token"));
        headers.insert(COOKIE, HeaderValue::from_static("access_token=cookie-token"));
        assert_eq!(extract_credential(&headers, "access_token"), Some("header-token"));
    }

    #[test]
    fn credential_falls_back_to_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; access_token=cookie-token"));
        assert_eq!(extract_credential(&headers, "access_token"), Some("cookie-token"));
        assert_eq!(extract_credential(&headers, "session"), None);
        assert_eq!(extract_credential(&HeaderMap::new(), "access_token"), None);
    }

    #[test]
    fn quoted_cookie_values_are_unwrapped() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; access_token=\"cookie-token\""));
        assert_eq!(extract_credential(&headers, "access_token"), Some("cookie-token"));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("access_token=\"\""));
        assert_eq!(extract_credential(&headers, "access_token"), None);
    }

    #[test]
    fn fingerprint_is_stable_sha256_hex() {
        let a = fingerprint("token");
        assert_eq!(a, fingerprint("token"));
        assert_eq!(a.len(), 64);
        assert_ne!(a, fingerprint("other"));
    }
}
