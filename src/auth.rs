use axum::{
    extract::{FromRef, FromRequestParts, OptionalFromRequestParts},
    http::{HeaderMap, StatusCode, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;

use crate::{
    config::{AppConfig, Env},
    models::{ROLE_ADMIN, User},
    service::UserService,
};

/// Name of the cookie carrying the session token for browser clients.
pub const SESSION_COOKIE: &str = "session";

/// Development-only identity header, honored in `Env::Local` when `dev_auth_bypass` is set.
pub const DEV_USER_HEADER: &str = "x-user-id";

/// Claims
///
/// Payload of the signed session token issued by `POST /login`.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user's numeric id, as a string per RFC 7519.
    pub sub: String,
    pub username: String,
    pub exp: usize,
    pub iat: usize,
}

/// AuthUser
///
/// The Principal: the resolved, currently enabled account behind a request. Authority
/// names are copied out of the roles, so downstream checks never depend on role records.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
    pub authorities: Vec<String>,
}

impl AuthUser {
    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.iter().any(|a| a == authority)
    }

    pub fn is_admin(&self) -> bool {
        self.has_authority(ROLE_ADMIN)
    }
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.unwrap_or_default(),
            username: user.username.clone(),
            authorities: user.authorities(),
        }
    }
}

/// issue_token
///
/// Signs a session token for `user`, valid for `config.session_ttl_secs`.
pub fn issue_token(user: &User, config: &AppConfig) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp().max(0) as usize;
    let claims = Claims {
        sub: user.id.unwrap_or_default().to_string(),
        username: user.username.clone(),
        iat: now,
        exp: now.saturating_add(usize::try_from(config.session_ttl_secs).unwrap_or(usize::MAX)),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Validates signature and expiry and returns the claims.
pub fn decode_token(token: &str, config: &AppConfig) -> Option<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    ) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!("rejected session token: {:?}", e.kind());
            None
        }
    }
}

/// `Set-Cookie` value storing `token` for the configured session lifetime.
pub fn session_cookie(token: &str, config: &AppConfig) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
        SESSION_COOKIE, token, config.session_ttl_secs
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0", SESSION_COOKIE)
}

/// Bearer header first, then the session cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, token)| token.to_string())
        .filter(|token| !token.is_empty())
}

/// resolve_principal
///
/// Turns request headers into a Principal:
/// 1. Local bypass: in `Env::Local` with `dev_auth_bypass` enabled, a numeric `x-user-id`
///    header names the account.
/// 2. Token: Bearer header or session cookie, validated and decoded.
/// 3. Store lookup: the account must still exist and be enabled, and its current roles
///    are used rather than anything baked into the token.
pub async fn resolve_principal(
    headers: &HeaderMap,
    service: &UserService,
    config: &AppConfig,
) -> Option<AuthUser> {
    let mut user_id = None;

    if config.env == Env::Local && config.dev_auth_bypass {
        user_id = headers
            .get(DEV_USER_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok());
    }

    if user_id.is_none() {
        let claims = decode_token(&extract_token(headers)?, config)?;
        user_id = claims.sub.parse::<i64>().ok();
    }

    let user = match service.find_by_id(user_id?).await {
        Ok(user) => user,
        Err(e) => {
            tracing::debug!("principal lookup failed: {}", e);
            return None;
        }
    };

    user.enabled.then(|| AuthUser::from(&user))
}

/// AuthUser Extractor Implementation
///
/// Reuses the principal placed in the request extensions by the access-control
/// middleware, and resolves it from the headers otherwise.
///
/// Rejection: `StatusCode::UNAUTHORIZED` when no valid principal is present.
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    UserService: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<AuthUser>() {
            return Ok(user.clone());
        }

        let service = UserService::from_ref(state);
        let config = AppConfig::from_ref(state);

        resolve_principal(&parts.headers, &service, &config)
            .await
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    UserService: FromRef<S>,
    AppConfig: FromRef<S>,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(
            <AuthUser as FromRequestParts<S>>::from_request_parts(parts, state)
                .await
                .ok(),
        )
    }
}
