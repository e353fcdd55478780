use argon2::Params;
use axum::{
    extract::FromRequestParts,
    http::{Method, Request, StatusCode, Uri, header, request::Parts},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::sync::Arc;
use user_admin::{
    AppState, Argon2Hasher, InMemoryRepository, UserService,
    auth::{self, AuthUser, Claims, DEV_USER_HEADER, SESSION_COOKIE},
    config::{AppConfig, Env},
    models::{ROLE_ADMIN, ROLE_USER, User, UserDraft},
};

const TEST_JWT_SECRET: &str = "auth-test-secret";

// --- Test Context and Setup ---

/// Builds an AppState over an in-memory store holding one enabled user ("alice",
/// ROLE_USER) and one disabled user ("mallory").
async fn create_app_state(env: Env) -> (AppState, User, User) {
    let repo = Arc::new(InMemoryRepository::with_default_roles());
    let hasher = Arc::new(Argon2Hasher::with_params(
        Params::new(1024, 1, 1, None).unwrap(),
    ));
    let service = UserService::new(repo, hasher);

    let alice = service
        .save(draft("alice", true), &[2])
        .await
        .expect("seed alice");
    let mallory = service
        .save(draft("mallory", false), &[2])
        .await
        .expect("seed mallory");

    let config = AppConfig {
        env,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        ..AppConfig::default()
    };

    (AppState { service, config }, alice, mallory)
}

fn draft(username: &str, enabled: bool) -> UserDraft {
    UserDraft {
        username: username.to_string(),
        password: "password123".to_string(),
        enabled,
        ..UserDraft::default()
    }
}

/// Signs claims directly, bypassing `issue_token`, to exercise expiry and foreign keys.
fn create_token(sub: &str, exp_offset: i64, secret: &str) -> String {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        username: "someone".to_string(),
        iat: now as usize,
        exp: (now + exp_offset) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// Helper to get the mutable Parts struct from a generated Request
fn get_request_parts(method: Method, uri: Uri) -> Parts {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .unwrap();
    let (parts, _) = request.into_parts();
    parts
}

fn with_bearer(parts: &mut Parts, token: &str) {
    parts.headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
    );
}

// --- Token issuing ---

#[tokio::test]
async fn test_issued_token_round_trips() {
    let (state, alice, _) = create_app_state(Env::Production).await;

    let token = auth::issue_token(&alice, &state.config).unwrap();
    let claims = auth::decode_token(&token, &state.config).expect("valid token");

    assert_eq!(claims.sub, alice.id.unwrap().to_string());
    assert_eq!(claims.username, "alice");
    assert_eq!(claims.exp - claims.iat, state.config.session_ttl_secs as usize);
}

#[tokio::test]
async fn test_huge_session_ttl_saturates_expiry() {
    let (mut state, alice, _) = create_app_state(Env::Production).await;
    state.config.session_ttl_secs = u64::MAX;

    let token = auth::issue_token(&alice, &state.config).unwrap();
    let claims = auth::decode_token(&token, &state.config).expect("valid token");
    assert_eq!(claims.exp, usize::MAX);
}

#[tokio::test]
async fn test_decode_rejects_foreign_and_expired_tokens() {
    let (state, _, _) = create_app_state(Env::Production).await;

    assert!(auth::decode_token(&create_token("1", 3600, "other-secret"), &state.config).is_none());
    assert!(auth::decode_token(&create_token("1", -3600, TEST_JWT_SECRET), &state.config).is_none());
    assert!(auth::decode_token("garbage", &state.config).is_none());
}

#[test]
fn test_session_cookie_attributes() {
    let config = AppConfig::default();
    let cookie = auth::session_cookie("abc", &config);
    assert!(cookie.starts_with(&format!("{}=abc;", SESSION_COOKIE)));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=3600"));
    assert!(cookie.contains("SameSite=Strict"));
    assert!(auth::clear_session_cookie().contains("Max-Age=0"));
    assert!(auth::clear_session_cookie().contains("SameSite=Strict"));
}

// --- Extractor ---

#[tokio::test]
async fn test_auth_success_with_valid_bearer_token() {
    let (state, alice, _) = create_app_state(Env::Production).await;
    let token = auth::issue_token(&alice, &state.config).unwrap();

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);

    let user = AuthUser::from_request_parts(&mut parts, &state)
        .await
        .expect("principal");
    assert_eq!(user.id, alice.id.unwrap());
    assert_eq!(user.username, "alice");
    assert_eq!(user.authorities, vec![ROLE_USER]);
    assert!(!user.is_admin());
}

#[tokio::test]
async fn test_auth_success_with_session_cookie() {
    let (state, alice, _) = create_app_state(Env::Production).await;
    let token = auth::issue_token(&alice, &state.config).unwrap();

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::COOKIE,
        header::HeaderValue::from_str(&format!("theme=dark; {}={}", SESSION_COOKIE, token))
            .unwrap(),
    );

    let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(user.username, "alice");
}

#[tokio::test]
async fn test_auth_failure_with_missing_header() {
    let (state, _, _) = create_app_state(Env::Production).await;
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_failure_with_expired_token() {
    let (state, alice, _) = create_app_state(Env::Production).await;
    let token = create_token(&alice.id.unwrap().to_string(), -3600, TEST_JWT_SECRET);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_auth_rejects_disabled_and_deleted_accounts() {
    let (state, alice, mallory) = create_app_state(Env::Production).await;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &auth::issue_token(&mallory, &state.config).unwrap());
    assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());

    let token = auth::issue_token(&alice, &state.config).unwrap();
    state
        .service
        .delete_user(&user_admin::models::UserRef::Id(alice.id.unwrap()))
        .await
        .unwrap();

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);
    assert!(AuthUser::from_request_parts(&mut parts, &state).await.is_err());
}

#[tokio::test]
async fn test_principal_reflects_current_roles() {
    let (state, alice, _) = create_app_state(Env::Production).await;
    let token = auth::issue_token(&alice, &state.config).unwrap();

    // Promote after the token was issued.
    state
        .service
        .save(UserDraft::from_user(&alice), &[1, 2])
        .await
        .unwrap();

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    with_bearer(&mut parts, &token);
    let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(user.authorities, vec![ROLE_ADMIN, ROLE_USER]);
}

#[tokio::test]
async fn test_local_bypass_success() {
    let (mut state, alice, _) = create_app_state(Env::Local).await;
    state.config.dev_auth_bypass = true;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_USER_HEADER),
        header::HeaderValue::from_str(&alice.id.unwrap().to_string()).unwrap(),
    );

    let user = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(user.username, "alice");
}

#[tokio::test]
async fn test_local_bypass_requires_opt_in() {
    let (state, alice, _) = create_app_state(Env::Local).await;
    assert!(!state.config.dev_auth_bypass);

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_USER_HEADER),
        header::HeaderValue::from_str(&alice.id.unwrap().to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_local_bypass_disabled_in_prod() {
    let (mut state, alice, _) = create_app_state(Env::Production).await;
    // Even a flag set by hand is ignored outside local mode.
    state.config.dev_auth_bypass = true;

    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());
    parts.headers.insert(
        header::HeaderName::from_static(DEV_USER_HEADER),
        header::HeaderValue::from_str(&alice.id.unwrap().to_string()).unwrap(),
    );

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await;
    assert_eq!(auth_user.unwrap_err(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_optional_extractor_never_rejects() {
    let (state, _, _) = create_app_state(Env::Production).await;
    let mut parts = get_request_parts(Method::GET, "/".parse().unwrap());

    let principal: Option<AuthUser> =
        <AuthUser as axum::extract::OptionalFromRequestParts<AppState>>::from_request_parts(
            &mut parts, &state,
        )
        .await
        .unwrap();
    assert!(principal.is_none());
}
