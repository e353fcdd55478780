use argon2::Params;
use reqwest::{StatusCode, header, redirect::Policy};
use std::sync::Arc;
use tokio::net::TcpListener;
use user_admin::{
    AppConfig, AppState, Argon2Hasher, InMemoryRepository, UserService, create_router,
};

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
}

async fn spawn_app() -> TestApp {
    spawn_app_with(AppConfig::default()).await
}

/// Serves the full router on an ephemeral port over the in-memory store, with the
/// bootstrap admin in place. Redirects are not followed so tests can assert on them.
async fn spawn_app_with(config: AppConfig) -> TestApp {
    let repo = Arc::new(InMemoryRepository::with_default_roles());
    let hasher = Arc::new(Argon2Hasher::with_params(
        Params::new(1024, 1, 1, None).unwrap(),
    ));
    let service = UserService::new(repo, hasher);
    service
        .ensure_admin_account_exists("admin")
        .await
        .expect("bootstrap");

    let state = AppState { service, config };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    TestApp { address, client }
}

impl TestApp {
    /// Signs in through the login form and returns the `session=...` cookie pair.
    async fn login(&self, username: &str, password: &str) -> String {
        let response = self
            .client
            .post(format!("{}/login", self.address))
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .expect("req fail");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .expect("session cookie")
            .to_string()
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = spawn_app().await;
    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("req fail");
    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;
    let doc: serde_json::Value = app
        .client
        .get(format!("{}/api-docs/openapi.json", app.address))
        .send()
        .await
        .expect("req fail")
        .json()
        .await
        .expect("json");

    assert!(doc["paths"]["/admin/save"].is_object());
    assert!(doc["paths"]["/login"].is_object());
    assert!(doc["components"]["schemas"]["UserDraft"].is_object());
}

#[tokio::test]
async fn test_user_lifecycle_through_the_browser_flow() {
    let app = spawn_app().await;
    let admin_cookie = app.login("admin", "admin").await;

    // Create
    let created = app
        .client
        .post(format!("{}/admin/save", app.address))
        .header(header::COOKIE, &admin_cookie)
        .form(&[
            ("username", "erin"),
            ("password", "erinspassword"),
            ("firstName", "Erin"),
            ("age", "28"),
            ("enabled", "false"),
            ("enabled", "true"),
            ("roleIds", "2"),
        ])
        .send()
        .await
        .expect("req fail");
    assert_eq!(created.status(), StatusCode::SEE_OTHER);

    let panel = app
        .client
        .get(format!("{}/admin", app.address))
        .header(header::COOKIE, &admin_cookie)
        .send()
        .await
        .expect("req fail")
        .text()
        .await
        .unwrap();
    assert!(panel.contains("<td>erin</td>"));

    // The new account can sign in and lands on /user, but not /admin.
    let erin_cookie = app.login("erin", "erinspassword").await;
    let denied = app
        .client
        .get(format!("{}/admin", app.address))
        .header(header::COOKIE, &erin_cookie)
        .send()
        .await
        .expect("req fail");
    assert_eq!(denied.status(), StatusCode::SEE_OTHER);
    assert_eq!(denied.headers()[header::LOCATION], "/403");

    // Delete, then the session no longer resolves.
    let deleted = app
        .client
        .post(format!("{}/admin/delete/erin", app.address))
        .header(header::COOKIE, &admin_cookie)
        .send()
        .await
        .expect("req fail");
    assert_eq!(deleted.status(), StatusCode::SEE_OTHER);

    let after = app
        .client
        .get(format!("{}/user", app.address))
        .header(header::COOKIE, &erin_cookie)
        .send()
        .await
        .expect("req fail");
    assert_eq!(after.headers()[header::LOCATION], "/login");
}

#[tokio::test]
async fn test_local_dev_header_bypass() {
    let app = spawn_app_with(AppConfig {
        dev_auth_bypass: true,
        ..AppConfig::default()
    })
    .await;

    // The bootstrap admin is the first user, id 1.
    let response = app
        .client
        .get(format!("{}/admin", app.address))
        .header("x-user-id", "1")
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_dev_header_is_ignored_unless_enabled() {
    let app = spawn_app().await;

    let response = app
        .client
        .get(format!("{}/admin", app.address))
        .header("x-user-id", "1")
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/login");
}
