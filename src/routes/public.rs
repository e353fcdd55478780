use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for load balancers.
        .route("/health", get(|| async { "ok" }))
        // GET / and /index
        .route("/", get(handlers::index))
        .route("/index", get(handlers::index))
        // GET/POST /login
        // Form login. A successful POST sets the `session` cookie.
        .route("/login", get(handlers::login_page).post(handlers::login))
        // POST/GET /logout
        // Clears the session cookie and returns to the landing page.
        .route("/logout", post(handlers::logout).get(handlers::logout))
}
