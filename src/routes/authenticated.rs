use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Views for any signed-in principal. `/user` additionally needs `ROLE_USER` or
/// `ROLE_ADMIN`, which the access policy enforces before the handler runs.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /user
        // Self-view of the signed-in account.
        .route("/user", get(handlers::user_page))
        // GET /403
        // Target of the policy's Forbidden redirect.
        .route("/403", get(handlers::forbidden))
}
