use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, patch, post},
};

/// Admin Router Module
///
/// User management. Every path sits under `/admin`, which the access policy restricts
/// to `ROLE_ADMIN`. Paths are registered in full rather than nested so `/admin`
/// itself stays a plain route.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // User table plus the new-user form.
        .route("/admin", get(handlers::admin_page))
        .route("/admin/new", get(handlers::new_user_form))
        // GET /admin/edit/{user}
        // Numeric segments are ids, anything else a username.
        .route("/admin/edit/{user}", get(handlers::edit_user_form))
        // POST /admin/save
        // Create or update from the form. Repeated `roleIds` fields carry the role set.
        .route("/admin/save", post(handlers::save_user))
        .route("/admin/user/{id}", patch(handlers::update_user))
        .route(
            "/admin/change-password/{username}",
            get(handlers::change_password_form).post(handlers::change_password),
        )
        // --- Deletion ---
        .route("/admin/{id}", delete(handlers::delete_user))
        // GET /admin/delete/{username} stays for links; the user table submits a POST.
        .route(
            "/admin/delete/{username}",
            get(handlers::delete_user_by_username).post(handlers::delete_user_by_username),
        )
}
