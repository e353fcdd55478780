use crate::{
    AppState,
    auth::{self, AuthUser},
    errors::{FieldError, ServiceError},
    models::{
        ChangePasswordForm, LoginForm, MIN_PASSWORD_LENGTH, PASSWORD_TOO_SHORT, UserDraft, UserRef,
        UserSubmission,
    },
    views::{self, FormMode},
};
use axum::{
    Form,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};

const ADMIN_HOME: &str = "/admin";

// --- Public Handlers ---

/// index
///
/// [Public Route] Landing view. Shows links matching the visitor's roles.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Landing page", content_type = "text/html"))
)]
pub async fn index(principal: Option<AuthUser>) -> Html<String> {
    views::landing(principal.as_ref())
}

/// login_page
///
/// [Public Route] Renders the login form.
#[utoipa::path(
    get,
    path = "/login",
    responses((status = 200, description = "Login form", content_type = "text/html"))
)]
pub async fn login_page() -> Html<String> {
    views::login_form(None)
}

/// login
///
/// [Public Route] Verifies the credentials, stores a signed session token in an
/// HttpOnly cookie and sends admins to `/admin`, everyone else to `/user`.
#[utoipa::path(
    post,
    path = "/login",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in; redirect to the landing area"),
        (status = 401, description = "Bad credentials", content_type = "text/html")
    )
)]
pub async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let user = match state.service.login(&form.username, &form.password).await {
        Ok(user) => user,
        Err(ServiceError::BadCredentials) => {
            return (
                StatusCode::UNAUTHORIZED,
                views::login_form(Some("Invalid username or password")),
            )
                .into_response();
        }
        Err(e) => return e.into_response(),
    };

    let token = match auth::issue_token(&user, &state.config) {
        Ok(token) => token,
        Err(e) => {
            tracing::error!("failed to sign session token: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    tracing::info!(username = %user.username, "user signed in");
    let landing = if user.is_admin() { ADMIN_HOME } else { "/user" };
    (
        [(header::SET_COOKIE, auth::session_cookie(&token, &state.config))],
        Redirect::to(landing),
    )
        .into_response()
}

/// logout
///
/// [Public Route] Clears the session cookie. Tokens are stateless, so this is a
/// client-side sign-out.
#[utoipa::path(
    post,
    path = "/logout",
    responses((status = 303, description = "Signed out; redirect to /"))
)]
pub async fn logout() -> Response {
    (
        [(header::SET_COOKIE, auth::clear_session_cookie())],
        Redirect::to("/"),
    )
        .into_response()
}

// --- Authenticated Handlers ---

/// user_page
///
/// [Authenticated Route] Self-view of the signed-in account.
#[utoipa::path(
    get,
    path = "/user",
    responses(
        (status = 200, description = "Own account", content_type = "text/html"),
        (status = 404, description = "Account vanished")
    )
)]
pub async fn user_page(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, ServiceError> {
    let user = state.service.authenticate(&principal.username).await?;
    Ok(views::user_page(&principal, &user))
}

/// forbidden
///
/// The access-denied view targeted by the access-control middleware.
#[utoipa::path(
    get,
    path = "/403",
    responses((status = 403, description = "Access denied", content_type = "text/html"))
)]
pub async fn forbidden() -> (StatusCode, Html<String>) {
    (StatusCode::FORBIDDEN, views::forbidden())
}

// --- Admin Handlers ---

/// admin_page
///
/// [Admin Route] Lists every user and shows an empty new-user form.
#[utoipa::path(
    get,
    path = "/admin",
    responses((status = 200, description = "Admin panel", content_type = "text/html"))
)]
pub async fn admin_page(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, ServiceError> {
    render_admin_page(&state, &principal, &UserDraft::default(), &[], &[]).await
}

async fn render_admin_page(
    state: &AppState,
    principal: &AuthUser,
    draft: &UserDraft,
    selected: &[i64],
    errors: &[FieldError],
) -> Result<Html<String>, ServiceError> {
    let users = state.service.list_users().await?;
    let roles = state.service.list_roles().await?;
    Ok(views::admin_page(principal, &users, &roles, draft, selected, errors))
}

/// new_user_form
///
/// [Admin Route] Empty user form.
#[utoipa::path(
    get,
    path = "/admin/new",
    responses((status = 200, description = "New user form", content_type = "text/html"))
)]
pub async fn new_user_form(
    principal: AuthUser,
    State(state): State<AppState>,
) -> Result<Html<String>, ServiceError> {
    let roles = state.service.list_roles().await?;
    Ok(views::user_form_page(
        Some(&principal),
        FormMode::Create,
        &UserDraft::default(),
        &roles,
        &[],
        &[],
    ))
}

/// edit_user_form
///
/// [Admin Route] User form pre-filled from the stored record. The path segment is an id
/// when numeric and a username otherwise.
#[utoipa::path(
    get,
    path = "/admin/edit/{user}",
    params(("user" = String, Path, description = "User id or username")),
    responses(
        (status = 200, description = "Edit form", content_type = "text/html"),
        (status = 404, description = "No such user")
    )
)]
pub async fn edit_user_form(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(segment): Path<String>,
) -> Result<Html<String>, ServiceError> {
    let user = state.service.find(&UserRef::parse(&segment)).await?;
    let roles = state.service.list_roles().await?;
    Ok(views::user_form_page(
        Some(&principal),
        FormMode::Edit,
        &UserDraft::from_user(&user),
        &roles,
        &user.role_ids(),
        &[],
    ))
}

/// save_user
///
/// [Admin Route] Create or update from the user form. Validation failures (including a
/// duplicate username) re-render the form with 422 and change nothing.
#[utoipa::path(
    post,
    path = "/admin/save",
    request_body(content = UserDraft, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Saved; redirect to /admin"),
        (status = 422, description = "Validation failed", content_type = "text/html"),
        (status = 400, description = "Unknown role id")
    )
)]
pub async fn save_user(
    principal: AuthUser,
    State(state): State<AppState>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let submission = UserSubmission::from_pairs(pairs);
    if !submission.errors.is_empty() {
        return reject_submission(&state, &principal, &submission, submission.errors.clone()).await;
    }

    match state
        .service
        .save(submission.draft.clone(), &submission.role_ids)
        .await
    {
        Ok(_) => Redirect::to(ADMIN_HOME).into_response(),
        Err(ServiceError::Validation(errors)) => {
            reject_submission(&state, &principal, &submission, errors).await
        }
        Err(e) => e.into_response(),
    }
}

/// update_user
///
/// [Admin Route] Update variant addressed by id. The record must exist.
#[utoipa::path(
    patch,
    path = "/admin/user/{id}",
    params(("id" = i64, Path, description = "User id")),
    request_body(content = UserDraft, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Updated; redirect to /admin"),
        (status = 404, description = "No such user"),
        (status = 422, description = "Validation failed", content_type = "text/html")
    )
)]
pub async fn update_user(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Form(pairs): Form<Vec<(String, String)>>,
) -> Response {
    let mut submission = UserSubmission::from_pairs(pairs);
    submission.draft.id = Some(id);
    if !submission.errors.is_empty() {
        return reject_submission(&state, &principal, &submission, submission.errors.clone()).await;
    }

    match state
        .service
        .update(id, submission.draft.clone(), &submission.role_ids)
        .await
    {
        Ok(_) => Redirect::to(ADMIN_HOME).into_response(),
        Err(ServiceError::Validation(errors)) => {
            reject_submission(&state, &principal, &submission, errors).await
        }
        Err(e) => e.into_response(),
    }
}

/// Re-renders the submitted form with its field errors.
async fn reject_submission(
    state: &AppState,
    principal: &AuthUser,
    submission: &UserSubmission,
    errors: Vec<FieldError>,
) -> Response {
    let mode = if submission.draft.id.is_some() {
        FormMode::Edit
    } else {
        FormMode::Create
    };

    let rendered = match mode {
        FormMode::Create => {
            render_admin_page(state, principal, &submission.draft, &submission.role_ids, &errors)
                .await
        }
        FormMode::Edit => state.service.list_roles().await.map(|roles| {
            views::user_form_page(
                Some(principal),
                mode,
                &submission.draft,
                &roles,
                &submission.role_ids,
                &errors,
            )
        }),
    };

    match rendered {
        Ok(page) => (StatusCode::UNPROCESSABLE_ENTITY, page).into_response(),
        Err(e) => e.into_response(),
    }
}

/// delete_user
///
/// [Admin Route] Deletes by id. A missing user is reported, not ignored.
#[utoipa::path(
    delete,
    path = "/admin/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 303, description = "Deleted; redirect to /admin"),
        (status = 404, description = "No such user")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Redirect, ServiceError> {
    state.service.delete_user(&UserRef::Id(id)).await?;
    Ok(Redirect::to(ADMIN_HOME))
}

/// delete_user_by_username
///
/// [Admin Route] Delete by username. The user table submits it as a POST form; the session
/// cookie is `SameSite=Strict`, so neither method is reachable from another site.
#[utoipa::path(
    method(get, post),
    path = "/admin/delete/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 303, description = "Deleted; redirect to /admin"),
        (status = 404, description = "No such user")
    )
)]
pub async fn delete_user_by_username(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Redirect, ServiceError> {
    state.service.delete_user(&UserRef::Username(username)).await?;
    Ok(Redirect::to(ADMIN_HOME))
}

/// change_password_form
///
/// [Admin Route] Password form for one account.
#[utoipa::path(
    get,
    path = "/admin/change-password/{username}",
    params(("username" = String, Path, description = "Username")),
    responses(
        (status = 200, description = "Password form", content_type = "text/html"),
        (status = 404, description = "No such user")
    )
)]
pub async fn change_password_form(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<Html<String>, ServiceError> {
    let user = state.service.find(&UserRef::Username(username)).await?;
    Ok(views::change_password_page(Some(&principal), &user.username, &[]))
}

/// change_password
///
/// [Admin Route] Sets a new password. Short or empty passwords re-render the form.
#[utoipa::path(
    post,
    path = "/admin/change-password/{username}",
    params(("username" = String, Path, description = "Username")),
    request_body(content = ChangePasswordForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Changed; redirect to /admin"),
        (status = 404, description = "No such user"),
        (status = 422, description = "Password rejected", content_type = "text/html")
    )
)]
pub async fn change_password(
    principal: AuthUser,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Form(form): Form<ChangePasswordForm>,
) -> Response {
    let reject = |message: &str| {
        let errors = [FieldError::new("password", message)];
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            views::change_password_page(Some(&principal), &username, &errors),
        )
            .into_response()
    };

    if !form.password.is_empty() && form.password.chars().count() < MIN_PASSWORD_LENGTH {
        return reject(PASSWORD_TOO_SHORT);
    }

    match state.service.change_password(&username, &form.password).await {
        Ok(()) => Redirect::to(ADMIN_HOME).into_response(),
        Err(ServiceError::InvalidArgument(_)) => reject("Password must not be empty"),
        Err(e) => e.into_response(),
    }
}
