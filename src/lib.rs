use axum::{
    Router,
    extract::{FromRef, Request, State},
    http::HeaderName,
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod password;
pub mod policy;
pub mod repository;
pub mod service;
pub mod views;

// Routing split by audience (Public, Authenticated, Admin).
pub mod routes;
use routes::{admin, authenticated, public};

use auth::AuthUser;
use policy::{AccessDecision, AccessPolicy, FORBIDDEN_PATH, LOGIN_PATH};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use password::{Argon2Hasher, HasherState};
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use service::{BootstrapOutcome, UserService};

/// ApiDoc
///
/// Aggregates every `#[utoipa::path]` handler and the form schemas into the OpenAPI
/// document served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::index, handlers::login_page, handlers::login, handlers::logout,
        handlers::user_page, handlers::forbidden, handlers::admin_page,
        handlers::new_user_form, handlers::edit_user_form, handlers::save_user,
        handlers::update_user, handlers::delete_user, handlers::delete_user_by_username,
        handlers::change_password_form, handlers::change_password
    ),
    components(
        schemas(
            models::Role, models::UserDraft, models::LoginForm, models::ChangePasswordForm,
            errors::FieldError,
        )
    ),
    tags(
        (name = "user-admin", description = "User and role administration")
    )
)]
struct ApiDoc;

/// AppState
///
/// The shared, cloneable container handed to every handler: the user service (which
/// owns the store and the hasher) and the loaded configuration.
#[derive(Clone)]
pub struct AppState {
    pub service: UserService,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for UserService {
    fn from_ref(app_state: &AppState) -> UserService {
        app_state.service.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// access_control
///
/// Runs in front of every route. Resolves the principal once, asks `AccessPolicy` for a
/// decision, and either forwards the request (with the principal stored in the request
/// extensions for the `AuthUser` extractor) or redirects:
/// anonymous callers to `/login`, under-privileged ones to `/403`.
async fn access_control(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let principal = auth::resolve_principal(request.headers(), &state.service, &state.config).await;
    let path = request.uri().path().to_string();

    let decision = AccessPolicy::decide(
        &path,
        principal.as_ref().map(|user| user.authorities.as_slice()),
    );

    match decision {
        AccessDecision::Allow => {
            if let Some(user) = principal {
                request.extensions_mut().insert::<AuthUser>(user);
            }
            next.run(request).await
        }
        AccessDecision::LoginRequired => {
            tracing::debug!(%path, "anonymous request to protected path");
            Redirect::to(LOGIN_PATH).into_response()
        }
        AccessDecision::Forbidden => {
            tracing::warn!(
                %path,
                username = principal.as_ref().map(|u| u.username.as_str()).unwrap_or_default(),
                "access denied"
            );
            Redirect::to(FORBIDDEN_PATH).into_response()
        }
    }
}

/// create_router
///
/// Assembles the route table, the access-control middleware and the observability
/// layers, and registers the application state.
pub fn create_router(state: AppState) -> Router {
    // 1. CORS Configuration
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    // Header name constant for Request Correlation.
    let x_request_id = HeaderName::from_static("x-request-id");

    // 2. Base Router Assembly
    let base_router = Router::new()
        // Documentation: Serve the auto-generated Swagger UI.
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(authenticated::authenticated_routes())
        .merge(admin::admin_routes())
        // Access policy over the whole router, unmatched paths included.
        .layer(middleware::from_fn_with_state(state.clone(), access_control))
        .with_state(state);

    // 3. Observability and Correlation Layers (outermost)
    base_router
        .layer(
            ServiceBuilder::new()
                // 3a. Request ID Generation
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                // 3b. Request Tracing, correlated by the generated request id.
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                // 3c. Echo x-request-id back to the client.
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        // 4. CORS Layer
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: method, uri and the `x-request-id` header, so every log
/// line of one request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
