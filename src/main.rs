use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use user_admin::{
    AppState, Argon2Hasher, BootstrapOutcome, InMemoryRepository, PostgresRepository,
    RepositoryState, UserService,
    config::{AppConfig, Env},
    create_router,
};

/// main
///
/// Entry point: configuration, logging, the user store, the admin bootstrap and the HTTP
/// server, in that order.
#[tokio::main]
async fn main() {
    // 1. Configuration & Environment Loading (Fail-Fast)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging Filter Setup
    // RUST_LOG wins; otherwise verbose for this crate and the HTTP stack.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "user_admin=debug,tower_http=info,axum=trace".into());

    // 3. Initialize Logging based on Environment
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);
    if config.dev_auth_bypass {
        tracing::warn!("DEV_AUTH_BYPASS enabled: the x-user-id header is trusted as identity");
    }

    // 4. User Store Initialization
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

            let repo = PostgresRepository::new(pool);
            repo.migrate()
                .await
                .expect("FATAL: Failed to apply database migrations.");
            Arc::new(repo) as RepositoryState
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory user store (data is lost on exit)");
            Arc::new(InMemoryRepository::with_default_roles()) as RepositoryState
        }
    };

    // 5. Service Assembly
    let service = UserService::new(repo, Arc::new(Argon2Hasher::new()));

    // 6. Admin Bootstrap (idempotent)
    match service
        .ensure_admin_account_exists(&config.admin_default_password)
        .await
        .expect("FATAL: Failed to bootstrap the admin account.")
    {
        BootstrapOutcome::Created => {
            tracing::warn!("Created the 'admin' account with the configured default password")
        }
        BootstrapOutcome::Repaired => tracing::info!("Restored ROLE_ADMIN on the 'admin' account"),
        BootstrapOutcome::Unchanged => tracing::debug!("Admin account already present"),
    }
    match service.count_users().await {
        Ok(count) => tracing::info!("User store ready with {} account(s)", count),
        Err(e) => tracing::warn!("Could not count user accounts: {}", e),
    }

    // 7. Router and Server Startup
    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState { service, config });

    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind the HTTP listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at: http://{}/swagger-ui", bind_addr);

    axum::serve(listener, app).await.unwrap();
}
