use std::env;

const LOCAL_JWT_SECRET: &str = "super-secure-test-secret-value-local";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_ADMIN_PASSWORD: &str = "admin";
const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// AppConfig
///
/// Holds the application's entire configuration state. Immutable once loaded and pulled
/// into handlers and extractors via `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Postgres connection string. `None` selects the in-memory store (local only).
    pub db_url: Option<String>,
    // Runtime environment marker. Controls the log format and the dev header bypass.
    pub env: Env,
    // HMAC secret used to sign and validate session tokens.
    pub jwt_secret: String,
    pub bind_addr: String,
    // Password given to the `admin` account when the bootstrap has to create it.
    pub admin_default_password: String,
    // Lifetime of an issued session token.
    pub session_ttl_secs: u64,
    // Accept the `x-user-id` development header. Opt-in via `DEV_AUTH_BYPASS`, local only.
    pub dev_auth_bypass: bool,
}

/// Env
///
/// Defines the runtime context: local development conveniences versus production.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking values for test state setup.
    fn default() -> Self {
        Self {
            db_url: None,
            env: Env::Local,
            jwt_secret: LOCAL_JWT_SECRET.to_string(),
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            admin_default_password: DEFAULT_ADMIN_PASSWORD.to_string(),
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            dev_auth_bypass: false,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from environment variables (fail-fast).
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL` or `JWT_SECRET` is missing, and in any
    /// environment when `SESSION_TTL_SECS` is not a number.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let (db_url, jwt_secret) = match env {
            Env::Production => (
                Some(env::var("DATABASE_URL").expect("FATAL: DATABASE_URL required in prod")),
                env::var("JWT_SECRET").expect("FATAL: JWT_SECRET must be set in production."),
            ),
            Env::Local => (
                env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
                env::var("JWT_SECRET").unwrap_or_else(|_| LOCAL_JWT_SECRET.to_string()),
            ),
        };

        let session_ttl_secs = match env::var("SESSION_TTL_SECS") {
            Ok(raw) => raw
                .parse()
                .expect("FATAL: SESSION_TTL_SECS must be a number of seconds"),
            Err(_) => DEFAULT_SESSION_TTL_SECS,
        };

        let dev_auth_bypass = env == Env::Local
            && matches!(env::var("DEV_AUTH_BYPASS").as_deref(), Ok("1") | Ok("true"));

        Self {
            db_url,
            env,
            jwt_secret,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            admin_default_password: env::var("ADMIN_DEFAULT_PASSWORD")
                .unwrap_or_else(|_| DEFAULT_ADMIN_PASSWORD.to_string()),
            session_ttl_secs,
            dev_auth_bypass,
        }
    }
}
