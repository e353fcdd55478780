//! Role-based access rules, evaluated for every incoming request before routing.
//!
//! The policy only sees the request path and the principal's authority names, so it is
//! independent of the route table and of how roles are stored.

use crate::models::{ROLE_ADMIN, ROLE_USER};

pub const LOGIN_PATH: &str = "/login";
pub const FORBIDDEN_PATH: &str = "/403";

/// Outcome of evaluating the policy for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Allow,
    /// No principal on a protected path: redirect to the login challenge.
    LoginRequired,
    /// A principal without the required authority: redirect to the forbidden view.
    Forbidden,
}

#[derive(Debug, Clone, Copy)]
enum Requirement {
    Anyone,
    AnyAuthority(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    prefix: &'static str,
    requirement: Requirement,
}

/// First matching rule wins; paths matching no rule need any authenticated principal.
const RULES: &[Rule] = &[
    Rule { prefix: "/", requirement: Requirement::Anyone },
    Rule { prefix: "/index", requirement: Requirement::Anyone },
    Rule { prefix: "/login", requirement: Requirement::Anyone },
    Rule { prefix: "/logout", requirement: Requirement::Anyone },
    Rule { prefix: "/health", requirement: Requirement::Anyone },
    Rule { prefix: "/swagger-ui", requirement: Requirement::Anyone },
    Rule { prefix: "/api-docs", requirement: Requirement::Anyone },
    Rule { prefix: "/admin", requirement: Requirement::AnyAuthority(&[ROLE_ADMIN]) },
    Rule { prefix: "/user", requirement: Requirement::AnyAuthority(&[ROLE_USER, ROLE_ADMIN]) },
];

/// AccessPolicy
///
/// The static path-prefix → authority mapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    /// Decides access for `path`. `authorities` is `None` for anonymous requests and the
    /// principal's authority names otherwise.
    pub fn decide<S: AsRef<str>>(path: &str, authorities: Option<&[S]>) -> AccessDecision {
        let rule = RULES.iter().find(|rule| matches_prefix(path, rule.prefix));

        match (rule.map(|r| r.requirement), authorities) {
            (Some(Requirement::Anyone), _) => AccessDecision::Allow,
            (_, None) => AccessDecision::LoginRequired,
            (Some(Requirement::AnyAuthority(required)), Some(held)) => {
                if held.iter().any(|a| required.contains(&a.as_ref())) {
                    AccessDecision::Allow
                } else {
                    AccessDecision::Forbidden
                }
            }
            (None, Some(_)) => AccessDecision::Allow,
        }
    }
}

/// Segment-aware prefix match: `/admin` covers `/admin` and `/admin/...` but not
/// `/administrator`. The root prefix `/` only matches the root itself.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
