use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::views;

/// FieldError
///
/// A single field-level validation message, rendered next to the offending form input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// RepositoryError
///
/// Failures raised by the persistence layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A uniqueness constraint rejected the write.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// A role association referenced an authority that does not exist.
    #[error("role #{0} does not exist")]
    UnknownRole(i64),

    /// An update targeted a user id that no longer exists.
    #[error("user #{0} does not exist")]
    RowNotFound(i64),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// ServiceError
///
/// The error taxonomy surfaced by `UserService`. Storage-level constraint violations are
/// translated into `Validation` by the service and never reach callers as raw storage
/// errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("validation failed on {} field(s)", .0.len())]
    Validation(Vec<FieldError>),

    #[error("{0} not found")]
    NotFound(String),

    #[error("role #{0} not found")]
    RoleNotFound(i64),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("bad credentials")]
    BadCredentials,

    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    /// Field errors carried by a `Validation` failure, empty otherwise.
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            ServiceError::Validation(errors) => errors,
            _ => &[],
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::RoleNotFound(_) | ServiceError::InvalidArgument(_) => {
                StatusCode::BAD_REQUEST
            }
            ServiceError::BadCredentials => StatusCode::UNAUTHORIZED,
            ServiceError::Hashing(_) | ServiceError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Renders the error as an HTML page. Internal failures are logged and replaced by a
/// generic message so storage details never reach the browser.
impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            ServiceError::Hashing(_) | ServiceError::Storage(_) => {
                tracing::error!("request failed: {:?}", self);
                "Something went wrong. Please try again later.".to_string()
            }
            other => other.to_string(),
        };
        (status, views::error_page(status, &message)).into_response()
    }
}
