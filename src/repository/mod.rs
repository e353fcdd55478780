use async_trait::async_trait;
use std::sync::Arc;

use crate::errors::RepositoryError;
use crate::models::{Role, User};

pub mod memory;
pub mod postgres;

pub use memory::InMemoryRepository;
pub use postgres::PostgresRepository;

/// UserRepository
///
/// Persistence contract for user records. Every read returns users with their full
/// role set loaded in the same read.
///
/// **Send + Sync + async_trait** are required so the trait object can be shared across
/// Axum's asynchronous task boundaries.
#[async_trait]
pub trait UserRepository: Send + Sync {
    // Stable order is not guaranteed by the contract; both backends return id order.
    async fn find_all(&self) -> Result<Vec<User>, RepositoryError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError>;

    /// Inserts when `user.id` is `None`, updates otherwise. The user row and its role
    /// associations are written atomically.
    ///
    /// Fails with `ConstraintViolation` when the username is held by another user,
    /// `UnknownRole` when a role does not exist, and `RowNotFound` when updating an id
    /// that does not exist.
    async fn save(&self, user: User) -> Result<User, RepositoryError>;

    /// Returns `false` when no such user existed. Role associations go with the user.
    async fn delete_by_id(&self, id: i64) -> Result<bool, RepositoryError>;
    async fn delete_by_username(&self, username: &str) -> Result<bool, RepositoryError>;

    async fn count(&self) -> Result<i64, RepositoryError>;
}

/// RoleRepository
///
/// Read-only access to the seeded authorities.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn find_all_roles(&self) -> Result<Vec<Role>, RepositoryError>;
    async fn find_role_by_id(&self, id: i64) -> Result<Option<Role>, RepositoryError>;
    async fn find_role_by_authority(&self, authority: &str)
    -> Result<Option<Role>, RepositoryError>;
}

/// Both stores behind one handle, as consumed by `UserService`.
pub trait Repository: UserRepository + RoleRepository {}

impl<T: UserRepository + RoleRepository> Repository for T {}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;
