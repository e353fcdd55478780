use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use std::collections::BTreeSet;

use super::{RoleRepository, UserRepository};
use crate::errors::RepositoryError;
use crate::models::{Role, User};

/// Users joined with their roles. One row per (user, role) pair, or a single row with
/// NULL role columns for a user without roles.
const USER_WITH_ROLES: &str = r#"
    SELECT
        u.id, u.username, u.password, u.first_name, u.last_name, u.age, u.enabled,
        a.id AS role_id, a.authority AS role_authority
    FROM users u
    LEFT JOIN user_roles ur ON ur.user_id = u.id
    LEFT JOIN authorities a ON a.id = ur.role_id
"#;

#[derive(Debug, FromRow)]
struct UserRoleRow {
    id: i64,
    username: String,
    password: String,
    first_name: String,
    last_name: String,
    age: i32,
    enabled: bool,
    role_id: Option<i64>,
    role_authority: Option<String>,
}

/// Folds the joined rows (ordered by user id) into users with their role sets.
fn fold_rows(rows: Vec<UserRoleRow>) -> Vec<User> {
    let mut users: Vec<User> = Vec::new();

    for row in rows {
        let role = match (row.role_id, row.role_authority) {
            (Some(id), Some(authority)) => Some(Role { id, authority }),
            _ => None,
        };

        match users.last_mut() {
            Some(current) if current.id == Some(row.id) => current.roles.extend(role),
            _ => users.push(User {
                id: Some(row.id),
                username: row.username,
                password_hash: row.password,
                first_name: row.first_name,
                last_name: row.last_name,
                age: row.age,
                enabled: row.enabled,
                roles: role.into_iter().collect::<BTreeSet<_>>(),
            }),
        }
    }

    users
}

/// Uniqueness breaches become `ConstraintViolation`.
fn map_write_error(error: sqlx::Error) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::ConstraintViolation(
                db.constraint()
                    .map(|name| format!("{}: {}", name, db.message()))
                    .unwrap_or_else(|| db.message().to_string()),
            )
        }
        _ => RepositoryError::Database(error),
    }
}

/// PostgresRepository
///
/// The concrete implementation of both stores, backed by PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations (`migrations/`), which also seed the roles.
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn fetch_users(
        &self,
        filter: &str,
        bind: Option<FilterValue<'_>>,
    ) -> Result<Vec<User>, RepositoryError> {
        let sql = format!("{} {} ORDER BY u.id, a.id", USER_WITH_ROLES, filter);
        let query = sqlx::query_as::<_, UserRoleRow>(&sql);
        let query = match bind {
            Some(FilterValue::Id(id)) => query.bind(id),
            Some(FilterValue::Username(username)) => query.bind(username),
            None => query,
        };
        let rows = query.fetch_all(&self.pool).await?;
        Ok(fold_rows(rows))
    }
}

enum FilterValue<'a> {
    Id(i64),
    Username(&'a str),
}

#[async_trait]
impl UserRepository for PostgresRepository {
    async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
        self.fetch_users("", None).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let users = self
            .fetch_users("WHERE u.id = $1", Some(FilterValue::Id(id)))
            .await?;
        Ok(users.into_iter().next())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let users = self
            .fetch_users("WHERE u.username = $1", Some(FilterValue::Username(username)))
            .await?;
        Ok(users.into_iter().next())
    }

    /// save
    ///
    /// Writes the user row and replaces its `user_roles` rows inside one transaction.
    /// Dropping the transaction on any error rolls everything back.
    async fn save(&self, user: User) -> Result<User, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id = match user.id {
            None => sqlx::query_scalar::<_, i64>(
                r#"INSERT INTO users (username, password, first_name, last_name, age, enabled)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   RETURNING id"#,
            )
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .bind(user.age)
            .bind(user.enabled)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_write_error)?,
            Some(id) => {
                let result = sqlx::query(
                    r#"UPDATE users
                       SET username = $2, password = $3, first_name = $4,
                           last_name = $5, age = $6, enabled = $7
                       WHERE id = $1"#,
                )
                .bind(id)
                .bind(&user.username)
                .bind(&user.password_hash)
                .bind(&user.first_name)
                .bind(&user.last_name)
                .bind(user.age)
                .bind(user.enabled)
                .execute(&mut *tx)
                .await
                .map_err(map_write_error)?;

                if result.rows_affected() == 0 {
                    return Err(RepositoryError::RowNotFound(id));
                }
                id
            }
        };

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        for role in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role_id) VALUES ($1, $2)")
                .bind(id)
                .bind(role.id)
                .execute(&mut *tx)
                .await
                .map_err(|e| match &e {
                    sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                        RepositoryError::UnknownRole(role.id)
                    }
                    _ => map_write_error(e),
                })?;
        }

        tx.commit().await?;

        Ok(User {
            id: Some(id),
            ..user
        })
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_username(&self, username: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE username = $1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl RoleRepository for PostgresRepository {
    async fn find_all_roles(&self) -> Result<Vec<Role>, RepositoryError> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, authority FROM authorities ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn find_role_by_id(&self, id: i64) -> Result<Option<Role>, RepositoryError> {
        let role = sqlx::query_as::<_, Role>("SELECT id, authority FROM authorities WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn find_role_by_authority(
        &self,
        authority: &str,
    ) -> Result<Option<Role>, RepositoryError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT id, authority FROM authorities WHERE authority = $1",
        )
        .bind(authority)
        .fetch_optional(&self.pool)
        .await?;
        Ok(role)
    }
}
