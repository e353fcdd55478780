use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

use super::{RoleRepository, UserRepository};
use crate::errors::RepositoryError;
use crate::models::{ROLE_ADMIN, ROLE_USER, Role, User};

/// InMemoryRepository
///
/// Process-local store with the same contract as the Postgres backend: ids are assigned
/// on insert, usernames are unique, and `user_roles` rows are removed with their user.
/// Each write runs under a single write guard, so readers never see a half-applied save.
///
/// Used when no `DATABASE_URL` is configured in local mode, and by the test suites.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    // Users are stored without roles; the association lives in `user_roles`.
    users: BTreeMap<i64, User>,
    roles: BTreeMap<i64, Role>,
    user_roles: BTreeSet<(i64, i64)>,
    last_user_id: i64,
}

impl MemoryState {
    fn with_roles(&self, mut user: User) -> User {
        let id = user.id.unwrap_or_default();
        user.roles = self
            .user_roles
            .range((id, i64::MIN)..=(id, i64::MAX))
            .filter_map(|(_, role_id)| self.roles.get(role_id).cloned())
            .collect();
        user
    }

    fn user_id_by_username(&self, username: &str) -> Option<i64> {
        self.users
            .values()
            .find(|user| user.username == username)
            .and_then(|user| user.id)
    }

    fn remove_user(&mut self, id: i64) -> bool {
        self.user_roles.retain(|(user_id, _)| *user_id != id);
        self.users.remove(&id).is_some()
    }
}

impl InMemoryRepository {
    /// An empty store without any roles.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds `ROLE_ADMIN` (id 1) and `ROLE_USER` (id 2), mirroring the migrations.
    pub fn with_default_roles() -> Self {
        Self::with_roles(&[ROLE_ADMIN, ROLE_USER])
    }

    /// Seeds the given authorities with ids starting at 1.
    pub fn with_roles(authorities: &[&str]) -> Self {
        let roles = authorities
            .iter()
            .zip(1..)
            .map(|(authority, id)| (id, Role::new(id, *authority)))
            .collect();

        Self {
            state: RwLock::new(MemoryState {
                roles,
                ..MemoryState::default()
            }),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryRepository {
    async fn find_all(&self) -> Result<Vec<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .map(|user| state.with_roles(user.clone()))
            .collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state.users.get(&id).map(|user| state.with_roles(user.clone())))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .user_id_by_username(username)
            .and_then(|id| state.users.get(&id))
            .map(|user| state.with_roles(user.clone())))
    }

    async fn save(&self, mut user: User) -> Result<User, RepositoryError> {
        let mut state = self.state.write().await;

        if let Some(owner) = state.user_id_by_username(&user.username) {
            if user.id != Some(owner) {
                return Err(RepositoryError::ConstraintViolation(format!(
                    "users_username_key: username '{}' already exists",
                    user.username
                )));
            }
        }

        if let Some(role) = user.roles.iter().find(|role| !state.roles.contains_key(&role.id)) {
            return Err(RepositoryError::UnknownRole(role.id));
        }

        let id = match user.id {
            Some(id) if !state.users.contains_key(&id) => {
                return Err(RepositoryError::RowNotFound(id));
            }
            Some(id) => id,
            None => {
                state.last_user_id += 1;
                state.last_user_id
            }
        };
        user.id = Some(id);

        let role_ids: Vec<i64> = user.roles.iter().map(|role| role.id).collect();
        state.user_roles.retain(|(user_id, _)| *user_id != id);
        state
            .user_roles
            .extend(role_ids.into_iter().map(|role_id| (id, role_id)));

        let mut row = user;
        row.roles.clear();
        state.users.insert(id, row.clone());

        Ok(state.with_roles(row))
    }

    async fn delete_by_id(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        Ok(state.remove_user(id))
    }

    async fn delete_by_username(&self, username: &str) -> Result<bool, RepositoryError> {
        let mut state = self.state.write().await;
        match state.user_id_by_username(username) {
            Some(id) => Ok(state.remove_user(id)),
            None => Ok(false),
        }
    }

    async fn count(&self) -> Result<i64, RepositoryError> {
        Ok(self.state.read().await.users.len() as i64)
    }
}

#[async_trait]
impl RoleRepository for InMemoryRepository {
    async fn find_all_roles(&self) -> Result<Vec<Role>, RepositoryError> {
        Ok(self.state.read().await.roles.values().cloned().collect())
    }

    async fn find_role_by_id(&self, id: i64) -> Result<Option<Role>, RepositoryError> {
        Ok(self.state.read().await.roles.get(&id).cloned())
    }

    async fn find_role_by_authority(
        &self,
        authority: &str,
    ) -> Result<Option<Role>, RepositoryError> {
        Ok(self
            .state
            .read()
            .await
            .roles
            .values()
            .find(|role| role.authority == authority)
            .cloned())
    }
}
