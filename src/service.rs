use std::collections::BTreeSet;
use std::sync::Arc;

use crate::errors::{FieldError, RepositoryError, ServiceError};
use crate::models::{
    ADMIN_USERNAME, ROLE_ADMIN, ROLE_USER, Role, USERNAME_TAKEN, User, UserDraft, UserRef,
};
use crate::password::{HasherState, PasswordHasher};
use crate::repository::RepositoryState;

/// What the startup bootstrap had to do for the `admin` account.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// The account did not exist and was created with both roles.
    Created,
    /// The account existed without `ROLE_ADMIN`; the association was added.
    Repaired,
    Unchanged,
}

/// How `write` treats a draft id that no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MissingTarget {
    // `POST /admin/save`: start a fresh record instead.
    Insert,
    // `PATCH /admin/user/{id}`: report `NotFound`.
    Reject,
}

/// UserService
///
/// Orchestrates every user mutation: validation, username uniqueness, password hashing
/// and role resolution all happen before the single store write, so a failed call never
/// leaves partial state behind.
#[derive(Clone)]
pub struct UserService {
    repo: RepositoryState,
    hasher: HasherState,
}

impl UserService {
    pub fn new(repo: RepositoryState, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { repo, hasher }
    }

    pub fn hasher(&self) -> &HasherState {
        &self.hasher
    }

    // --- Reads ---

    /// Loads the account for the authorization layer, with its full role set.
    pub async fn authenticate(&self, username: &str) -> Result<User, ServiceError> {
        self.repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| ServiceError::not_found(UserRef::Username(username.to_string()).to_string()))
    }

    /// Form login. Unknown users, wrong passwords and disabled accounts are
    /// indistinguishable to the caller.
    pub async fn login(&self, username: &str, password: &str) -> Result<User, ServiceError> {
        let user = match self.authenticate(username).await {
            Ok(user) => user,
            Err(ServiceError::NotFound(_)) => return Err(ServiceError::BadCredentials),
            Err(e) => return Err(e),
        };

        if !user.enabled || !self.hasher.verify(password, &user.password_hash) {
            tracing::debug!(username = %username, "login rejected");
            return Err(ServiceError::BadCredentials);
        }

        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.repo.find_all().await?)
    }

    pub async fn list_roles(&self) -> Result<Vec<Role>, ServiceError> {
        Ok(self.repo.find_all_roles().await?)
    }

    pub async fn count_users(&self) -> Result<i64, ServiceError> {
        Ok(self.repo.count().await?)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<User, ServiceError> {
        self.find(&UserRef::Id(id)).await
    }

    pub async fn find(&self, target: &UserRef) -> Result<User, ServiceError> {
        let found = match target {
            UserRef::Id(id) => self.repo.find_by_id(*id).await?,
            UserRef::Username(username) => self.repo.find_by_username(username).await?,
        };
        found.ok_or_else(|| ServiceError::not_found(target.to_string()))
    }

    /// True when a user *other than* `excluding_id` already holds `username`.
    /// `None` means "any user", which is the create case.
    pub async fn username_taken(
        &self,
        username: &str,
        excluding_id: Option<i64>,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .repo
            .find_by_username(username)
            .await?
            .is_some_and(|user| user.id != excluding_id))
    }

    // --- Writes ---

    /// save
    ///
    /// Create or update from a form draft. A draft id that no longer resolves is treated
    /// as a new record. Non-empty `role_ids` replace the role set; an empty slice leaves
    /// the existing roles untouched.
    pub async fn save(&self, draft: UserDraft, role_ids: &[i64]) -> Result<User, ServiceError> {
        self.write(draft, role_ids, MissingTarget::Insert).await
    }

    /// update
    ///
    /// Same rules as `save`, but `id` is authoritative and must exist.
    pub async fn update(
        &self,
        id: i64,
        mut draft: UserDraft,
        role_ids: &[i64],
    ) -> Result<User, ServiceError> {
        draft.id = Some(id);
        self.write(draft, role_ids, MissingTarget::Reject).await
    }

    async fn write(
        &self,
        draft: UserDraft,
        role_ids: &[i64],
        missing: MissingTarget,
    ) -> Result<User, ServiceError> {
        let mut errors = draft.validate();
        if errors.iter().all(|e| e.field != "username")
            && self.username_taken(&draft.username, draft.id).await?
        {
            errors.push(FieldError::new("username", USERNAME_TAKEN));
        }
        if !errors.is_empty() {
            return Err(ServiceError::Validation(errors));
        }

        let existing = match draft.id {
            Some(id) => self.repo.find_by_id(id).await?,
            None => None,
        };
        if existing.is_none() {
            if let (Some(id), MissingTarget::Reject) = (draft.id, missing) {
                return Err(ServiceError::not_found(UserRef::Id(id).to_string()));
            }
        }

        let roles = self.resolve_roles(role_ids).await?;

        let is_new = existing.is_none();
        let mut target = existing.unwrap_or_default();
        target.first_name = draft.first_name;
        target.last_name = draft.last_name;
        target.age = draft.age.unwrap_or(0);
        target.enabled = draft.enabled;
        target.username = draft.username;

        if !draft.password.is_empty() || is_new {
            target.password_hash = self.hasher.hash(&draft.password)?;
        }

        if let Some(roles) = roles {
            target.roles = roles;
        }

        let saved = self.persist(target).await?;
        tracing::info!(
            user_id = ?saved.id,
            username = %saved.username,
            created = is_new,
            "user saved"
        );
        Ok(saved)
    }

    /// `None` when no ids were submitted, meaning "keep the current roles".
    async fn resolve_roles(&self, role_ids: &[i64]) -> Result<Option<BTreeSet<Role>>, ServiceError> {
        if role_ids.is_empty() {
            return Ok(None);
        }

        let mut roles = BTreeSet::new();
        for &role_id in role_ids {
            let role = self
                .repo
                .find_role_by_id(role_id)
                .await?
                .ok_or(ServiceError::RoleNotFound(role_id))?;
            roles.insert(role);
        }
        Ok(Some(roles))
    }

    /// The single store write. A uniqueness breach that slipped past the pre-check
    /// (a concurrent writer) is reported as a username validation failure.
    async fn persist(&self, user: User) -> Result<User, ServiceError> {
        match self.repo.save(user).await {
            Ok(saved) => Ok(saved),
            Err(RepositoryError::ConstraintViolation(detail)) => {
                tracing::warn!("user write rejected by storage constraint: {}", detail);
                Err(ServiceError::Validation(vec![FieldError::new(
                    "username",
                    USERNAME_TAKEN,
                )]))
            }
            Err(RepositoryError::UnknownRole(role_id)) => Err(ServiceError::RoleNotFound(role_id)),
            Err(RepositoryError::RowNotFound(id)) => {
                Err(ServiceError::not_found(UserRef::Id(id).to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn change_password(
        &self,
        username: &str,
        new_password: &str,
    ) -> Result<(), ServiceError> {
        if new_password.is_empty() {
            return Err(ServiceError::InvalidArgument(
                "password must not be empty".to_string(),
            ));
        }

        let mut user = self.authenticate(username).await?;
        user.password_hash = self.hasher.hash(new_password)?;
        self.persist(user).await?;

        tracing::info!(username = %username, "password changed");
        Ok(())
    }

    /// Deletes by id or username. A missing target is always reported as `NotFound`.
    pub async fn delete_user(&self, target: &UserRef) -> Result<(), ServiceError> {
        let deleted = match target {
            UserRef::Id(id) => self.repo.delete_by_id(*id).await?,
            UserRef::Username(username) => self.repo.delete_by_username(username).await?,
        };

        if !deleted {
            return Err(ServiceError::not_found(target.to_string()));
        }

        tracing::info!("deleted {}", target);
        Ok(())
    }

    /// ensure_admin_account_exists
    ///
    /// Idempotent startup step: creates `admin` with `default_password` and both roles
    /// when missing, and restores a missing `ROLE_ADMIN` association otherwise.
    pub async fn ensure_admin_account_exists(
        &self,
        default_password: &str,
    ) -> Result<BootstrapOutcome, ServiceError> {
        let admin_role = self.seeded_role(ROLE_ADMIN).await?;

        match self.repo.find_by_username(ADMIN_USERNAME).await? {
            None => {
                let user_role = self.seeded_role(ROLE_USER).await?;
                let mut admin = User::new(ADMIN_USERNAME, self.hasher.hash(default_password)?);
                admin.roles = BTreeSet::from([admin_role, user_role]);
                self.persist(admin).await?;
                Ok(BootstrapOutcome::Created)
            }
            Some(mut admin) if !admin.is_admin() => {
                admin.roles.insert(admin_role);
                self.persist(admin).await?;
                Ok(BootstrapOutcome::Repaired)
            }
            Some(_) => Ok(BootstrapOutcome::Unchanged),
        }
    }

    async fn seeded_role(&self, authority: &str) -> Result<Role, ServiceError> {
        self.repo
            .find_role_by_authority(authority)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("role '{}'", authority)))
    }
}
