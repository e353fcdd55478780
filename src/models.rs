use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeSet;
use std::fmt;
use utoipa::ToSchema;

use crate::errors::FieldError;

// --- Well-known Names ---

/// Authority granting the admin path space.
pub const ROLE_ADMIN: &str = "ROLE_ADMIN";
/// Authority granting the user path space.
pub const ROLE_USER: &str = "ROLE_USER";
/// Username of the account created by the startup bootstrap.
pub const ADMIN_USERNAME: &str = "admin";

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const MIN_AGE: i32 = 13;
pub const MAX_AGE: i32 = 150;

// Field messages shared between the form validator and the service.
pub const USERNAME_TAKEN: &str = "This username is already in use";
pub const PASSWORD_TOO_SHORT: &str = "Password must be at least 8 characters long";

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// A named authority stored in the `authorities` table (e.g. `ROLE_ADMIN`).
/// Roles are fixture data seeded by the migrations. The access policy only ever looks
/// at the `authority` string, never at the record identity.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, FromRow, ToSchema,
)]
pub struct Role {
    pub id: i64,
    pub authority: String,
}

impl Role {
    pub fn new(id: i64, authority: impl Into<String>) -> Self {
        Self {
            id,
            authority: authority.into(),
        }
    }

    /// The authority without its `ROLE_` prefix, as shown in the views.
    pub fn display_name(&self) -> &str {
        self.authority
            .strip_prefix("ROLE_")
            .unwrap_or(&self.authority)
    }
}

/// User
///
/// One account row from the `users` table together with its complete role set.
/// Every read path (by id, by username, listing) populates `roles` in the same read.
///
/// `id` is `None` only for records that have not been persisted yet; the store
/// inserts those and assigns the identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Option<i64>,
    pub username: String,
    // PHC-formatted hash. Never serialized into responses.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub enabled: bool,
    pub roles: BTreeSet<Role>,
}

impl Default for User {
    fn default() -> Self {
        Self {
            id: None,
            username: String::new(),
            password_hash: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            age: 0,
            enabled: true,
            roles: BTreeSet::new(),
        }
    }
}

impl User {
    /// Creates an unsaved, enabled account without roles.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: password_hash.into(),
            ..Self::default()
        }
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.roles.iter().any(|role| role.authority == authority)
    }

    pub fn is_admin(&self) -> bool {
        self.has_authority(ROLE_ADMIN)
    }

    /// Authority names in stable (role id) order.
    pub fn authorities(&self) -> Vec<String> {
        self.roles.iter().map(|role| role.authority.clone()).collect()
    }

    pub fn role_ids(&self) -> Vec<i64> {
        self.roles.iter().map(|role| role.id).collect()
    }
}

/// UserRef
///
/// Identifies the target of a lookup or delete. Admin routes accept either the numeric
/// id or the username in the same path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserRef {
    Id(i64),
    Username(String),
}

impl UserRef {
    /// Numeric segments are ids, anything else is a username.
    pub fn parse(segment: &str) -> Self {
        match segment.parse::<i64>() {
            Ok(id) => UserRef::Id(id),
            Err(_) => UserRef::Username(segment.to_string()),
        }
    }
}

impl fmt::Display for UserRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserRef::Id(id) => write!(f, "user #{}", id),
            UserRef::Username(username) => write!(f, "user '{}'", username),
        }
    }
}

// --- Request Payloads (Input Schemas) ---

/// UserDraft
///
/// The not-yet-validated user record submitted by the admin forms. It is distinct from
/// the persisted `User` it may update: the password is plaintext here and an empty
/// password on an existing record means "keep the current one".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserDraft {
    pub id: Option<i64>,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    #[serde(rename = "firstName")]
    pub first_name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub age: Option<i32>,
    pub enabled: bool,
}

impl Default for UserDraft {
    fn default() -> Self {
        Self {
            id: None,
            username: String::new(),
            password: String::new(),
            first_name: String::new(),
            last_name: String::new(),
            age: None,
            enabled: true,
        }
    }
}

impl UserDraft {
    /// Prefills an edit form. The password field always starts empty.
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            password: String::new(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            age: (user.age != 0).then_some(user.age),
            enabled: user.enabled,
        }
    }

    /// Field-level checks. Returns every failing field, not just the first.
    ///
    /// Passwords are mandatory when creating (`id` is `None`); when editing, an empty
    /// password is allowed and means the stored hash is retained.
    pub fn validate(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.username.is_empty() {
            errors.push(FieldError::new("username", "Username must not be empty"));
        } else if !self.username.chars().all(|c| c.is_ascii_alphanumeric()) {
            errors.push(FieldError::new(
                "username",
                "Username may only contain Latin letters and digits",
            ));
        }

        if !is_letters_or_empty(&self.first_name) {
            errors.push(FieldError::new("firstName", "First name may only contain letters"));
        }
        if !is_letters_or_empty(&self.last_name) {
            errors.push(FieldError::new("lastName", "Last name may only contain letters"));
        }

        if let Some(age) = self.age {
            if age < MIN_AGE {
                errors.push(FieldError::new("age", "The service is only available from age 13"));
            } else if age > MAX_AGE {
                errors.push(FieldError::new("age", "Age cannot be greater than 150"));
            }
        }

        let creating = self.id.is_none();
        let password_len = self.password.chars().count();
        if (creating || password_len > 0) && password_len < MIN_PASSWORD_LENGTH {
            errors.push(FieldError::new("password", PASSWORD_TOO_SHORT));
        }

        errors
    }
}

/// Latin or Cyrillic letters only; the empty string is accepted.
fn is_letters_or_empty(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphabetic() || ('А'..='я').contains(&c) || c == 'Ё' || c == 'ё')
}

/// UserSubmission
///
/// A decoded `application/x-www-form-urlencoded` user form. The form carries repeated
/// `roleIds` fields and a checkbox, so it is decoded from raw pairs rather than through a
/// derived struct.
#[derive(Debug, Clone, Default)]
pub struct UserSubmission {
    pub draft: UserDraft,
    pub role_ids: Vec<i64>,
    /// Decoding problems (non-numeric age or role id), reported like validation errors.
    pub errors: Vec<FieldError>,
}

impl UserSubmission {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut submission = UserSubmission::default();
        let mut enabled: Option<bool> = None;

        for (key, raw) in pairs {
            // Passwords are hashed exactly as typed; every other field is trimmed.
            if key == "password" {
                submission.draft.password = raw;
                continue;
            }

            let value = raw.trim().to_string();
            match key.as_str() {
                "id" if !value.is_empty() => match value.parse::<i64>() {
                    Ok(id) => submission.draft.id = Some(id),
                    Err(_) => submission
                        .errors
                        .push(FieldError::new("id", "Invalid user id")),
                },
                "username" => submission.draft.username = value,
                "firstName" => submission.draft.first_name = value,
                "lastName" => submission.draft.last_name = value,
                "age" if !value.is_empty() => match value.parse::<i32>() {
                    Ok(age) => submission.draft.age = Some(age),
                    Err(_) => submission
                        .errors
                        .push(FieldError::new("age", "Age must be a whole number")),
                },
                // Forms send a hidden `enabled=false` before the checkbox; the last value wins.
                "enabled" => enabled = Some(matches!(value.as_str(), "true" | "on" | "1")),
                "roleIds" if !value.is_empty() => match value.parse::<i64>() {
                    Ok(role_id) => {
                        if !submission.role_ids.contains(&role_id) {
                            submission.role_ids.push(role_id);
                        }
                    }
                    Err(_) => submission
                        .errors
                        .push(FieldError::new("roleIds", "Invalid role id")),
                },
                _ => {}
            }
        }

        submission.draft.enabled = enabled.unwrap_or(true);
        submission
    }
}

/// LoginForm
///
/// Input payload for the form login (POST /login).
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// ChangePasswordForm
///
/// Input payload for POST /admin/change-password/{username}.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangePasswordForm {
    pub password: String,
}
