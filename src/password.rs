use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use std::sync::Arc;

use crate::errors::ServiceError;

/// PasswordHasher
///
/// One-way, salted password hashing. `UserService` calls `hash` exactly once per
/// password-setting event and never feeds an existing hash back in.
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, plaintext: &str) -> Result<String, ServiceError>;

    /// `false` for a wrong password and for a hash that cannot be parsed.
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// Shared handle stored in the service.
pub type HasherState = Arc<dyn PasswordHasher>;

/// Argon2id hasher producing PHC strings (`$argon2id$v=19$...`).
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses explicit cost parameters instead of the crate defaults.
    pub fn with_params(params: Params) -> Self {
        Self { params }
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, plaintext: &str) -> Result<String, ServiceError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ServiceError::Hashing(e.to_string()))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        // Cost parameters are read back from the PHC string.
        match PasswordHash::new(hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(plaintext.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }
}
