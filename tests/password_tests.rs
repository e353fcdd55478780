use argon2::Params;
use user_admin::password::{Argon2Hasher, PasswordHasher};

fn fast_hasher() -> Argon2Hasher {
    Argon2Hasher::with_params(Params::new(1024, 1, 1, None).unwrap())
}

#[test]
fn test_hash_is_salted_phc_string() {
    let hasher = fast_hasher();
    let first = hasher.hash("correct horse").unwrap();
    let second = hasher.hash("correct horse").unwrap();

    assert!(first.starts_with("$argon2id$"));
    assert_ne!(first, "correct horse");
    assert_ne!(first, second, "Each hash gets its own salt");
}

#[test]
fn test_verify_accepts_only_the_original_password() {
    let hasher = fast_hasher();
    let hash = hasher.hash("correct horse").unwrap();

    assert!(hasher.verify("correct horse", &hash));
    assert!(!hasher.verify("Correct horse", &hash));
    assert!(!hasher.verify("", &hash));
}

#[test]
fn test_verify_rejects_malformed_hash() {
    let hasher = fast_hasher();
    assert!(!hasher.verify("anything", "not-a-phc-string"));
    assert!(!hasher.verify("anything", ""));
}

#[test]
fn test_hashes_are_portable_across_cost_parameters() {
    let cheap = fast_hasher().hash("portable").unwrap();
    assert!(Argon2Hasher::new().verify("portable", &cheap));
}
