use std::collections::BTreeSet;
use user_admin::models::{
    PASSWORD_TOO_SHORT, ROLE_ADMIN, ROLE_USER, Role, User, UserDraft, UserRef, UserSubmission,
};

// --- Test Data Helpers ---

fn valid_draft() -> UserDraft {
    UserDraft {
        id: None,
        username: "alice".to_string(),
        password: "s3cretpass".to_string(),
        first_name: "Alice".to_string(),
        last_name: "Liddell".to_string(),
        age: Some(30),
        enabled: true,
    }
}

fn fields(draft: &UserDraft) -> Vec<String> {
    draft.validate().into_iter().map(|e| e.field).collect()
}

fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
    raw.iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// --- UserDraft::validate ---

#[test]
fn test_valid_draft_has_no_errors() {
    assert!(valid_draft().validate().is_empty());
}

#[test]
fn test_username_must_be_present_and_alphanumeric() {
    let mut draft = valid_draft();
    draft.username = String::new();
    assert_eq!(fields(&draft), vec!["username"]);

    draft.username = "bad name!".to_string();
    assert_eq!(fields(&draft), vec!["username"]);

    draft.username = "user42".to_string();
    assert!(fields(&draft).is_empty());
}

#[test]
fn test_names_accept_latin_and_cyrillic_letters_only() {
    let mut draft = valid_draft();
    draft.first_name = "Иван".to_string();
    draft.last_name = "Ёлкин".to_string();
    assert!(draft.validate().is_empty());

    draft.first_name = "R2D2".to_string();
    draft.last_name = "O'Neil".to_string();
    assert_eq!(fields(&draft), vec!["firstName", "lastName"]);

    draft.first_name = String::new();
    draft.last_name = String::new();
    assert!(draft.validate().is_empty(), "Empty names are allowed");
}

#[test]
fn test_age_bounds() {
    let mut draft = valid_draft();
    for (age, ok) in [(12, false), (13, true), (150, true), (151, false)] {
        draft.age = Some(age);
        assert_eq!(draft.validate().is_empty(), ok, "age {}", age);
    }

    draft.age = None;
    assert!(draft.validate().is_empty(), "Age is optional");
}

#[test]
fn test_password_required_on_create_only() {
    let mut draft = valid_draft();
    draft.password = String::new();
    let errors = draft.validate();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "password");
    assert_eq!(errors[0].message, PASSWORD_TOO_SHORT);

    // Editing: empty keeps the stored hash.
    draft.id = Some(7);
    assert!(draft.validate().is_empty());

    // Editing with a new but short password is still rejected.
    draft.password = "short".to_string();
    assert_eq!(fields(&draft), vec!["password"]);
}

#[test]
fn test_validate_reports_every_failing_field() {
    let draft = UserDraft {
        id: None,
        username: String::new(),
        password: "x".to_string(),
        first_name: "1".to_string(),
        last_name: "2".to_string(),
        age: Some(5),
        enabled: true,
    };
    assert_eq!(
        fields(&draft),
        vec!["username", "firstName", "lastName", "age", "password"]
    );
}

// --- UserSubmission::from_pairs ---

#[test]
fn test_submission_collects_repeated_role_ids() {
    let submission = UserSubmission::from_pairs(pairs(&[
        ("username", "bob"),
        ("password", "password1"),
        ("firstName", "Bob"),
        ("lastName", "Builder"),
        ("age", "40"),
        ("roleIds", "2"),
        ("roleIds", "1"),
        ("roleIds", "2"),
    ]));

    assert!(submission.errors.is_empty());
    assert_eq!(submission.role_ids, vec![2, 1]);
    assert_eq!(submission.draft.username, "bob");
    assert_eq!(submission.draft.first_name, "Bob");
    assert_eq!(submission.draft.age, Some(40));
    assert_eq!(submission.draft.id, None);
    assert!(submission.draft.enabled, "Absent checkbox group defaults to enabled");
}

#[test]
fn test_submission_checkbox_last_value_wins() {
    let unchecked = UserSubmission::from_pairs(pairs(&[("enabled", "false")]));
    assert!(!unchecked.draft.enabled);

    let checked = UserSubmission::from_pairs(pairs(&[("enabled", "false"), ("enabled", "true")]));
    assert!(checked.draft.enabled);
}

#[test]
fn test_submission_blank_id_and_age_are_absent() {
    let submission = UserSubmission::from_pairs(pairs(&[("id", ""), ("age", " ")]));
    assert!(submission.errors.is_empty());
    assert_eq!(submission.draft.id, None);
    assert_eq!(submission.draft.age, None);
}

#[test]
fn test_submission_reports_non_numeric_fields() {
    let submission =
        UserSubmission::from_pairs(pairs(&[("id", "x"), ("age", "old"), ("roleIds", "admin")]));
    let fields: Vec<_> = submission.errors.iter().map(|e| e.field.as_str()).collect();
    assert_eq!(fields, vec!["id", "age", "roleIds"]);
    assert!(submission.role_ids.is_empty());
}

#[test]
fn test_submission_keeps_password_exactly_as_typed() {
    let submission = UserSubmission::from_pairs(pairs(&[
        ("username", "  bob "),
        ("password", " secretpass1 "),
        ("firstName", " Bob "),
    ]));

    assert_eq!(submission.draft.username, "bob");
    assert_eq!(submission.draft.first_name, "Bob");
    assert_eq!(submission.draft.password, " secretpass1 ");

    // A whitespace-only password is a new password, not "keep the stored one".
    let blank = UserSubmission::from_pairs(pairs(&[("password", "         ")]));
    assert_eq!(blank.draft.password, "         ");
}

// --- User / Role / UserRef ---

#[test]
fn test_user_authorities_follow_roles() {
    let mut user = User::new("carol", "hash");
    assert!(user.enabled);
    assert!(!user.is_admin());

    user.roles = BTreeSet::from([Role::new(2, ROLE_USER), Role::new(1, ROLE_ADMIN)]);
    assert!(user.is_admin());
    assert!(user.has_authority(ROLE_USER));
    assert_eq!(user.authorities(), vec![ROLE_ADMIN, ROLE_USER]);
    assert_eq!(user.role_ids(), vec![1, 2]);
}

#[test]
fn test_user_serialization_never_exposes_password_hash() {
    let user = User::new("dave", "$argon2id$secret");
    let json = serde_json::to_value(&user).unwrap();
    assert!(json.get("password_hash").is_none());
    assert_eq!(json["username"], "dave");
}

#[test]
fn test_role_display_name_strips_prefix() {
    assert_eq!(Role::new(1, ROLE_ADMIN).display_name(), "ADMIN");
    assert_eq!(Role::new(3, "AUDITOR").display_name(), "AUDITOR");
}

#[test]
fn test_user_ref_parse() {
    assert_eq!(UserRef::parse("42"), UserRef::Id(42));
    assert_eq!(UserRef::parse("erin"), UserRef::Username("erin".to_string()));
    assert_eq!(UserRef::Id(42).to_string(), "user #42");
    assert_eq!(UserRef::parse("erin").to_string(), "user 'erin'");
}

#[test]
fn test_draft_from_user_starts_with_empty_password() {
    let mut user = User::new("frank", "hash");
    user.id = Some(3);
    user.age = 0;
    let draft = UserDraft::from_user(&user);
    assert_eq!(draft.id, Some(3));
    assert!(draft.password.is_empty());
    assert_eq!(draft.age, None, "A stored age of 0 means unset");
}
