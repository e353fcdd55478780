/// Router Module Index
///
/// Splits the route table by the audience the access policy grants it to. The split is
/// organisational: authorization itself is decided once per request by the
/// access-control middleware in `lib.rs`.

/// Routes open to anonymous visitors (landing, login, logout, health).
pub mod public;

/// Routes for any signed-in principal.
pub mod authenticated;

/// Routes requiring `ROLE_ADMIN`.
pub mod admin;
