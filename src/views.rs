//! Server-rendered HTML views.
//!
//! Every value interpolated into markup goes through `escape`.

use axum::{http::StatusCode, response::Html};
use std::fmt::Write;

use crate::auth::AuthUser;
use crate::errors::FieldError;
use crate::models::{Role, User, UserDraft};

/// Where a user form posts to and how it is labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, principal: Option<&AuthUser>, body: &str) -> Html<String> {
    let nav = match principal {
        Some(user) => format!(
            r#"<span>{} ({})</span> <form method="post" action="/logout" style="display:inline"><button type="submit">Logout</button></form>"#,
            escape(&user.username),
            escape(&user.authorities.join(", "))
        ),
        None => r#"<a href="/login">Login</a>"#.to_string(),
    };

    Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<header><nav>{nav}</nav></header>
<main>
{body}
</main>
</body>
</html>"#,
        title = escape(title),
        nav = nav,
        body = body
    ))
}

fn field_errors(errors: &[FieldError], field: &str) -> String {
    errors
        .iter()
        .filter(|e| e.field == field)
        .map(|e| format!(r#"<small class="error">{}</small>"#, escape(&e.message)))
        .collect()
}

fn role_labels(user: &User) -> String {
    user.roles
        .iter()
        .map(Role::display_name)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn landing(principal: Option<&AuthUser>) -> Html<String> {
    let body = match principal {
        Some(user) if user.is_admin() => r#"<h1>Welcome</h1><p><a href="/admin">Admin panel</a> | <a href="/user">My account</a></p>"#,
        Some(_) => r#"<h1>Welcome</h1><p><a href="/user">My account</a></p>"#,
        None => r#"<h1>Welcome</h1><p>Please <a href="/login">sign in</a>.</p>"#,
    };
    layout("Home", principal, body)
}

pub fn login_form(error: Option<&str>) -> Html<String> {
    let error = error
        .map(|message| format!(r#"<p class="error">{}</p>"#, escape(message)))
        .unwrap_or_default();
    let body = format!(
        r#"<h1>Sign in</h1>
{error}
<form method="post" action="/login">
  <label>Username <input name="username" required></label>
  <label>Password <input name="password" type="password" required></label>
  <button type="submit">Sign in</button>
</form>"#
    );
    layout("Sign in", None, &body)
}

fn user_table(users: &[User]) -> String {
    let mut rows = String::new();
    for user in users {
        let id = user.id.unwrap_or_default();
        let _ = write!(
            rows,
            r#"<tr><td>{id}</td><td>{username}</td><td>{first}</td><td>{last}</td><td>{age}</td><td>{enabled}</td><td>{roles}</td>
<td><a href="/admin/edit/{id}">Edit</a> <a href="/admin/change-password/{username}">Password</a> <form method="post" action="/admin/delete/{username}" style="display:inline"><button type="submit">Delete</button></form></td></tr>
"#,
            id = id,
            username = escape(&user.username),
            first = escape(&user.first_name),
            last = escape(&user.last_name),
            age = user.age,
            enabled = if user.enabled { "yes" } else { "no" },
            roles = escape(&role_labels(user)),
        );
    }

    format!(
        r#"<table>
<thead><tr><th>ID</th><th>Username</th><th>First name</th><th>Last name</th><th>Age</th><th>Enabled</th><th>Roles</th><th></th></tr></thead>
<tbody>
{rows}</tbody>
</table>"#
    )
}

fn user_form(
    mode: FormMode,
    draft: &UserDraft,
    roles: &[Role],
    selected: &[i64],
    errors: &[FieldError],
) -> String {
    let id_field = draft
        .id
        .map(|id| format!(r#"<input type="hidden" name="id" value="{}">"#, id))
        .unwrap_or_default();
    let password_hint = match mode {
        FormMode::Create => "",
        FormMode::Edit => " (leave empty to keep the current password)",
    };
    let age = draft.age.map(|age| age.to_string()).unwrap_or_default();

    let mut role_boxes = String::new();
    for role in roles {
        let checked = if selected.contains(&role.id) { " checked" } else { "" };
        let _ = write!(
            role_boxes,
            r#"<label><input type="checkbox" name="roleIds" value="{}"{}> {}</label> "#,
            role.id,
            checked,
            escape(role.display_name())
        );
    }

    format!(
        r#"<form method="post" action="/admin/save">
  {id_field}
  <label>Username <input name="username" value="{username}"></label> {username_errors}
  <label>Password{password_hint} <input name="password" type="password"></label> {password_errors}
  <label>First name <input name="firstName" value="{first}"></label> {first_errors}
  <label>Last name <input name="lastName" value="{last}"></label> {last_errors}
  <label>Age <input name="age" type="number" value="{age}"></label> {age_errors}
  <input type="hidden" name="enabled" value="false">
  <label><input type="checkbox" name="enabled" value="true"{enabled}> Enabled</label>
  <fieldset><legend>Roles</legend>{role_boxes}</fieldset> {role_errors}
  <button type="submit">{submit}</button>
</form>"#,
        id_field = id_field,
        username = escape(&draft.username),
        username_errors = field_errors(errors, "username"),
        password_hint = password_hint,
        password_errors = field_errors(errors, "password"),
        first = escape(&draft.first_name),
        first_errors = field_errors(errors, "firstName"),
        last = escape(&draft.last_name),
        last_errors = field_errors(errors, "lastName"),
        age = age,
        age_errors = field_errors(errors, "age"),
        enabled = if draft.enabled { " checked" } else { "" },
        role_boxes = role_boxes,
        role_errors = field_errors(errors, "roleIds"),
        submit = match mode {
            FormMode::Create => "Add user",
            FormMode::Edit => "Save changes",
        },
    )
}

/// The admin panel: all users plus the new-user form (pre-filled after a failed save).
pub fn admin_page(
    principal: &AuthUser,
    users: &[User],
    roles: &[Role],
    draft: &UserDraft,
    selected: &[i64],
    errors: &[FieldError],
) -> Html<String> {
    let body = format!(
        r#"<h1>Users</h1>
{table}
<h2>New user</h2>
{form}"#,
        table = user_table(users),
        form = user_form(FormMode::Create, draft, roles, selected, errors),
    );
    layout("Admin panel", Some(principal), &body)
}

/// Stand-alone create or edit form.
pub fn user_form_page(
    principal: Option<&AuthUser>,
    mode: FormMode,
    draft: &UserDraft,
    roles: &[Role],
    selected: &[i64],
    errors: &[FieldError],
) -> Html<String> {
    let title = match mode {
        FormMode::Create => "New user".to_string(),
        FormMode::Edit => format!("Edit {}", draft.username),
    };
    let body = format!(
        "<h1>{}</h1>\n{}",
        escape(&title),
        user_form(mode, draft, roles, selected, errors)
    );
    layout(&title, principal, &body)
}

pub fn change_password_page(
    principal: Option<&AuthUser>,
    username: &str,
    errors: &[FieldError],
) -> Html<String> {
    let body = format!(
        r#"<h1>Change password for {username}</h1>
<form method="post" action="/admin/change-password/{username}">
  <label>New password <input name="password" type="password"></label> {errors}
  <button type="submit">Change</button>
</form>"#,
        username = escape(username),
        errors = field_errors(errors, "password"),
    );
    layout("Change password", principal, &body)
}

/// Self-view of the signed-in account.
pub fn user_page(principal: &AuthUser, user: &User) -> Html<String> {
    let body = format!(
        r#"<h1>{username}</h1>
<dl>
  <dt>First name</dt><dd>{first}</dd>
  <dt>Last name</dt><dd>{last}</dd>
  <dt>Age</dt><dd>{age}</dd>
  <dt>Roles</dt><dd>{roles}</dd>
</dl>"#,
        username = escape(&user.username),
        first = escape(&user.first_name),
        last = escape(&user.last_name),
        age = user.age,
        roles = escape(&role_labels(user)),
    );
    layout("My account", Some(principal), &body)
}

pub fn forbidden() -> Html<String> {
    layout(
        "Access denied",
        None,
        r#"<h1>403</h1><p>You do not have permission to view this page.</p><p><a href="/">Home</a></p>"#,
    )
}

pub fn error_page(status: StatusCode, message: &str) -> Html<String> {
    let body = format!(
        r#"<h1>{}</h1><p>{}</p><p><a href="/admin">Back</a></p>"#,
        status.as_u16(),
        escape(message)
    );
    layout(status.canonical_reason().unwrap_or("Error"), None, &body)
}
