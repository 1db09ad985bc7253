//! Client-side checks run before account requests are sent.

use crate::{AuthError, AuthResult};
use regex::Regex;
use std::sync::LazyLock;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+@\S+\.\S+").expect("email pattern compiles"));

/// Characters of which a password needs at least one.
pub const PASSWORD_SPECIAL_CHARS: &str = "!@#$%^&*(),.?\":{}|<>";

const PASSWORD_MIN_EXCLUSIVE: usize = 10;
const PASSWORD_MAX_EXCLUSIVE: usize = 30;
const USERNAME_MIN: usize = 4;
const USERNAME_MAX: usize = 20;

fn invalid(field: &'static str, reason: impl Into<String>) -> AuthError {
    AuthError::Validation {
        field,
        reason: reason.into(),
    }
}

pub fn validate_email(email: &str) -> AuthResult<()> {
    if !EMAIL_PATTERN.is_match(email) {
        return Err(invalid("email", "must look like name@example.com"));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> AuthResult<()> {
    let len = password.chars().count();
    if len <= PASSWORD_MIN_EXCLUSIVE || len >= PASSWORD_MAX_EXCLUSIVE {
        return Err(invalid(
            "password",
            format!(
                "must be {} to {} characters long",
                PASSWORD_MIN_EXCLUSIVE + 1,
                PASSWORD_MAX_EXCLUSIVE - 1
            ),
        ));
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("password", "must contain an uppercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err(invalid("password", "must contain a lowercase letter"));
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(invalid("password", "must contain a digit"));
    }
    if !password.chars().any(|c| PASSWORD_SPECIAL_CHARS.contains(c)) {
        return Err(invalid(
            "password",
            format!("must contain one of {PASSWORD_SPECIAL_CHARS}"),
        ));
    }
    Ok(())
}

pub fn validate_username(username: &str) -> AuthResult<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(invalid(
            "username",
            format!("must be {USERNAME_MIN} to {USERNAME_MAX} characters long"),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
    {
        return Err(invalid(
            "username",
            "only ASCII letters, numbers, '.', '_', and '-' are allowed",
        ));
    }
    Ok(())
}

/// Login only needs both fields present.
pub fn validate_login(username_or_email: &str, password: &str) -> AuthResult<()> {
    if username_or_email.trim().is_empty() {
        return Err(invalid("username_or_email", "cannot be empty"));
    }
    if password.is_empty() {
        return Err(invalid("password", "cannot be empty"));
    }
    Ok(())
}

pub fn validate_registration(username: &str, email: &str, password: &str) -> AuthResult<()> {
    validate_username(username)?;
    validate_email(email)?;
    validate_password(password)
}
