//! Input checks shared by signup and the admin user endpoints.

use regex::Regex;

use crate::error::ApiError;

/// Minimum password length accepted on signup and password change.
pub const MIN_PASSWORD_LEN: usize = 8;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|regex| regex.is_match(email))
}

/// # Errors
///
/// Returns a validation error naming the first problem found.
pub fn check_username(username: &str) -> Result<(), ApiError> {
    if username.trim().is_empty() {
        return Err(ApiError::validation("username is required"));
    }
    Ok(())
}

/// # Errors
///
/// Returns a validation error if the address is empty or malformed.
pub fn check_email(email: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() {
        return Err(ApiError::validation("email is required"));
    }
    if !valid_email(email.trim()) {
        return Err(ApiError::validation("invalid email format"));
    }
    Ok(())
}

/// # Errors
///
/// Returns a validation error if the password is too short.
pub fn check_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
