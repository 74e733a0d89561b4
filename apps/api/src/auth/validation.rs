//! Input rules for account and subscription forms.

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::AppError;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$").unwrap();
}

pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 20;

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// 8-20 ASCII letters or digits, with at least one of each.
pub fn is_valid_password(password: &str) -> bool {
    let len = password.chars().count();
    (PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len)
        && password.chars().all(|c| c.is_ascii_alphanumeric())
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AppError::Validation("Invalid email address".into()))
    }
}

pub fn validate_password(password: &str) -> Result<(), AppError> {
    if is_valid_password(password) {
        Ok(())
    } else {
        Err(AppError::Validation(format!(
            "Password must be {PASSWORD_MIN_LEN}-{PASSWORD_MAX_LEN} letters or digits and contain at least one of each"
        )))
    }
}

pub fn validate_name(name: &str) -> Result<(), AppError> {
    if name.trim().is_empty() {
        Err(AppError::Validation("Name is required".into()))
    } else {
        Ok(())
    }
}

pub fn validate_topics(topics: &[i32]) -> Result<(), AppError> {
    if topics.is_empty() {
        Err(AppError::Validation("Select at least one topic".into()))
    } else {
        Ok(())
    }
}
