//! User records and account-field validation.

use serde::Serialize;

use crate::roles::Role;
use crate::types::{DbId, Timestamp};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 150;
pub const EMAIL_MAX_LEN: usize = 254;

/// A user as seen by the core services (no credentials).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_suspended: bool,
    pub suspend_reason: String,
    pub suspended_at: Option<Timestamp>,
    pub email_verified_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Suspension details written by moderation.
#[derive(Debug, Clone, PartialEq)]
pub struct Suspension {
    pub reason: String,
    pub at: Timestamp,
}

/// Usernames are 3-150 characters of ASCII letters, digits, `_`, `.` or `-`.
pub fn validate_username(username: &str) -> Result<(), String> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(format!(
            "Username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err("Username may only contain letters, digits, '_', '.' and '-'".to_string());
    }
    Ok(())
}

/// Shallow email check; the verification link proves ownership.
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.len() > EMAIL_MAX_LEN {
        return Err(format!("Email must be at most {EMAIL_MAX_LEN} characters"));
    }
    match email.split_once('@') {
        Some((local, domain))
            if !local.is_empty() && domain.contains('.') && !email.contains(char::is_whitespace) =>
        {
            Ok(())
        }
        _ => Err("Email address is not valid".to_string()),
    }
}
