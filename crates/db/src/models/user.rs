//! User entity model and DTOs.

use meowl_core::error::CoreError;
use meowl_core::roles::Role;
use meowl_core::types::{DbId, Timestamp};
use meowl_core::users::UserRecord;
use serde::Serialize;
use sqlx::FromRow;

use super::parse_column;

/// Full user row joined with its role name.
///
/// Contains the password hash -- NEVER serialize this to API responses directly.
/// Use [`UserResponse`] for external-facing output.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role_id: DbId,
    pub role: String,
    pub is_active: bool,
    pub email_verified_at: Option<Timestamp>,
    pub is_suspended: bool,
    pub suspend_reason: String,
    pub suspended_at: Option<Timestamp>,
    pub failed_login_count: i32,
    pub locked_until: Option<Timestamp>,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl User {
    pub fn to_record(&self) -> Result<UserRecord, CoreError> {
        Ok(UserRecord {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: parse_column::<Role>("users.role", &self.role)?,
            is_active: self.is_active,
            is_suspended: self.is_suspended,
            suspend_reason: self.suspend_reason.clone(),
            suspended_at: self.suspended_at,
            email_verified_at: self.email_verified_at,
            created_at: self.created_at,
        })
    }
}

/// Safe user representation for API responses (no password hash).
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: DbId,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub email_verified: bool,
    pub is_suspended: bool,
    pub suspend_reason: String,
    pub suspended_at: Option<Timestamp>,
    pub last_login_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            is_active: user.is_active,
            email_verified: user.email_verified_at.is_some(),
            is_suspended: user.is_suspended,
            suspend_reason: user.suspend_reason.clone(),
            suspended_at: user.suspended_at,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

impl From<&UserRecord> for UserResponse {
    fn from(user: &UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            is_active: user.is_active,
            email_verified: user.email_verified_at.is_some(),
            is_suspended: user.is_suspended,
            suspend_reason: user.suspend_reason.clone(),
            suspended_at: user.suspended_at,
            last_login_at: None,
            created_at: user.created_at,
        }
    }
}

/// DTO for creating a new user.
#[derive(Debug)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}
