//! Repository for the `users` table.

use meowl_core::roles::Role;
use meowl_core::types::{DbId, Timestamp};
use sqlx::{PgExecutor, PgPool};

use crate::models::user::{CreateUser, User};

/// Column list shared across queries. Expects `users` aliased `u` joined
/// with `roles` aliased `r`.
const COLUMNS: &str = "u.id, u.username, u.email, u.password_hash, u.role_id, r.name AS role, \
                        u.is_active, u.email_verified_at, u.is_suspended, u.suspend_reason, \
                        u.suspended_at, u.failed_login_count, u.locked_until, u.last_login_at, \
                        u.created_at, u.updated_at";

const FROM: &str = "users u JOIN roles r ON r.id = u.role_id";

/// Provides CRUD operations for users.
pub struct UserRepo;

impl UserRepo {
    /// Insert a new user, returning the created row.
    pub async fn create(db: impl PgExecutor<'_>, input: &CreateUser) -> Result<User, sqlx::Error> {
        let query = format!(
            "WITH u AS (
                INSERT INTO users (username, email, password_hash, role_id)
                VALUES ($1, $2, $3, (SELECT id FROM roles WHERE name = $4))
                RETURNING *
             )
             SELECT {COLUMNS} FROM u JOIN roles r ON r.id = u.role_id"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(&input.username)
            .bind(&input.email)
            .bind(&input.password_hash)
            .bind(input.role.as_str())
            .fetch_one(db)
            .await
    }

    /// Find a user by internal ID.
    pub async fn find_by_id(db: impl PgExecutor<'_>, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {FROM} WHERE u.id = $1");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Find a user by internal ID and lock the row until the transaction ends.
    pub async fn lock_by_id(db: impl PgExecutor<'_>, id: DbId) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {FROM} WHERE u.id = $1 FOR UPDATE OF u");
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Find a user by username or email (case-insensitive), for login.
    pub async fn find_by_login(pool: &PgPool, login: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {FROM}
             WHERE LOWER(u.username) = LOWER($1) OR LOWER(u.email) = LOWER($1)
             ORDER BY u.id
             LIMIT 1"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(login)
            .fetch_optional(pool)
            .await
    }

    /// Find a user by email (case-insensitive).
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {FROM} WHERE LOWER(u.email) = LOWER($1)");
        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// List users, newest first.
    pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<User>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {FROM} ORDER BY u.created_at DESC, u.id DESC LIMIT $1 OFFSET $2"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Change a user's role. Returns `None` if no row with the given `id` exists.
    pub async fn set_role(
        db: impl PgExecutor<'_>,
        id: DbId,
        role: Role,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "WITH u AS (
                UPDATE users SET role_id = (SELECT id FROM roles WHERE name = $2)
                WHERE id = $1
                RETURNING *
             )
             SELECT {COLUMNS} FROM u JOIN roles r ON r.id = u.role_id"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(role.as_str())
            .fetch_optional(db)
            .await
    }

    /// Set or clear the suspension fields. A `None` reason lifts the
    /// suspension.
    pub async fn set_suspension(
        db: impl PgExecutor<'_>,
        id: DbId,
        suspension: Option<(&str, Timestamp)>,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "WITH u AS (
                UPDATE users SET
                    is_suspended = $2,
                    suspend_reason = $3,
                    suspended_at = $4
                WHERE id = $1
                RETURNING *
             )
             SELECT {COLUMNS} FROM u JOIN roles r ON r.id = u.role_id"
        );
        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(suspension.is_some())
            .bind(suspension.map(|(reason, _)| reason).unwrap_or_default())
            .bind(suspension.map(|(_, at)| at))
            .fetch_optional(db)
            .await
    }

    /// Stamp the email address as verified. Returns `true` if the row changed.
    pub async fn mark_email_verified(
        pool: &PgPool,
        id: DbId,
        at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET email_verified_at = $2 WHERE id = $1 AND email_verified_at IS NULL",
        )
        .bind(id)
        .bind(at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Increment the failed login counter by 1.
    pub async fn increment_failed_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET failed_login_count = failed_login_count + 1 WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Lock a user account until the specified timestamp.
    pub async fn lock_account(pool: &PgPool, id: DbId, until: Timestamp) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE users SET locked_until = $2 WHERE id = $1")
            .bind(id)
            .bind(until)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// Record a successful login: reset `failed_login_count` to 0, clear `locked_until`,
    /// and set `last_login_at` to now.
    pub async fn record_successful_login(pool: &PgPool, id: DbId) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE users SET
                failed_login_count = 0,
                locked_until = NULL,
                last_login_at = NOW()
             WHERE id = $1",
        )
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }
}
