//! Repository for the `user_sessions` table.

use meowl_core::types::{DbId, Timestamp};
use sqlx::{PgExecutor, PgPool};

use crate::models::session::{NewSession, Session};

const COLUMNS: &str = "id, user_id, refresh_token_hash, expires_at, is_revoked, \
                       rotated_from, user_agent_hash, created_at, updated_at";

pub struct SessionRepo;

impl SessionRepo {
    /// Start a fresh chain (login or signup).
    pub async fn open(pool: &PgPool, input: &NewSession) -> Result<Session, sqlx::Error> {
        Self::insert(pool, input, None).await
    }

    async fn insert<'e>(
        executor: impl PgExecutor<'e>,
        input: &NewSession,
        rotated_from: Option<DbId>,
    ) -> Result<Session, sqlx::Error> {
        let query = format!(
            "INSERT INTO user_sessions
                 (user_id, refresh_token_hash, expires_at, user_agent_hash, rotated_from)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Session>(&query)
            .bind(input.user_id)
            .bind(&input.refresh_token_hash)
            .bind(input.expires_at)
            .bind(&input.user_agent_hash)
            .bind(rotated_from)
            .fetch_one(executor)
            .await
    }

    /// Look a session up by token hash regardless of state, so callers can
    /// tell a reused (revoked) token from an unknown one.
    pub async fn find_by_token_hash(
        pool: &PgPool,
        hash: &str,
    ) -> Result<Option<Session>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM user_sessions WHERE refresh_token_hash = $1");
        sqlx::query_as::<_, Session>(&query)
            .bind(hash)
            .fetch_optional(pool)
            .await
    }

    /// Revoke `current` and insert its successor in one transaction.
    ///
    /// Returns `None` when `current` was revoked concurrently; two requests
    /// racing with the same token get one successor between them.
    pub async fn rotate(
        pool: &PgPool,
        current: &Session,
        refresh_token_hash: &str,
        expires_at: Timestamp,
    ) -> Result<Option<Session>, sqlx::Error> {
        let mut tx = pool.begin().await?;
        let revoked = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true WHERE id = $1 AND is_revoked = false",
        )
        .bind(current.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        if revoked == 0 {
            return Ok(None);
        }

        let next = NewSession {
            user_id: current.user_id,
            refresh_token_hash: refresh_token_hash.to_string(),
            expires_at,
            user_agent_hash: current.user_agent_hash.clone(),
        };
        let session = Self::insert(&mut *tx, &next, Some(current.id)).await?;
        tx.commit().await?;
        Ok(Some(session))
    }

    /// Revoke every live session of a user. Returns how many were live.
    pub async fn revoke_all_for_user(pool: &PgPool, user_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE user_sessions SET is_revoked = true
             WHERE user_id = $1 AND is_revoked = false",
        )
        .bind(user_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
