//! Repository for the append-only `audit_logs` table.

use meowl_core::audit::NewAuditEntry;
use sqlx::{PgExecutor, PgPool};

use crate::models::audit::{AuditLogRow, AuditQuery};

/// Column list for `audit_logs` SELECT queries.
const COLUMNS: &str = "\
    id, actor_id, action, target_user_id, target_meowl_id, \
    target_comment_id, detail, created_at";

/// Default page size for audit listings.
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// Hard cap on audit listing page size.
pub const MAX_PAGE_SIZE: i64 = 200;

/// Provides insert and query operations for audit logs. There is no update
/// or delete.
pub struct AuditLogRepo;

impl AuditLogRepo {
    pub async fn insert(db: impl PgExecutor<'_>, entry: &NewAuditEntry) -> Result<AuditLogRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_logs
                (actor_id, action, target_user_id, target_meowl_id, target_comment_id, detail, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLogRow>(&query)
            .bind(entry.actor_id)
            .bind(entry.action.as_str())
            .bind(entry.target_user_id)
            .bind(entry.target_meowl_id)
            .bind(entry.target_comment_id)
            .bind(&entry.detail)
            .bind(entry.created_at)
            .fetch_one(db)
            .await
    }

    /// Newest first, optionally filtered by action and actor.
    pub async fn query(pool: &PgPool, params: &AuditQuery) -> Result<Vec<AuditLogRow>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let offset = params.offset.unwrap_or(0).max(0);
        let query = format!(
            "SELECT {COLUMNS} FROM audit_logs
             WHERE ($1::TEXT IS NULL OR action = $1)
               AND ($2::BIGINT IS NULL OR actor_id = $2)
             ORDER BY created_at DESC, id DESC
             LIMIT $3 OFFSET $4"
        );
        sqlx::query_as::<_, AuditLogRow>(&query)
            .bind(params.action.as_deref())
            .bind(params.actor_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }
}
