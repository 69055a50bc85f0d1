use meowl_core::audit::{AuditAction, AuditEntry};
use meowl_core::error::CoreError;
use meowl_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::parse_column;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLogRow {
    pub id: DbId,
    pub actor_id: Option<DbId>,
    pub action: String,
    pub target_user_id: Option<DbId>,
    pub target_meowl_id: Option<DbId>,
    pub target_comment_id: Option<DbId>,
    pub detail: String,
    pub created_at: Timestamp,
}

impl TryFrom<AuditLogRow> for AuditEntry {
    type Error = CoreError;

    fn try_from(row: AuditLogRow) -> Result<Self, Self::Error> {
        Ok(AuditEntry {
            action: parse_column::<AuditAction>("audit_logs.action", &row.action)?,
            id: row.id,
            actor_id: row.actor_id,
            target_user_id: row.target_user_id,
            target_meowl_id: row.target_meowl_id,
            target_comment_id: row.target_comment_id,
            detail: row.detail,
            created_at: row.created_at,
        })
    }
}

/// Filter and paging for the admin audit log listing.
#[derive(Debug, Default, Deserialize)]
pub struct AuditQuery {
    pub action: Option<String>,
    pub actor_id: Option<DbId>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
