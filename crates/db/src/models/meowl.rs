use meowl_core::error::CoreError;
use meowl_core::meowl::{Meowl, MeowlStatus};
use meowl_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::parse_column;

#[derive(Debug, Clone, FromRow)]
pub struct MeowlRow {
    pub id: DbId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub owner_id: DbId,
    pub status: String,
    pub is_archived: bool,
    pub archived_at: Option<Timestamp>,
    pub archived_by: Option<DbId>,
    pub archived_reason: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TryFrom<MeowlRow> for Meowl {
    type Error = CoreError;

    fn try_from(row: MeowlRow) -> Result<Self, Self::Error> {
        Ok(Meowl {
            status: parse_column::<MeowlStatus>("meowls.status", &row.status)?,
            id: row.id,
            slug: row.slug,
            name: row.name,
            description: row.description,
            owner_id: row.owner_id,
            is_archived: row.is_archived,
            archived_at: row.archived_at,
            archived_by: row.archived_by,
            archived_reason: row.archived_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Public list entry. Carries no coordinates; those are behind the gate.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MeowlSummary {
    pub id: DbId,
    pub slug: String,
    pub name: String,
    pub status: String,
    pub owner_username: String,
    pub created_at: Timestamp,
}
