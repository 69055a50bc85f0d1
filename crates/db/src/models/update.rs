use meowl_core::activity::{MeowlUpdate, UpdateKind};
use meowl_core::error::CoreError;
use meowl_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

use super::parse_column;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MeowlUpdateRow {
    pub id: DbId,
    pub meowl_id: Option<DbId>,
    pub actor_id: Option<DbId>,
    pub kind: String,
    pub message: String,
    pub created_at: Timestamp,
}

impl TryFrom<MeowlUpdateRow> for MeowlUpdate {
    type Error = CoreError;

    fn try_from(row: MeowlUpdateRow) -> Result<Self, Self::Error> {
        Ok(MeowlUpdate {
            kind: parse_column::<UpdateKind>("meowl_updates.kind", &row.kind)?,
            id: row.id,
            meowl_id: row.meowl_id,
            actor_id: row.actor_id,
            message: row.message,
            created_at: row.created_at,
        })
    }
}
