use meowl_core::scan::ScanEvent;
use meowl_core::types::{DbId, Timestamp};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ScanEventRow {
    pub id: DbId,
    pub meowl_id: DbId,
    pub user_id: DbId,
    pub ip_hash: String,
    pub user_agent_hash: String,
    pub created_at: Timestamp,
}

impl From<ScanEventRow> for ScanEvent {
    fn from(row: ScanEventRow) -> Self {
        ScanEvent {
            id: row.id,
            meowl_id: row.meowl_id,
            user_id: row.user_id,
            ip_hash: row.ip_hash,
            user_agent_hash: row.user_agent_hash,
            created_at: row.created_at,
        }
    }
}
