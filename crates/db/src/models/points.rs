use chrono::NaiveDate;
use meowl_core::error::CoreError;
use meowl_core::points::{LeaderboardRow, PointsEntry, PointsReason};
use meowl_core::types::{DbId, Timestamp};
use sqlx::FromRow;

use super::parse_column;

#[derive(Debug, Clone, FromRow)]
pub struct PointsEntryRow {
    pub id: DbId,
    pub user_id: DbId,
    pub meowl_id: Option<DbId>,
    pub ref_scan_id: Option<DbId>,
    pub amount: i32,
    pub reason: String,
    pub scan_day: Option<NaiveDate>,
    pub note: String,
    pub created_at: Timestamp,
}

impl TryFrom<PointsEntryRow> for PointsEntry {
    type Error = CoreError;

    fn try_from(row: PointsEntryRow) -> Result<Self, Self::Error> {
        Ok(PointsEntry {
            reason: parse_column::<PointsReason>("points_ledger.reason", &row.reason)?,
            id: row.id,
            user_id: row.user_id,
            meowl_id: row.meowl_id,
            ref_scan_id: row.ref_scan_id,
            amount: row.amount,
            scan_day: row.scan_day,
            note: row.note,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct LeaderboardRowRecord {
    pub user_id: DbId,
    pub username: String,
    pub total: i64,
}

impl From<LeaderboardRowRecord> for LeaderboardRow {
    fn from(row: LeaderboardRowRecord) -> Self {
        LeaderboardRow {
            user_id: row.user_id,
            username: row.username,
            total: row.total,
        }
    }
}
