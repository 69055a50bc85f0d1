//! Repository for the `scan_events` table.

use meowl_core::scan::NewScan;
use meowl_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::scan::ScanEventRow;

const COLUMNS: &str = "id, meowl_id, user_id, ip_hash, user_agent_hash, created_at";

pub struct ScanRepo;

impl ScanRepo {
    pub async fn create(db: impl PgExecutor<'_>, input: &NewScan) -> Result<ScanEventRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO scan_events (meowl_id, user_id, ip_hash, user_agent_hash, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ScanEventRow>(&query)
            .bind(input.meowl_id)
            .bind(input.user_id)
            .bind(&input.ip_hash)
            .bind(&input.user_agent_hash)
            .bind(input.created_at)
            .fetch_one(db)
            .await
    }

    /// Whether the user scanned the Meowl in `[from, to)`, ignoring `exclude_id`.
    pub async fn exists_between(
        db: impl PgExecutor<'_>,
        user_id: DbId,
        meowl_id: DbId,
        from: Timestamp,
        to: Timestamp,
        exclude_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT EXISTS(
                SELECT 1 FROM scan_events
                WHERE user_id = $1 AND meowl_id = $2
                  AND created_at >= $3 AND created_at < $4
                  AND id <> $5
             )",
        )
        .bind(user_id)
        .bind(meowl_id)
        .bind(from)
        .bind(to)
        .bind(exclude_id)
        .fetch_one(db)
        .await
    }
}
