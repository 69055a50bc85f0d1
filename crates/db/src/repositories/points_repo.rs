//! Repository for the append-only `points_ledger` table.

use meowl_core::points::{LeaderboardQuery, NewPointsEntry};
use meowl_core::types::DbId;
use sqlx::PgExecutor;

use crate::models::points::{LeaderboardRowRecord, PointsEntryRow};

const COLUMNS: &str = "id, user_id, meowl_id, ref_scan_id, amount, reason, scan_day, note, created_at";

pub struct PointsRepo;

impl PointsRepo {
    /// Append an entry. Returns `None` if a scan reward for the same user,
    /// Meowl and day already exists.
    pub async fn append(
        db: impl PgExecutor<'_>,
        input: &NewPointsEntry,
    ) -> Result<Option<PointsEntryRow>, sqlx::Error> {
        let query = format!(
            "INSERT INTO points_ledger
                (user_id, meowl_id, ref_scan_id, amount, reason, scan_day, note, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (user_id, meowl_id, scan_day) WHERE scan_day IS NOT NULL DO NOTHING
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, PointsEntryRow>(&query)
            .bind(input.user_id)
            .bind(input.meowl_id)
            .bind(input.ref_scan_id)
            .bind(input.amount)
            .bind(input.reason.as_str())
            .bind(input.scan_day)
            .bind(&input.note)
            .bind(input.created_at)
            .fetch_optional(db)
            .await
    }

    /// Per-user sums, highest first, ties broken by username.
    pub async fn totals(
        db: impl PgExecutor<'_>,
        query: &LeaderboardQuery,
    ) -> Result<Vec<LeaderboardRowRecord>, sqlx::Error> {
        sqlx::query_as::<_, LeaderboardRowRecord>(
            "SELECT p.user_id, u.username, SUM(p.amount)::BIGINT AS total
             FROM points_ledger p JOIN users u ON u.id = p.user_id
             WHERE ($1::TIMESTAMPTZ IS NULL OR p.created_at >= $1)
               AND (NOT $2 OR u.is_suspended = false)
             GROUP BY p.user_id, u.username
             ORDER BY total DESC, u.username ASC
             LIMIT $3",
        )
        .bind(query.since)
        .bind(query.exclude_suspended)
        .bind(query.limit)
        .fetch_all(db)
        .await
    }

    pub async fn total_for_user(db: impl PgExecutor<'_>, user_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COALESCE(SUM(amount), 0)::BIGINT FROM points_ledger WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(db)
            .await
    }
}
