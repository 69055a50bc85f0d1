//! Repository for the `location_candidates` and `location_verifications` tables.

use meowl_core::location::{LocationStatus, NewLocationCandidate};
use meowl_core::types::{DbId, Timestamp};
use sqlx::PgExecutor;

use crate::models::location::LocationCandidateRow;

const COLUMNS: &str = "id, meowl_id, lat, lng, address, proposer_id, status, \
                        verification_count, verified_at, created_at";

pub struct LocationRepo;

impl LocationRepo {
    /// Insert a new candidate as `pending` with a zero count.
    pub async fn create(
        db: impl PgExecutor<'_>,
        input: &NewLocationCandidate,
    ) -> Result<LocationCandidateRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO location_candidates (meowl_id, lat, lng, address, proposer_id, status, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LocationCandidateRow>(&query)
            .bind(input.meowl_id)
            .bind(input.coordinates.lat)
            .bind(input.coordinates.lng)
            .bind(&input.address)
            .bind(input.proposer_id)
            .bind(LocationStatus::Pending.as_str())
            .bind(input.created_at)
            .fetch_one(db)
            .await
    }

    /// The Meowl's candidate in `status`. Only meaningful for `pending` and
    /// `current`, which are unique per Meowl.
    pub async fn find_by_status(
        db: impl PgExecutor<'_>,
        meowl_id: DbId,
        status: LocationStatus,
    ) -> Result<Option<LocationCandidateRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM location_candidates WHERE meowl_id = $1 AND status = $2"
        );
        sqlx::query_as::<_, LocationCandidateRow>(&query)
            .bind(meowl_id)
            .bind(status.as_str())
            .fetch_optional(db)
            .await
    }

    /// The pending candidate, locked until the transaction ends. A concurrent
    /// verifier blocks here and re-reads the row once the first one commits.
    pub async fn lock_pending(
        db: impl PgExecutor<'_>,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidateRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM location_candidates
             WHERE meowl_id = $1 AND status = 'pending'
             FOR UPDATE"
        );
        sqlx::query_as::<_, LocationCandidateRow>(&query)
            .bind(meowl_id)
            .fetch_optional(db)
            .await
    }

    /// Move every candidate of the Meowl in `from` to `hidden`.
    pub async fn hide_all(
        db: impl PgExecutor<'_>,
        meowl_id: DbId,
        from: LocationStatus,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE location_candidates SET status = 'hidden' WHERE meowl_id = $1 AND status = $2",
        )
        .bind(meowl_id)
        .bind(from.as_str())
        .execute(db)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn update_state(
        db: impl PgExecutor<'_>,
        id: DbId,
        status: LocationStatus,
        verification_count: i32,
        verified_at: Option<Timestamp>,
    ) -> Result<Option<LocationCandidateRow>, sqlx::Error> {
        let query = format!(
            "UPDATE location_candidates SET status = $2, verification_count = $3, verified_at = $4
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LocationCandidateRow>(&query)
            .bind(id)
            .bind(status.as_str())
            .bind(verification_count)
            .bind(verified_at)
            .fetch_optional(db)
            .await
    }

    /// Record a verifier. Returns `false` if they were already recorded.
    pub async fn add_verification(
        db: impl PgExecutor<'_>,
        candidate_id: DbId,
        verifier_id: DbId,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO location_verifications (candidate_id, verifier_id, created_at)
             VALUES ($1, $2, $3)
             ON CONFLICT (candidate_id, verifier_id) DO NOTHING",
        )
        .bind(candidate_id)
        .bind(verifier_id)
        .bind(now)
        .execute(db)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn count_verifiers(db: impl PgExecutor<'_>, candidate_id: DbId) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(DISTINCT verifier_id) FROM location_verifications WHERE candidate_id = $1",
        )
        .bind(candidate_id)
        .fetch_one(db)
        .await
    }
}
