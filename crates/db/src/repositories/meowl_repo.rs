//! Repository for the `meowls` table.

use meowl_core::meowl::{MeowlStatus, NewMeowl};
use meowl_core::moderation::ModerationStamp;
use meowl_core::types::{DbId, Timestamp};
use sqlx::{PgExecutor, PgPool};

use crate::models::meowl::{MeowlRow, MeowlSummary};

const COLUMNS: &str = "id, slug, name, description, owner_id, status, is_archived, \
                        archived_at, archived_by, archived_reason, created_at, updated_at";

pub struct MeowlRepo;

impl MeowlRepo {
    pub async fn create(db: impl PgExecutor<'_>, input: &NewMeowl) -> Result<MeowlRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO meowls (slug, name, description, owner_id, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MeowlRow>(&query)
            .bind(&input.slug)
            .bind(&input.name)
            .bind(&input.description)
            .bind(input.owner_id)
            .bind(MeowlStatus::Hidden.as_str())
            .bind(input.created_at)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_slug(db: impl PgExecutor<'_>, slug: &str) -> Result<Option<MeowlRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM meowls WHERE slug = $1");
        sqlx::query_as::<_, MeowlRow>(&query)
            .bind(slug)
            .fetch_optional(db)
            .await
    }

    /// Like [`Self::find_by_slug`] but holds a row lock until the transaction ends.
    pub async fn lock_by_slug(db: impl PgExecutor<'_>, slug: &str) -> Result<Option<MeowlRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM meowls WHERE slug = $1 FOR UPDATE");
        sqlx::query_as::<_, MeowlRow>(&query)
            .bind(slug)
            .fetch_optional(db)
            .await
    }

    pub async fn slug_exists(db: impl PgExecutor<'_>, slug: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM meowls WHERE slug = $1)")
            .bind(slug)
            .fetch_one(db)
            .await
    }

    pub async fn update_details(
        db: impl PgExecutor<'_>,
        id: DbId,
        name: &str,
        description: &str,
        now: Timestamp,
    ) -> Result<Option<MeowlRow>, sqlx::Error> {
        let query = format!(
            "UPDATE meowls SET name = $2, description = $3, updated_at = $4
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MeowlRow>(&query)
            .bind(id)
            .bind(name)
            .bind(description)
            .bind(now)
            .fetch_optional(db)
            .await
    }

    /// Returns `true` if the row was updated.
    pub async fn set_status(
        db: impl PgExecutor<'_>,
        id: DbId,
        status: MeowlStatus,
        now: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE meowls SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(now)
            .execute(db)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Archive (`Some`) or restore (`None`) a Meowl together with its status.
    pub async fn set_archive(
        db: impl PgExecutor<'_>,
        id: DbId,
        archive: Option<&ModerationStamp>,
        status: MeowlStatus,
        now: Timestamp,
    ) -> Result<Option<MeowlRow>, sqlx::Error> {
        let query = format!(
            "UPDATE meowls SET
                is_archived = $2,
                archived_at = $3,
                archived_by = $4,
                archived_reason = $5,
                status = $6,
                updated_at = $7
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MeowlRow>(&query)
            .bind(id)
            .bind(archive.is_some())
            .bind(archive.map(|a| a.at))
            .bind(archive.map(|a| a.by))
            .bind(archive.map(|a| a.reason.as_str()).unwrap_or_default())
            .bind(status.as_str())
            .bind(now)
            .fetch_optional(db)
            .await
    }

    /// Public listing: non-archived Meowls, newest first.
    pub async fn list_visible(
        pool: &PgPool,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MeowlSummary>, sqlx::Error> {
        sqlx::query_as::<_, MeowlSummary>(
            "SELECT m.id, m.slug, m.name, m.status, u.username AS owner_username, m.created_at
             FROM meowls m JOIN users u ON u.id = m.owner_id
             WHERE m.is_archived = false
             ORDER BY m.created_at DESC, m.id DESC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }
}
