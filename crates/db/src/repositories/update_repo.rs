//! Repository for the `meowl_updates` activity feed.

use meowl_core::activity::NewMeowlUpdate;
use meowl_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::update::MeowlUpdateRow;

const COLUMNS: &str = "id, meowl_id, actor_id, kind, message, created_at";

pub struct MeowlUpdateRepo;

impl MeowlUpdateRepo {
    pub async fn insert(db: impl PgExecutor<'_>, input: &NewMeowlUpdate) -> Result<MeowlUpdateRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO meowl_updates (meowl_id, actor_id, kind, message, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, MeowlUpdateRow>(&query)
            .bind(input.meowl_id)
            .bind(input.actor_id)
            .bind(input.kind.as_str())
            .bind(&input.message)
            .bind(input.created_at)
            .fetch_one(db)
            .await
    }

    /// Newest first.
    pub async fn list_for_meowl(
        pool: &PgPool,
        meowl_id: DbId,
        limit: i64,
    ) -> Result<Vec<MeowlUpdateRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM meowl_updates
             WHERE meowl_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2"
        );
        sqlx::query_as::<_, MeowlUpdateRow>(&query)
            .bind(meowl_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
