//! Repository for the `comments` table.

use meowl_core::comment::NewComment;
use meowl_core::moderation::ModerationStamp;
use meowl_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::comment::{CommentRow, CommentView};

const COLUMNS: &str = "id, meowl_id, user_id, text, is_hidden, hidden_at, hidden_by, \
                        hidden_reason, created_at";

pub struct CommentRepo;

impl CommentRepo {
    pub async fn create(db: impl PgExecutor<'_>, input: &NewComment) -> Result<CommentRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO comments (meowl_id, user_id, text, created_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CommentRow>(&query)
            .bind(input.meowl_id)
            .bind(input.user_id)
            .bind(&input.text)
            .bind(input.created_at)
            .fetch_one(db)
            .await
    }

    pub async fn lock_by_id(db: impl PgExecutor<'_>, id: DbId) -> Result<Option<CommentRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM comments WHERE id = $1 FOR UPDATE");
        sqlx::query_as::<_, CommentRow>(&query)
            .bind(id)
            .fetch_optional(db)
            .await
    }

    /// Hide (`Some`) or unhide (`None`) a comment.
    pub async fn set_hidden(
        db: impl PgExecutor<'_>,
        id: DbId,
        hidden: Option<&ModerationStamp>,
    ) -> Result<Option<CommentRow>, sqlx::Error> {
        let query = format!(
            "UPDATE comments SET
                is_hidden = $2,
                hidden_at = $3,
                hidden_by = $4,
                hidden_reason = $5
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, CommentRow>(&query)
            .bind(id)
            .bind(hidden.is_some())
            .bind(hidden.map(|h| h.at))
            .bind(hidden.map(|h| h.by))
            .bind(hidden.map(|h| h.reason.as_str()).unwrap_or_default())
            .fetch_optional(db)
            .await
    }

    /// Comments on a Meowl, oldest first. Hidden ones only when asked for.
    pub async fn list_for_meowl(
        pool: &PgPool,
        meowl_id: DbId,
        include_hidden: bool,
    ) -> Result<Vec<CommentView>, sqlx::Error> {
        sqlx::query_as::<_, CommentView>(
            "SELECT c.id, c.user_id, u.username, c.text, c.is_hidden, c.hidden_reason, c.created_at
             FROM comments c JOIN users u ON u.id = c.user_id
             WHERE c.meowl_id = $1 AND ($2 OR c.is_hidden = false)
             ORDER BY c.created_at ASC, c.id ASC",
        )
        .bind(meowl_id)
        .bind(include_hidden)
        .fetch_all(pool)
        .await
    }
}
