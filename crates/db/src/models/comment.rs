use meowl_core::comment::Comment;
use meowl_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct CommentRow {
    pub id: DbId,
    pub meowl_id: DbId,
    pub user_id: DbId,
    pub text: String,
    pub is_hidden: bool,
    pub hidden_at: Option<Timestamp>,
    pub hidden_by: Option<DbId>,
    pub hidden_reason: String,
    pub created_at: Timestamp,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Comment {
            id: row.id,
            meowl_id: row.meowl_id,
            user_id: row.user_id,
            text: row.text,
            is_hidden: row.is_hidden,
            hidden_at: row.hidden_at,
            hidden_by: row.hidden_by,
            hidden_reason: row.hidden_reason,
            created_at: row.created_at,
        }
    }
}

/// Comment joined with its author for listings.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CommentView {
    pub id: DbId,
    pub user_id: DbId,
    pub username: String,
    pub text: String,
    pub is_hidden: bool,
    pub hidden_reason: String,
    pub created_at: Timestamp,
}
