//! Comments on a Meowl.

use serde::Serialize;

use crate::context::RequestContext;
use crate::error::CoreError;
use crate::guards::require_active;
use crate::store::MeowlStore;
use crate::types::{DbId, Timestamp};

pub const COMMENT_MAX_LEN: usize = 2000;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
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

#[derive(Debug, Clone, PartialEq)]
pub struct NewComment {
    pub meowl_id: DbId,
    pub user_id: DbId,
    pub text: String,
    pub created_at: Timestamp,
}

pub async fn add_comment<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    slug: &str,
    text: &str,
    now: Timestamp,
) -> Result<Comment, CoreError> {
    let actor = ctx.actor()?;
    require_active(actor).into_result()?;

    let text = text.trim();
    if text.is_empty() {
        return Err(CoreError::Validation("Comment text is required".into()));
    }
    if text.chars().count() > COMMENT_MAX_LEN {
        return Err(CoreError::Validation(format!(
            "Comment must be at most {COMMENT_MAX_LEN} characters"
        )));
    }

    let mut tx = store.begin().await?;
    let meowl = tx
        .find_meowl_by_slug(slug)
        .await?
        .filter(|m| !m.is_archived)
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;

    let comment = tx
        .insert_comment(&NewComment {
            meowl_id: meowl.id,
            user_id: actor.user_id,
            text: text.to_string(),
            created_at: now,
        })
        .await?;
    tx.commit().await?;

    tracing::info!(comment_id = comment.id, meowl_id = meowl.id, user_id = actor.user_id, "Comment added");
    Ok(comment)
}
