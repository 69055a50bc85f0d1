//! Refresh-token sessions.

use meowl_core::types::{DbId, Timestamp};
use sqlx::FromRow;

/// One link in a refresh-token chain. Each refresh revokes the current row
/// and inserts its successor pointing back through `rotated_from`.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: DbId,
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
    pub is_revoked: bool,
    pub rotated_from: Option<DbId>,
    pub user_agent_hash: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Session {
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at <= now
    }
}

pub struct NewSession {
    pub user_id: DbId,
    pub refresh_token_hash: String,
    pub expires_at: Timestamp,
    pub user_agent_hash: String,
}
