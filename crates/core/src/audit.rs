//! Moderation audit trail.
//!
//! Every privileged mutation writes exactly one [`NewAuditEntry`] inside the
//! same transaction as the mutation itself. Entries are never updated or
//! deleted; a reversal (unarchive, unhide, ...) is a new entry.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::types::{DbId, Timestamp};

/// Closed set of audited actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    MeowlArchive,
    MeowlUnarchive,
    CommentHide,
    CommentUnhide,
    UserPromote,
    UserDemote,
    UserSuspend,
    UserUnsuspend,
    PointsAdjust,
}

impl AuditAction {
    pub const ALL: [AuditAction; 9] = [
        AuditAction::MeowlArchive,
        AuditAction::MeowlUnarchive,
        AuditAction::CommentHide,
        AuditAction::CommentUnhide,
        AuditAction::UserPromote,
        AuditAction::UserDemote,
        AuditAction::UserSuspend,
        AuditAction::UserUnsuspend,
        AuditAction::PointsAdjust,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::MeowlArchive => "meowl_archive",
            AuditAction::MeowlUnarchive => "meowl_unarchive",
            AuditAction::CommentHide => "comment_hide",
            AuditAction::CommentUnhide => "comment_unhide",
            AuditAction::UserPromote => "user_promote",
            AuditAction::UserDemote => "user_demote",
            AuditAction::UserSuspend => "user_suspend",
            AuditAction::UserUnsuspend => "user_unsuspend",
            AuditAction::PointsAdjust => "points_adjust",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AuditAction::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("Unknown audit action '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: DbId,
    /// `None` for system-initiated actions.
    pub actor_id: Option<DbId>,
    pub action: AuditAction,
    pub target_user_id: Option<DbId>,
    pub target_meowl_id: Option<DbId>,
    pub target_comment_id: Option<DbId>,
    pub detail: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub actor_id: Option<DbId>,
    pub action: AuditAction,
    pub target_user_id: Option<DbId>,
    pub target_meowl_id: Option<DbId>,
    pub target_comment_id: Option<DbId>,
    pub detail: String,
    pub created_at: Timestamp,
}

impl NewAuditEntry {
    pub fn new(actor_id: Option<DbId>, action: AuditAction, created_at: Timestamp) -> Self {
        Self {
            actor_id,
            action,
            target_user_id: None,
            target_meowl_id: None,
            target_comment_id: None,
            detail: String::new(),
            created_at,
        }
    }

    pub fn user(mut self, user_id: DbId) -> Self {
        self.target_user_id = Some(user_id);
        self
    }

    pub fn meowl(mut self, meowl_id: DbId) -> Self {
        self.target_meowl_id = Some(meowl_id);
        self
    }

    pub fn comment(mut self, comment_id: DbId) -> Self {
        self.target_comment_id = Some(comment_id);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip_through_from_str() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse::<AuditAction>(), Ok(action));
        }
    }

    #[test]
    fn unknown_action_is_rejected() {
        assert!("meowl_delete".parse::<AuditAction>().is_err());
    }

    #[test]
    fn builder_sets_targets() {
        let now = chrono::Utc::now();
        let entry = NewAuditEntry::new(Some(1), AuditAction::CommentHide, now)
            .meowl(7)
            .comment(9)
            .detail("spam");
        assert_eq!(entry.target_meowl_id, Some(7));
        assert_eq!(entry.target_comment_id, Some(9));
        assert_eq!(entry.target_user_id, None);
        assert_eq!(entry.detail, "spam");
    }
}
