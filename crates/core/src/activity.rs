//! Public per-Meowl activity feed.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Create,
    Edit,
    LocationProposed,
    LocationVerified,
    CommentHidden,
    MeowlArchived,
    MeowlUnarchived,
    UserSuspended,
    UserUnsuspended,
}

impl UpdateKind {
    pub const ALL: [UpdateKind; 9] = [
        UpdateKind::Create,
        UpdateKind::Edit,
        UpdateKind::LocationProposed,
        UpdateKind::LocationVerified,
        UpdateKind::CommentHidden,
        UpdateKind::MeowlArchived,
        UpdateKind::MeowlUnarchived,
        UpdateKind::UserSuspended,
        UpdateKind::UserUnsuspended,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UpdateKind::Create => "create",
            UpdateKind::Edit => "edit",
            UpdateKind::LocationProposed => "location_proposed",
            UpdateKind::LocationVerified => "location_verified",
            UpdateKind::CommentHidden => "comment_hidden",
            UpdateKind::MeowlArchived => "meowl_archived",
            UpdateKind::MeowlUnarchived => "meowl_unarchived",
            UpdateKind::UserSuspended => "user_suspended",
            UpdateKind::UserUnsuspended => "user_unsuspended",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        UpdateKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown update kind '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeowlUpdate {
    pub id: DbId,
    pub meowl_id: Option<DbId>,
    pub actor_id: Option<DbId>,
    pub kind: UpdateKind,
    pub message: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeowlUpdate {
    pub meowl_id: Option<DbId>,
    pub actor_id: Option<DbId>,
    pub kind: UpdateKind,
    pub message: String,
    pub created_at: Timestamp,
}
