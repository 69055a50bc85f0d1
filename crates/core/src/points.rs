//! Append-only points ledger and leaderboard aggregation.
//!
//! Ledger rows are never updated or deleted. Corrections are new rows with a
//! negative amount (see [`crate::moderation::adjust_points`]).

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::error::CoreError;
use crate::policy::{Policy, LEADERBOARD_LIMIT};
use crate::store::MeowlStore;
use crate::types::{DbId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointsReason {
    Create,
    Scan,
    Verify,
    Other,
}

impl PointsReason {
    pub fn as_str(self) -> &'static str {
        match self {
            PointsReason::Create => "create",
            PointsReason::Scan => "scan",
            PointsReason::Verify => "verify",
            PointsReason::Other => "other",
        }
    }
}

impl fmt::Display for PointsReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointsReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(PointsReason::Create),
            "scan" => Ok(PointsReason::Scan),
            "verify" => Ok(PointsReason::Verify),
            "other" => Ok(PointsReason::Other),
            other => Err(format!("Unknown points reason '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointsEntry {
    pub id: DbId,
    pub user_id: DbId,
    pub meowl_id: Option<DbId>,
    pub ref_scan_id: Option<DbId>,
    pub amount: i32,
    pub reason: PointsReason,
    /// Set only on scan rewards; unique per (user, Meowl, day).
    pub scan_day: Option<NaiveDate>,
    pub note: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPointsEntry {
    pub user_id: DbId,
    pub meowl_id: Option<DbId>,
    pub ref_scan_id: Option<DbId>,
    pub amount: i32,
    pub reason: PointsReason,
    pub scan_day: Option<NaiveDate>,
    pub note: String,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Leaderboard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum LeaderboardPeriod {
    #[default]
    #[serde(rename = "all")]
    AllTime,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "7d")]
    Last7Days,
}

impl LeaderboardPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            LeaderboardPeriod::AllTime => "all",
            LeaderboardPeriod::Last30Days => "30d",
            LeaderboardPeriod::Last7Days => "7d",
        }
    }

    /// Lower bound on `created_at`, or `None` for all time.
    pub fn since(self, now: Timestamp) -> Option<Timestamp> {
        match self {
            LeaderboardPeriod::AllTime => None,
            LeaderboardPeriod::Last30Days => Some(now - Duration::days(30)),
            LeaderboardPeriod::Last7Days => Some(now - Duration::days(7)),
        }
    }
}

impl FromStr for LeaderboardPeriod {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(LeaderboardPeriod::AllTime),
            "30d" => Ok(LeaderboardPeriod::Last30Days),
            "7d" => Ok(LeaderboardPeriod::Last7Days),
            other => Err(CoreError::Validation(format!(
                "Unknown leaderboard period '{other}' (expected all, 30d or 7d)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardQuery {
    pub since: Option<Timestamp>,
    pub exclude_suspended: bool,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardRow {
    pub user_id: DbId,
    pub username: String,
    pub total: i64,
}

/// Ordered by total descending, then username ascending.
pub async fn leaderboard<S: MeowlStore + ?Sized>(
    store: &S,
    period: LeaderboardPeriod,
    policy: &Policy,
    now: Timestamp,
) -> Result<Vec<LeaderboardRow>, CoreError> {
    let query = LeaderboardQuery {
        since: period.since(now),
        exclude_suspended: policy.leaderboard_exclude_suspended,
        limit: LEADERBOARD_LIMIT,
    };
    let mut tx = store.begin().await?;
    let rows = tx.points_totals(&query).await?;
    tx.commit().await?;
    Ok(rows)
}

pub async fn points_total<S: MeowlStore + ?Sized>(store: &S, user_id: DbId) -> Result<i64, CoreError> {
    let mut tx = store.begin().await?;
    let total = tx.points_total_for_user(user_id).await?;
    tx.commit().await?;
    Ok(total)
}

/// Append one entry in its own transaction. Returns `None` when the
/// per-day scan reward constraint suppressed the row.
pub async fn grant<S: MeowlStore + ?Sized>(
    store: &S,
    entry: &NewPointsEntry,
) -> Result<Option<PointsEntry>, CoreError> {
    let mut tx = store.begin().await?;
    let inserted = tx.insert_points(entry).await?;
    tx.commit().await?;
    if let Some(row) = &inserted {
        tracing::debug!(user_id = row.user_id, amount = row.amount, reason = %row.reason, "Points granted");
    }
    Ok(inserted)
}
