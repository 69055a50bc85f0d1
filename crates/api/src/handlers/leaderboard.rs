//! GET /api/v1/leaderboard

use axum::extract::{Query, State};
use axum::Json;
use chrono::Utc;
use meowl_core::points::{leaderboard, LeaderboardPeriod};
use meowl_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    /// `all` (default), `30d` or `7d`.
    pub period: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct Standing {
    pub rank: usize,
    pub user_id: DbId,
    pub username: String,
    pub points: i64,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub period: LeaderboardPeriod,
    pub standings: Vec<Standing>,
}

/// Top users by points over the requested window. Ranks are positional;
/// equal totals are ordered by username.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> AppResult<Json<DataResponse<LeaderboardResponse>>> {
    let period = match params.period.as_deref() {
        None | Some("") => LeaderboardPeriod::default(),
        Some(raw) => raw.parse()?,
    };

    let rows = leaderboard(&state.store, period, &state.config.policy, Utc::now()).await?;
    let standings = rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| Standing {
            rank: i + 1,
            user_id: row.user_id,
            username: row.username,
            points: row.total,
        })
        .collect();

    Ok(Json(DataResponse::new(LeaderboardResponse { period, standings })))
}
