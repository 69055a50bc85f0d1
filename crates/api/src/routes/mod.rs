pub mod admin;
pub mod auth;
pub mod health;
pub mod meowls;

use axum::routing::get;
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /auth/...          accounts and sessions
/// /meowls/...        Meowls, locations, scans, comments, activity
/// /leaderboard       public standings (?period=all|30d|7d)
/// /admin/...         moderation (staff only)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/meowls", meowls::router())
        .route("/leaderboard", get(handlers::leaderboard::get_leaderboard))
        .nest("/admin", admin::router())
}
