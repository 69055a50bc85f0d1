//! Route definitions for the `/admin` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`. Every handler requires staff.
///
/// ```text
/// GET  /dashboard                -> dashboard
/// GET  /users                    -> list_users
/// GET  /audit-logs               -> audit_logs
/// POST /meowls/{slug}/archive    -> archive_meowl
/// POST /meowls/{slug}/unarchive  -> unarchive_meowl
/// POST /comments/{id}/hide       -> hide_comment
/// POST /comments/{id}/unhide     -> unhide_comment
/// POST /users/{id}/promote       -> promote_user
/// POST /users/{id}/demote        -> demote_user
/// POST /users/{id}/suspend       -> suspend_user
/// POST /users/{id}/unsuspend     -> unsuspend_user
/// POST /users/{id}/points        -> adjust_points
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(admin::dashboard))
        .route("/users", get(admin::list_users))
        .route("/audit-logs", get(admin::audit_logs))
        .route("/meowls/{slug}/archive", post(admin::archive_meowl))
        .route("/meowls/{slug}/unarchive", post(admin::unarchive_meowl))
        .route("/comments/{id}/hide", post(admin::hide_comment))
        .route("/comments/{id}/unhide", post(admin::unhide_comment))
        .route("/users/{id}/promote", post(admin::promote_user))
        .route("/users/{id}/demote", post(admin::demote_user))
        .route("/users/{id}/suspend", post(admin::suspend_user))
        .route("/users/{id}/unsuspend", post(admin::unsuspend_user))
        .route("/users/{id}/points", post(admin::adjust_points))
}
