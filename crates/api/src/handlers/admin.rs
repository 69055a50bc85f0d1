//! Handlers for the `/admin` resource. Staff only.
//!
//! Every moderation action runs through the core moderation service, which
//! re-checks the actor's role and writes one audit entry per action.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use meowl_core::comment::Comment;
use meowl_core::context::RequestContext;
use meowl_core::meowl::Meowl;
use meowl_core::moderation;
use meowl_core::points::PointsEntry;
use meowl_core::scan::utc_day_window;
use meowl_core::types::DbId;
use meowl_core::users::UserRecord;
use meowl_db::models::audit::{AuditLogRow, AuditQuery};
use meowl_db::models::dashboard::DashboardStats;
use meowl_db::models::user::UserResponse;
use meowl_db::repositories::{AuditLogRepo, DashboardRepo, UserRepo};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::rbac::RequireStaff;
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body for archive/hide/suspend (reason required) and their reversals
/// (reason optional).
#[derive(Debug, Default, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct AdjustPointsRequest {
    pub amount: i32,
    pub note: String,
}

fn staff_context(RequireStaff(user): &RequireStaff) -> RequestContext {
    RequestContext::for_actor(user.actor())
}

// ---------------------------------------------------------------------------
// Read-only views
// ---------------------------------------------------------------------------

/// GET /api/v1/admin/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    _staff: RequireStaff,
) -> AppResult<Json<DataResponse<DashboardStats>>> {
    let (_, day_start, _) = utc_day_window(Utc::now());
    let stats = DashboardRepo::stats(&state.pool, day_start).await?;
    Ok(Json(DataResponse::new(stats)))
}

/// GET /api/v1/admin/users
pub async fn list_users(
    State(state): State<AppState>,
    _staff: RequireStaff,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<UserResponse>>>> {
    let users = UserRepo::list(&state.pool, page.limit(), page.offset()).await?;
    Ok(Json(DataResponse::new(
        users.iter().map(UserResponse::from).collect(),
    )))
}

/// GET /api/v1/admin/audit-logs?action=&actor_id=&limit=&offset=
pub async fn audit_logs(
    State(state): State<AppState>,
    _staff: RequireStaff,
    Query(params): Query<AuditQuery>,
) -> AppResult<Json<DataResponse<Vec<AuditLogRow>>>> {
    let entries = AuditLogRepo::query(&state.pool, &params).await?;
    Ok(Json(DataResponse::new(entries)))
}

// ---------------------------------------------------------------------------
// Meowls and comments
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/meowls/{slug}/archive
pub async fn archive_meowl(
    State(state): State<AppState>,
    staff: RequireStaff,
    Path(slug): Path<String>,
    Json(input): Json<ReasonRequest>,
) -> AppResult<Json<DataResponse<Meowl>>> {
    let ctx = staff_context(&staff);
    let meowl = moderation::archive_meowl(&state.store, &ctx, &slug, &input.reason, Utc::now()).await?;
    Ok(Json(DataResponse::new(meowl)))
}

/// POST /api/v1/admin/meowls/{slug}/unarchive
pub async fn unarchive_meowl(
    State(state): State<AppState>,
    staff: RequireStaff,
    Path(slug): Path<String>,
    Json(input): Json<ReasonRequest>,
) -> AppResult<Json<DataResponse<Meowl>>> {
    let ctx = staff_context(&staff);
    let meowl =
        moderation::unarchive_meowl(&state.store, &ctx, &slug, &input.reason, Utc::now()).await?;
    Ok(Json(DataResponse::new(meowl)))
}

/// POST /api/v1/admin/comments/{id}/hide
pub async fn hide_comment(
    State(state): State<AppState>,
    staff: RequireStaff,
    Path(comment_id): Path<DbId>,
    Json(input): Json<ReasonRequest>,
) -> AppResult<Json<DataResponse<Comment>>> {
    let ctx = staff_context(&staff);
    let comment =
        moderation::hide_comment(&state.store, &ctx, comment_id, &input.reason, Utc::now()).await?;
    Ok(Json(DataResponse::new(comment)))
}

/// POST /api/v1/admin/comments/{id}/unhide
pub async fn unhide_comment(
    State(state): State<AppState>,
    staff: RequireStaff,
    Path(comment_id): Path<DbId>,
    Json(input): Json<ReasonRequest>,
) -> AppResult<Json<DataResponse<Comment>>> {
    let ctx = staff_context(&staff);
    let comment =
        moderation::unhide_comment(&state.store, &ctx, comment_id, &input.reason, Utc::now())
            .await?;
    Ok(Json(DataResponse::new(comment)))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// POST /api/v1/admin/users/{id}/promote
pub async fn promote_user(
    State(state): State<AppState>,
    staff: RequireStaff,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let ctx = staff_context(&staff);
    let user = moderation::promote_user(&state.store, &ctx, user_id, Utc::now()).await?;
    Ok(user_response(&user))
}

/// POST /api/v1/admin/users/{id}/demote
pub async fn demote_user(
    State(state): State<AppState>,
    staff: RequireStaff,
    Path(user_id): Path<DbId>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let ctx = staff_context(&staff);
    let user = moderation::demote_user(&state.store, &ctx, user_id, Utc::now()).await?;
    Ok(user_response(&user))
}

/// POST /api/v1/admin/users/{id}/suspend
pub async fn suspend_user(
    State(state): State<AppState>,
    staff: RequireStaff,
    Path(user_id): Path<DbId>,
    Json(input): Json<ReasonRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let ctx = staff_context(&staff);
    let user =
        moderation::suspend_user(&state.store, &ctx, user_id, &input.reason, Utc::now()).await?;
    Ok(user_response(&user))
}

/// POST /api/v1/admin/users/{id}/unsuspend
pub async fn unsuspend_user(
    State(state): State<AppState>,
    staff: RequireStaff,
    Path(user_id): Path<DbId>,
    Json(input): Json<ReasonRequest>,
) -> AppResult<Json<DataResponse<UserResponse>>> {
    let ctx = staff_context(&staff);
    let user =
        moderation::unsuspend_user(&state.store, &ctx, user_id, &input.reason, Utc::now()).await?;
    Ok(user_response(&user))
}

/// POST /api/v1/admin/users/{id}/points
///
/// Manual correction; the amount may be negative.
pub async fn adjust_points(
    State(state): State<AppState>,
    staff: RequireStaff,
    Path(user_id): Path<DbId>,
    Json(input): Json<AdjustPointsRequest>,
) -> AppResult<Json<DataResponse<PointsEntry>>> {
    let ctx = staff_context(&staff);
    let entry = moderation::adjust_points(
        &state.store,
        &ctx,
        user_id,
        input.amount,
        &input.note,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse::new(entry)))
}

fn user_response(user: &UserRecord) -> Json<DataResponse<UserResponse>> {
    Json(DataResponse::new(UserResponse::from(user)))
}
