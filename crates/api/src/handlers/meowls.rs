//! Handlers for the `/meowls` resource.
//!
//! Everything that changes state goes through a core service with a
//! [`RequestContext`](meowl_core::context::RequestContext); the plain listings read the pool directly.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::AppendHeaders;
use axum::Json;
use chrono::Utc;
use meowl_core::activity::MeowlUpdate;
use meowl_core::comment::{add_comment, Comment};
use meowl_core::error::CoreError;
use meowl_core::gate::{open_meowl, qr_link, AccessVia, QrLink};
use meowl_core::location::{
    propose_location, verify_location, LocationCandidate, LocationInput, VerifyOutcome,
};
use meowl_core::meowl::{create_meowl, update_meowl, CreateMeowlInput, Meowl, UpdateMeowlInput};
use meowl_core::scan::record_scan;
use meowl_core::types::DbId;
use meowl_db::models::comment::CommentView;
use meowl_db::models::meowl::MeowlSummary;
use meowl_db::repositories::{CommentRepo, MeowlRepo, MeowlUpdateRepo};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::auth::OptionalAuthUser;
use crate::middleware::context::{Ctx, ACCESS_PASS_HEADER};
use crate::query::PaginationParams;
use crate::response::DataResponse;
use crate::state::AppState;

const UPDATES_LIMIT: i64 = 50;

/// Sets `x-meowl-pass` when a QR token was just exchanged for a pass.
type PassHeader = AppendHeaders<Option<(&'static str, String)>>;

fn pass_header(pass: Option<String>) -> PassHeader {
    AppendHeaders(pass.map(|p| (ACCESS_PASS_HEADER, p)))
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateMeowlRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub location: Option<LocationInput>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMeowlRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyRequest {
    /// The pending candidate the client was shown. A mismatch means someone
    /// proposed a newer location in the meantime.
    pub candidate_id: Option<DbId>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CommentFilter {
    /// Honoured for staff only.
    #[serde(default)]
    pub include_hidden: bool,
}

#[derive(Debug, Serialize)]
pub struct CreatedMeowlResponse {
    pub meowl: Meowl,
    pub pending_location: Option<LocationCandidate>,
    pub points_awarded: i32,
}

#[derive(Debug, Serialize)]
pub struct AccessInfo {
    pub via: AccessVia,
    pub access_pass: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MeowlDetail {
    pub meowl: Meowl,
    pub current_location: Option<LocationCandidate>,
    pub pending_location: Option<LocationCandidate>,
    pub comments: Vec<CommentView>,
    pub access: AccessInfo,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub scan_id: DbId,
    pub rewarded: bool,
    pub points_awarded: i32,
    pub access: AccessInfo,
}

#[derive(Debug, Serialize)]
pub struct ProposalResponse {
    pub candidate: LocationCandidate,
    pub superseded: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyResult {
    Recorded,
    Promoted,
    AlreadyVerified,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub outcome: VerifyResult,
    pub candidate: LocationCandidate,
    /// Previous current location hidden by a promotion.
    pub replaced: Option<DbId>,
    pub points_awarded: i32,
}

impl From<VerifyOutcome> for VerifyResponse {
    fn from(outcome: VerifyOutcome) -> Self {
        let points_awarded = outcome.points_awarded();
        match outcome {
            VerifyOutcome::Recorded { candidate, .. } => Self {
                outcome: VerifyResult::Recorded,
                candidate,
                replaced: None,
                points_awarded,
            },
            VerifyOutcome::Promoted {
                candidate,
                replaced,
                ..
            } => Self {
                outcome: VerifyResult::Promoted,
                candidate,
                replaced,
                points_awarded,
            },
            VerifyOutcome::AlreadyVerified { candidate } => Self {
                outcome: VerifyResult::AlreadyVerified,
                candidate,
                replaced: None,
                points_awarded,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/meowls
///
/// Public listing without coordinates.
pub async fn list_meowls(
    State(state): State<AppState>,
    Query(page): Query<PaginationParams>,
) -> AppResult<Json<DataResponse<Vec<MeowlSummary>>>> {
    let meowls = MeowlRepo::list_visible(&state.pool, page.limit(), page.offset()).await?;
    Ok(Json(DataResponse::new(meowls)))
}

/// POST /api/v1/meowls
pub async fn create(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Json(input): Json<CreateMeowlRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CreatedMeowlResponse>>)> {
    let created = create_meowl(
        &state.store,
        &ctx,
        CreateMeowlInput {
            name: input.name,
            description: input.description,
            location: input.location,
        },
        &state.config.policy,
        Utc::now(),
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(CreatedMeowlResponse {
            meowl: created.meowl,
            pending_location: created.pending_location,
            points_awarded: created.points_awarded,
        })),
    ))
}

/// GET /api/v1/meowls/{slug}?t=&pass=
///
/// Gated detail. Owners and staff always pass; everyone else needs a QR
/// token or an access pass for this slug.
pub async fn detail(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(slug): Path<String>,
) -> AppResult<(PassHeader, Json<DataResponse<MeowlDetail>>)> {
    let view = open_meowl(&state.store, &state.gate, &ctx, &slug, Utc::now()).await?;
    // Hidden comments stay out of the detail view; staff opt in through the
    // comments listing.
    let comments = CommentRepo::list_for_meowl(&state.pool, view.meowl.id, false).await?;

    let pass = view.access.pass;
    let detail = MeowlDetail {
        meowl: view.meowl,
        current_location: view.current,
        pending_location: view.pending,
        comments,
        access: AccessInfo {
            via: view.access.via,
            access_pass: pass.clone(),
        },
    };
    Ok((pass_header(pass), Json(DataResponse::new(detail))))
}

/// PUT /api/v1/meowls/{slug}
pub async fn update(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(slug): Path<String>,
    Json(input): Json<UpdateMeowlRequest>,
) -> AppResult<Json<DataResponse<Meowl>>> {
    let meowl = update_meowl(
        &state.store,
        &ctx,
        &slug,
        UpdateMeowlInput {
            name: input.name,
            description: input.description,
        },
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse::new(meowl)))
}

/// GET /api/v1/meowls/{slug}/qr-link
pub async fn get_qr_link(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(slug): Path<String>,
) -> AppResult<Json<DataResponse<QrLink>>> {
    let link = qr_link(
        &state.store,
        &state.gate,
        &ctx,
        &state.config.site_url,
        &slug,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse::new(link)))
}

/// POST /api/v1/meowls/{slug}/scan?t=
///
/// Always records the scan; only the first one per user, Meowl and UTC day
/// earns points.
pub async fn scan(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(slug): Path<String>,
) -> AppResult<(PassHeader, Json<DataResponse<ScanResponse>>)> {
    let outcome = record_scan(
        &state.store,
        &state.gate,
        &ctx,
        &slug,
        &state.config.policy,
        Utc::now(),
    )
    .await?;

    let pass = outcome.access.pass;
    let response = ScanResponse {
        scan_id: outcome.scan.id,
        rewarded: outcome.rewarded,
        points_awarded: outcome.points_awarded,
        access: AccessInfo {
            via: outcome.access.via,
            access_pass: pass.clone(),
        },
    };
    Ok((pass_header(pass), Json(DataResponse::new(response))))
}

/// POST /api/v1/meowls/{slug}/location
pub async fn propose(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(slug): Path<String>,
    Json(input): Json<LocationInput>,
) -> AppResult<(StatusCode, Json<DataResponse<ProposalResponse>>)> {
    let proposal = propose_location(&state.store, &ctx, &slug, &input, Utc::now()).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(ProposalResponse {
            candidate: proposal.candidate,
            superseded: proposal.superseded,
        })),
    ))
}

/// POST /api/v1/meowls/{slug}/location/verify?t=&pass=
///
/// Gated like the detail view: only someone who has been at the Meowl can
/// vouch for its location.
pub async fn verify(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(slug): Path<String>,
    Json(input): Json<VerifyRequest>,
) -> AppResult<Json<DataResponse<VerifyResponse>>> {
    let outcome = verify_location(
        &state.store,
        &state.gate,
        &ctx,
        &slug,
        input.candidate_id,
        &state.config.policy,
        Utc::now(),
    )
    .await?;
    Ok(Json(DataResponse::new(outcome.into())))
}

/// GET /api/v1/meowls/{slug}/comments
pub async fn list_comments(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    Path(slug): Path<String>,
    Query(filter): Query<CommentFilter>,
) -> AppResult<Json<DataResponse<Vec<CommentView>>>> {
    let staff = user.as_ref().is_some_and(|u| u.role.is_staff());
    let meowl = visible_meowl(&state, &slug, staff).await?;
    let comments =
        CommentRepo::list_for_meowl(&state.pool, meowl.id, staff && filter.include_hidden).await?;
    Ok(Json(DataResponse::new(comments)))
}

/// POST /api/v1/meowls/{slug}/comments
pub async fn post_comment(
    State(state): State<AppState>,
    Ctx(ctx): Ctx,
    Path(slug): Path<String>,
    Json(input): Json<CommentRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<Comment>>)> {
    let comment = add_comment(&state.store, &ctx, &slug, &input.text, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(comment))))
}

/// GET /api/v1/meowls/{slug}/updates
pub async fn list_updates(
    State(state): State<AppState>,
    OptionalAuthUser(user): OptionalAuthUser,
    Path(slug): Path<String>,
) -> AppResult<Json<DataResponse<Vec<MeowlUpdate>>>> {
    let staff = user.as_ref().is_some_and(|u| u.role.is_staff());
    let meowl = visible_meowl(&state, &slug, staff).await?;
    let updates = MeowlUpdateRepo::list_for_meowl(&state.pool, meowl.id, UPDATES_LIMIT)
        .await?
        .into_iter()
        .map(MeowlUpdate::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(DataResponse::new(updates)))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Archived Meowls look missing to everyone but staff.
async fn visible_meowl(state: &AppState, slug: &str, staff: bool) -> AppResult<Meowl> {
    let row = MeowlRepo::find_by_slug(&state.pool, slug)
        .await?
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;
    let meowl = Meowl::try_from(row)?;
    if meowl.is_archived && !staff {
        return Err(CoreError::not_found("Meowl", slug).into());
    }
    Ok(meowl)
}
