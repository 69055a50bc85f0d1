//! QR gate in front of Meowl detail and scan.
//!
//! A caller passes the gate if they own the Meowl or are staff, present a
//! valid access pass for the slug, or present a valid QR token for the slug.
//! A QR token is exchanged for a fresh access pass so the holder can come
//! back until the pass expires. Every failure looks the same to the caller.

use serde::Serialize;

use crate::context::RequestContext;
use crate::error::CoreError;
use crate::guards::{require_owner_or_staff, DenyReason, GATE_DENIED_MESSAGE};
use crate::location::LocationCandidate;
use crate::meowl::Meowl;
use crate::store::MeowlStore;
use crate::token_gate::{TokenGate, TokenPurpose};
use crate::types::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessVia {
    /// Owner or staff.
    Privileged,
    Pass,
    QrToken,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessGrant {
    pub via: AccessVia,
    /// Newly issued access pass, set only when a QR token was exchanged.
    pub pass: Option<String>,
}

/// Decide whether `ctx` may see `meowl`. Pure apart from issuing a pass.
pub fn check_detail_access(
    gate: &TokenGate,
    meowl: &Meowl,
    ctx: &RequestContext,
    now: Timestamp,
) -> Result<AccessGrant, CoreError> {
    if let Some(actor) = &ctx.actor {
        if actor.user_id == meowl.owner_id || actor.is_staff() {
            return Ok(AccessGrant {
                via: AccessVia::Privileged,
                pass: None,
            });
        }
    }

    let key_matches =
        |purpose, token: &str| gate.validate(purpose, token, now).as_deref() == Some(meowl.slug.as_str());

    if ctx
        .access_pass
        .as_deref()
        .is_some_and(|pass| key_matches(TokenPurpose::Pass, pass))
    {
        return Ok(AccessGrant {
            via: AccessVia::Pass,
            pass: None,
        });
    }

    if ctx
        .qr_token
        .as_deref()
        .is_some_and(|token| key_matches(TokenPurpose::Qr, token))
    {
        return Ok(AccessGrant {
            via: AccessVia::QrToken,
            pass: Some(gate.issue(TokenPurpose::Pass, &meowl.slug, now)),
        });
    }

    tracing::debug!(meowl_id = meowl.id, reason = DenyReason::GateClosed.code(), "Gate closed");
    Err(CoreError::Unauthorized(GATE_DENIED_MESSAGE.into()))
}

/// What a caller who passed the gate gets to see.
#[derive(Debug, Clone, PartialEq)]
pub struct MeowlView {
    pub meowl: Meowl,
    pub current: Option<LocationCandidate>,
    pub pending: Option<LocationCandidate>,
    pub access: AccessGrant,
}

/// Load a Meowl through the gate. Archived Meowls are only visible to staff.
pub async fn open_meowl<S: MeowlStore + ?Sized>(
    store: &S,
    gate: &TokenGate,
    ctx: &RequestContext,
    slug: &str,
    now: Timestamp,
) -> Result<MeowlView, CoreError> {
    let is_staff = ctx.actor.as_ref().is_some_and(|a| a.is_staff());

    let mut tx = store.begin().await?;
    let meowl = tx
        .find_meowl_by_slug(slug)
        .await?
        .filter(|m| !m.is_archived || is_staff)
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;
    let access = check_detail_access(gate, &meowl, ctx, now)?;
    let current = tx.find_current_candidate(meowl.id).await?;
    let pending = tx.find_pending_candidate(meowl.id).await?;
    tx.commit().await?;

    Ok(MeowlView {
        meowl,
        current,
        pending,
        access,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrLink {
    pub url: String,
    pub token: String,
    pub expires_at: Timestamp,
}

pub fn qr_url(site_url: &str, slug: &str, token: &str) -> String {
    format!("{}/meowls/{slug}?t={token}", site_url.trim_end_matches('/'))
}

/// Issue the scannable URL printed on a Meowl's poster. Owner or staff only.
pub async fn qr_link<S: MeowlStore + ?Sized>(
    store: &S,
    gate: &TokenGate,
    ctx: &RequestContext,
    site_url: &str,
    slug: &str,
    now: Timestamp,
) -> Result<QrLink, CoreError> {
    let actor = ctx.actor()?;

    let mut tx = store.begin().await?;
    let meowl = tx
        .find_meowl_by_slug(slug)
        .await?
        .filter(|m| !m.is_archived)
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;
    tx.commit().await?;
    require_owner_or_staff(actor, meowl.owner_id).into_result()?;

    let token = gate.issue(TokenPurpose::Qr, &meowl.slug, now);
    Ok(QrLink {
        url: qr_url(site_url, &meowl.slug, &token),
        token,
        expires_at: now + gate.max_age(),
    })
}
