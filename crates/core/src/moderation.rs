//! Staff moderation actions.
//!
//! Each action runs in one transaction that performs the mutation and writes
//! exactly one audit entry. Repeating an action that would not change state
//! is a conflict and writes nothing.

use crate::activity::{NewMeowlUpdate, UpdateKind};
use crate::audit::{AuditAction, NewAuditEntry};
use crate::comment::Comment;
use crate::context::{Actor, RequestContext};
use crate::error::CoreError;
use crate::guards::{can_moderate_user, require_staff};
use crate::meowl::{Meowl, MeowlStatus};
use crate::points::{NewPointsEntry, PointsEntry, PointsReason};
use crate::roles::Role;
use crate::store::{MeowlStore, StoreTx};
use crate::types::{DbId, Timestamp};
use crate::users::{Suspension, UserRecord};

pub const REASON_MAX_LEN: usize = 255;

/// Who did what when, stamped on archived Meowls and hidden comments.
#[derive(Debug, Clone, PartialEq)]
pub struct ModerationStamp {
    pub by: DbId,
    pub at: Timestamp,
    pub reason: String,
}

fn clean_reason(reason: &str, required: bool) -> Result<String, CoreError> {
    let reason = reason.trim();
    if required && reason.is_empty() {
        return Err(CoreError::Validation("A reason is required".into()));
    }
    if reason.chars().count() > REASON_MAX_LEN {
        return Err(CoreError::Validation(format!(
            "Reason must be at most {REASON_MAX_LEN} characters"
        )));
    }
    Ok(reason.to_string())
}

fn staff_actor(ctx: &RequestContext) -> Result<&Actor, CoreError> {
    let actor = ctx.actor()?;
    require_staff(actor).into_result()?;
    Ok(actor)
}

// ---------------------------------------------------------------------------
// Meowls
// ---------------------------------------------------------------------------

pub async fn archive_meowl<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    slug: &str,
    reason: &str,
    now: Timestamp,
) -> Result<Meowl, CoreError> {
    let actor = staff_actor(ctx)?;
    let reason = clean_reason(reason, true)?;

    let mut tx = store.begin().await?;
    let meowl = tx
        .lock_meowl_by_slug(slug)
        .await?
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;
    if meowl.is_archived {
        return Err(CoreError::Conflict("Meowl is already archived".into()));
    }

    let stamp = ModerationStamp {
        by: actor.user_id,
        at: now,
        reason: reason.clone(),
    };
    let archived = tx
        .set_meowl_archive(meowl.id, Some(&stamp), MeowlStatus::Archived, now)
        .await?;
    tx.insert_audit(
        &NewAuditEntry::new(Some(actor.user_id), AuditAction::MeowlArchive, now)
            .meowl(meowl.id)
            .detail(reason),
    )
    .await?;
    tx.insert_update(&NewMeowlUpdate {
        meowl_id: Some(meowl.id),
        actor_id: Some(actor.user_id),
        kind: UpdateKind::MeowlArchived,
        message: format!("{} was archived", meowl.name),
        created_at: now,
    })
    .await?;
    tx.commit().await?;

    tracing::info!(meowl_id = meowl.id, actor_id = actor.user_id, "Meowl archived");
    Ok(archived)
}

/// Restore an archived Meowl. It becomes active again if it still has a
/// current location, hidden otherwise.
pub async fn unarchive_meowl<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    slug: &str,
    reason: &str,
    now: Timestamp,
) -> Result<Meowl, CoreError> {
    let actor = staff_actor(ctx)?;
    let reason = clean_reason(reason, false)?;

    let mut tx = store.begin().await?;
    let meowl = tx
        .lock_meowl_by_slug(slug)
        .await?
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;
    if !meowl.is_archived {
        return Err(CoreError::Conflict("Meowl is not archived".into()));
    }

    let status = match tx.find_current_candidate(meowl.id).await? {
        Some(_) => MeowlStatus::Active,
        None => MeowlStatus::Hidden,
    };
    let restored = tx.set_meowl_archive(meowl.id, None, status, now).await?;
    tx.insert_audit(
        &NewAuditEntry::new(Some(actor.user_id), AuditAction::MeowlUnarchive, now)
            .meowl(meowl.id)
            .detail(reason),
    )
    .await?;
    tx.insert_update(&NewMeowlUpdate {
        meowl_id: Some(meowl.id),
        actor_id: Some(actor.user_id),
        kind: UpdateKind::MeowlUnarchived,
        message: format!("{} was restored", meowl.name),
        created_at: now,
    })
    .await?;
    tx.commit().await?;

    tracing::info!(meowl_id = meowl.id, actor_id = actor.user_id, status = %status, "Meowl unarchived");
    Ok(restored)
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

pub async fn hide_comment<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    comment_id: DbId,
    reason: &str,
    now: Timestamp,
) -> Result<Comment, CoreError> {
    let actor = staff_actor(ctx)?;
    let reason = clean_reason(reason, true)?;

    let mut tx = store.begin().await?;
    let comment = lock_comment(tx.as_mut(), comment_id).await?;
    if comment.is_hidden {
        return Err(CoreError::Conflict("Comment is already hidden".into()));
    }

    let stamp = ModerationStamp {
        by: actor.user_id,
        at: now,
        reason: reason.clone(),
    };
    let hidden = tx.set_comment_hidden(comment.id, Some(&stamp)).await?;
    tx.insert_audit(
        &NewAuditEntry::new(Some(actor.user_id), AuditAction::CommentHide, now)
            .meowl(comment.meowl_id)
            .comment(comment.id)
            .user(comment.user_id)
            .detail(reason),
    )
    .await?;
    tx.insert_update(&NewMeowlUpdate {
        meowl_id: Some(comment.meowl_id),
        actor_id: Some(actor.user_id),
        kind: UpdateKind::CommentHidden,
        message: "A comment was hidden by a moderator".into(),
        created_at: now,
    })
    .await?;
    tx.commit().await?;

    tracing::info!(comment_id, actor_id = actor.user_id, "Comment hidden");
    Ok(hidden)
}

pub async fn unhide_comment<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    comment_id: DbId,
    reason: &str,
    now: Timestamp,
) -> Result<Comment, CoreError> {
    let actor = staff_actor(ctx)?;
    let reason = clean_reason(reason, false)?;

    let mut tx = store.begin().await?;
    let comment = lock_comment(tx.as_mut(), comment_id).await?;
    if !comment.is_hidden {
        return Err(CoreError::Conflict("Comment is not hidden".into()));
    }

    let visible = tx.set_comment_hidden(comment.id, None).await?;
    tx.insert_audit(
        &NewAuditEntry::new(Some(actor.user_id), AuditAction::CommentUnhide, now)
            .meowl(comment.meowl_id)
            .comment(comment.id)
            .user(comment.user_id)
            .detail(reason),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(comment_id, actor_id = actor.user_id, "Comment unhidden");
    Ok(visible)
}

async fn lock_comment(tx: &mut dyn StoreTx, comment_id: DbId) -> Result<Comment, CoreError> {
    tx.lock_comment(comment_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Comment", comment_id))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

async fn lock_target(
    tx: &mut dyn StoreTx,
    actor: &Actor,
    user_id: DbId,
) -> Result<UserRecord, CoreError> {
    let target = tx
        .lock_user(user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("User", user_id))?;
    can_moderate_user(actor, &target).into_result()?;
    Ok(target)
}

async fn change_role<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    user_id: DbId,
    role: Role,
    action: AuditAction,
    now: Timestamp,
) -> Result<UserRecord, CoreError> {
    let actor = staff_actor(ctx)?;

    let mut tx = store.begin().await?;
    let target = lock_target(tx.as_mut(), actor, user_id).await?;
    let promoting = action == AuditAction::UserPromote;
    let moves_in_direction = if promoting { target.role < role } else { target.role > role };
    if !moves_in_direction {
        let verb = if promoting { "promoted" } else { "demoted" };
        return Err(CoreError::Conflict(format!(
            "A user with the {} role cannot be {verb} to {role}",
            target.role
        )));
    }

    let updated = tx.set_user_role(target.id, role).await?;
    tx.insert_audit(
        &NewAuditEntry::new(Some(actor.user_id), action, now)
            .user(target.id)
            .detail(format!("{} -> {}", target.role, role)),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user_id, actor_id = actor.user_id, role = %role, "User role changed");
    Ok(updated)
}

/// Grant the staff role.
pub async fn promote_user<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    user_id: DbId,
    now: Timestamp,
) -> Result<UserRecord, CoreError> {
    change_role(store, ctx, user_id, Role::Staff, AuditAction::UserPromote, now).await
}

/// Back to the member role.
pub async fn demote_user<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    user_id: DbId,
    now: Timestamp,
) -> Result<UserRecord, CoreError> {
    change_role(store, ctx, user_id, Role::Member, AuditAction::UserDemote, now).await
}

pub async fn suspend_user<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    user_id: DbId,
    reason: &str,
    now: Timestamp,
) -> Result<UserRecord, CoreError> {
    let actor = staff_actor(ctx)?;
    let reason = clean_reason(reason, true)?;

    let mut tx = store.begin().await?;
    let target = lock_target(tx.as_mut(), actor, user_id).await?;
    if target.is_suspended {
        return Err(CoreError::Conflict("User is already suspended".into()));
    }

    let suspension = Suspension {
        reason: reason.clone(),
        at: now,
    };
    let updated = tx.set_user_suspension(target.id, Some(&suspension)).await?;
    tx.insert_audit(
        &NewAuditEntry::new(Some(actor.user_id), AuditAction::UserSuspend, now)
            .user(target.id)
            .detail(reason),
    )
    .await?;
    tx.insert_update(&NewMeowlUpdate {
        meowl_id: None,
        actor_id: Some(actor.user_id),
        kind: UpdateKind::UserSuspended,
        message: format!("{} was suspended", target.username),
        created_at: now,
    })
    .await?;
    tx.commit().await?;

    tracing::info!(user_id, actor_id = actor.user_id, "User suspended");
    Ok(updated)
}

pub async fn unsuspend_user<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    user_id: DbId,
    reason: &str,
    now: Timestamp,
) -> Result<UserRecord, CoreError> {
    let actor = staff_actor(ctx)?;
    let reason = clean_reason(reason, false)?;

    let mut tx = store.begin().await?;
    let target = lock_target(tx.as_mut(), actor, user_id).await?;
    if !target.is_suspended {
        return Err(CoreError::Conflict("User is not suspended".into()));
    }

    let updated = tx.set_user_suspension(target.id, None).await?;
    tx.insert_audit(
        &NewAuditEntry::new(Some(actor.user_id), AuditAction::UserUnsuspend, now)
            .user(target.id)
            .detail(reason),
    )
    .await?;
    tx.insert_update(&NewMeowlUpdate {
        meowl_id: None,
        actor_id: Some(actor.user_id),
        kind: UpdateKind::UserUnsuspended,
        message: format!("{} was reinstated", target.username),
        created_at: now,
    })
    .await?;
    tx.commit().await?;

    tracing::info!(user_id, actor_id = actor.user_id, "User unsuspended");
    Ok(updated)
}

// ---------------------------------------------------------------------------
// Points corrections
// ---------------------------------------------------------------------------

/// Append a manual ledger correction. `amount` may be negative but not zero.
pub async fn adjust_points<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    user_id: DbId,
    amount: i32,
    note: &str,
    now: Timestamp,
) -> Result<PointsEntry, CoreError> {
    let actor = staff_actor(ctx)?;
    if amount == 0 {
        return Err(CoreError::Validation("Amount must not be zero".into()));
    }
    let note = clean_reason(note, true)?;

    let mut tx = store.begin().await?;
    let target = tx
        .lock_user(user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("User", user_id))?;

    let entry = tx
        .insert_points(&NewPointsEntry {
            user_id: target.id,
            meowl_id: None,
            ref_scan_id: None,
            amount,
            reason: PointsReason::Other,
            scan_day: None,
            note: note.clone(),
            created_at: now,
        })
        .await?
        .ok_or_else(|| CoreError::Internal("Points correction was not recorded".into()))?;
    tx.insert_audit(
        &NewAuditEntry::new(Some(actor.user_id), AuditAction::PointsAdjust, now)
            .user(target.id)
            .detail(format!("{amount:+}: {note}")),
    )
    .await?;
    tx.commit().await?;

    tracing::info!(user_id, actor_id = actor.user_id, amount, "Points adjusted");
    Ok(entry)
}
