//! Meowl records and the create/edit flows.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::activity::{NewMeowlUpdate, UpdateKind};
use crate::context::{Actor, RequestContext};
use crate::error::CoreError;
use crate::guards::{require_active, require_owner_or_staff};
use crate::location::{Coordinates, LocationCandidate, LocationInput, NewLocationCandidate};
use crate::points::{NewPointsEntry, PointsReason};
use crate::policy::Policy;
use crate::store::{MeowlStore, StoreTx};
use crate::types::{DbId, Timestamp};

pub const NAME_MAX_LEN: usize = 120;
pub const SLUG_MAX_LEN: usize = 64;
pub const DESCRIPTION_MAX_LEN: usize = 5000;

/// Slug used when a name contains no sluggable characters.
const FALLBACK_SLUG: &str = "meowl";

const SLUG_CONSTRAINT: &str = "uq_meowls_slug";

/// Lifecycle status of a Meowl. New Meowls are hidden until a location is
/// verified; archiving is a soft delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeowlStatus {
    Hidden,
    Active,
    Archived,
}

impl MeowlStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MeowlStatus::Hidden => "hidden",
            MeowlStatus::Active => "active",
            MeowlStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for MeowlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MeowlStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hidden" => Ok(MeowlStatus::Hidden),
            "active" => Ok(MeowlStatus::Active),
            "archived" => Ok(MeowlStatus::Archived),
            other => Err(format!("Unknown meowl status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Meowl {
    pub id: DbId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub owner_id: DbId,
    pub status: MeowlStatus,
    pub is_archived: bool,
    pub archived_at: Option<Timestamp>,
    pub archived_by: Option<DbId>,
    pub archived_reason: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMeowl {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub owner_id: DbId,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default)]
pub struct CreateMeowlInput {
    pub name: String,
    pub description: String,
    pub location: Option<LocationInput>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateMeowlInput {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreatedMeowl {
    pub meowl: Meowl,
    pub pending_location: Option<LocationCandidate>,
    pub points_awarded: i32,
}

// ---------------------------------------------------------------------------
// Validation and slugs
// ---------------------------------------------------------------------------

pub fn validate_name(name: &str) -> Result<String, CoreError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation("Name is required".into()));
    }
    if name.chars().count() > NAME_MAX_LEN {
        return Err(CoreError::Validation(format!(
            "Name must be at most {NAME_MAX_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_description(description: &str) -> Result<String, CoreError> {
    let description = description.trim();
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(CoreError::Validation(format!(
            "Description must be at most {DESCRIPTION_MAX_LEN} characters"
        )));
    }
    Ok(description.to_string())
}

/// Lowercase ASCII alphanumerics separated by single hyphens, at most
/// [`SLUG_MAX_LEN`] characters. Returns an empty string if nothing survives.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }
    slug.truncate(SLUG_MAX_LEN);
    slug.trim_end_matches('-').to_string()
}

/// `base`, then `base-2`, `base-3`, ... until the slug is free.
async fn unique_slug(tx: &mut dyn StoreTx, name: &str) -> Result<String, CoreError> {
    let base = match slugify(name) {
        s if s.is_empty() => FALLBACK_SLUG.to_string(),
        s => s,
    };
    if !tx.slug_exists(&base).await? {
        return Ok(base);
    }
    let mut n: u32 = 2;
    loop {
        let suffix = format!("-{n}");
        let mut head = base.clone();
        head.truncate(SLUG_MAX_LEN - suffix.len());
        let candidate = format!("{}{suffix}", head.trim_end_matches('-'));
        if !tx.slug_exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Register a new Meowl owned by the caller, optionally with an initial
/// location that enters verification as a pending candidate.
///
/// The free-slug lookup and the insert are not atomic, so a concurrent
/// create can claim the slug in between. That loses on `uq_meowls_slug`
/// and is retried once in a fresh transaction.
pub async fn create_meowl<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    input: CreateMeowlInput,
    policy: &Policy,
    now: Timestamp,
) -> Result<CreatedMeowl, CoreError> {
    let actor = ctx.actor()?;
    require_active(actor).into_result()?;

    let draft = MeowlDraft {
        name: validate_name(&input.name)?,
        description: validate_description(&input.description)?,
        location: input.location.map(|l| l.validate()).transpose()?,
    };

    let created = match insert_new_meowl(store, actor, &draft, policy, now).await {
        Err(err) if is_slug_conflict(&err) => {
            tracing::warn!(name = %draft.name, "Slug claimed concurrently, retrying");
            insert_new_meowl(store, actor, &draft, policy, now).await?
        }
        other => other?,
    };

    tracing::info!(
        meowl_id = created.meowl.id,
        slug = %created.meowl.slug,
        owner_id = actor.user_id,
        "Meowl created",
    );

    Ok(created)
}

/// Validated create input.
struct MeowlDraft {
    name: String,
    description: String,
    location: Option<(Coordinates, String)>,
}

fn is_slug_conflict(err: &CoreError) -> bool {
    matches!(err, CoreError::Conflict(msg) if msg.contains(SLUG_CONSTRAINT))
}

async fn insert_new_meowl<S: MeowlStore + ?Sized>(
    store: &S,
    actor: &Actor,
    draft: &MeowlDraft,
    policy: &Policy,
    now: Timestamp,
) -> Result<CreatedMeowl, CoreError> {
    let mut tx = store.begin().await?;
    let slug = unique_slug(tx.as_mut(), &draft.name).await?;
    let meowl = tx
        .insert_meowl(&NewMeowl {
            slug,
            name: draft.name.clone(),
            description: draft.description.clone(),
            owner_id: actor.user_id,
            created_at: now,
        })
        .await?;

    let pending_location = match &draft.location {
        Some((coordinates, address)) => Some(
            tx.insert_candidate(&NewLocationCandidate {
                meowl_id: meowl.id,
                coordinates: *coordinates,
                address: address.clone(),
                proposer_id: actor.user_id,
                created_at: now,
            })
            .await?,
        ),
        None => None,
    };

    let mut points_awarded = 0;
    if policy.points.create != 0 {
        tx.insert_points(&NewPointsEntry {
            user_id: actor.user_id,
            meowl_id: Some(meowl.id),
            ref_scan_id: None,
            amount: policy.points.create,
            reason: PointsReason::Create,
            scan_day: None,
            note: String::new(),
            created_at: now,
        })
        .await?;
        points_awarded = policy.points.create;
    }

    tx.insert_update(&NewMeowlUpdate {
        meowl_id: Some(meowl.id),
        actor_id: Some(actor.user_id),
        kind: UpdateKind::Create,
        message: format!("{} registered {}", actor.username, meowl.name),
        created_at: now,
    })
    .await?;
    tx.commit().await?;

    Ok(CreatedMeowl {
        meowl,
        pending_location,
        points_awarded,
    })
}

/// Edit name and/or description. Owner or staff only.
pub async fn update_meowl<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    slug: &str,
    input: UpdateMeowlInput,
    now: Timestamp,
) -> Result<Meowl, CoreError> {
    let actor = ctx.actor()?;

    let mut tx = store.begin().await?;
    let meowl = tx
        .lock_meowl_by_slug(slug)
        .await?
        .filter(|m| !m.is_archived || actor.is_staff())
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;
    require_owner_or_staff(actor, meowl.owner_id).into_result()?;

    let name = match input.name.as_deref() {
        Some(n) => validate_name(n)?,
        None => meowl.name.clone(),
    };
    let description = match input.description.as_deref() {
        Some(d) => validate_description(d)?,
        None => meowl.description.clone(),
    };

    let updated = tx
        .update_meowl_details(meowl.id, &name, &description, now)
        .await?;
    tx.insert_update(&NewMeowlUpdate {
        meowl_id: Some(meowl.id),
        actor_id: Some(actor.user_id),
        kind: UpdateKind::Edit,
        message: format!("{} edited {}", actor.username, updated.name),
        created_at: now,
    })
    .await?;
    tx.commit().await?;

    tracing::info!(meowl_id = meowl.id, actor_id = actor.user_id, "Meowl updated");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;
    use crate::roles::Role;
    use crate::store::memory::MemoryStore;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("  Mr. Whiskers!! "), "mr-whiskers");
        assert_eq!(slugify("Café du Chat"), "caf-du-chat");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn slugify_truncates_without_trailing_hyphen() {
        let name = format!("{} tail", "a".repeat(63));
        let slug = slugify(&name);
        assert!(slug.len() <= SLUG_MAX_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn name_validation() {
        assert_matches!(validate_name("   "), Err(CoreError::Validation(_)));
        assert_matches!(validate_name(&"x".repeat(121)), Err(CoreError::Validation(_)));
        assert_eq!(validate_name(" Whiskers ").unwrap(), "Whiskers");
    }

    #[test]
    fn only_slug_conflicts_are_retried() {
        assert!(is_slug_conflict(&CoreError::Conflict(
            "Duplicate value violates uq_meowls_slug".into()
        )));
        assert!(!is_slug_conflict(&CoreError::Conflict(
            "Duplicate value violates uq_users_email".into()
        )));
        assert!(!is_slug_conflict(&CoreError::Internal("uq_meowls_slug".into())));
    }

    #[tokio::test]
    async fn duplicate_names_get_numbered_slugs() {
        let store = MemoryStore::new();
        let owner = store.add_user("owner", Role::Member).await;
        let ctx = RequestContext::for_actor((&owner).into());
        let policy = Policy::default();
        let now = Utc::now();

        let mut slugs = Vec::new();
        for _ in 0..3 {
            let input = CreateMeowlInput {
                name: "Whiskers".into(),
                ..Default::default()
            };
            let created = create_meowl(&store, &ctx, input, &policy, now).await.unwrap();
            slugs.push(created.meowl.slug);
        }
        assert_eq!(slugs, ["whiskers", "whiskers-2", "whiskers-3"]);
    }

    #[tokio::test]
    async fn unsluggable_name_falls_back() {
        let store = MemoryStore::new();
        let owner = store.add_user("owner", Role::Member).await;
        let ctx = RequestContext::for_actor((&owner).into());
        let input = CreateMeowlInput {
            name: "!!!".into(),
            ..Default::default()
        };
        let created = create_meowl(&store, &ctx, input, &Policy::default(), Utc::now())
            .await
            .unwrap();
        assert_eq!(created.meowl.slug, "meowl");
    }

    #[tokio::test]
    async fn create_with_location_starts_hidden_with_pending_candidate() {
        let store = MemoryStore::new();
        let owner = store.add_user("owner", Role::Member).await;
        let ctx = RequestContext::for_actor((&owner).into());
        let input = CreateMeowlInput {
            name: "Whiskers".into(),
            description: "Tabby by the fountain".into(),
            location: Some(LocationInput {
                lat: 10.0,
                lng: 20.0,
                address: "Main square".into(),
            }),
        };

        let created = create_meowl(&store, &ctx, input, &Policy::default(), Utc::now())
            .await
            .unwrap();

        assert_eq!(created.meowl.status, MeowlStatus::Hidden);
        assert_eq!(created.points_awarded, 20);
        let pending = created.pending_location.unwrap();
        assert_eq!(pending.proposer_id, owner.id);
        assert_eq!(pending.verification_count, 0);

        let state = store.snapshot().await;
        assert_eq!(state.points.len(), 1);
        assert_eq!(state.updates.len(), 1);
        assert_eq!(state.updates[0].kind, UpdateKind::Create);
    }

    #[tokio::test]
    async fn zero_create_points_disables_reward() {
        let store = MemoryStore::new();
        let owner = store.add_user("owner", Role::Member).await;
        let ctx = RequestContext::for_actor((&owner).into());
        let mut policy = Policy::default();
        policy.points.create = 0;
        let input = CreateMeowlInput {
            name: "Whiskers".into(),
            ..Default::default()
        };

        let created = create_meowl(&store, &ctx, input, &policy, Utc::now()).await.unwrap();

        assert_eq!(created.points_awarded, 0);
        assert!(store.snapshot().await.points.is_empty());
    }

    #[tokio::test]
    async fn suspended_users_cannot_create() {
        let store = MemoryStore::new();
        let owner = store.add_user("owner", Role::Member).await;
        let mut actor: crate::context::Actor = (&owner).into();
        actor.is_suspended = true;
        let ctx = RequestContext::for_actor(actor);
        let input = CreateMeowlInput {
            name: "Whiskers".into(),
            ..Default::default()
        };

        let result = create_meowl(&store, &ctx, input, &Policy::default(), Utc::now()).await;

        assert_matches!(result, Err(CoreError::Forbidden(_)));
        assert!(store.snapshot().await.meowls.is_empty());
    }

    #[tokio::test]
    async fn only_owner_or_staff_may_edit() {
        let store = MemoryStore::new();
        let owner = store.add_user("owner", Role::Member).await;
        let other = store.add_user("other", Role::Member).await;
        let staff = store.add_user("staff", Role::Staff).await;
        let now = Utc::now();
        let created = create_meowl(
            &store,
            &RequestContext::for_actor((&owner).into()),
            CreateMeowlInput {
                name: "Whiskers".into(),
                ..Default::default()
            },
            &Policy::default(),
            now,
        )
        .await
        .unwrap();
        let slug = created.meowl.slug;

        let edit = UpdateMeowlInput {
            name: Some("Sir Whiskers".into()),
            description: None,
        };
        let denied = update_meowl(
            &store,
            &RequestContext::for_actor((&other).into()),
            &slug,
            edit.clone(),
            now,
        )
        .await;
        assert_matches!(denied, Err(CoreError::Forbidden(_)));

        let updated = update_meowl(
            &store,
            &RequestContext::for_actor((&staff).into()),
            &slug,
            edit,
            now,
        )
        .await
        .unwrap();
        assert_eq!(updated.name, "Sir Whiskers");
        assert_eq!(updated.slug, slug);
    }
}
