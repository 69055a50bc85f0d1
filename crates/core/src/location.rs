//! Location candidates and the verification state machine.
//!
//! ```text
//! proposed -> pending -> current
//!                    \-> hidden
//! ```
//!
//! A Meowl has at most one `pending` and at most one `current` candidate.
//! Proposing demotes the existing pending candidate; reaching the verifier
//! quorum demotes the existing current one. Candidates are never deleted.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::activity::{NewMeowlUpdate, UpdateKind};
use crate::context::RequestContext;
use crate::error::CoreError;
use crate::gate::check_detail_access;
use crate::guards::{forbid_self_verification, require_active};
use crate::meowl::MeowlStatus;
use crate::points::{NewPointsEntry, PointsReason};
use crate::policy::Policy;
use crate::store::MeowlStore;
use crate::token_gate::TokenGate;
use crate::types::{DbId, Timestamp};

pub const ADDRESS_MAX_LEN: usize = 255;

/// Coordinates are stored with six decimal places (about 0.1 m).
const COORDINATE_SCALE: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationStatus {
    /// Accepted by storage for completeness; new candidates enter the
    /// workflow as `Pending` directly.
    Proposed,
    Pending,
    Current,
    Hidden,
}

impl LocationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LocationStatus::Proposed => "proposed",
            LocationStatus::Pending => "pending",
            LocationStatus::Current => "current",
            LocationStatus::Hidden => "hidden",
        }
    }
}

impl fmt::Display for LocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LocationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "proposed" => Ok(LocationStatus::Proposed),
            "pending" => Ok(LocationStatus::Pending),
            "current" => Ok(LocationStatus::Current),
            "hidden" => Ok(LocationStatus::Hidden),
            other => Err(format!("Unknown location status '{other}'")),
        }
    }
}

/// Validated, rounded latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoreError> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(CoreError::Validation("Coordinates must be finite numbers".into()));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(CoreError::Validation("Latitude must be between -90 and 90".into()));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(CoreError::Validation(
                "Longitude must be between -180 and 180".into(),
            ));
        }
        Ok(Self {
            lat: round_coordinate(lat),
            lng: round_coordinate(lng),
        })
    }
}

fn round_coordinate(value: f64) -> f64 {
    (value * COORDINATE_SCALE).round() / COORDINATE_SCALE
}

/// Raw location as submitted by a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationInput {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub address: String,
}

impl LocationInput {
    pub fn validate(&self) -> Result<(Coordinates, String), CoreError> {
        let coordinates = Coordinates::new(self.lat, self.lng)?;
        let address = self.address.trim();
        if address.chars().count() > ADDRESS_MAX_LEN {
            return Err(CoreError::Validation(format!(
                "Address must be at most {ADDRESS_MAX_LEN} characters"
            )));
        }
        Ok((coordinates, address.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocationCandidate {
    pub id: DbId,
    pub meowl_id: DbId,
    pub lat: f64,
    pub lng: f64,
    pub address: String,
    pub proposer_id: DbId,
    pub status: LocationStatus,
    pub verification_count: i32,
    pub verified_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

/// Always inserted as `pending` with a zero count.
#[derive(Debug, Clone, PartialEq)]
pub struct NewLocationCandidate {
    pub meowl_id: DbId,
    pub coordinates: Coordinates,
    pub address: String,
    pub proposer_id: DbId,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

/// What happens to a pending candidate once a new verifier is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    RemainPending,
    Promote,
}

pub fn transition_after_verification(distinct_verifiers: i64, quorum: i64) -> Transition {
    if distinct_verifiers >= quorum {
        Transition::Promote
    } else {
        Transition::RemainPending
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    pub candidate: LocationCandidate,
    /// Pending candidates demoted to hidden by this proposal.
    pub superseded: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerifyOutcome {
    /// Counted, below quorum.
    Recorded {
        candidate: LocationCandidate,
        points_awarded: i32,
    },
    /// Quorum reached; the candidate is now the Meowl's current location.
    Promoted {
        candidate: LocationCandidate,
        replaced: Option<DbId>,
        points_awarded: i32,
    },
    /// The caller had already verified this candidate. Nothing changed.
    AlreadyVerified { candidate: LocationCandidate },
}

impl VerifyOutcome {
    pub fn candidate(&self) -> &LocationCandidate {
        match self {
            VerifyOutcome::Recorded { candidate, .. }
            | VerifyOutcome::Promoted { candidate, .. }
            | VerifyOutcome::AlreadyVerified { candidate } => candidate,
        }
    }

    pub fn points_awarded(&self) -> i32 {
        match self {
            VerifyOutcome::Recorded { points_awarded, .. }
            | VerifyOutcome::Promoted { points_awarded, .. } => *points_awarded,
            VerifyOutcome::AlreadyVerified { .. } => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Propose a new location for a Meowl, replacing any pending proposal.
pub async fn propose_location<S: MeowlStore + ?Sized>(
    store: &S,
    ctx: &RequestContext,
    slug: &str,
    input: &LocationInput,
    now: Timestamp,
) -> Result<Proposal, CoreError> {
    let actor = ctx.actor()?;
    require_active(actor).into_result()?;
    let (coordinates, address) = input.validate()?;

    let mut tx = store.begin().await?;
    let meowl = tx
        .lock_meowl_by_slug(slug)
        .await?
        .filter(|m| !m.is_archived)
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;

    let superseded = tx.hide_candidates(meowl.id, LocationStatus::Pending).await?;
    let candidate = tx
        .insert_candidate(&NewLocationCandidate {
            meowl_id: meowl.id,
            coordinates,
            address,
            proposer_id: actor.user_id,
            created_at: now,
        })
        .await?;
    tx.insert_update(&NewMeowlUpdate {
        meowl_id: Some(meowl.id),
        actor_id: Some(actor.user_id),
        kind: UpdateKind::LocationProposed,
        message: format!("{} proposed a new location for {}", actor.username, meowl.name),
        created_at: now,
    })
    .await?;
    tx.commit().await?;

    tracing::info!(
        meowl_id = meowl.id,
        candidate_id = candidate.id,
        proposer_id = actor.user_id,
        superseded,
        "Location proposed",
    );
    Ok(Proposal {
        candidate,
        superseded,
    })
}

/// Count the caller as a verifier of the Meowl's pending location and
/// promote it once the quorum is reached.
///
/// Verifying vouches for having been there, so the caller must pass the same
/// gate as the detail view. `expected_candidate` lets a client assert which
/// proposal it looked at; if that proposal has since been superseded the
/// call fails with a conflict.
pub async fn verify_location<S: MeowlStore + ?Sized>(
    store: &S,
    gate: &TokenGate,
    ctx: &RequestContext,
    slug: &str,
    expected_candidate: Option<DbId>,
    policy: &Policy,
    now: Timestamp,
) -> Result<VerifyOutcome, CoreError> {
    let actor = ctx.actor()?;
    require_active(actor).into_result()?;

    let mut tx = store.begin().await?;
    let meowl = tx
        .find_meowl_by_slug(slug)
        .await?
        .filter(|m| !m.is_archived)
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;
    check_detail_access(gate, &meowl, ctx, now)?;

    let candidate = tx
        .lock_pending_candidate(meowl.id)
        .await?
        .ok_or_else(|| CoreError::Conflict("There is no pending location to verify".into()))?;
    if let Some(expected) = expected_candidate {
        if expected != candidate.id {
            return Err(CoreError::Conflict(
                "The proposed location has been replaced by a newer proposal".into(),
            ));
        }
    }
    forbid_self_verification(actor, candidate.proposer_id).into_result()?;

    if !tx.insert_verification(candidate.id, actor.user_id, now).await? {
        tracing::debug!(candidate_id = candidate.id, verifier_id = actor.user_id, "Already verified");
        return Ok(VerifyOutcome::AlreadyVerified { candidate });
    }

    let count = tx.count_verifiers(candidate.id).await?;
    let stored_count = i32::try_from(count)
        .map_err(|_| CoreError::Internal(format!("Verifier count out of range: {count}")))?;

    let points_awarded = policy.points.verify;
    let outcome = match transition_after_verification(count, policy.verification_quorum) {
        Transition::RemainPending => {
            let candidate = tx
                .update_candidate(candidate.id, LocationStatus::Pending, stored_count, None)
                .await?;
            VerifyOutcome::Recorded {
                candidate,
                points_awarded,
            }
        }
        Transition::Promote => {
            let previous = tx.find_current_candidate(meowl.id).await?;
            if let Some(prev) = &previous {
                tx.update_candidate(
                    prev.id,
                    LocationStatus::Hidden,
                    prev.verification_count,
                    prev.verified_at,
                )
                .await?;
            }
            let candidate = tx
                .update_candidate(candidate.id, LocationStatus::Current, stored_count, Some(now))
                .await?;
            tx.set_meowl_status(meowl.id, MeowlStatus::Active, now).await?;
            tx.insert_update(&NewMeowlUpdate {
                meowl_id: Some(meowl.id),
                actor_id: Some(actor.user_id),
                kind: UpdateKind::LocationVerified,
                message: format!("The location of {} was verified", meowl.name),
                created_at: now,
            })
            .await?;
            VerifyOutcome::Promoted {
                candidate,
                replaced: previous.map(|p| p.id),
                points_awarded,
            }
        }
    };

    if points_awarded != 0 {
        tx.insert_points(&NewPointsEntry {
            user_id: actor.user_id,
            meowl_id: Some(meowl.id),
            ref_scan_id: None,
            amount: points_awarded,
            reason: PointsReason::Verify,
            scan_day: None,
            note: String::new(),
            created_at: now,
        })
        .await?;
    }
    tx.commit().await?;

    tracing::info!(
        meowl_id = meowl.id,
        candidate_id = outcome.candidate().id,
        verifier_id = actor.user_id,
        verification_count = count,
        promoted = matches!(outcome, VerifyOutcome::Promoted { .. }),
        "Location verified",
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;
    use crate::meowl::{create_meowl, CreateMeowlInput};
    use crate::roles::Role;
    use crate::store::memory::MemoryStore;
    use crate::token_gate::TokenPurpose;
    use crate::users::UserRecord;

    fn ctx(user: &UserRecord) -> RequestContext {
        RequestContext::for_actor(user.into())
    }

    fn gate() -> TokenGate {
        TokenGate::new("location-tests", 15)
    }

    /// A caller who just scanned the Meowl's QR code.
    fn visitor(user: &UserRecord, slug: &str, now: Timestamp) -> RequestContext {
        ctx(user).with_qr_token(gate().issue(TokenPurpose::Qr, slug, now))
    }

    fn at(lat: f64, lng: f64) -> LocationInput {
        LocationInput {
            lat,
            lng,
            address: String::new(),
        }
    }

    async fn setup() -> (MemoryStore, UserRecord, String) {
        let store = MemoryStore::new();
        let owner = store.add_user("owner", Role::Member).await;
        let created = create_meowl(
            &store,
            &ctx(&owner),
            CreateMeowlInput {
                name: "Whiskers".into(),
                ..Default::default()
            },
            &Policy::default(),
            Utc::now(),
        )
        .await
        .unwrap();
        (store, owner, created.meowl.slug)
    }

    #[test]
    fn coordinates_are_range_checked_and_rounded() {
        assert_matches!(Coordinates::new(90.5, 0.0), Err(CoreError::Validation(_)));
        assert_matches!(Coordinates::new(0.0, -180.1), Err(CoreError::Validation(_)));
        assert_matches!(Coordinates::new(f64::NAN, 0.0), Err(CoreError::Validation(_)));
        assert_matches!(Coordinates::new(0.0, f64::INFINITY), Err(CoreError::Validation(_)));

        let c = Coordinates::new(10.123_456_78, -20.987_654_32).unwrap();
        assert_eq!(c.lat, 10.123457);
        assert_eq!(c.lng, -20.987654);
        assert!(Coordinates::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn quorum_transition() {
        assert_eq!(transition_after_verification(1, 2), Transition::RemainPending);
        assert_eq!(transition_after_verification(2, 2), Transition::Promote);
        assert_eq!(transition_after_verification(3, 2), Transition::Promote);
        assert_eq!(transition_after_verification(1, 1), Transition::Promote);
    }

    #[test]
    fn status_names_parse() {
        for s in ["proposed", "pending", "current", "hidden"] {
            assert_eq!(s.parse::<LocationStatus>().unwrap().as_str(), s);
        }
        assert!("deleted".parse::<LocationStatus>().is_err());
    }

    #[tokio::test]
    async fn new_proposal_hides_previous_pending() {
        let (store, _owner, slug) = setup().await;
        let a = store.add_user("alice", Role::Member).await;
        let b = store.add_user("bob", Role::Member).await;
        let now = Utc::now();

        let first = propose_location(&store, &ctx(&a), &slug, &at(1.0, 1.0), now).await.unwrap();
        assert_eq!(first.superseded, 0);
        let second = propose_location(&store, &ctx(&b), &slug, &at(2.0, 2.0), now).await.unwrap();
        assert_eq!(second.superseded, 1);

        let state = store.snapshot().await;
        let pending: Vec<_> = state
            .candidates
            .iter()
            .filter(|c| c.status == LocationStatus::Pending)
            .collect();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, second.candidate.id);
        let old = state.candidates.iter().find(|c| c.id == first.candidate.id).unwrap();
        assert_eq!(old.status, LocationStatus::Hidden);
    }

    #[tokio::test]
    async fn proposer_cannot_verify_own_candidate() {
        let (store, _owner, slug) = setup().await;
        let a = store.add_user("alice", Role::Member).await;
        let now = Utc::now();
        propose_location(&store, &ctx(&a), &slug, &at(1.0, 1.0), now).await.unwrap();

        let result = verify_location(
            &store,
            &gate(),
            &visitor(&a, &slug, now),
            &slug,
            None,
            &Policy::default(),
            now,
        )
        .await;

        assert_matches!(result, Err(CoreError::Forbidden(_)));
        let state = store.snapshot().await;
        assert!(state.verifications.is_empty());
        assert!(state.points.iter().all(|p| p.reason != PointsReason::Verify));
    }

    #[tokio::test]
    async fn repeat_verification_does_not_change_count() {
        let (store, _owner, slug) = setup().await;
        let a = store.add_user("alice", Role::Member).await;
        let b = store.add_user("bob", Role::Member).await;
        let now = Utc::now();
        let policy = Policy::default();
        propose_location(&store, &ctx(&a), &slug, &at(1.0, 1.0), now).await.unwrap();

        let first =
            verify_location(&store, &gate(), &visitor(&b, &slug, now), &slug, None, &policy, now)
                .await
                .unwrap();
        assert_matches!(first, VerifyOutcome::Recorded { ref candidate, points_awarded: 10 } if candidate.verification_count == 1);

        let again =
            verify_location(&store, &gate(), &visitor(&b, &slug, now), &slug, None, &policy, now)
                .await
                .unwrap();
        assert_matches!(again, VerifyOutcome::AlreadyVerified { ref candidate } if candidate.verification_count == 1);

        let state = store.snapshot().await;
        let verify_entries = state
            .points
            .iter()
            .filter(|p| p.reason == PointsReason::Verify)
            .count();
        assert_eq!(verify_entries, 1);
    }

    #[tokio::test]
    async fn verify_requires_passing_the_gate() {
        let (store, owner, slug) = setup().await;
        let a = store.add_user("alice", Role::Member).await;
        let b = store.add_user("bob", Role::Member).await;
        let now = Utc::now();
        let secret_spot = LocationInput {
            lat: 51.5,
            lng: -0.12,
            address: "Back alley".into(),
        };
        propose_location(&store, &ctx(&a), &slug, &secret_spot, now).await.unwrap();

        let policy = Policy::default();
        let no_token = verify_location(&store, &gate(), &ctx(&b), &slug, None, &policy, now).await;
        assert_matches!(no_token, Err(CoreError::Unauthorized(_)));

        let other_slug = ctx(&b).with_qr_token(gate().issue(TokenPurpose::Qr, "mittens", now));
        let wrong_meowl = verify_location(&store, &gate(), &other_slug, &slug, None, &policy, now).await;
        assert_matches!(wrong_meowl, Err(CoreError::Unauthorized(_)));

        let state = store.snapshot().await;
        assert!(state.verifications.is_empty());
        assert!(state.points.iter().all(|p| p.reason != PointsReason::Verify));

        // Owners pass without a token, like on the detail view.
        let by_owner = verify_location(&store, &gate(), &ctx(&owner), &slug, None, &policy, now).await;
        assert_matches!(by_owner, Ok(VerifyOutcome::Recorded { .. }));
    }

    #[tokio::test]
    async fn verify_without_pending_is_conflict() {
        let (store, _owner, slug) = setup().await;
        let b = store.add_user("bob", Role::Member).await;
        let now = Utc::now();

        let result = verify_location(
            &store,
            &gate(),
            &visitor(&b, &slug, now),
            &slug,
            None,
            &Policy::default(),
            now,
        )
        .await;

        assert_matches!(result, Err(CoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn stale_expected_candidate_is_conflict() {
        let (store, _owner, slug) = setup().await;
        let a = store.add_user("alice", Role::Member).await;
        let c = store.add_user("carol", Role::Member).await;
        let b = store.add_user("bob", Role::Member).await;
        let now = Utc::now();
        let first = propose_location(&store, &ctx(&a), &slug, &at(1.0, 1.0), now).await.unwrap();
        propose_location(&store, &ctx(&c), &slug, &at(2.0, 2.0), now).await.unwrap();

        let result = verify_location(
            &store,
            &gate(),
            &visitor(&b, &slug, now),
            &slug,
            Some(first.candidate.id),
            &Policy::default(),
            now,
        )
        .await;

        assert_matches!(result, Err(CoreError::Conflict(_)));
        assert!(store.snapshot().await.verifications.is_empty());
    }

    #[tokio::test]
    async fn promotion_replaces_current_location() {
        let (store, _owner, slug) = setup().await;
        let users = [
            store.add_user("alice", Role::Member).await,
            store.add_user("bob", Role::Member).await,
            store.add_user("carol", Role::Member).await,
        ];
        let policy = Policy::default();
        let now = Utc::now();

        let first = propose_location(&store, &ctx(&users[0]), &slug, &at(1.0, 1.0), now)
            .await
            .unwrap();
        verify_location(&store, &gate(), &visitor(&users[1], &slug, now), &slug, None, &policy, now).await.unwrap();
        verify_location(&store, &gate(), &visitor(&users[2], &slug, now), &slug, None, &policy, now).await.unwrap();

        propose_location(&store, &ctx(&users[1]), &slug, &at(3.0, 3.0), now).await.unwrap();
        verify_location(&store, &gate(), &visitor(&users[0], &slug, now), &slug, None, &policy, now).await.unwrap();
        let outcome = verify_location(&store, &gate(), &visitor(&users[2], &slug, now), &slug, None, &policy, now)
            .await
            .unwrap();

        assert_matches!(outcome, VerifyOutcome::Promoted { replaced: Some(id), .. } if id == first.candidate.id);
        let state = store.snapshot().await;
        let current: Vec<_> = state
            .candidates
            .iter()
            .filter(|c| c.status == LocationStatus::Current)
            .collect();
        assert_eq!(current.len(), 1);
        assert_eq!(current[0].lat, 3.0);
    }

    #[tokio::test]
    async fn archived_meowl_refuses_proposals() {
        let (store, _owner, slug) = setup().await;
        let a = store.add_user("alice", Role::Member).await;
        let staff = store.add_user("staff", Role::Staff).await;
        crate::moderation::archive_meowl(&store, &ctx(&staff), &slug, "Moved away", Utc::now())
            .await
            .unwrap();

        let result = propose_location(&store, &ctx(&a), &slug, &at(1.0, 1.0), Utc::now()).await;

        assert_matches!(result, Err(CoreError::NotFound { .. }));
    }
}
