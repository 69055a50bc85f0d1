//! End-to-end flows over the in-memory store.

use assert_matches::assert_matches;
use chrono::{Duration, TimeZone, Utc};

use meowl_core::audit::AuditAction;
use meowl_core::context::RequestContext;
use meowl_core::error::CoreError;
use meowl_core::location::{propose_location, verify_location, LocationInput, LocationStatus, VerifyOutcome};
use meowl_core::meowl::{create_meowl, CreateMeowlInput, MeowlStatus};
use meowl_core::moderation::{archive_meowl, unarchive_meowl};
use meowl_core::points::{leaderboard, LeaderboardPeriod, PointsReason};
use meowl_core::policy::Policy;
use meowl_core::roles::Role;
use meowl_core::store::memory::MemoryStore;
use meowl_core::token_gate::{TokenGate, TokenPurpose};
use meowl_core::types::Timestamp;
use meowl_core::users::UserRecord;

fn ctx(user: &UserRecord) -> RequestContext {
    RequestContext::for_actor(user.into())
}

fn gate() -> TokenGate {
    TokenGate::new("scenario-secret", 15)
}

/// `user` standing in front of the Meowl with its QR code scanned.
fn on_site(user: &UserRecord, slug: &str, now: Timestamp) -> RequestContext {
    ctx(user).with_qr_token(gate().issue(TokenPurpose::Qr, slug, now))
}

#[tokio::test]
async fn whiskers_location_is_verified_by_two_neighbours() {
    let store = MemoryStore::new();
    let policy = Policy::default();
    let now = Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap();
    let owner = store.add_user("owner", Role::Member).await;
    let a = store.add_user("a", Role::Member).await;
    let b = store.add_user("b", Role::Member).await;
    let c = store.add_user("c", Role::Member).await;

    let created = create_meowl(
        &store,
        &ctx(&owner),
        CreateMeowlInput {
            name: "whiskers".into(),
            ..Default::default()
        },
        &policy,
        now,
    )
    .await
    .unwrap();
    let slug = created.meowl.slug;
    assert_eq!(slug, "whiskers");

    let proposal = propose_location(
        &store,
        &ctx(&a),
        &slug,
        &LocationInput {
            lat: 10.0,
            lng: 20.0,
            address: "Corner of 1st and Main".into(),
        },
        now,
    )
    .await
    .unwrap();

    let by_b = verify_location(&store, &gate(), &on_site(&b, &slug, now), &slug, Some(proposal.candidate.id), &policy, now)
        .await
        .unwrap();
    assert_matches!(by_b, VerifyOutcome::Recorded { .. });
    assert_eq!(by_b.candidate().verification_count, 1);

    let by_c = verify_location(&store, &gate(), &on_site(&c, &slug, now), &slug, Some(proposal.candidate.id), &policy, now)
        .await
        .unwrap();
    assert_matches!(by_c, VerifyOutcome::Promoted { replaced: None, .. });

    let state = store.snapshot().await;
    let current: Vec<_> = state
        .candidates
        .iter()
        .filter(|x| x.status == LocationStatus::Current)
        .collect();
    assert_eq!(current.len(), 1);
    assert_eq!((current[0].lat, current[0].lng), (10.0, 20.0));
    assert_eq!(current[0].verification_count, 2);
    assert_eq!(current[0].verified_at, Some(now));

    let meowl = state.meowls.iter().find(|m| m.slug == slug).unwrap();
    assert_eq!(meowl.status, MeowlStatus::Active);

    let verify_rewards: Vec<_> = state
        .points
        .iter()
        .filter(|p| p.reason == PointsReason::Verify)
        .map(|p| (p.user_id, p.amount))
        .collect();
    assert_eq!(verify_rewards, [(b.id, 10), (c.id, 10)]);
    assert!(state.points.iter().all(|p| p.user_id != a.id));

    // A third verification has nothing left to verify.
    let late = verify_location(&store, &gate(), &ctx(&owner), &slug, None, &policy, now).await;
    assert_matches!(late, Err(CoreError::Conflict(_)));
}

#[tokio::test]
async fn archive_then_unarchive_leaves_two_audit_entries() {
    let store = MemoryStore::new();
    let policy = Policy::default();
    let now = Utc::now();
    let owner = store.add_user("owner", Role::Member).await;
    let staff = store.add_user("staff", Role::Staff).await;
    let b = store.add_user("b", Role::Member).await;
    let c = store.add_user("c", Role::Member).await;

    let slug = create_meowl(
        &store,
        &ctx(&owner),
        CreateMeowlInput {
            name: "Whiskers".into(),
            location: Some(LocationInput {
                lat: 1.5,
                lng: 2.5,
                address: String::new(),
            }),
            ..Default::default()
        },
        &policy,
        now,
    )
    .await
    .unwrap()
    .meowl
    .slug;
    verify_location(&store, &gate(), &on_site(&b, &slug, now), &slug, None, &policy, now).await.unwrap();
    verify_location(&store, &gate(), &on_site(&c, &slug, now), &slug, None, &policy, now).await.unwrap();

    let archived = archive_meowl(&store, &ctx(&staff), &slug, "Reported as fake", now + Duration::minutes(1))
        .await
        .unwrap();
    assert!(archived.is_archived);
    assert_eq!(archived.status, MeowlStatus::Archived);
    assert_eq!(archived.archived_by, Some(staff.id));
    assert_eq!(archived.archived_reason, "Reported as fake");

    let restored = unarchive_meowl(&store, &ctx(&staff), &slug, "Confirmed real", now + Duration::minutes(2))
        .await
        .unwrap();
    assert!(!restored.is_archived);
    assert_eq!(restored.status, MeowlStatus::Active);
    assert_eq!(restored.archived_at, None);
    assert_eq!(restored.archived_reason, "");

    let audit = store.snapshot().await.audit;
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].action, AuditAction::MeowlArchive);
    assert_eq!(audit[0].detail, "Reported as fake");
    assert_eq!(audit[1].action, AuditAction::MeowlUnarchive);
    assert!(audit.iter().all(|e| e.actor_id == Some(staff.id)));
    assert!(audit.iter().all(|e| e.target_meowl_id == Some(archived.id)));
}

#[tokio::test]
async fn leaderboard_reflects_creation_and_verification_rewards() {
    let store = MemoryStore::new();
    let policy = Policy::default();
    let now = Utc::now();
    let owner = store.add_user("owner", Role::Member).await;
    let b = store.add_user("b", Role::Member).await;
    let c = store.add_user("c", Role::Member).await;

    let slug = create_meowl(
        &store,
        &ctx(&owner),
        CreateMeowlInput {
            name: "Whiskers".into(),
            location: Some(LocationInput {
                lat: 0.0,
                lng: 0.0,
                address: String::new(),
            }),
            ..Default::default()
        },
        &policy,
        now,
    )
    .await
    .unwrap()
    .meowl
    .slug;
    verify_location(&store, &gate(), &on_site(&b, &slug, now), &slug, None, &policy, now).await.unwrap();
    verify_location(&store, &gate(), &on_site(&c, &slug, now), &slug, None, &policy, now).await.unwrap();

    let rows = leaderboard(&store, LeaderboardPeriod::Last7Days, &policy, now).await.unwrap();
    let got: Vec<_> = rows.iter().map(|r| (r.username.as_str(), r.total)).collect();
    assert_eq!(got, [("owner", 20), ("b", 10), ("c", 10)]);
}
