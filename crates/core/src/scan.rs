//! QR check-ins and the once-per-day scan reward.

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::context::RequestContext;
use crate::error::CoreError;
use crate::gate::{check_detail_access, AccessGrant};
use crate::guards::require_active;
use crate::points::{NewPointsEntry, PointsReason};
use crate::policy::Policy;
use crate::store::MeowlStore;
use crate::token_gate::TokenGate;
use crate::types::{DbId, Timestamp};

/// Immutable record of one check-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanEvent {
    pub id: DbId,
    pub meowl_id: DbId,
    pub user_id: DbId,
    pub ip_hash: String,
    pub user_agent_hash: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewScan {
    pub meowl_id: DbId,
    pub user_id: DbId,
    pub ip_hash: String,
    pub user_agent_hash: String,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanOutcome {
    pub scan: ScanEvent,
    /// `false` when the user already had a scan of this Meowl today.
    pub rewarded: bool,
    pub points_awarded: i32,
    pub access: AccessGrant,
}

/// The UTC calendar day containing `now`, as `(day, start, end)` with an
/// exclusive end.
pub fn utc_day_window(now: Timestamp) -> (NaiveDate, Timestamp, Timestamp) {
    let day = now.date_naive();
    let start = day.and_time(chrono::NaiveTime::MIN).and_utc();
    (day, start, start + Duration::days(1))
}

/// Record a check-in and reward it if it is the caller's first scan of this
/// Meowl today. The scan itself is always stored.
pub async fn record_scan<S: MeowlStore + ?Sized>(
    store: &S,
    gate: &TokenGate,
    ctx: &RequestContext,
    slug: &str,
    policy: &Policy,
    now: Timestamp,
) -> Result<ScanOutcome, CoreError> {
    let actor = ctx.actor()?;
    require_active(actor).into_result()?;

    let mut tx = store.begin().await?;
    let meowl = tx
        .find_meowl_by_slug(slug)
        .await?
        .filter(|m| !m.is_archived)
        .ok_or_else(|| CoreError::not_found("Meowl", slug))?;
    let access = check_detail_access(gate, &meowl, ctx, now)?;

    let scan = tx
        .insert_scan(&NewScan {
            meowl_id: meowl.id,
            user_id: actor.user_id,
            ip_hash: ctx.client.ip_hash.clone(),
            user_agent_hash: ctx.client.user_agent_hash.clone(),
            created_at: now,
        })
        .await?;

    let (day, start, end) = utc_day_window(now);
    let seen_today = tx
        .has_scan_between(actor.user_id, meowl.id, start, end, scan.id)
        .await?;

    let mut rewarded = false;
    if !seen_today && policy.points.scan != 0 {
        // The ledger's unique (user, meowl, scan_day) key settles races between
        // two first scans of the same day.
        rewarded = tx
            .insert_points(&NewPointsEntry {
                user_id: actor.user_id,
                meowl_id: Some(meowl.id),
                ref_scan_id: Some(scan.id),
                amount: policy.points.scan,
                reason: PointsReason::Scan,
                scan_day: Some(day),
                note: String::new(),
                created_at: now,
            })
            .await?
            .is_some();
    }
    tx.commit().await?;

    tracing::info!(
        meowl_id = meowl.id,
        user_id = actor.user_id,
        scan_id = scan.id,
        rewarded,
        "Scan recorded",
    );
    Ok(ScanOutcome {
        scan,
        rewarded,
        points_awarded: if rewarded { policy.points.scan } else { 0 },
        access,
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::context::ClientInfo;
    use crate::meowl::{create_meowl, CreateMeowlInput};
    use crate::roles::Role;
    use crate::store::memory::MemoryStore;
    use crate::token_gate::TokenPurpose;
    use crate::users::UserRecord;

    async fn setup(store: &MemoryStore) -> String {
        let owner = store.add_user("owner", Role::Member).await;
        create_meowl(
            store,
            &RequestContext::for_actor((&owner).into()),
            CreateMeowlInput {
                name: "Whiskers".into(),
                ..Default::default()
            },
            &Policy::default(),
            Utc::now(),
        )
        .await
        .unwrap()
        .meowl
        .slug
    }

    fn scanner_ctx(gate: &TokenGate, user: &UserRecord, slug: &str, now: Timestamp) -> RequestContext {
        RequestContext::for_actor(user.into())
            .with_qr_token(gate.issue(TokenPurpose::Qr, slug, now))
            .with_client(ClientInfo {
                ip_hash: "iphash".into(),
                user_agent_hash: "uahash".into(),
            })
    }

    #[test]
    fn day_window_is_utc_midnight_to_midnight() {
        let now = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap();
        let (day, start, end) = utc_day_window(now);
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 3, 9).unwrap());
        assert_eq!(start, Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn second_scan_same_day_is_recorded_but_not_rewarded() {
        let store = MemoryStore::new();
        let gate = TokenGate::new("secret", 15);
        let slug = setup(&store).await;
        let user = store.add_user("scanner", Role::Member).await;
        let morning = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 5, 1, 20, 0, 0).unwrap();
        let policy = Policy::default();

        let first = record_scan(&store, &gate, &scanner_ctx(&gate, &user, &slug, morning), &slug, &policy, morning)
            .await
            .unwrap();
        let second = record_scan(&store, &gate, &scanner_ctx(&gate, &user, &slug, evening), &slug, &policy, evening)
            .await
            .unwrap();

        assert!(first.rewarded);
        assert_eq!(first.points_awarded, 5);
        assert!(!second.rewarded);
        assert_eq!(second.points_awarded, 0);

        let state = store.snapshot().await;
        assert_eq!(state.scans.len(), 2);
        assert_eq!(state.scans[0].ip_hash, "iphash");
        let scan_points: Vec<_> = state
            .points
            .iter()
            .filter(|p| p.reason == PointsReason::Scan)
            .collect();
        assert_eq!(scan_points.len(), 1);
        assert_eq!(scan_points[0].ref_scan_id, Some(first.scan.id));
    }

    #[tokio::test]
    async fn next_day_scan_is_rewarded_again() {
        let store = MemoryStore::new();
        let gate = TokenGate::new("secret", 15);
        let slug = setup(&store).await;
        let user = store.add_user("scanner", Role::Member).await;
        let late = Utc.with_ymd_and_hms(2024, 5, 1, 23, 55, 0).unwrap();
        let early = Utc.with_ymd_and_hms(2024, 5, 2, 0, 5, 0).unwrap();
        let policy = Policy::default();

        let a = record_scan(&store, &gate, &scanner_ctx(&gate, &user, &slug, late), &slug, &policy, late)
            .await
            .unwrap();
        let b = record_scan(&store, &gate, &scanner_ctx(&gate, &user, &slug, early), &slug, &policy, early)
            .await
            .unwrap();

        assert!(a.rewarded);
        assert!(b.rewarded);
    }

    #[tokio::test]
    async fn scan_without_token_is_refused_and_not_stored() {
        let store = MemoryStore::new();
        let gate = TokenGate::new("secret", 15);
        let slug = setup(&store).await;
        let user = store.add_user("scanner", Role::Member).await;
        let ctx = RequestContext::for_actor((&user).into());

        let result = record_scan(&store, &gate, &ctx, &slug, &Policy::default(), Utc::now()).await;

        assert_matches!(result, Err(CoreError::Unauthorized(_)));
        assert!(store.snapshot().await.scans.is_empty());
    }

    #[tokio::test]
    async fn suspended_user_cannot_scan() {
        let store = MemoryStore::new();
        let gate = TokenGate::new("secret", 15);
        let slug = setup(&store).await;
        let user = store.add_user("scanner", Role::Member).await;
        let now = Utc::now();
        let mut ctx = scanner_ctx(&gate, &user, &slug, now);
        if let Some(actor) = ctx.actor.as_mut() {
            actor.is_suspended = true;
        }

        let result = record_scan(&store, &gate, &ctx, &slug, &Policy::default(), now).await;

        assert_matches!(result, Err(CoreError::Forbidden(_)));
    }
}
