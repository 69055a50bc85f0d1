//! In-memory store used by the core unit tests.
//!
//! Transactions are serialized behind a single `tokio::sync::Mutex`. Each
//! transaction works on a copy of the state and swaps it in on commit, so
//! an uncommitted transaction leaves nothing behind.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{MeowlStore, StoreTx};
use crate::activity::{MeowlUpdate, NewMeowlUpdate};
use crate::audit::{AuditEntry, NewAuditEntry};
use crate::comment::{Comment, NewComment};
use crate::error::CoreError;
use crate::location::{LocationCandidate, LocationStatus, NewLocationCandidate};
use crate::meowl::{Meowl, MeowlStatus, NewMeowl};
use crate::moderation::ModerationStamp;
use crate::points::{LeaderboardQuery, LeaderboardRow, NewPointsEntry, PointsEntry};
use crate::roles::Role;
use crate::scan::{NewScan, ScanEvent};
use crate::types::{DbId, Timestamp};
use crate::users::{Suspension, UserRecord};

#[derive(Debug, Clone, PartialEq)]
pub struct Verification {
    pub candidate_id: DbId,
    pub verifier_id: DbId,
    pub created_at: Timestamp,
}

/// Every table, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub users: Vec<UserRecord>,
    pub meowls: Vec<Meowl>,
    pub candidates: Vec<LocationCandidate>,
    pub verifications: Vec<Verification>,
    pub scans: Vec<ScanEvent>,
    pub points: Vec<PointsEntry>,
    pub comments: Vec<Comment>,
    pub audit: Vec<AuditEntry>,
    pub updates: Vec<MeowlUpdate>,
    next_id: DbId,
}

impl MemoryState {
    fn next_id(&mut self) -> DbId {
        self.next_id += 1;
        self.next_id
    }

    fn user_mut(&mut self, user_id: DbId) -> Result<&mut UserRecord, CoreError> {
        self.users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or_else(|| CoreError::not_found("User", user_id))
    }

    fn meowl_mut(&mut self, meowl_id: DbId) -> Result<&mut Meowl, CoreError> {
        self.meowls
            .iter_mut()
            .find(|m| m.id == meowl_id)
            .ok_or_else(|| CoreError::not_found("Meowl", meowl_id))
    }

    fn comment_mut(&mut self, comment_id: DbId) -> Result<&mut Comment, CoreError> {
        self.comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| CoreError::not_found("Comment", comment_id))
    }

    fn candidate_with_status(&self, meowl_id: DbId, status: LocationStatus) -> Option<LocationCandidate> {
        self.candidates
            .iter()
            .find(|c| c.meowl_id == meowl_id && c.status == status)
            .cloned()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an active user with a verified `{username}@example.com` address.
    pub async fn add_user(&self, username: &str, role: Role) -> UserRecord {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let user = UserRecord {
            id: state.next_id(),
            username: username.to_string(),
            email: format!("{username}@example.com"),
            role,
            is_active: true,
            is_suspended: false,
            suspend_reason: String::new(),
            suspended_at: None,
            email_verified_at: Some(now),
            created_at: now,
        };
        state.users.push(user.clone());
        user
    }

    /// Copy of the committed state.
    pub async fn snapshot(&self) -> MemoryState {
        self.state.lock().await.clone()
    }
}

#[async_trait]
impl MeowlStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, CoreError> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard: Some(guard),
            working,
        }))
    }
}

pub struct MemoryTx {
    guard: Option<OwnedMutexGuard<MemoryState>>,
    working: MemoryState,
}

impl MemoryTx {
    fn state(&mut self) -> Result<&mut MemoryState, CoreError> {
        if self.guard.is_none() {
            return Err(CoreError::Internal("Transaction already committed".into()));
        }
        Ok(&mut self.working)
    }
}

fn unique_violation(constraint: &str) -> CoreError {
    CoreError::Conflict(format!("Unique constraint violated: {constraint}"))
}

fn scan_reward_key(entry: &NewPointsEntry) -> Option<(DbId, DbId, NaiveDate)> {
    Some((entry.user_id, entry.meowl_id?, entry.scan_day?))
}

#[async_trait]
impl StoreTx for MemoryTx {
    // ==================== Users ====================

    async fn lock_user(&mut self, user_id: DbId) -> Result<Option<UserRecord>, CoreError> {
        Ok(self.state()?.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn set_user_role(&mut self, user_id: DbId, role: Role) -> Result<UserRecord, CoreError> {
        let user = self.state()?.user_mut(user_id)?;
        user.role = role;
        Ok(user.clone())
    }

    async fn set_user_suspension(
        &mut self,
        user_id: DbId,
        suspension: Option<&Suspension>,
    ) -> Result<UserRecord, CoreError> {
        let user = self.state()?.user_mut(user_id)?;
        match suspension {
            Some(s) => {
                user.is_suspended = true;
                user.suspend_reason = s.reason.clone();
                user.suspended_at = Some(s.at);
            }
            None => {
                user.is_suspended = false;
                user.suspend_reason.clear();
                user.suspended_at = None;
            }
        }
        Ok(user.clone())
    }

    // ==================== Meowls ====================

    async fn find_meowl_by_slug(&mut self, slug: &str) -> Result<Option<Meowl>, CoreError> {
        Ok(self.state()?.meowls.iter().find(|m| m.slug == slug).cloned())
    }

    async fn lock_meowl_by_slug(&mut self, slug: &str) -> Result<Option<Meowl>, CoreError> {
        self.find_meowl_by_slug(slug).await
    }

    async fn slug_exists(&mut self, slug: &str) -> Result<bool, CoreError> {
        Ok(self.state()?.meowls.iter().any(|m| m.slug == slug))
    }

    async fn insert_meowl(&mut self, meowl: &NewMeowl) -> Result<Meowl, CoreError> {
        let state = self.state()?;
        if state.meowls.iter().any(|m| m.slug == meowl.slug) {
            return Err(unique_violation("uq_meowls_slug"));
        }
        let row = Meowl {
            id: state.next_id(),
            slug: meowl.slug.clone(),
            name: meowl.name.clone(),
            description: meowl.description.clone(),
            owner_id: meowl.owner_id,
            status: MeowlStatus::Hidden,
            is_archived: false,
            archived_at: None,
            archived_by: None,
            archived_reason: String::new(),
            created_at: meowl.created_at,
            updated_at: meowl.created_at,
        };
        state.meowls.push(row.clone());
        Ok(row)
    }

    async fn update_meowl_details(
        &mut self,
        meowl_id: DbId,
        name: &str,
        description: &str,
        now: Timestamp,
    ) -> Result<Meowl, CoreError> {
        let meowl = self.state()?.meowl_mut(meowl_id)?;
        meowl.name = name.to_string();
        meowl.description = description.to_string();
        meowl.updated_at = now;
        Ok(meowl.clone())
    }

    async fn set_meowl_status(
        &mut self,
        meowl_id: DbId,
        status: MeowlStatus,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let meowl = self.state()?.meowl_mut(meowl_id)?;
        meowl.status = status;
        meowl.updated_at = now;
        Ok(())
    }

    async fn set_meowl_archive(
        &mut self,
        meowl_id: DbId,
        archive: Option<&ModerationStamp>,
        status: MeowlStatus,
        now: Timestamp,
    ) -> Result<Meowl, CoreError> {
        let meowl = self.state()?.meowl_mut(meowl_id)?;
        meowl.is_archived = archive.is_some();
        meowl.archived_at = archive.map(|a| a.at);
        meowl.archived_by = archive.map(|a| a.by);
        meowl.archived_reason = archive.map(|a| a.reason.clone()).unwrap_or_default();
        meowl.status = status;
        meowl.updated_at = now;
        Ok(meowl.clone())
    }

    // ==================== Location candidates ====================

    async fn find_current_candidate(
        &mut self,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidate>, CoreError> {
        Ok(self.state()?.candidate_with_status(meowl_id, LocationStatus::Current))
    }

    async fn find_pending_candidate(
        &mut self,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidate>, CoreError> {
        Ok(self.state()?.candidate_with_status(meowl_id, LocationStatus::Pending))
    }

    async fn lock_pending_candidate(
        &mut self,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidate>, CoreError> {
        self.find_pending_candidate(meowl_id).await
    }

    async fn insert_candidate(
        &mut self,
        candidate: &NewLocationCandidate,
    ) -> Result<LocationCandidate, CoreError> {
        let state = self.state()?;
        if state
            .candidate_with_status(candidate.meowl_id, LocationStatus::Pending)
            .is_some()
        {
            return Err(unique_violation("uq_location_candidates_one_pending"));
        }
        let row = LocationCandidate {
            id: state.next_id(),
            meowl_id: candidate.meowl_id,
            lat: candidate.coordinates.lat,
            lng: candidate.coordinates.lng,
            address: candidate.address.clone(),
            proposer_id: candidate.proposer_id,
            status: LocationStatus::Pending,
            verification_count: 0,
            verified_at: None,
            created_at: candidate.created_at,
        };
        state.candidates.push(row.clone());
        Ok(row)
    }

    async fn hide_candidates(&mut self, meowl_id: DbId, from: LocationStatus) -> Result<u64, CoreError> {
        let mut changed = 0;
        for c in self
            .state()?
            .candidates
            .iter_mut()
            .filter(|c| c.meowl_id == meowl_id && c.status == from)
        {
            c.status = LocationStatus::Hidden;
            changed += 1;
        }
        Ok(changed)
    }

    async fn update_candidate(
        &mut self,
        candidate_id: DbId,
        status: LocationStatus,
        verification_count: i32,
        verified_at: Option<Timestamp>,
    ) -> Result<LocationCandidate, CoreError> {
        let state = self.state()?;
        let meowl_id = state
            .candidates
            .iter()
            .find(|c| c.id == candidate_id)
            .map(|c| c.meowl_id)
            .ok_or_else(|| CoreError::not_found("LocationCandidate", candidate_id))?;
        if matches!(status, LocationStatus::Pending | LocationStatus::Current) {
            let clash = state
                .candidates
                .iter()
                .any(|c| c.meowl_id == meowl_id && c.status == status && c.id != candidate_id);
            if clash {
                return Err(unique_violation(&format!("uq_location_candidates_one_{status}")));
            }
        }
        let candidate = state
            .candidates
            .iter_mut()
            .find(|c| c.id == candidate_id)
            .ok_or_else(|| CoreError::not_found("LocationCandidate", candidate_id))?;
        candidate.status = status;
        candidate.verification_count = verification_count;
        candidate.verified_at = verified_at;
        Ok(candidate.clone())
    }

    async fn insert_verification(
        &mut self,
        candidate_id: DbId,
        verifier_id: DbId,
        now: Timestamp,
    ) -> Result<bool, CoreError> {
        let state = self.state()?;
        if state
            .verifications
            .iter()
            .any(|v| v.candidate_id == candidate_id && v.verifier_id == verifier_id)
        {
            return Ok(false);
        }
        state.verifications.push(Verification {
            candidate_id,
            verifier_id,
            created_at: now,
        });
        Ok(true)
    }

    async fn count_verifiers(&mut self, candidate_id: DbId) -> Result<i64, CoreError> {
        let count = self
            .state()?
            .verifications
            .iter()
            .filter(|v| v.candidate_id == candidate_id)
            .count();
        Ok(count as i64)
    }

    // ==================== Scans ====================

    async fn insert_scan(&mut self, scan: &NewScan) -> Result<ScanEvent, CoreError> {
        let state = self.state()?;
        let row = ScanEvent {
            id: state.next_id(),
            meowl_id: scan.meowl_id,
            user_id: scan.user_id,
            ip_hash: scan.ip_hash.clone(),
            user_agent_hash: scan.user_agent_hash.clone(),
            created_at: scan.created_at,
        };
        state.scans.push(row.clone());
        Ok(row)
    }

    async fn has_scan_between(
        &mut self,
        user_id: DbId,
        meowl_id: DbId,
        from: Timestamp,
        to: Timestamp,
        exclude_scan_id: DbId,
    ) -> Result<bool, CoreError> {
        Ok(self.state()?.scans.iter().any(|s| {
            s.user_id == user_id
                && s.meowl_id == meowl_id
                && s.id != exclude_scan_id
                && s.created_at >= from
                && s.created_at < to
        }))
    }

    // ==================== Points ledger ====================

    async fn insert_points(&mut self, entry: &NewPointsEntry) -> Result<Option<PointsEntry>, CoreError> {
        let state = self.state()?;
        if let Some(key) = scan_reward_key(entry) {
            let taken = state.points.iter().any(|p| {
                p.meowl_id
                    .zip(p.scan_day)
                    .is_some_and(|(meowl_id, day)| (p.user_id, meowl_id, day) == key)
            });
            if taken {
                return Ok(None);
            }
        }
        let row = PointsEntry {
            id: state.next_id(),
            user_id: entry.user_id,
            meowl_id: entry.meowl_id,
            ref_scan_id: entry.ref_scan_id,
            amount: entry.amount,
            reason: entry.reason,
            scan_day: entry.scan_day,
            note: entry.note.clone(),
            created_at: entry.created_at,
        };
        state.points.push(row.clone());
        Ok(Some(row))
    }

    async fn points_totals(&mut self, query: &LeaderboardQuery) -> Result<Vec<LeaderboardRow>, CoreError> {
        let state = self.state()?;
        let mut totals: HashMap<DbId, i64> = HashMap::new();
        for p in &state.points {
            if query.since.is_some_and(|since| p.created_at < since) {
                continue;
            }
            *totals.entry(p.user_id).or_default() += i64::from(p.amount);
        }

        let mut rows: Vec<LeaderboardRow> = state
            .users
            .iter()
            .filter(|u| !(query.exclude_suspended && u.is_suspended))
            .filter_map(|u| {
                totals.get(&u.id).map(|total| LeaderboardRow {
                    user_id: u.id,
                    username: u.username.clone(),
                    total: *total,
                })
            })
            .collect();
        rows.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.username.cmp(&b.username)));
        rows.truncate(usize::try_from(query.limit).unwrap_or(0));
        Ok(rows)
    }

    async fn points_total_for_user(&mut self, user_id: DbId) -> Result<i64, CoreError> {
        Ok(self
            .state()?
            .points
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| i64::from(p.amount))
            .sum())
    }

    // ==================== Comments ====================

    async fn insert_comment(&mut self, comment: &NewComment) -> Result<Comment, CoreError> {
        let state = self.state()?;
        let row = Comment {
            id: state.next_id(),
            meowl_id: comment.meowl_id,
            user_id: comment.user_id,
            text: comment.text.clone(),
            is_hidden: false,
            hidden_at: None,
            hidden_by: None,
            hidden_reason: String::new(),
            created_at: comment.created_at,
        };
        state.comments.push(row.clone());
        Ok(row)
    }

    async fn lock_comment(&mut self, comment_id: DbId) -> Result<Option<Comment>, CoreError> {
        Ok(self.state()?.comments.iter().find(|c| c.id == comment_id).cloned())
    }

    async fn set_comment_hidden(
        &mut self,
        comment_id: DbId,
        hidden: Option<&ModerationStamp>,
    ) -> Result<Comment, CoreError> {
        let comment = self.state()?.comment_mut(comment_id)?;
        comment.is_hidden = hidden.is_some();
        comment.hidden_at = hidden.map(|h| h.at);
        comment.hidden_by = hidden.map(|h| h.by);
        comment.hidden_reason = hidden.map(|h| h.reason.clone()).unwrap_or_default();
        Ok(comment.clone())
    }

    // ==================== Audit and activity ====================

    async fn insert_audit(&mut self, entry: &NewAuditEntry) -> Result<AuditEntry, CoreError> {
        let state = self.state()?;
        let row = AuditEntry {
            id: state.next_id(),
            actor_id: entry.actor_id,
            action: entry.action,
            target_user_id: entry.target_user_id,
            target_meowl_id: entry.target_meowl_id,
            target_comment_id: entry.target_comment_id,
            detail: entry.detail.clone(),
            created_at: entry.created_at,
        };
        state.audit.push(row.clone());
        Ok(row)
    }

    async fn insert_update(&mut self, update: &NewMeowlUpdate) -> Result<MeowlUpdate, CoreError> {
        let state = self.state()?;
        let row = MeowlUpdate {
            id: state.next_id(),
            meowl_id: update.meowl_id,
            actor_id: update.actor_id,
            kind: update.kind,
            message: update.message.clone(),
            created_at: update.created_at,
        };
        state.updates.push(row.clone());
        Ok(row)
    }

    async fn commit(&mut self) -> Result<(), CoreError> {
        let mut guard = self
            .guard
            .take()
            .ok_or_else(|| CoreError::Internal("Transaction already committed".into()))?;
        *guard = std::mem::take(&mut self.working);
        Ok(())
    }
}
