//! Persistence seam for the core services.
//!
//! Services open a [`StoreTx`] through [`MeowlStore::begin`], do all their
//! reads and writes through it and call [`StoreTx::commit`]. Dropping a
//! transaction without committing discards every write made through it.
//!
//! Implementations must enforce the same uniqueness rules as the Postgres
//! schema: one pending and one current candidate per Meowl, one verification
//! per (candidate, verifier), one scan reward per (user, Meowl, day).

pub mod memory;

use async_trait::async_trait;

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

#[async_trait]
pub trait MeowlStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, CoreError>;
}

/// One unit of work. `lock_*` methods hold the row until commit or drop.
#[async_trait]
pub trait StoreTx: Send {
    // ==================== Users ====================

    async fn lock_user(&mut self, user_id: DbId) -> Result<Option<UserRecord>, CoreError>;

    async fn set_user_role(&mut self, user_id: DbId, role: Role) -> Result<UserRecord, CoreError>;

    /// `None` lifts the suspension.
    async fn set_user_suspension(
        &mut self,
        user_id: DbId,
        suspension: Option<&Suspension>,
    ) -> Result<UserRecord, CoreError>;

    // ==================== Meowls ====================

    async fn find_meowl_by_slug(&mut self, slug: &str) -> Result<Option<Meowl>, CoreError>;

    async fn lock_meowl_by_slug(&mut self, slug: &str) -> Result<Option<Meowl>, CoreError>;

    async fn slug_exists(&mut self, slug: &str) -> Result<bool, CoreError>;

    async fn insert_meowl(&mut self, meowl: &NewMeowl) -> Result<Meowl, CoreError>;

    async fn update_meowl_details(
        &mut self,
        meowl_id: DbId,
        name: &str,
        description: &str,
        now: Timestamp,
    ) -> Result<Meowl, CoreError>;

    async fn set_meowl_status(
        &mut self,
        meowl_id: DbId,
        status: MeowlStatus,
        now: Timestamp,
    ) -> Result<(), CoreError>;

    /// `Some` archives with the given stamp, `None` clears the archive fields.
    async fn set_meowl_archive(
        &mut self,
        meowl_id: DbId,
        archive: Option<&ModerationStamp>,
        status: MeowlStatus,
        now: Timestamp,
    ) -> Result<Meowl, CoreError>;

    // ==================== Location candidates ====================

    async fn find_current_candidate(
        &mut self,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidate>, CoreError>;

    async fn find_pending_candidate(
        &mut self,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidate>, CoreError>;

    async fn lock_pending_candidate(
        &mut self,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidate>, CoreError>;

    async fn insert_candidate(
        &mut self,
        candidate: &NewLocationCandidate,
    ) -> Result<LocationCandidate, CoreError>;

    /// Move every candidate of the Meowl in `from` to hidden. Returns the
    /// number of rows changed.
    async fn hide_candidates(&mut self, meowl_id: DbId, from: LocationStatus) -> Result<u64, CoreError>;

    async fn update_candidate(
        &mut self,
        candidate_id: DbId,
        status: LocationStatus,
        verification_count: i32,
        verified_at: Option<Timestamp>,
    ) -> Result<LocationCandidate, CoreError>;

    /// Returns `false` if this verifier was already recorded.
    async fn insert_verification(
        &mut self,
        candidate_id: DbId,
        verifier_id: DbId,
        now: Timestamp,
    ) -> Result<bool, CoreError>;

    async fn count_verifiers(&mut self, candidate_id: DbId) -> Result<i64, CoreError>;

    // ==================== Scans ====================

    async fn insert_scan(&mut self, scan: &NewScan) -> Result<ScanEvent, CoreError>;

    /// Whether the user has another scan of the Meowl in `[from, to)`.
    async fn has_scan_between(
        &mut self,
        user_id: DbId,
        meowl_id: DbId,
        from: Timestamp,
        to: Timestamp,
        exclude_scan_id: DbId,
    ) -> Result<bool, CoreError>;

    // ==================== Points ledger ====================

    /// Returns `None` when a scan reward for the same (user, Meowl, day)
    /// already exists.
    async fn insert_points(&mut self, entry: &NewPointsEntry) -> Result<Option<PointsEntry>, CoreError>;

    async fn points_totals(&mut self, query: &LeaderboardQuery) -> Result<Vec<LeaderboardRow>, CoreError>;

    async fn points_total_for_user(&mut self, user_id: DbId) -> Result<i64, CoreError>;

    // ==================== Comments ====================

    async fn insert_comment(&mut self, comment: &NewComment) -> Result<Comment, CoreError>;

    async fn lock_comment(&mut self, comment_id: DbId) -> Result<Option<Comment>, CoreError>;

    /// `None` makes the comment visible again.
    async fn set_comment_hidden(
        &mut self,
        comment_id: DbId,
        hidden: Option<&ModerationStamp>,
    ) -> Result<Comment, CoreError>;

    // ==================== Audit and activity ====================

    async fn insert_audit(&mut self, entry: &NewAuditEntry) -> Result<AuditEntry, CoreError>;

    async fn insert_update(&mut self, update: &NewMeowlUpdate) -> Result<MeowlUpdate, CoreError>;

    /// Make every write visible. Calling it twice is an error.
    async fn commit(&mut self) -> Result<(), CoreError>;
}
