//! PostgreSQL implementation of the core store traits.

use async_trait::async_trait;
use meowl_core::activity::{MeowlUpdate, NewMeowlUpdate};
use meowl_core::audit::{AuditEntry, NewAuditEntry};
use meowl_core::comment::{Comment, NewComment};
use meowl_core::error::CoreError;
use meowl_core::location::{LocationCandidate, LocationStatus, NewLocationCandidate};
use meowl_core::meowl::{Meowl, MeowlStatus, NewMeowl};
use meowl_core::moderation::ModerationStamp;
use meowl_core::points::{LeaderboardQuery, LeaderboardRow, NewPointsEntry, PointsEntry};
use meowl_core::roles::Role;
use meowl_core::scan::{NewScan, ScanEvent};
use meowl_core::store::{MeowlStore, StoreTx};
use meowl_core::types::{DbId, Timestamp};
use meowl_core::users::{Suspension, UserRecord};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::repositories::{
    AuditLogRepo, CommentRepo, LocationRepo, MeowlRepo, MeowlUpdateRepo, PointsRepo, ScanRepo,
    UserRepo,
};

/// Map a database error into the core error space. Unique violations on
/// `uq_` constraints become conflicts; everything else is internal.
pub fn map_db_error(err: sqlx::Error) -> CoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            if let Some(constraint) = db_err.constraint() {
                if constraint.starts_with("uq_") {
                    return CoreError::Conflict(format!("Duplicate value violates {constraint}"));
                }
            }
        }
    }
    tracing::error!(error = %err, "Database error");
    CoreError::Internal(format!("Database error: {err}"))
}

fn missing(entity: &'static str, id: DbId) -> CoreError {
    CoreError::not_found(entity, id)
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl MeowlStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, CoreError> {
        let tx = self.pool.begin().await.map_err(map_db_error)?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }
}

/// Open transaction. Dropped without [`StoreTx::commit`] it rolls back.
pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> Result<&mut PgConnection, CoreError> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| CoreError::Internal("Transaction already committed".into()))
    }
}

#[async_trait]
impl StoreTx for PgTx {
    // ==================== Users ====================

    async fn lock_user(&mut self, user_id: DbId) -> Result<Option<UserRecord>, CoreError> {
        UserRepo::lock_by_id(self.conn()?, user_id)
            .await
            .map_err(map_db_error)?
            .map(|u| u.to_record())
            .transpose()
    }

    async fn set_user_role(&mut self, user_id: DbId, role: Role) -> Result<UserRecord, CoreError> {
        UserRepo::set_role(self.conn()?, user_id, role)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| missing("User", user_id))?
            .to_record()
    }

    async fn set_user_suspension(
        &mut self,
        user_id: DbId,
        suspension: Option<&Suspension>,
    ) -> Result<UserRecord, CoreError> {
        let fields = suspension.map(|s| (s.reason.as_str(), s.at));
        UserRepo::set_suspension(self.conn()?, user_id, fields)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| missing("User", user_id))?
            .to_record()
    }

    // ==================== Meowls ====================

    async fn find_meowl_by_slug(&mut self, slug: &str) -> Result<Option<Meowl>, CoreError> {
        MeowlRepo::find_by_slug(self.conn()?, slug)
            .await
            .map_err(map_db_error)?
            .map(Meowl::try_from)
            .transpose()
    }

    async fn lock_meowl_by_slug(&mut self, slug: &str) -> Result<Option<Meowl>, CoreError> {
        MeowlRepo::lock_by_slug(self.conn()?, slug)
            .await
            .map_err(map_db_error)?
            .map(Meowl::try_from)
            .transpose()
    }

    async fn slug_exists(&mut self, slug: &str) -> Result<bool, CoreError> {
        MeowlRepo::slug_exists(self.conn()?, slug)
            .await
            .map_err(map_db_error)
    }

    async fn insert_meowl(&mut self, meowl: &NewMeowl) -> Result<Meowl, CoreError> {
        MeowlRepo::create(self.conn()?, meowl)
            .await
            .map_err(map_db_error)?
            .try_into()
    }

    async fn update_meowl_details(
        &mut self,
        meowl_id: DbId,
        name: &str,
        description: &str,
        now: Timestamp,
    ) -> Result<Meowl, CoreError> {
        MeowlRepo::update_details(self.conn()?, meowl_id, name, description, now)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| missing("Meowl", meowl_id))?
            .try_into()
    }

    async fn set_meowl_status(
        &mut self,
        meowl_id: DbId,
        status: MeowlStatus,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let updated = MeowlRepo::set_status(self.conn()?, meowl_id, status, now)
            .await
            .map_err(map_db_error)?;
        if updated {
            Ok(())
        } else {
            Err(missing("Meowl", meowl_id))
        }
    }

    async fn set_meowl_archive(
        &mut self,
        meowl_id: DbId,
        archive: Option<&ModerationStamp>,
        status: MeowlStatus,
        now: Timestamp,
    ) -> Result<Meowl, CoreError> {
        MeowlRepo::set_archive(self.conn()?, meowl_id, archive, status, now)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| missing("Meowl", meowl_id))?
            .try_into()
    }

    // ==================== Location candidates ====================

    async fn find_current_candidate(
        &mut self,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidate>, CoreError> {
        LocationRepo::find_by_status(self.conn()?, meowl_id, LocationStatus::Current)
            .await
            .map_err(map_db_error)?
            .map(LocationCandidate::try_from)
            .transpose()
    }

    async fn find_pending_candidate(
        &mut self,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidate>, CoreError> {
        LocationRepo::find_by_status(self.conn()?, meowl_id, LocationStatus::Pending)
            .await
            .map_err(map_db_error)?
            .map(LocationCandidate::try_from)
            .transpose()
    }

    async fn lock_pending_candidate(
        &mut self,
        meowl_id: DbId,
    ) -> Result<Option<LocationCandidate>, CoreError> {
        LocationRepo::lock_pending(self.conn()?, meowl_id)
            .await
            .map_err(map_db_error)?
            .map(LocationCandidate::try_from)
            .transpose()
    }

    async fn insert_candidate(
        &mut self,
        candidate: &NewLocationCandidate,
    ) -> Result<LocationCandidate, CoreError> {
        LocationRepo::create(self.conn()?, candidate)
            .await
            .map_err(map_db_error)?
            .try_into()
    }

    async fn hide_candidates(&mut self, meowl_id: DbId, from: LocationStatus) -> Result<u64, CoreError> {
        LocationRepo::hide_all(self.conn()?, meowl_id, from)
            .await
            .map_err(map_db_error)
    }

    async fn update_candidate(
        &mut self,
        candidate_id: DbId,
        status: LocationStatus,
        verification_count: i32,
        verified_at: Option<Timestamp>,
    ) -> Result<LocationCandidate, CoreError> {
        LocationRepo::update_state(self.conn()?, candidate_id, status, verification_count, verified_at)
            .await
            .map_err(map_db_error)?
            .ok_or_else(|| missing("LocationCandidate", candidate_id))?
            .try_into()
    }

    async fn insert_verification(
        &mut self,
        candidate_id: DbId,
        verifier_id: DbId,
        now: Timestamp,
    ) -> Result<bool, CoreError> {
        LocationRepo::add_verification(self.conn()?, candidate_id, verifier_id, now)
            .await
            .map_err(map_db_error)
    }

    async fn count_verifiers(&mut self, candidate_id: DbId) -> Result<i64, CoreError> {
        LocationRepo::count_verifiers(self.conn()?, candidate_id)
            .await
            .map_err(map_db_error)
    }

    // ==================== Scans ====================

    async fn insert_scan(&mut self, scan: &NewScan) -> Result<ScanEvent, CoreError> {
        ScanRepo::create(self.conn()?, scan)
            .await
            .map(ScanEvent::from)
            .map_err(map_db_error)
    }

    async fn has_scan_between(
        &mut self,
        user_id: DbId,
        meowl_id: DbId,
        from: Timestamp,
        to: Timestamp,
        exclude_scan_id: DbId,
    ) -> Result<bool, CoreError> {
        ScanRepo::exists_between(self.conn()?, user_id, meowl_id, from, to, exclude_scan_id)
            .await
            .map_err(map_db_error)
    }

    // ==================== Points ledger ====================

    async fn insert_points(&mut self, entry: &NewPointsEntry) -> Result<Option<PointsEntry>, CoreError> {
        PointsRepo::append(self.conn()?, entry)
            .await
            .map_err(map_db_error)?
            .map(PointsEntry::try_from)
            .transpose()
    }

    async fn points_totals(&mut self, query: &LeaderboardQuery) -> Result<Vec<LeaderboardRow>, CoreError> {
        let rows = PointsRepo::totals(self.conn()?, query)
            .await
            .map_err(map_db_error)?;
        Ok(rows.into_iter().map(LeaderboardRow::from).collect())
    }

    async fn points_total_for_user(&mut self, user_id: DbId) -> Result<i64, CoreError> {
        PointsRepo::total_for_user(self.conn()?, user_id)
            .await
            .map_err(map_db_error)
    }

    // ==================== Comments ====================

    async fn insert_comment(&mut self, comment: &NewComment) -> Result<Comment, CoreError> {
        CommentRepo::create(self.conn()?, comment)
            .await
            .map(Comment::from)
            .map_err(map_db_error)
    }

    async fn lock_comment(&mut self, comment_id: DbId) -> Result<Option<Comment>, CoreError> {
        Ok(CommentRepo::lock_by_id(self.conn()?, comment_id)
            .await
            .map_err(map_db_error)?
            .map(Comment::from))
    }

    async fn set_comment_hidden(
        &mut self,
        comment_id: DbId,
        hidden: Option<&ModerationStamp>,
    ) -> Result<Comment, CoreError> {
        CommentRepo::set_hidden(self.conn()?, comment_id, hidden)
            .await
            .map_err(map_db_error)?
            .map(Comment::from)
            .ok_or_else(|| missing("Comment", comment_id))
    }

    // ==================== Audit and activity ====================

    async fn insert_audit(&mut self, entry: &NewAuditEntry) -> Result<AuditEntry, CoreError> {
        AuditLogRepo::insert(self.conn()?, entry)
            .await
            .map_err(map_db_error)?
            .try_into()
    }

    async fn insert_update(&mut self, update: &NewMeowlUpdate) -> Result<MeowlUpdate, CoreError> {
        MeowlUpdateRepo::insert(self.conn()?, update)
            .await
            .map_err(map_db_error)?
            .try_into()
    }

    async fn commit(&mut self) -> Result<(), CoreError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| CoreError::Internal("Transaction already committed".into()))?;
        tx.commit().await.map_err(map_db_error)
    }
}
