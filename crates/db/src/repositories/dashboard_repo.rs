//! Aggregate counters for the staff dashboard.

use meowl_core::types::Timestamp;
use sqlx::PgPool;

use crate::models::dashboard::DashboardStats;

pub struct DashboardRepo;

impl DashboardRepo {
    /// `day_start` is the beginning of the current UTC day.
    pub async fn stats(pool: &PgPool, day_start: Timestamp) -> Result<DashboardStats, sqlx::Error> {
        sqlx::query_as::<_, DashboardStats>(
            "SELECT
                (SELECT COUNT(*) FROM users) AS users,
                (SELECT COUNT(*) FROM users WHERE is_suspended) AS suspended_users,
                (SELECT COUNT(*) FROM meowls WHERE status = 'active') AS meowls_active,
                (SELECT COUNT(*) FROM meowls WHERE status = 'hidden') AS meowls_hidden,
                (SELECT COUNT(*) FROM meowls WHERE status = 'archived') AS meowls_archived,
                (SELECT COUNT(*) FROM location_candidates WHERE status = 'pending') AS pending_locations,
                (SELECT COUNT(*) FROM comments WHERE is_hidden) AS hidden_comments,
                (SELECT COUNT(*) FROM scan_events WHERE created_at >= $1) AS scans_today,
                (SELECT COUNT(*) FROM audit_logs WHERE created_at >= $1) AS audit_entries_today",
        )
        .bind(day_start)
        .fetch_one(pool)
        .await
    }
}
