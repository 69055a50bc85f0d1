use serde::Serialize;
use sqlx::FromRow;

/// Counters shown on the staff dashboard.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct DashboardStats {
    pub users: i64,
    pub suspended_users: i64,
    pub meowls_active: i64,
    pub meowls_hidden: i64,
    pub meowls_archived: i64,
    pub pending_locations: i64,
    pub hidden_comments: i64,
    pub scans_today: i64,
    pub audit_entries_today: i64,
}
