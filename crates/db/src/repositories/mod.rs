//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods.
//! Methods used inside store transactions accept any `PgExecutor` (a pool or
//! `&mut PgConnection` from an open transaction); listing and dashboard
//! queries take `&PgPool`.

pub mod audit_repo;
pub mod comment_repo;
pub mod dashboard_repo;
pub mod location_repo;
pub mod meowl_repo;
pub mod points_repo;
pub mod scan_repo;
pub mod session_repo;
pub mod update_repo;
pub mod user_repo;

pub use audit_repo::AuditLogRepo;
pub use comment_repo::CommentRepo;
pub use dashboard_repo::DashboardRepo;
pub use location_repo::LocationRepo;
pub use meowl_repo::MeowlRepo;
pub use points_repo::PointsRepo;
pub use scan_repo::ScanRepo;
pub use session_repo::SessionRepo;
pub use update_repo::MeowlUpdateRepo;
pub use user_repo::UserRepo;
