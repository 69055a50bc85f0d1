//! Tunable rules shared by the core services.

/// Points granted per scan reward (one per user, Meowl and calendar day).
pub const DEFAULT_POINTS_SCAN: i32 = 5;
/// Points granted to each verifier of a pending location.
pub const DEFAULT_POINTS_VERIFY: i32 = 10;
/// Points granted to the creator of a new Meowl.
pub const DEFAULT_POINTS_CREATE: i32 = 20;
/// Distinct verifiers needed to promote a pending location.
pub const DEFAULT_VERIFICATION_QUORUM: i64 = 2;
/// Rows returned by the leaderboard.
pub const LEADERBOARD_LIMIT: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsPolicy {
    pub scan: i32,
    pub verify: i32,
    /// Zero disables the creation reward.
    pub create: i32,
}

impl Default for PointsPolicy {
    fn default() -> Self {
        Self {
            scan: DEFAULT_POINTS_SCAN,
            verify: DEFAULT_POINTS_VERIFY,
            create: DEFAULT_POINTS_CREATE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    pub points: PointsPolicy,
    pub verification_quorum: i64,
    /// Hide suspended users from leaderboard aggregation.
    pub leaderboard_exclude_suspended: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            points: PointsPolicy::default(),
            verification_quorum: DEFAULT_VERIFICATION_QUORUM,
            leaderboard_exclude_suspended: true,
        }
    }
}
