//! Authorization guards.
//!
//! Each guard is a plain function returning a [`Decision`]. Handlers compose
//! them before calling into core logic; the deny reason carries a stable code
//! for logs and a user-facing message that never explains token failures.

use crate::context::Actor;
use crate::error::CoreError;
use crate::roles::Role;
use crate::types::DbId;
use crate::users::UserRecord;

/// Message used for every token-gate refusal (tampered, expired, wrong Meowl).
pub const GATE_DENIED_MESSAGE: &str = "Access requires a valid QR code";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NotAuthenticated,
    Suspended,
    NotStaff,
    NotOwner,
    SelfVerification,
    SelfModeration,
    TargetOutranksActor,
    GateClosed,
}

impl DenyReason {
    pub fn code(self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "not_authenticated",
            DenyReason::Suspended => "suspended",
            DenyReason::NotStaff => "not_staff",
            DenyReason::NotOwner => "not_owner",
            DenyReason::SelfVerification => "self_verification",
            DenyReason::SelfModeration => "self_moderation",
            DenyReason::TargetOutranksActor => "target_outranks_actor",
            DenyReason::GateClosed => "gate_closed",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            DenyReason::NotAuthenticated => "Authentication required",
            DenyReason::Suspended => "Account is suspended",
            DenyReason::NotStaff => "Staff role required",
            DenyReason::NotOwner => "Only the owner or staff may do this",
            DenyReason::SelfVerification => "You cannot verify a location you proposed",
            DenyReason::SelfModeration => "You cannot moderate your own account",
            DenyReason::TargetOutranksActor => "Only admins may moderate admins",
            DenyReason::GateClosed => GATE_DENIED_MESSAGE,
        }
    }

    fn into_error(self) -> CoreError {
        match self {
            DenyReason::NotAuthenticated | DenyReason::GateClosed => {
                CoreError::Unauthorized(self.message().into())
            }
            _ => CoreError::Forbidden(self.message().into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }

    /// Evaluate `next` only if this decision allows.
    pub fn and_then(self, next: impl FnOnce() -> Decision) -> Decision {
        match self {
            Decision::Allow => next(),
            deny => deny,
        }
    }

    pub fn into_result(self) -> Result<(), CoreError> {
        match self {
            Decision::Allow => Ok(()),
            Decision::Deny(reason) => {
                tracing::debug!(reason = reason.code(), "Guard denied request");
                Err(reason.into_error())
            }
        }
    }
}

pub fn require_authenticated(actor: Option<&Actor>) -> Decision {
    match actor {
        Some(_) => Decision::Allow,
        None => Decision::Deny(DenyReason::NotAuthenticated),
    }
}

/// Suspended users keep read access but may not mutate anything.
pub fn require_active(actor: &Actor) -> Decision {
    if actor.is_suspended {
        Decision::Deny(DenyReason::Suspended)
    } else {
        Decision::Allow
    }
}

pub fn require_staff(actor: &Actor) -> Decision {
    require_active(actor).and_then(|| {
        if actor.is_staff() {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotStaff)
        }
    })
}

pub fn require_owner_or_staff(actor: &Actor, owner_id: DbId) -> Decision {
    require_active(actor).and_then(|| {
        if actor.user_id == owner_id || actor.is_staff() {
            Decision::Allow
        } else {
            Decision::Deny(DenyReason::NotOwner)
        }
    })
}

pub fn forbid_self_verification(actor: &Actor, proposer_id: DbId) -> Decision {
    if actor.user_id == proposer_id {
        Decision::Deny(DenyReason::SelfVerification)
    } else {
        Decision::Allow
    }
}

/// Staff may moderate other users, but never themselves, and only admins may
/// moderate admins.
pub fn can_moderate_user(actor: &Actor, target: &UserRecord) -> Decision {
    require_staff(actor).and_then(|| {
        if actor.user_id == target.id {
            Decision::Deny(DenyReason::SelfModeration)
        } else if target.role == Role::Admin && actor.role != Role::Admin {
            Decision::Deny(DenyReason::TargetOutranksActor)
        } else {
            Decision::Allow
        }
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;

    use super::*;

    fn actor(id: DbId, role: Role) -> Actor {
        Actor {
            user_id: id,
            username: format!("user{id}"),
            role,
            is_suspended: false,
        }
    }

    fn user(id: DbId, role: Role) -> UserRecord {
        UserRecord {
            id,
            username: format!("user{id}"),
            email: format!("user{id}@example.com"),
            role,
            is_active: true,
            is_suspended: false,
            suspend_reason: String::new(),
            suspended_at: None,
            email_verified_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn staff_guard_checks_role_and_suspension() {
        assert!(require_staff(&actor(1, Role::Staff)).is_allowed());
        assert!(require_staff(&actor(1, Role::Admin)).is_allowed());
        assert_eq!(
            require_staff(&actor(1, Role::Member)),
            Decision::Deny(DenyReason::NotStaff)
        );

        let mut suspended = actor(1, Role::Staff);
        suspended.is_suspended = true;
        assert_eq!(
            require_staff(&suspended),
            Decision::Deny(DenyReason::Suspended)
        );
    }

    #[test]
    fn owner_or_staff() {
        assert!(require_owner_or_staff(&actor(5, Role::Member), 5).is_allowed());
        assert!(require_owner_or_staff(&actor(6, Role::Staff), 5).is_allowed());
        assert_eq!(
            require_owner_or_staff(&actor(6, Role::Member), 5),
            Decision::Deny(DenyReason::NotOwner)
        );
    }

    #[test]
    fn moderation_rules() {
        let staff = actor(1, Role::Staff);
        assert!(can_moderate_user(&staff, &user(2, Role::Member)).is_allowed());
        assert_eq!(
            can_moderate_user(&staff, &user(1, Role::Staff)),
            Decision::Deny(DenyReason::SelfModeration)
        );
        assert_eq!(
            can_moderate_user(&staff, &user(3, Role::Admin)),
            Decision::Deny(DenyReason::TargetOutranksActor)
        );
        assert!(can_moderate_user(&actor(9, Role::Admin), &user(3, Role::Admin)).is_allowed());
    }

    #[test]
    fn gate_denial_maps_to_uniform_unauthorized() {
        let err = Decision::Deny(DenyReason::GateClosed).into_result().unwrap_err();
        assert_matches!(err, CoreError::Unauthorized(msg) if msg == GATE_DENIED_MESSAGE);
    }

    #[test]
    fn self_verification_is_forbidden() {
        let err = forbid_self_verification(&actor(4, Role::Member), 4)
            .into_result()
            .unwrap_err();
        assert_matches!(err, CoreError::Forbidden(_));
    }
}
