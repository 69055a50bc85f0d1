//! Request-scoped context handed explicitly to core operations.
//!
//! The HTTP layer builds one [`RequestContext`] per request from the bearer
//! token, client headers and gate credentials. Core code never reaches for
//! ambient request or session state.

use crate::error::CoreError;
use crate::guards::DenyReason;
use crate::roles::Role;
use crate::types::DbId;
use crate::users::UserRecord;

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Actor {
    pub user_id: DbId,
    pub username: String,
    pub role: Role,
    pub is_suspended: bool,
}

impl Actor {
    pub fn is_staff(&self) -> bool {
        self.role.is_staff()
    }
}

impl From<&UserRecord> for Actor {
    fn from(user: &UserRecord) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
            role: user.role,
            is_suspended: user.is_suspended,
        }
    }
}

/// Hashed client fingerprint recorded with scans.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientInfo {
    pub ip_hash: String,
    pub user_agent_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub actor: Option<Actor>,
    pub client: ClientInfo,
    /// QR token from the `t` query parameter.
    pub qr_token: Option<String>,
    /// Access pass issued by an earlier successful QR check.
    pub access_pass: Option<String>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_actor(actor: Actor) -> Self {
        Self {
            actor: Some(actor),
            ..Self::default()
        }
    }

    pub fn with_qr_token(mut self, token: impl Into<String>) -> Self {
        self.qr_token = Some(token.into());
        self
    }

    pub fn with_access_pass(mut self, pass: impl Into<String>) -> Self {
        self.access_pass = Some(pass.into());
        self
    }

    pub fn with_client(mut self, client: ClientInfo) -> Self {
        self.client = client;
        self
    }

    /// The caller, or an `Unauthorized` error for anonymous requests.
    pub fn actor(&self) -> Result<&Actor, CoreError> {
        self.actor.as_ref().ok_or_else(|| {
            CoreError::Unauthorized(DenyReason::NotAuthenticated.message().into())
        })
    }
}
