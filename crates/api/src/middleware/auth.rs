//! JWT-based authentication extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use meowl_core::context::Actor;
use meowl_core::roles::Role;
use meowl_core::types::DbId;
use meowl_db::repositories::UserRepo;

use crate::auth::jwt::validate_token;
use crate::error::AppError;
use crate::state::AppState;

/// Authenticated caller.
///
/// The token only proves identity. Role and suspension are read from the
/// database on every request so moderation takes effect immediately.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub username: String,
    pub role: Role,
    pub is_suspended: bool,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            username: self.username.clone(),
            role: self.role,
            is_suspended: self.is_suspended,
        }
    }
}

fn bearer_token(parts: &Parts) -> Option<Result<&str, AppError>> {
    let header = parts.headers.get("authorization")?;
    Some(
        header
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(|| {
                AppError::unauthorized("Invalid Authorization format. Expected: Bearer <token>")
            }),
    )
}

async fn load_user(token: &str, state: &AppState) -> Result<AuthUser, AppError> {
    let claims = validate_token(token, &state.config.jwt)
        .map_err(|_| AppError::unauthorized("Invalid or expired token"))?;

    let user = UserRepo::find_by_id(&state.pool, claims.sub)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::unauthorized("Account is not available"))?
        .to_record()?;

    Ok(AuthUser {
        user_id: user.id,
        username: user.username,
        role: user.role,
        is_suspended: user.is_suspended,
    })
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .unwrap_or_else(|| Err(AppError::unauthorized("Missing Authorization header")))?;
        load_user(token, state).await
    }
}

/// Like [`AuthUser`], but a request without an `Authorization` header is
/// anonymous rather than rejected. A present but invalid token is still 401.
#[derive(Debug, Clone)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts) {
            None => Ok(OptionalAuthUser(None)),
            Some(token) => Ok(OptionalAuthUser(Some(load_user(token?, state).await?))),
        }
    }
}
