//! Handlers for the `/auth` resource: signup, login, token refresh, logout,
//! email verification and the caller's profile.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{Duration, Utc};
use meowl_core::email_link::{issue_email_token, verification_link, verify_email_token};
use meowl_core::error::CoreError;
use meowl_core::points::points_total;
use meowl_core::roles::Role;
use meowl_core::types::DbId;
use meowl_core::users::{validate_email, validate_username};
use meowl_db::models::session::NewSession;
use meowl_db::models::user::{CreateUser, User, UserResponse};
use meowl_db::repositories::{SessionRepo, UserRepo};
use serde::{Deserialize, Serialize};

use crate::auth::jwt::{generate_access_token, hash_refresh_token, RefreshToken};
use crate::auth::password::{check_password, hash_password, verify_password};
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::middleware::context::client_info;
use crate::response::DataResponse;
use crate::state::AppState;

/// Consecutive failed logins before the account is locked.
const MAX_FAILED_ATTEMPTS: i32 = 5;

const LOCK_DURATION_MINS: i64 = 15;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    /// Username or email.
    pub login: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
    pub user: UserResponse,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
    pub points: i64,
}

#[derive(Debug, Serialize)]
pub struct EmailVerified {
    pub email_verified: bool,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/auth/signup
///
/// Create a member account, send the verification link and log the new user
/// in.
pub async fn signup(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<SignupRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<AuthResponse>>)> {
    let username = input.username.trim();
    let email = input.email.trim().to_lowercase();
    validate_username(username).map_err(CoreError::Validation)?;
    validate_email(&email).map_err(CoreError::Validation)?;
    check_password(&input.password, username, state.config.password_min_length)
        .map_err(CoreError::Validation)?;

    let password_hash = hash_password(&input.password)
        .map_err(|e| AppError::InternalError(format!("Password hashing error: {e}")))?;

    let user = UserRepo::create(
        &state.pool,
        &CreateUser {
            username: username.to_string(),
            email,
            password_hash,
            role: Role::Member,
        },
    )
    .await?;
    tracing::info!(user_id = user.id, username = %user.username, "Account created");

    send_verification_email(&state, &user).await;

    let response = create_auth_response(&state, &user, &headers).await?;
    Ok((StatusCode::CREATED, Json(DataResponse::new(response))))
}

/// POST /api/v1/auth/login
///
/// Username or email plus password. Five consecutive failures lock the
/// account for fifteen minutes.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(input): Json<LoginRequest>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    let user = UserRepo::find_by_login(&state.pool, input.login.trim())
        .await?
        .ok_or_else(|| AppError::unauthorized(INVALID_CREDENTIALS))?;

    if !user.is_active {
        return Err(AppError::forbidden("Account is deactivated"));
    }

    let now = Utc::now();
    if user.locked_until.is_some_and(|until| until > now) {
        return Err(AppError::forbidden(
            "Account is temporarily locked. Try again later.",
        ));
    }

    let password_valid = verify_password(&input.password, &user.password_hash)
        .map_err(|e| AppError::InternalError(format!("Password verification error: {e}")))?;

    if !password_valid {
        UserRepo::increment_failed_login(&state.pool, user.id).await?;
        if user.failed_login_count + 1 >= MAX_FAILED_ATTEMPTS {
            UserRepo::lock_account(&state.pool, user.id, now + Duration::minutes(LOCK_DURATION_MINS))
                .await?;
            tracing::warn!(user_id = user.id, "Account locked after repeated failed logins");
        }
        return Err(AppError::unauthorized(INVALID_CREDENTIALS));
    }

    UserRepo::record_successful_login(&state.pool, user.id).await?;

    let response = create_auth_response(&state, &user, &headers).await?;
    Ok(Json(DataResponse::new(response)))
}

/// POST /api/v1/auth/refresh
///
/// Exchange a refresh token for a new pair. The old token stops working.
/// Presenting an already rotated token revokes every session of the user.
pub async fn refresh(
    State(state): State<AppState>,
    Json(input): Json<RefreshRequest>,
) -> AppResult<Json<DataResponse<AuthResponse>>> {
    let invalid = || AppError::unauthorized("Invalid or expired refresh token");
    let now = Utc::now();

    let session =
        SessionRepo::find_by_token_hash(&state.pool, &hash_refresh_token(&input.refresh_token))
            .await?
            .ok_or_else(invalid)?;

    if session.is_revoked {
        let revoked = SessionRepo::revoke_all_for_user(&state.pool, session.user_id).await?;
        if revoked > 0 {
            tracing::warn!(
                user_id = session.user_id,
                session_id = session.id,
                revoked,
                "Refresh token reuse, all sessions revoked"
            );
        }
        return Err(invalid());
    }
    if session.is_expired(now) {
        return Err(invalid());
    }

    let user = UserRepo::find_by_id(&state.pool, session.user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| AppError::unauthorized("Account is not available"))?;

    let next = RefreshToken::generate();
    let expires_at = state.config.jwt.refresh_expires_at(now);
    SessionRepo::rotate(&state.pool, &session, &next.hash, expires_at)
        .await?
        .ok_or_else(invalid)?;

    let response = AuthResponse {
        access_token: access_token(&state, &user)?,
        refresh_token: next.plaintext,
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
        user: UserResponse::from(&user),
    };
    Ok(Json(DataResponse::new(response)))
}

/// POST /api/v1/auth/logout
///
/// Revoke every session of the caller.
pub async fn logout(State(state): State<AppState>, auth_user: AuthUser) -> AppResult<StatusCode> {
    let revoked = SessionRepo::revoke_all_for_user(&state.pool, auth_user.user_id).await?;
    tracing::debug!(user_id = auth_user.user_id, revoked, "Logged out");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/verify-email/{user_id}/{token}
pub async fn verify_email(
    State(state): State<AppState>,
    Path((user_id, token)): Path<(DbId, String)>,
) -> AppResult<Json<DataResponse<EmailVerified>>> {
    let invalid = || CoreError::Validation("Verification link is invalid or expired".into());

    let user = UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(invalid)?;

    if user.email_verified_at.is_none() {
        let now = Utc::now();
        if !verify_email_token(
            &state.gate,
            &token,
            user.id,
            &user.email,
            state.config.email_token_hours,
            now,
        ) {
            return Err(invalid().into());
        }
        UserRepo::mark_email_verified(&state.pool, user.id, now).await?;
        tracing::info!(user_id = user.id, "Email verified");
    }

    Ok(Json(DataResponse::new(EmailVerified {
        email_verified: true,
    })))
}

/// POST /api/v1/auth/resend-verification
pub async fn resend_verification(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<StatusCode> {
    let user = find_user(&state, auth_user.user_id).await?;
    if user.email_verified_at.is_some() {
        return Err(CoreError::Conflict("Email address is already verified".into()).into());
    }
    send_verification_email(&state, &user).await;
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/auth/me
pub async fn me(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> AppResult<Json<DataResponse<MeResponse>>> {
    let user = find_user(&state, auth_user.user_id).await?;
    let points = points_total(&state.store, user.id).await?;
    Ok(Json(DataResponse::new(MeResponse {
        user: UserResponse::from(&user),
        points,
    })))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_user(state: &AppState, user_id: DbId) -> AppResult<User> {
    UserRepo::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| CoreError::not_found("User", user_id).into())
}

fn access_token(state: &AppState, user: &User) -> AppResult<String> {
    let record = user.to_record()?;
    generate_access_token(record.id, record.role, &state.config.jwt, Utc::now())
        .map_err(|e| AppError::InternalError(format!("Token generation error: {e}")))
}

/// Issue tokens and persist a new session row.
async fn create_auth_response(
    state: &AppState,
    user: &User,
    headers: &HeaderMap,
) -> AppResult<AuthResponse> {
    let access_token = access_token(state, user)?;
    let refresh = RefreshToken::generate();

    SessionRepo::open(
        &state.pool,
        &NewSession {
            user_id: user.id,
            refresh_token_hash: refresh.hash,
            expires_at: state.config.jwt.refresh_expires_at(Utc::now()),
            user_agent_hash: client_info(headers, &state.config.signing_secret).user_agent_hash,
        },
    )
    .await?;

    Ok(AuthResponse {
        access_token,
        refresh_token: refresh.plaintext,
        expires_in: state.config.jwt.access_token_expiry_mins * 60,
        user: UserResponse::from(user),
    })
}

/// Mail failures are logged, never surfaced: the account already exists and
/// the user can ask for another link.
async fn send_verification_email(state: &AppState, user: &User) {
    let token = issue_email_token(&state.gate, user.id, &user.email, Utc::now());
    let link = verification_link(&state.config.site_url, user.id, &token);
    if let Err(e) = state
        .mailer
        .send_verification(&user.email, &user.username, &link)
        .await
    {
        tracing::error!(user_id = user.id, error = %e, "Failed to send verification email");
    }
}
