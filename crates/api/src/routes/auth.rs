//! Route definitions for the `/auth` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::auth;
use crate::state::AppState;

/// Routes mounted at `/auth`.
///
/// ```text
/// POST /signup                         -> signup
/// POST /login                          -> login
/// POST /refresh                        -> refresh
/// POST /logout                         -> logout (requires auth)
/// POST /resend-verification            -> resend_verification (requires auth)
/// GET  /verify-email/{user_id}/{token} -> verify_email
/// GET  /me                             -> me (requires auth)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/logout", post(auth::logout))
        .route("/resend-verification", post(auth::resend_verification))
        .route("/verify-email/{user_id}/{token}", get(auth::verify_email))
        .route("/me", get(auth::me))
}
