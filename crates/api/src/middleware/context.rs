//! Builds the per-request [`RequestContext`] handed to core operations.

use axum::extract::{FromRequestParts, Query};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use meowl_core::context::{ClientInfo, RequestContext};
use meowl_core::hashing::hash_client_value;
use serde::Deserialize;

use super::auth::OptionalAuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// Header carrying an access pass issued by an earlier QR check.
pub const ACCESS_PASS_HEADER: &str = "x-meowl-pass";

#[derive(Debug, Default, Deserialize)]
struct GateParams {
    /// QR token.
    t: Option<String>,
    pass: Option<String>,
}

/// The caller (if any), gate credentials and hashed client fingerprint.
pub struct Ctx(pub RequestContext);

fn client_ip(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .unwrap_or_default()
}

/// Salted hashes of the caller's address and user agent; raw values are
/// never stored.
pub fn client_info(headers: &HeaderMap, secret: &str) -> ClientInfo {
    let user_agent = headers
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    ClientInfo {
        ip_hash: hash_client_value(secret, client_ip(headers)),
        user_agent_hash: hash_client_value(secret, user_agent),
    }
}

impl FromRequestParts<AppState> for Ctx {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let OptionalAuthUser(user) = OptionalAuthUser::from_request_parts(parts, state).await?;

        let params = Query::<GateParams>::try_from_uri(&parts.uri)
            .map(|Query(p)| p)
            .unwrap_or_default();
        let header_pass = parts
            .headers
            .get(ACCESS_PASS_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut ctx = match user {
            Some(user) => RequestContext::for_actor(user.actor()),
            None => RequestContext::anonymous(),
        }
        .with_client(client_info(&parts.headers, &state.config.signing_secret));

        if let Some(token) = params.t.filter(|t| !t.is_empty()) {
            ctx = ctx.with_qr_token(token);
        }
        if let Some(pass) = header_pass.or(params.pass).filter(|p| !p.is_empty()) {
            ctx = ctx.with_access_pass(pass);
        }

        Ok(Ctx(ctx))
    }
}
