//! Route definitions for the `/meowls` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::meowls;
use crate::state::AppState;

/// Routes mounted at `/meowls`.
///
/// ```text
/// GET  /                         -> list_meowls (public)
/// POST /                         -> create
/// GET  /{slug}?t=&pass=          -> detail (gated)
/// PUT  /{slug}                   -> update (owner/staff)
/// GET  /{slug}/qr-link           -> get_qr_link (owner/staff)
/// POST /{slug}/scan?t=           -> scan (gated)
/// POST /{slug}/location          -> propose
/// POST /{slug}/location/verify   -> verify
/// GET  /{slug}/comments          -> list_comments
/// POST /{slug}/comments          -> post_comment
/// GET  /{slug}/updates           -> list_updates
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(meowls::list_meowls).post(meowls::create))
        .route("/{slug}", get(meowls::detail).put(meowls::update))
        .route("/{slug}/qr-link", get(meowls::get_qr_link))
        .route("/{slug}/scan", post(meowls::scan))
        .route("/{slug}/location", post(meowls::propose))
        .route("/{slug}/location/verify", post(meowls::verify))
        .route(
            "/{slug}/comments",
            get(meowls::list_comments).post(meowls::post_comment),
        )
        .route("/{slug}/updates", get(meowls::list_updates))
}
