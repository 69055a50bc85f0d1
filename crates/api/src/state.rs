use std::sync::Arc;

use meowl_core::token_gate::TokenGate;
use meowl_db::PgStore;

use crate::config::ServerConfig;
use crate::mail::Mailer;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind `Arc` or is a pool handle.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool, for read-only listings.
    pub pool: meowl_db::DbPool,
    /// Transactional store the core services run against.
    pub store: PgStore,
    pub config: Arc<ServerConfig>,
    /// Signs QR tokens, access passes and email links.
    pub gate: Arc<TokenGate>,
    pub mailer: Arc<Mailer>,
}

impl AppState {
    pub fn new(pool: meowl_db::DbPool, config: ServerConfig) -> Self {
        let gate = TokenGate::new(&config.signing_secret, config.qr_token_minutes);
        let mailer = Mailer::new(config.email.clone());
        Self {
            store: PgStore::new(pool.clone()),
            pool,
            config: Arc::new(config),
            gate: Arc::new(gate),
            mailer: Arc::new(mailer),
        }
    }
}
