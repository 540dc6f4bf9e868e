use std::sync::Arc;

use crate::config::Config;
use crate::db::connection::DbPool;
use crate::repositories::{
    CredentialStore, MemoryCredentialStore, MemoryRefreshTokenStore, MemorySessionStore,
    PgCredentialStore, PgRefreshTokenStore, PgSessionStore, RefreshTokenStore, SessionStore,
};
use crate::services::mailer::Mailer;
use crate::services::session_manager::SessionManager;
use crate::utils::jwt::TokenCodec;

/// Shared handles passed to handlers and middleware. Everything is wired
/// here once at startup; nothing reaches for globals at request time.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub codec: Arc<TokenCodec>,
    pub credentials: Arc<dyn CredentialStore>,
    pub manager: SessionManager,
    pub mailer: Arc<Mailer>,
}

impl AppState {
    pub fn new(
        config: Config,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
    ) -> anyhow::Result<Self> {
        let codec = Arc::new(TokenCodec::new(
            &config.jwt_secret,
            config.access_token_ttl_minutes,
            config.refresh_token_ttl_days,
        ));
        let manager = SessionManager::new(
            sessions,
            refresh_tokens,
            codec.clone(),
            config.session_ttl_days,
            config.revoke_session_on_token_reuse,
        );
        let mailer = Arc::new(Mailer::new(&config.frontend_url)?);
        Ok(Self {
            config,
            codec,
            credentials,
            manager,
            mailer,
        })
    }

    pub fn with_postgres(config: Config, pool: DbPool) -> anyhow::Result<Self> {
        Self::new(
            config,
            Arc::new(PgCredentialStore::new(pool.clone())),
            Arc::new(PgSessionStore::new(pool.clone())),
            Arc::new(PgRefreshTokenStore::new(pool)),
        )
    }

    pub fn with_memory(config: Config) -> anyhow::Result<Self> {
        Self::new(
            config,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemorySessionStore::new()),
            Arc::new(MemoryRefreshTokenStore::new()),
        )
    }
}
