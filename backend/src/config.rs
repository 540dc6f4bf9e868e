use serde::{Deserialize, Serialize};
use std::env;

use crate::utils::cookies::SameSite;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: u64,
    pub refresh_token_ttl_days: u64,
    pub session_ttl_days: u64,
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,
    /// Treat a replayed (already revoked) refresh token as theft and
    /// deactivate the whole session chain.
    pub revoke_session_on_token_reuse: bool,
    /// "postgres" (default) or "memory" for running without a database.
    pub store_backend: String,
    pub frontend_url: String,
    pub rate_limit_enabled: bool,
    pub rate_limit_burst: u32,
    pub rate_limit_window_seconds: u64,
    pub db_acquire_timeout_seconds: u64,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/shardview".to_string());

        let jwt_secret = env::var("JWT_SECRET")
            .unwrap_or_else(|_| "your-secret-key-change-this-in-production".to_string());

        let access_token_ttl_minutes = env::var("ACCESS_TOKEN_TTL_MINUTES")
            .unwrap_or_else(|_| "15".to_string())
            .parse()
            .unwrap_or(15);

        let refresh_token_ttl_days = env::var("REFRESH_TOKEN_TTL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let session_ttl_days = env::var("SESSION_TTL_DAYS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .unwrap_or(30);

        let cookie_secure = env::var("COOKIE_SECURE")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let cookie_same_site = match env::var("COOKIE_SAME_SITE").as_deref() {
            Ok("strict") => SameSite::Strict,
            Ok("none") => SameSite::None,
            _ => SameSite::Lax,
        };

        let revoke_session_on_token_reuse = env::var("REVOKE_SESSION_ON_TOKEN_REUSE")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let store_backend =
            env::var("STORE_BACKEND").unwrap_or_else(|_| "postgres".to_string());

        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());

        let rate_limit_enabled = env::var("RATE_LIMIT_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let rate_limit_burst = env::var("RATE_LIMIT_BURST")
            .unwrap_or_else(|_| "20".to_string())
            .parse()
            .unwrap_or(20);

        let rate_limit_window_seconds = env::var("RATE_LIMIT_WINDOW_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let db_acquire_timeout_seconds = env::var("DB_ACQUIRE_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);

        Ok(Config {
            database_url,
            jwt_secret,
            access_token_ttl_minutes,
            refresh_token_ttl_days,
            session_ttl_days,
            cookie_secure,
            cookie_same_site,
            revoke_session_on_token_reuse,
            store_backend,
            frontend_url,
            rate_limit_enabled,
            rate_limit_burst,
            rate_limit_window_seconds,
            db_acquire_timeout_seconds,
        })
    }
}
