//! Orchestrates the session and refresh-token lifecycle: sign-in, rotation,
//! logout, and bulk revocation. All invariant enforcement lives here; the
//! stores are plain persistence and the codec is pure crypto.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::models::refresh_token::RefreshToken;
use crate::models::session::{DeviceMetadata, Session};
use crate::repositories::{RefreshTokenStore, SessionStore};
use crate::utils::jwt::{hash_refresh_token, TokenCodec, TokenError};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("refresh token not found")]
    TokenNotFound,
    #[error("refresh token has been revoked")]
    TokenRevoked,
    #[error("token has expired")]
    TokenExpired,
    #[error("invalid token")]
    InvalidToken,
    #[error("session is no longer active")]
    SessionInactive,
    #[error("session not found")]
    SessionNotFound,
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => AuthError::TokenExpired,
            TokenError::Invalid => AuthError::InvalidToken,
            TokenError::Signing(e) => AuthError::Store(e.into()),
        }
    }
}

/// Everything a successful sign-in hands back to the transport layer.
#[derive(Debug)]
pub struct IssuedSession {
    pub session: Session,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Result of one rotation step: a fresh access/refresh pair for the same
/// session. The consumed refresh token is already revoked by the time this
/// value exists.
#[derive(Debug)]
pub struct RotatedTokens {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    codec: Arc<TokenCodec>,
    session_ttl: Duration,
    revoke_session_on_reuse: bool,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        codec: Arc<TokenCodec>,
        session_ttl_days: u64,
        revoke_session_on_reuse: bool,
    ) -> Self {
        Self {
            sessions,
            refresh_tokens,
            codec,
            session_ttl: Duration::days(session_ttl_days as i64),
            revoke_session_on_reuse,
        }
    }

    /// Creates an active session for an already-authenticated user and
    /// issues its first access/refresh token pair.
    pub async fn login(
        &self,
        user_id: Uuid,
        metadata: DeviceMetadata,
    ) -> Result<IssuedSession, AuthError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
            ip_address: metadata.ip_address,
            user_agent: metadata.user_agent,
            device_info: metadata.device_info,
            is_active: true,
            last_activity_at: now,
            expires_at: now + self.session_ttl,
            created_at: now,
            updated_at: now,
        };
        self.sessions.insert(&session).await?;

        let refresh = self.codec.issue_refresh_token(user_id, session.id)?;
        self.refresh_tokens
            .insert(&RefreshToken {
                id: Uuid::new_v4(),
                user_id,
                session_id: session.id,
                token_hash: refresh.token_hash,
                expires_at: refresh.expires_at,
                is_revoked: false,
                revoked_at: None,
                created_at: now,
            })
            .await?;

        let access = self.codec.issue_access_token(user_id, session.id)?;
        tracing::info!(%user_id, session_id = %session.id, "session created");

        Ok(IssuedSession {
            session,
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Exchanges a valid refresh token for a new access/refresh pair,
    /// revoking the presented token. Single-use is enforced by a
    /// compare-and-set on the stored row, so of two concurrent calls with
    /// the same token exactly one succeeds and the other observes
    /// `TokenRevoked`.
    pub async fn refresh(&self, raw_token: &str) -> Result<RotatedTokens, AuthError> {
        let claims = self.codec.verify_refresh_token(raw_token)?;
        let token_hash = hash_refresh_token(raw_token);
        let record = self
            .refresh_tokens
            .find_by_hash(&token_hash)
            .await?
            .ok_or(AuthError::TokenNotFound)?;
        if claims.sid != record.session_id || claims.sub != record.user_id {
            return Err(AuthError::InvalidToken);
        }

        let now = Utc::now();
        if record.is_revoked {
            // A spent token came back: someone is replaying the chain.
            tracing::warn!(
                user_id = %record.user_id,
                session_id = %record.session_id,
                "revoked refresh token presented again"
            );
            if self.revoke_session_on_reuse {
                self.sessions.deactivate(record.session_id, now).await?;
                self.refresh_tokens
                    .revoke_for_session(record.session_id, now)
                    .await?;
            }
            return Err(AuthError::TokenRevoked);
        }
        if record.is_expired(now) {
            return Err(AuthError::TokenExpired);
        }

        let session = self
            .sessions
            .find_by_id(record.session_id)
            .await?
            .ok_or(AuthError::SessionNotFound)?;
        if !session.is_usable(now) {
            // Fail closed: an unrevoked token under a dead session must not
            // remain exchangeable.
            self.refresh_tokens.revoke_if_active(record.id, now).await?;
            return Err(AuthError::SessionInactive);
        }

        // The rotation gate. Losing this compare-and-set means a concurrent
        // refresh already consumed the token; no cascade in that case.
        if !self.refresh_tokens.revoke_if_active(record.id, now).await? {
            return Err(AuthError::TokenRevoked);
        }

        let refresh = self
            .codec
            .issue_refresh_token(record.user_id, record.session_id)?;
        self.refresh_tokens
            .insert(&RefreshToken {
                id: Uuid::new_v4(),
                user_id: record.user_id,
                session_id: record.session_id,
                token_hash: refresh.token_hash,
                expires_at: refresh.expires_at,
                is_revoked: false,
                revoked_at: None,
                created_at: now,
            })
            .await?;
        let access = self
            .codec
            .issue_access_token(record.user_id, record.session_id)?;
        self.sessions.touch(record.session_id, now).await?;

        Ok(RotatedTokens {
            user_id: record.user_id,
            session_id: record.session_id,
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Deactivates one session and revokes its refresh tokens. Idempotent:
    /// an already-inactive session deactivates 0 rows and still succeeds.
    pub async fn logout(&self, session_id: Uuid) -> Result<u64, AuthError> {
        let now = Utc::now();
        let deactivated = self.sessions.deactivate(session_id, now).await?;
        self.refresh_tokens
            .revoke_for_session(session_id, now)
            .await?;
        if deactivated > 0 {
            tracing::info!(%session_id, "session deactivated");
        }
        Ok(deactivated)
    }

    /// Signs the user out everywhere. Returns the number of sessions that
    /// were still active.
    pub async fn deactivate_all_sessions(&self, user_id: Uuid) -> Result<u64, AuthError> {
        let now = Utc::now();
        let count = self.sessions.deactivate_all_for_user(user_id, now).await?;
        self.refresh_tokens.revoke_for_user(user_id, now).await?;
        tracing::info!(%user_id, count, "all sessions deactivated");
        Ok(count)
    }

    /// Signs the user out everywhere except the given session.
    pub async fn deactivate_other_sessions(
        &self,
        user_id: Uuid,
        except_session_id: Uuid,
    ) -> Result<u64, AuthError> {
        let now = Utc::now();
        let count = self
            .sessions
            .deactivate_others_for_user(user_id, except_session_id, now)
            .await?;
        self.refresh_tokens
            .revoke_for_user_except_session(user_id, except_session_id, now)
            .await?;
        tracing::info!(%user_id, count, "other sessions deactivated");
        Ok(count)
    }

    /// All of the user's sessions, newest first, active or not. The UI
    /// distinguishes current/active/expired from the flags and timestamps.
    pub async fn list_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, AuthError> {
        Ok(self.sessions.list_for_user(user_id).await?)
    }

    pub async fn find_session(&self, session_id: Uuid) -> Result<Option<Session>, AuthError> {
        Ok(self.sessions.find_by_id(session_id).await?)
    }

    /// Best-effort observability update; never extends `expires_at`.
    pub async fn record_activity(&self, session_id: Uuid) -> Result<bool, AuthError> {
        Ok(self.sessions.touch(session_id, Utc::now()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::refresh_token::MockRefreshTokenStore;
    use crate::repositories::session::MockSessionStore;

    fn manager_with(
        sessions: MockSessionStore,
        refresh_tokens: MockRefreshTokenStore,
    ) -> SessionManager {
        SessionManager::new(
            Arc::new(sessions),
            Arc::new(refresh_tokens),
            Arc::new(TokenCodec::new("test-secret", 15, 30)),
            30,
            true,
        )
    }

    #[tokio::test]
    async fn login_surfaces_session_store_failures() {
        let mut sessions = MockSessionStore::new();
        sessions
            .expect_insert()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let manager = manager_with(sessions, MockRefreshTokenStore::new());

        let err = manager
            .login(Uuid::new_v4(), DeviceMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
    }

    #[tokio::test]
    async fn refresh_surfaces_token_store_failures() {
        let mut refresh_tokens = MockRefreshTokenStore::new();
        refresh_tokens
            .expect_find_by_hash()
            .returning(|_| Err(anyhow::anyhow!("connection reset")));
        let manager = manager_with(MockSessionStore::new(), refresh_tokens);

        let raw = TokenCodec::new("test-secret", 15, 30)
            .issue_refresh_token(Uuid::new_v4(), Uuid::new_v4())
            .unwrap()
            .token;
        let err = manager.refresh(&raw).await.unwrap_err();
        assert!(matches!(err, AuthError::Store(_)));
    }
}
