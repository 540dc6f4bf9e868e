use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::refresh_token::RefreshToken;

/// Persistence contract for refresh-token rows. Rows are never deleted;
/// revocation flips `is_revoked` so replays stay detectable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    async fn insert(&self, token: &RefreshToken) -> anyhow::Result<()>;
    async fn find_by_hash(&self, token_hash: &str) -> anyhow::Result<Option<RefreshToken>>;
    /// Compare-and-set: marks the token revoked only if it is not already.
    /// Returns false when another caller won the race.
    async fn revoke_if_active(&self, token_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<bool>;
    async fn revoke_for_session(
        &self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64>;
    async fn revoke_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<u64>;
    async fn revoke_for_user_except_session(
        &self,
        user_id: Uuid,
        except_session_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64>;
}

pub struct PgRefreshTokenStore {
    pool: PgPool,
}

impl PgRefreshTokenStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RefreshTokenStore for PgRefreshTokenStore {
    async fn insert(&self, token: &RefreshToken) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens
                (id, user_id, session_id, token_hash, expires_at, is_revoked, revoked_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(token.session_id)
        .bind(&token.token_hash)
        .bind(token.expires_at)
        .bind(token.is_revoked)
        .bind(token.revoked_at)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> anyhow::Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(
            r#"
            SELECT id, user_id, session_id, token_hash, expires_at, is_revoked, revoked_at, created_at
            FROM refresh_tokens
            WHERE token_hash = $1
            "#,
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(token)
    }

    async fn revoke_if_active(&self, token_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = TRUE, revoked_at = $1
            WHERE id = $2 AND is_revoked = FALSE
            "#,
        )
        .bind(at)
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn revoke_for_session(
        &self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = TRUE, revoked_at = $1
            WHERE session_id = $2 AND is_revoked = FALSE
            "#,
        )
        .bind(at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = TRUE, revoked_at = $1
            WHERE user_id = $2 AND is_revoked = FALSE
            "#,
        )
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn revoke_for_user_except_session(
        &self,
        user_id: Uuid,
        except_session_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE refresh_tokens
            SET is_revoked = TRUE, revoked_at = $1
            WHERE user_id = $2 AND session_id <> $3 AND is_revoked = FALSE
            "#,
        )
        .bind(at)
        .bind(user_id)
        .bind(except_session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}
