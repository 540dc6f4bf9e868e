use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::session::Session;

/// Persistence contract for session records. No business logic lives here;
/// the session manager owns invariant enforcement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert(&self, session: &Session) -> anyhow::Result<()>;
    async fn find_by_id(&self, session_id: Uuid) -> anyhow::Result<Option<Session>>;
    /// All rows for the user regardless of the active flag, newest first.
    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Session>>;
    async fn touch(&self, session_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<bool>;
    /// Flips `is_active` off for one session; returns the number of rows
    /// that were still active. Deactivation is terminal.
    async fn deactivate(&self, session_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<u64>;
    async fn deactivate_all_for_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64>;
    async fn deactivate_others_for_user(
        &self,
        user_id: Uuid,
        except_session_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64>;
}

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn insert(&self, session: &Session) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions
                (id, user_id, ip_address, user_agent, device_info, is_active,
                 last_activity_at, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(&session.device_info)
        .bind(session.is_active)
        .bind(session.last_activity_at)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, session_id: Uuid) -> anyhow::Result<Option<Session>> {
        let session = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, ip_address, user_agent, device_info, is_active,
                   last_activity_at, expires_at, created_at, updated_at
            FROM sessions
            WHERE id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Session>> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT id, user_id, ip_address, user_agent, device_info, is_active,
                   last_activity_at, expires_at, created_at, updated_at
            FROM sessions
            WHERE user_id = $1
            ORDER BY last_activity_at DESC, created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    async fn touch(&self, session_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET last_activity_at = $1, updated_at = $1
            WHERE id = $2 AND is_active = TRUE
            "#,
        )
        .bind(at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn deactivate(&self, session_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = FALSE, updated_at = $1
            WHERE id = $2 AND is_active = TRUE
            "#,
        )
        .bind(at)
        .bind(session_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn deactivate_all_for_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = FALSE, updated_at = $1
            WHERE user_id = $2 AND is_active = TRUE
            "#,
        )
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn deactivate_others_for_user(
        &self,
        user_id: Uuid,
        except_session_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE sessions
            SET is_active = FALSE, updated_at = $1
            WHERE user_id = $2 AND id <> $3 AND is_active = TRUE
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
