use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::email_change::EmailChangeToken;
use crate::models::password_reset::PasswordResetToken;
use crate::models::user::User;

/// Persistence contract for users and the mailed single-use tokens
/// (password reset, email-change confirmation).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn insert_user(&self, user: &User) -> anyhow::Result<()>;
    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>>;
    async fn find_user_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<User>>;
    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
    async fn update_email(
        &self,
        user_id: Uuid,
        new_email: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool>;

    async fn insert_password_reset(&self, token: &PasswordResetToken) -> anyhow::Result<()>;
    async fn find_password_reset_by_token(
        &self,
        token: &str,
    ) -> anyhow::Result<Option<PasswordResetToken>>;
    /// Compare-and-set on the `used` flag so a reset token cannot be spent
    /// twice. Returns false if it was already used.
    async fn mark_password_reset_used(&self, token_id: Uuid) -> anyhow::Result<bool>;

    async fn insert_email_change(&self, token: &EmailChangeToken) -> anyhow::Result<()>;
    async fn find_email_change_by_token(
        &self,
        token: &str,
    ) -> anyhow::Result<Option<EmailChangeToken>>;
    async fn mark_email_change_used(&self, token_id: Uuid) -> anyhow::Result<bool>;
}

pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn insert_user(&self, user: &User) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, name, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.name)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at, updated_at \
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, name, password_hash, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $1, updated_at = $2 WHERE id = $3",
        )
        .bind(password_hash)
        .bind(at)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_email(
        &self,
        user_id: Uuid,
        new_email: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let result =
            sqlx::query("UPDATE users SET email = $1, updated_at = $2 WHERE id = $3")
                .bind(new_email)
                .bind(at)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_password_reset(&self, token: &PasswordResetToken) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO password_reset_tokens (id, user_id, token, expires_at, used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_password_reset_by_token(
        &self,
        token: &str,
    ) -> anyhow::Result<Option<PasswordResetToken>> {
        let record = sqlx::query_as::<_, PasswordResetToken>(
            r#"
            SELECT id, user_id, token, expires_at, used, created_at
            FROM password_reset_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn mark_password_reset_used(&self, token_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE password_reset_tokens SET used = TRUE WHERE id = $1 AND used = FALSE",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_email_change(&self, token: &EmailChangeToken) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO email_change_tokens
                (id, user_id, old_email, new_email, token, expires_at, used, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(&token.old_email)
        .bind(&token.new_email)
        .bind(&token.token)
        .bind(token.expires_at)
        .bind(token.used)
        .bind(token.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_email_change_by_token(
        &self,
        token: &str,
    ) -> anyhow::Result<Option<EmailChangeToken>> {
        let record = sqlx::query_as::<_, EmailChangeToken>(
            r#"
            SELECT id, user_id, old_email, new_email, token, expires_at, used, created_at
            FROM email_change_tokens
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    async fn mark_email_change_used(&self, token_id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query(
            "UPDATE email_change_tokens SET used = TRUE WHERE id = $1 AND used = FALSE",
        )
        .bind(token_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
