//! In-memory store implementations. Used by the test suite and by
//! `STORE_BACKEND=memory` deployments that run the console without a
//! database. Each method takes the collection lock once, so the
//! read-modify-write updates are atomic exactly like their SQL
//! `UPDATE ... WHERE` counterparts.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::models::email_change::EmailChangeToken;
use crate::models::password_reset::PasswordResetToken;
use crate::models::refresh_token::RefreshToken;
use crate::models::session::Session;
use crate::models::user::User;
use crate::repositories::credential::CredentialStore;
use crate::repositories::refresh_token::RefreshTokenStore;
use crate::repositories::session::SessionStore;

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<Uuid, Session>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn insert(&self, session: &Session) -> anyhow::Result<()> {
        self.sessions
            .lock()
            .await
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, session_id: Uuid) -> anyhow::Result<Option<Session>> {
        Ok(self.sessions.lock().await.get(&session_id).cloned())
    }

    async fn list_for_user(&self, user_id: Uuid) -> anyhow::Result<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .sessions
            .lock()
            .await
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| {
            b.last_activity_at
                .cmp(&a.last_activity_at)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        Ok(sessions)
    }

    async fn touch(&self, session_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&session_id) {
            Some(session) if session.is_active => {
                session.last_activity_at = at;
                session.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn deactivate(&self, session_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut sessions = self.sessions.lock().await;
        match sessions.get_mut(&session_id) {
            Some(session) if session.is_active => {
                session.is_active = false;
                session.updated_at = at;
                Ok(1)
            }
            _ => Ok(0),
        }
    }

    async fn deactivate_all_for_user(
        &self,
        user_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let mut sessions = self.sessions.lock().await;
        let mut count = 0;
        for session in sessions.values_mut() {
            if session.user_id == user_id && session.is_active {
                session.is_active = false;
                session.updated_at = at;
                count += 1;
            }
        }
        Ok(count)
    }

    async fn deactivate_others_for_user(
        &self,
        user_id: Uuid,
        except_session_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let mut sessions = self.sessions.lock().await;
        let mut count = 0;
        for session in sessions.values_mut() {
            if session.user_id == user_id && session.id != except_session_id && session.is_active
            {
                session.is_active = false;
                session.updated_at = at;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[derive(Default)]
pub struct MemoryRefreshTokenStore {
    tokens: Mutex<HashMap<Uuid, RefreshToken>>,
}

impl MemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RefreshTokenStore for MemoryRefreshTokenStore {
    async fn insert(&self, token: &RefreshToken) -> anyhow::Result<()> {
        self.tokens.lock().await.insert(token.id, token.clone());
        Ok(())
    }

    async fn find_by_hash(&self, token_hash: &str) -> anyhow::Result<Option<RefreshToken>> {
        Ok(self
            .tokens
            .lock()
            .await
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn revoke_if_active(&self, token_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<bool> {
        let mut tokens = self.tokens.lock().await;
        match tokens.get_mut(&token_id) {
            Some(token) if !token.is_revoked => {
                token.is_revoked = true;
                token.revoked_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_for_session(
        &self,
        session_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let mut tokens = self.tokens.lock().await;
        let mut count = 0;
        for token in tokens.values_mut() {
            if token.session_id == session_id && !token.is_revoked {
                token.is_revoked = true;
                token.revoked_at = Some(at);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn revoke_for_user(&self, user_id: Uuid, at: DateTime<Utc>) -> anyhow::Result<u64> {
        let mut tokens = self.tokens.lock().await;
        let mut count = 0;
        for token in tokens.values_mut() {
            if token.user_id == user_id && !token.is_revoked {
                token.is_revoked = true;
                token.revoked_at = Some(at);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn revoke_for_user_except_session(
        &self,
        user_id: Uuid,
        except_session_id: Uuid,
        at: DateTime<Utc>,
    ) -> anyhow::Result<u64> {
        let mut tokens = self.tokens.lock().await;
        let mut count = 0;
        for token in tokens.values_mut() {
            if token.user_id == user_id
                && token.session_id != except_session_id
                && !token.is_revoked
            {
                token.is_revoked = true;
                token.revoked_at = Some(at);
                count += 1;
            }
        }
        Ok(count)
    }
}

#[derive(Default)]
pub struct MemoryCredentialStore {
    users: Mutex<HashMap<Uuid, User>>,
    password_resets: Mutex<HashMap<Uuid, PasswordResetToken>>,
    email_changes: Mutex<HashMap<Uuid, EmailChangeToken>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn insert_user(&self, user: &User) -> anyhow::Result<()> {
        self.users.lock().await.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> anyhow::Result<Option<User>> {
        Ok(self
            .users
            .lock()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_user_by_id(&self, user_id: Uuid) -> anyhow::Result<Option<User>> {
        Ok(self.users.lock().await.get(&user_id).cloned())
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut users = self.users.lock().await;
        match users.get_mut(&user_id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_email(
        &self,
        user_id: Uuid,
        new_email: &str,
        at: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let mut users = self.users.lock().await;
        match users.get_mut(&user_id) {
            Some(user) => {
                user.email = new_email.to_string();
                user.updated_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_password_reset(&self, token: &PasswordResetToken) -> anyhow::Result<()> {
        self.password_resets
            .lock()
            .await
            .insert(token.id, token.clone());
        Ok(())
    }

    async fn find_password_reset_by_token(
        &self,
        token: &str,
    ) -> anyhow::Result<Option<PasswordResetToken>> {
        Ok(self
            .password_resets
            .lock()
            .await
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn mark_password_reset_used(&self, token_id: Uuid) -> anyhow::Result<bool> {
        let mut tokens = self.password_resets.lock().await;
        match tokens.get_mut(&token_id) {
            Some(token) if !token.used => {
                token.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_email_change(&self, token: &EmailChangeToken) -> anyhow::Result<()> {
        self.email_changes
            .lock()
            .await
            .insert(token.id, token.clone());
        Ok(())
    }

    async fn find_email_change_by_token(
        &self,
        token: &str,
    ) -> anyhow::Result<Option<EmailChangeToken>> {
        Ok(self
            .email_changes
            .lock()
            .await
            .values()
            .find(|t| t.token == token)
            .cloned())
    }

    async fn mark_email_change_used(&self, token_id: Uuid) -> anyhow::Result<bool> {
        let mut tokens = self.email_changes.lock().await;
        match tokens.get_mut(&token_id) {
            Some(token) if !token.used => {
                token.used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn session(user_id: Uuid, last_activity_at: DateTime<Utc>) -> Session {
        let now = Utc::now();
        Session {
            id: Uuid::new_v4(),
            user_id,
            ip_address: None,
            user_agent: None,
            device_info: None,
            is_active: true,
            last_activity_at,
            expires_at: now + Duration::days(30),
            created_at: now,
            updated_at: now,
        }
    }

    fn refresh_token(user_id: Uuid, session_id: Uuid) -> RefreshToken {
        let now = Utc::now();
        RefreshToken {
            id: Uuid::new_v4(),
            user_id,
            session_id,
            token_hash: Uuid::new_v4().to_string(),
            expires_at: now + Duration::days(30),
            is_revoked: false,
            revoked_at: None,
            created_at: now,
        }
    }

    #[tokio::test]
    async fn revoke_if_active_is_single_shot() {
        let store = MemoryRefreshTokenStore::new();
        let token = refresh_token(Uuid::new_v4(), Uuid::new_v4());
        store.insert(&token).await.unwrap();

        assert!(store.revoke_if_active(token.id, Utc::now()).await.unwrap());
        assert!(!store.revoke_if_active(token.id, Utc::now()).await.unwrap());
    }

    #[tokio::test]
    async fn deactivate_is_idempotent() {
        let store = MemorySessionStore::new();
        let s = session(Uuid::new_v4(), Utc::now());
        store.insert(&s).await.unwrap();

        assert_eq!(store.deactivate(s.id, Utc::now()).await.unwrap(), 1);
        assert_eq!(store.deactivate(s.id, Utc::now()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn list_for_user_orders_by_recency() {
        let store = MemorySessionStore::new();
        let user_id = Uuid::new_v4();
        let now = Utc::now();
        let older = session(user_id, now - Duration::hours(2));
        let newer = session(user_id, now);
        store.insert(&older).await.unwrap();
        store.insert(&newer).await.unwrap();
        store.insert(&session(Uuid::new_v4(), now)).await.unwrap();

        let listed = store.list_for_user(user_id).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, newer.id);
        assert_eq!(listed[1].id, older.id);
    }

    #[tokio::test]
    async fn reset_token_cannot_be_spent_twice() {
        let store = MemoryCredentialStore::new();
        let now = Utc::now();
        let token = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            token: "reset-token-value-1234".to_string(),
            expires_at: now + Duration::hours(1),
            used: false,
            created_at: now,
        };
        store.insert_password_reset(&token).await.unwrap();

        assert!(store.mark_password_reset_used(token.id).await.unwrap());
        assert!(!store.mark_password_reset_used(token.id).await.unwrap());
    }
}
