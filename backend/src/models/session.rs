//! Models for tracking authenticated device/browser sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
/// Database representation of one authenticated device/browser context.
pub struct Session {
    /// Unique identifier for the session record.
    pub id: Uuid,
    /// User the session belongs to.
    pub user_id: Uuid,
    /// Client IP observed at sign-in.
    pub ip_address: Option<String>,
    /// User-Agent header observed at sign-in.
    pub user_agent: Option<String>,
    /// Optional client-supplied label for the device.
    pub device_info: Option<String>,
    /// False once the session is deactivated; deactivation is terminal.
    pub is_active: bool,
    /// Timestamp of the most recent authenticated request.
    pub last_activity_at: DateTime<Utc>,
    /// Fixed at creation; activity never extends it.
    pub expires_at: DateTime<Utc>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// A session is usable only while active and not past its expiry.
    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }
}

#[derive(Debug, Clone, Default)]
/// Client metadata captured at sign-in and attached to the session record.
pub struct DeviceMetadata {
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_info: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub id: Uuid,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_info: Option<String>,
    pub is_active: bool,
    pub last_activity_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub is_current: bool,
}

impl SessionResponse {
    pub fn from_session(session: Session, current_session_id: Uuid) -> Self {
        let is_current = session.id == current_session_id;
        Self {
            id: session.id,
            ip_address: session.ip_address,
            user_agent: session.user_agent,
            device_info: session.device_info,
            is_active: session.is_active,
            last_activity_at: session.last_activity_at,
            expires_at: session.expires_at,
            created_at: session.created_at,
            is_current,
        }
    }
}
