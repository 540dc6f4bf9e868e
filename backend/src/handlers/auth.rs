use axum::{
    extract::{Extension, State},
    http::{header, header::USER_AGENT, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    middleware::auth::AuthContext,
    models::session::DeviceMetadata,
    models::user::{LoginRequest, UserResponse},
    response::ApiResponse,
    state::AppState,
    utils::cookies::{
        build_auth_cookie, build_clear_cookie, CookieOptions, ACCESS_COOKIE_NAME,
        ACCESS_COOKIE_PATH, REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH, SESSION_COOKIE_NAME,
        SESSION_COOKIE_PATH,
    },
    utils::password::verify_password,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginData {
    pub user: UserResponse,
    pub session_id: Uuid,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshData {
    pub session_id: Uuid,
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LogoutData {
    pub deactivated: u64,
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<LoginRequest>,
) -> Result<Response, AppError> {
    payload.validate()?;

    let user = state
        .credentials
        .find_user_by_email(&payload.email)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".to_string()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::Unauthorized(
            "Invalid email or password".to_string(),
        ));
    }

    let metadata = DeviceMetadata {
        ip_address: extract_ip(&headers),
        user_agent: extract_user_agent(&headers),
        device_info: payload.device_info.clone(),
    };
    let issued = state.manager.login(user.id, metadata).await?;

    let data = LoginData {
        user: UserResponse::from(user),
        session_id: issued.session.id,
        access_token: issued.access_token.clone(),
        access_expires_at: issued.access_expires_at,
    };
    let mut response = Json(ApiResponse::success("Signed in", data)).into_response();
    append_auth_cookies(
        &mut response,
        &state.config,
        &issued.access_token,
        issued.access_expires_at,
        &issued.refresh_token,
        issued.refresh_expires_at,
    )?;
    append_session_cookie(
        &mut response,
        &state.config,
        issued.session.id,
        issued.session.expires_at,
    )?;
    Ok(response)
}

/// Rotates the refresh token presented in the `rtoken` cookie. The consumed
/// token is revoked even if the caller never stores the replacement.
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let raw_token = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| crate::utils::cookies::extract_cookie_value(raw, REFRESH_COOKIE_NAME))
        .ok_or_else(|| AppError::BadRequest("Refresh token is required".to_string()))?;

    let rotated = state.manager.refresh(&raw_token).await?;

    let data = RefreshData {
        session_id: rotated.session_id,
        access_token: rotated.access_token.clone(),
        access_expires_at: rotated.access_expires_at,
    };
    let mut response = Json(ApiResponse::success("Token refreshed", data)).into_response();
    append_auth_cookies(
        &mut response,
        &state.config,
        &rotated.access_token,
        rotated.access_expires_at,
        &rotated.refresh_token,
        rotated.refresh_expires_at,
    )?;
    Ok(response)
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, AppError> {
    let deactivated = state.manager.logout(context.session_id).await?;

    let mut response =
        Json(ApiResponse::success("Signed out", LogoutData { deactivated })).into_response();
    append_clear_cookies(&mut response, &state.config)?;
    Ok(response)
}

pub async fn me(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<ApiResponse<UserResponse>>, AppError> {
    let user = state
        .credentials
        .find_user_by_id(context.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(ApiResponse::success("OK", UserResponse::from(user))))
}

fn extract_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        return value
            .split(',')
            .next()
            .map(|ip| ip.trim().to_string())
            .filter(|ip| !ip.is_empty());
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|agent| agent.trim().to_string())
        .filter(|agent| !agent.is_empty())
}

fn hidden_cookie_options(config: &Config) -> CookieOptions {
    CookieOptions {
        secure: config.cookie_secure,
        same_site: config.cookie_same_site,
        http_only: true,
    }
}

// The session-id mirror is readable by the frontend on purpose.
fn mirror_cookie_options(config: &Config) -> CookieOptions {
    CookieOptions {
        secure: config.cookie_secure,
        same_site: config.cookie_same_site,
        http_only: false,
    }
}

fn remaining_max_age(expires_at: DateTime<Utc>) -> Duration {
    Duration::from_secs((expires_at - Utc::now()).num_seconds().max(0) as u64)
}

fn append_cookie(response: &mut Response, cookie: String) -> Result<(), AppError> {
    let value = HeaderValue::from_str(&cookie)
        .map_err(|e| AppError::InternalServerError(anyhow::anyhow!("invalid cookie: {}", e)))?;
    response.headers_mut().append(header::SET_COOKIE, value);
    Ok(())
}

pub(crate) fn append_auth_cookies(
    response: &mut Response,
    config: &Config,
    access_token: &str,
    access_expires_at: DateTime<Utc>,
    refresh_token: &str,
    refresh_expires_at: DateTime<Utc>,
) -> Result<(), AppError> {
    let options = hidden_cookie_options(config);
    append_cookie(
        response,
        build_auth_cookie(
            ACCESS_COOKIE_NAME,
            access_token,
            remaining_max_age(access_expires_at),
            ACCESS_COOKIE_PATH,
            options,
        ),
    )?;
    append_cookie(
        response,
        build_auth_cookie(
            REFRESH_COOKIE_NAME,
            refresh_token,
            remaining_max_age(refresh_expires_at),
            REFRESH_COOKIE_PATH,
            options,
        ),
    )
}

pub(crate) fn append_session_cookie(
    response: &mut Response,
    config: &Config,
    session_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<(), AppError> {
    append_cookie(
        response,
        build_auth_cookie(
            SESSION_COOKIE_NAME,
            &session_id.to_string(),
            remaining_max_age(expires_at),
            SESSION_COOKIE_PATH,
            mirror_cookie_options(config),
        ),
    )
}

pub(crate) fn append_clear_cookies(
    response: &mut Response,
    config: &Config,
) -> Result<(), AppError> {
    let options = hidden_cookie_options(config);
    append_cookie(
        response,
        build_clear_cookie(ACCESS_COOKIE_NAME, ACCESS_COOKIE_PATH, options),
    )?;
    append_cookie(
        response,
        build_clear_cookie(REFRESH_COOKIE_NAME, REFRESH_COOKIE_PATH, options),
    )?;
    append_cookie(
        response,
        build_clear_cookie(
            SESSION_COOKIE_NAME,
            SESSION_COOKIE_PATH,
            mirror_cookie_options(config),
        ),
    )
}
