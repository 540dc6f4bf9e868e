//! Credential flows backed by mailed single-use tokens, plus the signed-in
//! password change.

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    error::AppError,
    middleware::auth::AuthContext,
    models::email_change::{ConfirmEmailRequest, EmailChangeToken},
    models::password_reset::{
        ForgotPasswordRequest, PasswordResetToken, ResetPasswordRequest, ValidateTokenQuery,
    },
    models::user::{ChangeEmailRequest, ChangePasswordRequest},
    response::ApiResponse,
    services::mailer::Mailer,
    state::AppState,
    utils::password::{hash_password, verify_password},
    utils::tokens::generate_opaque_token,
};

const RESET_TOKEN_TTL_HOURS: i64 = 1;
const EMAIL_CHANGE_TOKEN_TTL_HOURS: i64 = 24;

/// Always answers 200 so the endpoint cannot be used to probe which
/// addresses have accounts.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    payload.validate()?;

    if let Some(user) = state.credentials.find_user_by_email(&payload.email).await? {
        let now = Utc::now();
        let token = PasswordResetToken {
            id: Uuid::new_v4(),
            user_id: user.id,
            token: generate_opaque_token(),
            expires_at: now + Duration::hours(RESET_TOKEN_TTL_HOURS),
            used: false,
            created_at: now,
        };
        state.credentials.insert_password_reset(&token).await?;
        send_mail_in_background(state.mailer.clone(), move |mailer| {
            mailer.send_password_reset_email(&user.email, &token.token)
        });
    }

    Ok(Json(ApiResponse::message_only(
        "If the address exists, a reset link has been sent",
    )))
}

/// Pre-flight check used by the reset form before asking for a new
/// password. Used, expired, and unknown tokens are all rejected the same
/// way.
pub async fn validate_token(
    State(state): State<AppState>,
    Query(query): Query<ValidateTokenQuery>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    if query.token.trim().is_empty() {
        return Err(AppError::BadRequest("Token is required".to_string()));
    }

    let record = state
        .credentials
        .find_password_reset_by_token(&query.token)
        .await?;
    match record {
        Some(token) if token.is_usable(Utc::now()) => {
            Ok(Json(ApiResponse::message_only("Token is valid")))
        }
        _ => Err(AppError::Unauthorized(
            "Invalid or expired token".to_string(),
        )),
    }
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    payload.validate()?;

    let record = state
        .credentials
        .find_password_reset_by_token(&payload.token)
        .await?
        .filter(|token| token.is_usable(Utc::now()))
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    // Spend the token before touching the credential so a raced duplicate
    // submission cannot reset twice.
    if !state
        .credentials
        .mark_password_reset_used(record.id)
        .await?
    {
        return Err(AppError::Unauthorized(
            "Invalid or expired token".to_string(),
        ));
    }

    let user = state
        .credentials
        .find_user_by_id(record.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let new_hash = hash_password(&payload.new_password)?;
    state
        .credentials
        .update_password(user.id, &new_hash, Utc::now())
        .await?;

    // A reset means the old credential may be compromised; nothing keeps
    // its sessions.
    state.manager.deactivate_all_sessions(user.id).await?;

    send_mail_in_background(state.mailer.clone(), move |mailer| {
        mailer.send_password_changed_notice(&user.email, &user.name)
    });

    Ok(Json(ApiResponse::message_only("Password has been reset")))
}

pub async fn change_password(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    payload.validate()?;
    if payload.new_password == payload.current_password {
        return Err(AppError::BadRequest(
            "New password must differ from current password".to_string(),
        ));
    }

    let user = state
        .credentials
        .find_user_by_id(context.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&payload.current_password, &user.password_hash)? {
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    let new_hash = hash_password(&payload.new_password)?;
    state
        .credentials
        .update_password(user.id, &new_hash, Utc::now())
        .await?;

    // Keep this device signed in; everything else goes.
    state
        .manager
        .deactivate_other_sessions(user.id, context.session_id)
        .await?;

    send_mail_in_background(state.mailer.clone(), move |mailer| {
        mailer.send_password_changed_notice(&user.email, &user.name)
    });

    Ok(Json(ApiResponse::message_only(
        "Password updated successfully",
    )))
}

pub async fn change_email(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<ChangeEmailRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    payload.validate()?;

    let user = state
        .credentials
        .find_user_by_id(context.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !verify_password(&payload.password, &user.password_hash)? {
        return Err(AppError::Unauthorized("Password is incorrect".to_string()));
    }
    if payload.new_email == user.email {
        return Err(AppError::BadRequest(
            "New email must differ from current email".to_string(),
        ));
    }
    if state
        .credentials
        .find_user_by_email(&payload.new_email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Email address is already in use".to_string(),
        ));
    }

    let now = Utc::now();
    let token = EmailChangeToken {
        id: Uuid::new_v4(),
        user_id: user.id,
        old_email: user.email.clone(),
        new_email: payload.new_email.clone(),
        token: generate_opaque_token(),
        expires_at: now + Duration::hours(EMAIL_CHANGE_TOKEN_TTL_HOURS),
        used: false,
        created_at: now,
    };
    state.credentials.insert_email_change(&token).await?;

    send_mail_in_background(state.mailer.clone(), move |mailer| {
        mailer.send_email_change_confirmation(&token.new_email, &token.token)
    });

    Ok(Json(ApiResponse::message_only(
        "Confirmation link sent to the new address",
    )))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Json(payload): Json<ConfirmEmailRequest>,
) -> Result<Json<ApiResponse<()>>, AppError> {
    payload.validate()?;

    let record = state
        .credentials
        .find_email_change_by_token(&payload.token)
        .await?
        .filter(|token| token.is_usable(Utc::now()))
        .ok_or_else(|| AppError::Unauthorized("Invalid or expired token".to_string()))?;

    if state
        .credentials
        .find_user_by_email(&record.new_email)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Email address is already in use".to_string(),
        ));
    }

    if !state.credentials.mark_email_change_used(record.id).await? {
        return Err(AppError::Unauthorized(
            "Invalid or expired token".to_string(),
        ));
    }

    state
        .credentials
        .update_email(record.user_id, &record.new_email, Utc::now())
        .await?;

    Ok(Json(ApiResponse::message_only("Email address updated")))
}

/// SMTP delivery is blocking and best-effort; the request outcome never
/// depends on it.
fn send_mail_in_background<F>(mailer: Arc<Mailer>, send: F)
where
    F: FnOnce(&Mailer) -> anyhow::Result<()> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        if let Err(err) = send(&mailer) {
            tracing::warn!(error = ?err, "failed to send email");
        }
    });
}
