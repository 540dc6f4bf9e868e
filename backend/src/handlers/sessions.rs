use axum::{
    extract::{Extension, State},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppError,
    handlers::auth::append_clear_cookies,
    middleware::auth::AuthContext,
    models::session::SessionResponse,
    response::ApiResponse,
    state::AppState,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct RevokeSessionRequest {
    pub session_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RevokedData {
    pub deactivated: u64,
}

pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<ApiResponse<Vec<SessionResponse>>>, AppError> {
    let sessions = state.manager.list_sessions(context.user_id).await?;
    let responses: Vec<SessionResponse> = sessions
        .into_iter()
        .map(|session| SessionResponse::from_session(session, context.session_id))
        .collect();
    Ok(Json(ApiResponse::success("OK", responses)))
}

/// Revokes one of the caller's sessions by id. The current session is
/// rejected here; logout is the way to end it.
pub async fn revoke_session(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<RevokeSessionRequest>,
) -> Result<Json<ApiResponse<RevokedData>>, AppError> {
    let session = state
        .manager
        .find_session(payload.session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".to_string()))?;

    if session.user_id != context.user_id {
        return Err(AppError::Forbidden("Forbidden".to_string()));
    }
    if session.id == context.session_id {
        return Err(AppError::BadRequest(
            "Cannot revoke current session; use logout instead".to_string(),
        ));
    }

    let deactivated = state.manager.logout(session.id).await?;
    Ok(Json(ApiResponse::success(
        "Session revoked",
        RevokedData { deactivated },
    )))
}

/// Signs the caller out of every device, including this one, so the auth
/// cookies are cleared as well.
pub async fn revoke_all_sessions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Response, AppError> {
    let deactivated = state
        .manager
        .deactivate_all_sessions(context.user_id)
        .await?;

    let mut response = Json(ApiResponse::success(
        "All sessions revoked",
        RevokedData { deactivated },
    ))
    .into_response();
    append_clear_cookies(&mut response, &state.config)?;
    Ok(response)
}

pub async fn revoke_other_sessions(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<ApiResponse<RevokedData>>, AppError> {
    let deactivated = state
        .manager
        .deactivate_other_sessions(context.user_id, context.session_id)
        .await?;
    Ok(Json(ApiResponse::success(
        "Other sessions revoked",
        RevokedData { deactivated },
    )))
}
