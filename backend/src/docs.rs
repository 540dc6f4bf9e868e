#![allow(dead_code)] // OpenAPI doc stubs are only referenced by utoipa macros.

use crate::{
    handlers::{
        auth::{LoginData, LogoutData, RefreshData},
        sessions::{RevokeSessionRequest, RevokedData},
    },
    models::{
        email_change::ConfirmEmailRequest,
        password_reset::{ForgotPasswordRequest, ResetPasswordRequest},
        session::SessionResponse,
        user::{ChangeEmailRequest, ChangePasswordRequest, LoginRequest, UserResponse},
    },
};
use utoipa::{
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
    Modify, OpenApi,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        login_doc,
        refresh_doc,
        logout_doc,
        me_doc,
        list_sessions_doc,
        revoke_session_doc,
        revoke_all_sessions_doc,
        revoke_other_sessions_doc,
        forgot_password_doc,
        validate_token_doc,
        reset_password_doc,
        change_password_doc,
        change_email_doc,
        confirm_email_doc
    ),
    components(schemas(
        LoginRequest,
        LoginData,
        RefreshData,
        LogoutData,
        UserResponse,
        SessionResponse,
        RevokeSessionRequest,
        RevokedData,
        ForgotPasswordRequest,
        ResetPasswordRequest,
        ChangePasswordRequest,
        ChangeEmailRequest,
        ConfirmEmailRequest
    )),
    modifiers(&SecurityAddon),
    info(
        title = "Shardview auth API",
        description = "Session and refresh-token lifecycle endpoints of the Shardview cluster console."
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            );
        }
    }
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session created, tokens issued", body = LoginData),
        (status = 401, description = "Invalid email or password")
    ),
    tag = "auth"
)]
fn login_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/refresh",
    responses(
        (status = 200, description = "Rotated access/refresh pair", body = RefreshData),
        (status = 401, description = "Invalid, expired, or revoked refresh token")
    ),
    tag = "auth"
)]
fn refresh_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses((status = 200, description = "Session deactivated", body = LogoutData)),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
fn logout_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    responses((status = 200, description = "Authenticated user", body = UserResponse)),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
fn me_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/sessions",
    responses((status = 200, description = "All sessions for the current user", body = [SessionResponse])),
    security(("bearer_auth" = [])),
    tag = "sessions"
)]
fn list_sessions_doc() {}

#[utoipa::path(
    delete,
    path = "/api/auth/sessions",
    request_body = RevokeSessionRequest,
    responses(
        (status = 200, description = "Session revoked", body = RevokedData),
        (status = 404, description = "Session not found")
    ),
    security(("bearer_auth" = [])),
    tag = "sessions"
)]
fn revoke_session_doc() {}

#[utoipa::path(
    delete,
    path = "/api/auth/sessions/all",
    responses((status = 200, description = "All sessions revoked", body = RevokedData)),
    security(("bearer_auth" = [])),
    tag = "sessions"
)]
fn revoke_all_sessions_doc() {}

#[utoipa::path(
    delete,
    path = "/api/auth/sessions/others",
    responses((status = 200, description = "Other sessions revoked", body = RevokedData)),
    security(("bearer_auth" = [])),
    tag = "sessions"
)]
fn revoke_other_sessions_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses((status = 200, description = "Reset link sent if the address exists")),
    tag = "password"
)]
fn forgot_password_doc() {}

#[utoipa::path(
    get,
    path = "/api/auth/validate-token",
    params(("token" = String, Query, description = "Password reset token")),
    responses(
        (status = 200, description = "Token is valid"),
        (status = 401, description = "Used, expired, or unknown token")
    ),
    tag = "password"
)]
fn validate_token_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset, all sessions revoked"),
        (status = 401, description = "Used, expired, or unknown token")
    ),
    tag = "password"
)]
fn reset_password_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/change-password",
    request_body = ChangePasswordRequest,
    responses((status = 200, description = "Password updated, other sessions revoked")),
    security(("bearer_auth" = [])),
    tag = "password"
)]
fn change_password_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/change-email",
    request_body = ChangeEmailRequest,
    responses((status = 200, description = "Confirmation link sent to the new address")),
    security(("bearer_auth" = [])),
    tag = "password"
)]
fn change_email_doc() {}

#[utoipa::path(
    post,
    path = "/api/auth/confirm-email",
    request_body = ConfirmEmailRequest,
    responses(
        (status = 200, description = "Email address updated"),
        (status = 401, description = "Used, expired, or unknown token")
    ),
    tag = "password"
)]
fn confirm_email_doc() {}
