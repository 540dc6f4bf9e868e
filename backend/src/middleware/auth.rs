//! Request-boundary guard for protected routes. Verifies the access token
//! (signature + expiry, nothing else) and attaches the authenticated
//! identity to the request. The session store is never consulted on this
//! path; a deactivated session stays usable only for the remaining access
//! token lifetime, which is why that lifetime is minutes.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::{
    error::AppError,
    state::AppState,
    utils::cookies::{extract_cookie_value, ACCESS_COOKIE_NAME},
    utils::jwt::TokenError,
};

/// Authenticated identity resolved from the access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

pub async fn auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (auth_header, cookie_header) = extract_auth_headers(request.headers());
    let token = auth_header
        .as_deref()
        .and_then(parse_bearer_token)
        .map(str::to_string)
        .or_else(|| {
            cookie_header
                .as_deref()
                .and_then(|raw| extract_cookie_value(raw, ACCESS_COOKIE_NAME))
        })
        .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))?;

    let claims = state.codec.verify_access_token(&token).map_err(|err| {
        let message = match err {
            TokenError::Expired => "Token has expired",
            _ => "Invalid token",
        };
        AppError::Unauthorized(message.to_string())
    })?;
    let context = AuthContext {
        user_id: claims.sub,
        session_id: claims.sid,
    };

    // Observability only; failures never block the request.
    let manager = state.manager.clone();
    let session_id = context.session_id;
    tokio::spawn(async move {
        if let Err(err) = manager.record_activity(session_id).await {
            tracing::debug!(%session_id, error = ?err, "failed to record session activity");
        }
    });

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn parse_bearer_token(header: &str) -> Option<&str> {
    if let Some(rest) = header.strip_prefix("Bearer ") {
        return Some(rest);
    }
    if let Some(space_idx) = header.find(' ') {
        let (scheme, rest) = header.split_at(space_idx);
        if scheme.eq_ignore_ascii_case("bearer") {
            return Some(rest.trim_start());
        }
    }
    None
}

fn extract_auth_headers(headers: &axum::http::HeaderMap) -> (Option<String>, Option<String>) {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned());
    let cookie_header = headers
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_owned());
    (auth_header, cookie_header)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bearer_token_accepts_mixed_case_scheme() {
        assert_eq!(parse_bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("bearer abc"), Some("abc"));
        assert_eq!(parse_bearer_token("BEARER  abc"), Some("abc"));
        assert_eq!(parse_bearer_token("Basic abc"), None);
        assert_eq!(parse_bearer_token("abc"), None);
    }
}
