#![allow(dead_code)]

use axum::{
    body::Body,
    http::header::SET_COOKIE,
    http::{Request, Response},
    middleware as axum_middleware,
    routing::{delete, get, post},
    Router,
};
use chrono::Utc;
use uuid::Uuid;

use shardview_backend::{
    config::Config,
    handlers,
    middleware::auth as auth_middleware,
    models::user::User,
    state::AppState,
    utils::cookies::SameSite,
    utils::password::hash_password,
};

pub fn test_config() -> Config {
    Config {
        database_url: String::new(),
        jwt_secret: "test-secret".into(),
        access_token_ttl_minutes: 15,
        refresh_token_ttl_days: 30,
        session_ttl_days: 30,
        cookie_secure: false,
        cookie_same_site: SameSite::Lax,
        revoke_session_on_token_reuse: true,
        store_backend: "memory".into(),
        frontend_url: "http://localhost:5173".into(),
        rate_limit_enabled: false,
        rate_limit_burst: 20,
        rate_limit_window_seconds: 60,
        db_acquire_timeout_seconds: 5,
    }
}

pub fn test_state() -> AppState {
    AppState::with_memory(test_config()).expect("build app state")
}

pub async fn seed_user(state: &AppState, email: &str, password: &str) -> User {
    let now = Utc::now();
    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        name: "Test User".to_string(),
        password_hash: hash_password(password).expect("hash password"),
        created_at: now,
        updated_at: now,
    };
    state
        .credentials
        .insert_user(&user)
        .await
        .expect("insert user");
    user
}

/// The auth surface wired the way main.rs wires it, minus the rate limiter
/// and the shared CORS/trace layers.
pub fn auth_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/auth/refresh", post(handlers::auth::refresh))
        .route(
            "/api/auth/forgot-password",
            post(handlers::password::forgot_password),
        )
        .route(
            "/api/auth/validate-token",
            get(handlers::password::validate_token),
        )
        .route(
            "/api/auth/reset-password",
            post(handlers::password::reset_password),
        )
        .route(
            "/api/auth/confirm-email",
            post(handlers::password::confirm_email),
        );

    let protected_routes = Router::new()
        .route("/api/auth/logout", post(handlers::auth::logout))
        .route("/api/auth/me", get(handlers::auth::me))
        .route(
            "/api/auth/change-password",
            post(handlers::password::change_password),
        )
        .route(
            "/api/auth/change-email",
            post(handlers::password::change_email),
        )
        .route(
            "/api/auth/sessions",
            get(handlers::sessions::list_sessions).delete(handlers::sessions::revoke_session),
        )
        .route(
            "/api/auth/sessions/all",
            delete(handlers::sessions::revoke_all_sessions),
        )
        .route(
            "/api/auth/sessions/others",
            delete(handlers::sessions::revoke_other_sessions),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware::auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("build request")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json body")
}

/// All Set-Cookie header values on the response.
pub fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .collect()
}

/// The value of a named cookie among the Set-Cookie headers, if present.
pub fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    let prefix = format!("{}=", name);
    cookies.iter().find_map(|cookie| {
        let first_pair = cookie.split(';').next()?;
        first_pair
            .strip_prefix(prefix.as_str())
            .map(|value| value.to_string())
    })
}
