//! HTTP-level tests for session listing and revocation.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::json;
use tower::ServiceExt;

mod support;

use support::{auth_router, body_json, cookie_value, json_request, seed_user, set_cookies, test_state};

struct LoginOutcome {
    access_token: String,
    refresh_token: String,
    session_id: String,
}

async fn login(app: &Router, email: &str, password: &str) -> LoginOutcome {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/auth/login",
            json!({"email": email, "password": password}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let refresh_token = cookie_value(&set_cookies(&response), "rtoken").expect("rtoken");
    let body = body_json(response).await;
    LoginOutcome {
        access_token: body["data"]["access_token"].as_str().unwrap().to_string(),
        refresh_token,
        session_id: body["data"]["session_id"].as_str().unwrap().to_string(),
    }
}

async fn refresh_status(app: &Router, refresh_token: &str) -> StatusCode {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/refresh")
                .header("cookie", format!("rtoken={}", refresh_token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
        .status()
}

fn bearer_request(method: &str, uri: &str, access_token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("authorization", format!("Bearer {}", access_token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn list_sessions_marks_the_current_one() {
    let state = test_state();
    seed_user(&state, "admin@example.com", "hunter2!pass").await;
    let app = auth_router(state);

    let first = login(&app, "admin@example.com", "hunter2!pass").await;
    let _second = login(&app, "admin@example.com", "hunter2!pass").await;

    let response = app
        .oneshot(bearer_request(
            "GET",
            "/api/auth/sessions",
            &first.access_token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let sessions = body["data"].as_array().unwrap();
    assert_eq!(sessions.len(), 2);
    let current: Vec<_> = sessions
        .iter()
        .filter(|s| s["is_current"] == true)
        .collect();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0]["id"], first.session_id.as_str());
}

#[tokio::test]
async fn revoking_another_session_kills_its_refresh_chain() {
    let state = test_state();
    seed_user(&state, "admin@example.com", "hunter2!pass").await;
    let app = auth_router(state);

    let current = login(&app, "admin@example.com", "hunter2!pass").await;
    let other = login(&app, "admin@example.com", "hunter2!pass").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/auth/sessions")
                .header("authorization", format!("Bearer {}", current.access_token))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"session_id": other.session_id}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["deactivated"], 1);

    assert_eq!(
        refresh_status(&app, &other.refresh_token).await,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        refresh_status(&app, &current.refresh_token).await,
        StatusCode::OK
    );
}

#[tokio::test]
async fn revoking_the_current_session_is_rejected() {
    let state = test_state();
    seed_user(&state, "admin@example.com", "hunter2!pass").await;
    let app = auth_router(state);

    let current = login(&app, "admin@example.com", "hunter2!pass").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/auth/sessions")
                .header("authorization", format!("Bearer {}", current.access_token))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"session_id": current.session_id}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn revoking_an_unknown_session_is_not_found() {
    let state = test_state();
    seed_user(&state, "admin@example.com", "hunter2!pass").await;
    let app = auth_router(state);

    let current = login(&app, "admin@example.com", "hunter2!pass").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/auth/sessions")
                .header("authorization", format!("Bearer {}", current.access_token))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"session_id": uuid::Uuid::new_v4()}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn revoking_another_users_session_is_forbidden() {
    let state = test_state();
    seed_user(&state, "admin@example.com", "hunter2!pass").await;
    seed_user(&state, "operator@example.com", "different!pass").await;
    let app = auth_router(state);

    let admin = login(&app, "admin@example.com", "hunter2!pass").await;
    let operator = login(&app, "operator@example.com", "different!pass").await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/api/auth/sessions")
                .header("authorization", format!("Bearer {}", admin.access_token))
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"session_id": operator.session_id}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn revoke_all_signs_out_every_device() {
    let state = test_state();
    seed_user(&state, "admin@example.com", "hunter2!pass").await;
    let app = auth_router(state);

    let first = login(&app, "admin@example.com", "hunter2!pass").await;
    let second = login(&app, "admin@example.com", "hunter2!pass").await;

    let response = app
        .clone()
        .oneshot(bearer_request(
            "DELETE",
            "/api/auth/sessions/all",
            &first.access_token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookies(&response);
    assert!(cookies.iter().any(|c| c.starts_with("atoken=;")));
    let body = body_json(response).await;
    assert_eq!(body["data"]["deactivated"], 2);

    for token in [&first.refresh_token, &second.refresh_token] {
        assert_eq!(
            refresh_status(&app, token).await,
            StatusCode::UNAUTHORIZED
        );
    }
}

#[tokio::test]
async fn revoke_others_spares_the_current_device() {
    let state = test_state();
    seed_user(&state, "admin@example.com", "hunter2!pass").await;
    let app = auth_router(state);

    let current = login(&app, "admin@example.com", "hunter2!pass").await;
    let second = login(&app, "admin@example.com", "hunter2!pass").await;
    let third = login(&app, "admin@example.com", "hunter2!pass").await;

    let response = app
        .clone()
        .oneshot(bearer_request(
            "DELETE",
            "/api/auth/sessions/others",
            &current.access_token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["deactivated"], 2);

    assert_eq!(
        refresh_status(&app, &current.refresh_token).await,
        StatusCode::OK
    );
    for token in [&second.refresh_token, &third.refresh_token] {
        assert_eq!(
            refresh_status(&app, token).await,
            StatusCode::UNAUTHORIZED
        );
    }
}
