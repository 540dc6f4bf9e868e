//! IP-keyed rate limiting for the public auth endpoints (login, refresh,
//! forgot-password), which accept credentials without an authenticated
//! context and are the natural brute-force target.

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode};
use governor::middleware::StateInformationMiddleware;
use std::sync::Arc;
use std::time::Duration;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::PeerIpKeyExtractor, GovernorError,
    GovernorLayer,
};

use crate::config::Config;
use crate::response::ApiResponse;

pub fn create_auth_rate_limiter(
    config: &Config,
) -> GovernorLayer<PeerIpKeyExtractor, StateInformationMiddleware, Body> {
    let burst_size = config.rate_limit_burst.max(1);
    let window_seconds = config.rate_limit_window_seconds.max(1);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .period(Duration::from_secs(window_seconds))
            .burst_size(burst_size)
            .key_extractor(PeerIpKeyExtractor)
            .use_headers()
            .finish()
            .expect("rate limiter config should be valid"),
    );

    GovernorLayer::new(governor_conf).error_handler(rate_limit_error_handler)
}

fn rate_limit_error_handler(error: GovernorError) -> Response<Body> {
    match error {
        GovernorError::TooManyRequests { wait_time, headers } => {
            tracing::warn!(wait_time, "Rate limit exceeded");
            let mut response = envelope_response(
                StatusCode::TOO_MANY_REQUESTS,
                "Too many requests. Please try again later.",
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
        GovernorError::UnableToExtractKey => envelope_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Unable to determine request identity.",
        ),
        GovernorError::Other { code, msg, headers } => {
            let mut response = envelope_response(
                code,
                &msg.unwrap_or_else(|| "Rate limit error".to_string()),
            );
            if let Some(headers) = headers {
                response.headers_mut().extend(headers);
            }
            response
        }
    }
}

fn envelope_response(status: StatusCode, message: &str) -> Response<Body> {
    let body = serde_json::to_string(&ApiResponse::<()>::failure(message))
        .unwrap_or_else(|_| r#"{"success":false,"message":"Rate limit error","data":null}"#.into());
    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
