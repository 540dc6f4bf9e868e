use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{delete, get, post},
    Json, Router,
};
use std::net::SocketAddr;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;

use shardview_backend::{
    config::Config,
    db::connection::create_pool,
    docs::ApiDoc,
    handlers,
    middleware::{auth as auth_middleware, rate_limit::create_auth_rate_limiter},
    state::AppState,
};

fn mask_secret(s: &str) -> String {
    if s.is_empty() {
        return "<empty>".into();
    }
    let prefix = s.chars().take(4).collect::<String>();
    format!("{}*** (len={})", prefix, s.len())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shardview_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        jwt_secret = %mask_secret(&config.jwt_secret),
        access_token_ttl_minutes = config.access_token_ttl_minutes,
        refresh_token_ttl_days = config.refresh_token_ttl_days,
        session_ttl_days = config.session_ttl_days,
        store_backend = %config.store_backend,
        "Loaded configuration from environment/.env"
    );

    // Wire stores, codec, and the session manager
    let state = if config.store_backend == "memory" {
        tracing::warn!("Using in-memory stores; sessions will not survive a restart");
        AppState::with_memory(config.clone())?
    } else {
        let pool = create_pool(&config.database_url, config.db_acquire_timeout_seconds).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        AppState::with_postgres(config.clone(), pool)?
    };

    // Public routes (no auth); these accept credentials, so they carry the
    // IP rate limiter when enabled
    let mut public_routes = Router::new()
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
    if config.rate_limit_enabled {
        public_routes = public_routes.layer(create_auth_rate_limiter(&config));
    }

    // Protected routes (access token required)
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

    let docs_routes: Router<AppState> = Router::new().route(
        "/api/docs/openapi.json",
        get(|| async { Json(ApiDoc::openapi()) }),
    );

    // Compose app with shared layers (CORS/Trace) and shared state
    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .merge(docs_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::DELETE,
                            Method::OPTIONS,
                        ])
                        .allow_headers(Any)
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
