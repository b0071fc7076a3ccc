//! Axum HTTP gateway.
//!
//! Thin boundary over the agent: request validation and normalization, CORS,
//! body limits, localized error payloads, and the share-by-id lookup. All
//! verdict logic lives below this layer.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::http::HeaderValue;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

use crate::agent::FortuneAgent;
use crate::config::Config;
use crate::providers;
use crate::store::{InteractionStore, SqliteStore};
use self::handlers::{
    handle_divine, handle_global_stats, handle_health, handle_root, handle_share,
    handle_user_recent, handle_user_stats, handle_version,
};

/// Maximum request body size (16KB) — the question itself caps at 200 chars.
pub const MAX_BODY_SIZE: usize = 16_384;
/// Whole-request timeout; the only slow step inside is the LLM call, which
/// carries its own shorter timeout.
pub const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Questions longer than this are silently truncated, never rejected.
pub const MAX_QUESTION_CHARS: usize = 200;

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<FortuneAgent>,
    pub store: Arc<dyn InteractionStore>,
    pub config: Arc<Config>,
}

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let cors = if cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/api/v1/version", get(handle_version))
        .route("/api/v1/divine", post(handle_divine))
        .route("/api/v1/share/{share_id}", get(handle_share))
        .route("/api/v1/stats/user", get(handle_user_stats))
        .route("/api/v1/stats/user/recent", get(handle_user_recent))
        .route("/api/v1/stats/global", get(handle_global_stats))
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .with_state(state)
}

/// Wire everything and serve until shutdown.
pub async fn run_gateway(host: &str, port: u16, config: Config) -> Result<()> {
    config.validate()?;

    let provider = providers::create_provider(&config.llm);
    let agent = Arc::new(FortuneAgent::new(provider));
    let store: Arc<dyn InteractionStore> = Arc::new(SqliteStore::open(&config.db_path())?);

    let cors_origins = config.gateway.cors_origins.clone();
    let state = AppState {
        agent,
        store,
        config: Arc::new(config),
    };
    let router = build_router(state, &cors_origins);

    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("gateway listening on http://{host}:{port}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    })
    .await?;

    Ok(())
}
