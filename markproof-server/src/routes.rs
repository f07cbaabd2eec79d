//! Router configuration module
//!
//! Configures all routes, middleware layers, and creates the application router.

use std::{sync::Arc, time::Duration};

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use markproof_core::{Embedder, WatermarkError};

use crate::config::Config;
use crate::handlers::{embed_handler, extract_handler, health, ready, root};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Create the application router with default config and no decoder (for testing)
pub fn create_router() -> Router {
    let config = Config::default();
    let state = AppState {
        decoder: None,
        embedder: Embedder::default(),
        max_file_size: config.max_file_size_bytes(),
    };
    create_router_with_state(&config, state)
}

/// Create the application router with custom configuration and no decoder
///
/// `/extract` answers 503 until a router is built with a loaded decoder
/// through [`create_router_with_state`]. Fails when the configured
/// strength or frame edge is invalid.
pub fn create_router_with_config(config: &Config) -> Result<Router, WatermarkError> {
    let state = AppState::new(config, None)?;
    Ok(create_router_with_state(config, state))
}

/// Create the application router around an already-built state
pub fn create_router_with_state(config: &Config, state: AppState) -> Router {
    // Configure CORS based on allowed_origins
    let cors = match &config.allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!("CORS: Restricting to {} origin(s)", origins.len());
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        }
        _ => {
            tracing::warn!("CORS: Allowing all origins (dev mode)");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    };

    // Request body limit
    let body_limit = RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024);

    // Request timeout
    let timeout = TimeoutLayer::with_status_code(
        StatusCode::REQUEST_TIMEOUT,
        Duration::from_secs(config.timeout_secs),
    );

    let router = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/embed", post(embed_handler))
        .route("/extract", post(extract_handler))
        .route("/api-docs/openapi.json", get(openapi_json))
        .with_state(state)
        .layer(cors)
        // Multipart uploads are bounded by `body_limit`, not axum's 2 MB default
        .layer(DefaultBodyLimit::disable())
        .layer(body_limit)
        .layer(timeout)
        .layer(PropagateRequestIdLayer::x_request_id());

    // Conditionally apply rate limiting (disabled in tests, enabled in production)
    let router = if config.rate_limit_enabled {
        let governor_conf = GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_sec)
            .burst_size(config.rate_limit_burst)
            .finish();

        match governor_conf {
            Some(conf) => {
                tracing::info!(
                    "Rate limiting: {} req/s (burst: {})",
                    config.rate_limit_per_sec,
                    config.rate_limit_burst
                );
                router.layer(GovernorLayer::new(Arc::new(conf)))
            }
            None => {
                tracing::error!(
                    per_sec = config.rate_limit_per_sec,
                    burst = config.rate_limit_burst,
                    "Invalid rate limiter settings, rate limiting DISABLED"
                );
                router
            }
        }
    } else {
        tracing::warn!("Rate limiting: DISABLED");
        router
    };

    router
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
