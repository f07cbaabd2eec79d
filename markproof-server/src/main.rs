//! MarkProof Server - REST API for invisible image watermarking
//!
//! Exposes markproof-core functionality via HTTP endpoints:
//! - POST /embed - Embed a bit payload into an uploaded image
//! - POST /extract - Decode the payload from an uploaded image

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use markproof_core::{DecoderService, FeatureExtractor};
use markproof_server::{create_router_with_state, AppState, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "markproof_server=info,markproof_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = Config::from_env();

    // Artifacts are loaded once; the service refuses to start without them.
    let decoder = match FeatureExtractor::new(config.embed_strength, config.frame_edge)
        .and_then(|extractor| {
            DecoderService::load_with(&config.model_path, &config.scaler_path, extractor)
        }) {
        Ok(decoder) => Arc::new(decoder),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load decoder artifacts");
            return ExitCode::FAILURE;
        }
    };

    let state = match AppState::new(&config, Some(decoder)) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Invalid server configuration");
            return ExitCode::FAILURE;
        }
    };

    let app = create_router_with_state(&config, state);
    let addr = config.socket_addr();

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        %addr,
        version = env!("CARGO_PKG_VERSION"),
        "MarkProof Watermark API listening"
    );

    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Err(e) = served {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
