//! reactormonitor -- fault detection and diagnosis timing for Tennessee
//! Eastman reactor replays.
//!
//! This crate provides the timing evaluator, replay data sources, the
//! single-reading fault classifier, and the HTTP service that exposes them.

pub mod api;
pub mod config;
pub mod detect;
pub mod inference;
pub mod replay;

use anyhow::{Context, Result};

/// Start the HTTP service: `/`, `/health`, `/predict`, `/evaluate`.
pub async fn serve(config: &config::MonitorConfig) -> Result<()> {
    // 1. Load model artefacts and validate evaluator parameters
    let state = api::state::AppState::from_config(config)?;
    tracing::info!(
        model_loaded = state.pipeline.model_loaded(),
        scaler_loaded = state.pipeline.scaler_loaded(),
        "prediction pipeline ready"
    );

    // 2. Start API server
    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;
    let app = api::router(state);

    tracing::info!(%addr, "reactormonitor listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
