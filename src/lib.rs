//! wattguard -- power-consumption anomaly detection.
//!
//! An offline trainer fits an isolation forest on synthetic power readings and
//! writes it to disk; an HTTP service loads that artifact once at startup and
//! scores individual readings on request.

pub mod api;
pub mod config;
pub mod detect;
pub mod model;
pub mod training;

use anyhow::{Context, Result};

use crate::config::{LoggingConfig, WattguardConfig};

/// Install the global tracing subscriber. `RUST_LOG` overrides `cfg.level`.
pub fn init_tracing(cfg: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if cfg.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Start the inference service: load the model (or degrade), then serve HTTP.
pub async fn serve(config: &WattguardConfig) -> Result<()> {
    let state = api::state::AppState::load(&config.model.path);
    if !state.is_ready() {
        tracing::warn!("serving in degraded mode: /health reports 500, analysis returns 503");
    }

    let addr: std::net::SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address: {}", config.server.bind))?;
    let app = api::router(state);

    tracing::info!(%addr, "wattguard listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
