mod routes;
mod state;

use anyhow::{Context, Result};
use shared::Config;
use signal_engine::engine::SignalEngine;
use signal_engine::risk::PositionSizer;
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::state::AppState;

/// Resolves once ctrl-c is received or `stopped` flips to true
async fn wait_for_shutdown(mut stopped: watch::Receiver<bool>) {
    while !*stopped.borrow() {
        if stopped.changed().await.is_err() {
            return;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into())
        )
        .init();

    info!("Starting GenX signal service...");

    let config = Config::from_env()?;
    info!(
        "Symbols: {:?}, timeframe {}, provider {:?}",
        config.trading.symbols, config.trading.primary_timeframe, config.provider
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown requested");
        }
        let _ = stop_tx.send(true);
    });

    let mut engine = SignalEngine::from_config(&config)?;
    engine.start().await.context("starting signal engine")?;
    let (handle, engine_task) = engine.spawn(wait_for_shutdown(stop_rx.clone()));

    let state = AppState::new(handle, PositionSizer::new(config.risk.clone()));
    let app = routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.server.bind_addr))?;
    info!("API server listening on http://{}", config.server.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(stop_rx))
        .await?;

    match engine_task.await {
        Ok(Ok(())) => info!("Signal engine stopped"),
        Ok(Err(e)) => error!("Signal engine failed: {:#}", e),
        Err(e) => error!("Signal engine task panicked: {}", e),
    }

    Ok(())
}
