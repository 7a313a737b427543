use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use signal_engine::output::SignalSnapshot;
use signal_engine::risk::PortfolioExposure;
use shared::Signal;
use tracing::warn;

use crate::state::AppState;

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/signals", get(list_signals))
        .route("/signals/generate", post(generate_signals))
        .route("/signals/:symbol", get(get_signal))
        .route("/portfolio", get(portfolio))
        .route("/status", get(status))
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "git_hash": option_env!("GIT_HASH").filter(|h| !h.is_empty()).unwrap_or("unknown"),
    }))
}

async fn list_signals(State(state): State<AppState>) -> Json<SignalSnapshot> {
    let snapshot = state.engine.snapshot();
    Json(SignalSnapshot {
        total_count: snapshot.signals.len(),
        signals: snapshot.signals,
        last_updated: snapshot.last_cycle.unwrap_or_else(Utc::now),
    })
}

async fn get_signal(State(state): State<AppState>, Path(symbol): Path<String>) -> Result<Json<Signal>, ApiError> {
    state
        .engine
        .snapshot()
        .signal(&symbol)
        .cloned()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("no signal for {}", symbol.to_uppercase())))
}

#[derive(Debug, Default, Deserialize)]
struct GenerateRequest {
    #[serde(default)]
    symbols: Option<Vec<String>>,
}

async fn generate_signals(
    State(state): State<AppState>,
    body: Option<Json<GenerateRequest>>,
) -> Result<Json<Value>, ApiError> {
    let symbols = body.and_then(|Json(req)| req.symbols).unwrap_or_default();
    match state.engine.generate(symbols).await {
        Ok(signals) => Ok(Json(json!({
            "total_count": signals.len(),
            "signals": signals,
        }))),
        Err(e) => {
            warn!("Forced generation failed: {:#}", e);
            Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

async fn portfolio(State(state): State<AppState>) -> Json<PortfolioExposure> {
    let snapshot = state.engine.snapshot();
    Json(state.sizer.exposure(&snapshot.signals))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.engine.snapshot();
    Json(json!({
        "provider": snapshot.provider,
        "connected": snapshot.connected,
        "running": snapshot.running,
        "cycles": snapshot.cycles,
        "last_cycle": snapshot.last_cycle,
        "last_error": snapshot.last_error,
        "signal_count": snapshot.signals.len(),
        "uptime_secs": (Utc::now() - state.started_at).num_seconds(),
    }))
}
