use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/status", get(status))
}

/// Liveness probe.
async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let scanner = state.scheduler.state().await;
    let snapshot = state.snapshot.read().await;
    Json(json!({
        "scanner": scanner.to_string(),
        "mode": state.data_mode.to_string(),
        "candidates": snapshot.potential_candidates.len(),
        "lastLog": snapshot.last_log,
    }))
}
