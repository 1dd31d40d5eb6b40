use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use common::CandidateView;

use crate::AppState;

pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/candidates", get(get_candidates))
        .route("/api/ranks", get(get_ranks))
}

// ─── Candidates ───────────────────────────────────────────────────────────────

async fn get_candidates(State(state): State<AppState>) -> Json<Vec<CandidateView>> {
    Json(state.snapshot.read().await.potential_candidates.clone())
}

// ─── Ranks ────────────────────────────────────────────────────────────────────

async fn get_ranks(State(state): State<AppState>) -> Json<Value> {
    let snapshot = state.snapshot.read().await;
    Json(json!({
        "current": snapshot.current,
        "history": snapshot.history,
    }))
}
