pub mod routes;
mod snapshot;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::sync::{broadcast::error::RecvError, RwLock};
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use common::{DataMode, Result};
use engine::SchedulerHandle;

pub use snapshot::DashboardSnapshot;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: SchedulerHandle,
    pub data_mode: DataMode,
    /// Latest dashboard state, replayed to new WebSocket clients.
    pub snapshot: Arc<RwLock<DashboardSnapshot>>,
}

impl AppState {
    pub fn new(scheduler: SchedulerHandle, data_mode: DataMode) -> Self {
        Self {
            scheduler,
            data_mode,
            snapshot: Arc::new(RwLock::new(DashboardSnapshot::default())),
        }
    }
}

/// Keep `state.snapshot` in sync with the scheduler's event stream.
pub fn track_events(state: &AppState) -> JoinHandle<()> {
    let mut events = state.scheduler.subscribe_events();
    let snapshot = state.snapshot.clone();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => snapshot.write().await.apply(&event),
                Err(RecvError::Lagged(n)) => warn!(dropped = n, "Dashboard tracker lagged"),
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    Router::new()
        .merge(routes::api_router())
        .merge(routes::ws_router())
        .merge(routes::health_router())
        .merge(routes::static_router())
        .with_state(state)
        .layer(cors)
}

/// Build and run the dashboard server.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(state);

    info!(%addr, "Dashboard listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis::ScanConfig;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use common::{CandidateView, DashboardEvent};
    use engine::ScanScheduler;
    use replay::ReplayGateway;
    use serde_json::Value;
    use tokio::sync::mpsc;
    use tower::ServiceExt;

    fn state() -> (AppState, ScanScheduler) {
        let (alert_tx, _alert_rx) = mpsc::channel(1);
        let (scheduler, handle) =
            ScanScheduler::new(Arc::new(ReplayGateway::new()), ScanConfig::default(), alert_tx)
                .unwrap();
        (AppState::new(handle, DataMode::Replay), scheduler)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let (state, _scheduler) = state();
        let (status, body) = get_json(router(state), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_stopped_scanner() {
        let (state, _scheduler) = state();
        let (_, body) = get_json(router(state), "/status").await;
        assert_eq!(body["scanner"], "stopped");
        assert_eq!(body["mode"], "replay");
        assert_eq!(body["candidates"], 0);
    }

    #[tokio::test]
    async fn candidates_follow_published_events() {
        let (state, _scheduler) = state();
        let tracker = track_events(&state);

        let view = CandidateView {
            symbol: "SOLUSDT".into(),
            price: 150.0,
            total: 25.0,
            volatility_score: 2.0,
            price_change_pct: 1.5,
            first_seen: None,
            last_seen: None,
            daily_count: 1,
        };
        state
            .scheduler
            .events_sender()
            .send(DashboardEvent::Candidates { potential_candidates: vec![view] })
            .unwrap();

        // let the tracker task drain the channel
        for _ in 0..50 {
            if !state.snapshot.read().await.potential_candidates.is_empty() {
                break;
            }
            tokio::task::yield_now().await;
        }
        tracker.abort();

        let (status, body) = get_json(router(state), "/api/candidates").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["symbol"], "SOLUSDT");
        assert_eq!(body[0]["dailyCount"], 1);
    }

    #[tokio::test]
    async fn ranks_start_empty() {
        let (state, _scheduler) = state();
        let (_, body) = get_json(router(state), "/api/ranks").await;
        assert!(body["current"].is_null());
        assert_eq!(body["history"], Value::Array(vec![]));
    }

    #[tokio::test]
    async fn root_serves_dashboard_page() {
        let (state, _scheduler) = state();
        let resp = router(state)
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers()[axum::http::header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("text/html"));
    }

    #[tokio::test]
    async fn unknown_asset_is_not_found() {
        let (state, _scheduler) = state();
        let (status, _) = get_json(router(state), "/missing.js").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
