use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use common::DashboardEvent;

use crate::AppState;

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// Streams `DashboardEvent`s as JSON text frames.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    // Subscribe before reading the snapshot so nothing falls between the two.
    let events_rx = state.scheduler.subscribe_events();
    let backlog = state.snapshot.read().await.replay();
    ws.on_upgrade(move |socket| handle_ws(socket, events_rx, backlog))
}

async fn handle_ws(
    mut socket: WebSocket,
    mut events_rx: broadcast::Receiver<DashboardEvent>,
    backlog: Vec<DashboardEvent>,
) {
    for event in &backlog {
        if send_event(&mut socket, event).await.is_err() {
            return;
        }
    }

    loop {
        match events_rx.recv().await {
            Ok(event) => {
                if send_event(&mut socket, &event).await.is_err() {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                warn!(dropped = n, "WebSocket dashboard client lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
    debug!("WebSocket dashboard client disconnected");
}

async fn send_event(socket: &mut WebSocket, event: &DashboardEvent) -> Result<(), ()> {
    let text = match serde_json::to_string(event) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Failed to encode dashboard event");
            return Ok(());
        }
    };
    socket.send(Message::Text(text)).await.map_err(|_| ())
}
