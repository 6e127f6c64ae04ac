//! WebSocket upgrade endpoint.

use axum::{
    extract::{ws::WebSocket, State, WebSocketUpgrade},
    response::Response,
};
use uuid::Uuid;

use crate::state::AppState;
use crate::ws::actor;

/// GET /ws
/// Upgrades the connection and spawns an actor for it. Each connection gets
/// a fresh opaque identity; presence starts only once the client joins.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let identity = Uuid::new_v4().to_string();
    ws.on_upgrade(move |socket| handle_connection(socket, state, identity))
}

async fn handle_connection(socket: WebSocket, state: AppState, identity: String) {
    actor::run_connection(socket, state, identity).await;
}
