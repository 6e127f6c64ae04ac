use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::hub::{log, poll, registry};
use crate::state::AppState;
use crate::ws::handler as ws_handler;

/// Aggregate counters for the read-only query surface.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub online_count: usize,
    pub message_count: usize,
    pub vote_total: u64,
    pub uptime_secs: i64,
    pub server_time: String,
}

/// GET /api/stats — Aggregate stats over the four components, side-effect-free.
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        online_count: state.registry.online_count(),
        message_count: state.log.len(),
        vote_total: state.poll.vote_total(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        server_time: Utc::now().to_rfc3339(),
    })
}

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    // Read-only query surface over the same components as the WS channel
    let api_routes = Router::new()
        .route("/api/stats", get(stats))
        .route("/api/messages", get(log::get_history))
        .route("/api/poll", get(poll::get_poll))
        .route("/api/roster", get(registry::get_roster));

    // Real-time channel
    let ws_routes = Router::new().route("/ws", get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(api_routes)
        .merge(ws_routes)
        .merge(health)
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
