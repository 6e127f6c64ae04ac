//! Background idle-session reaper.
//!
//! Spawns a tokio task that periodically sweeps the session registry and
//! flips sessions offline once their idle time passes the timeout. The
//! reaper never removes registry entries; it tears down presence, fanout
//! reachability, and the socket, and the entry itself is dropped only by
//! the disconnect path once the closed socket unwinds.

use chrono::{Duration, Utc};

use crate::events::ServerEvent;
use crate::state::AppState;
use crate::ws::broadcast;

/// WebSocket close code sent to reaped connections.
const CLOSE_IDLE_TIMEOUT: u16 = 4008;

/// Spawn the periodic sweep task.
///
/// Runs `reap_idle` every `interval_secs` seconds against a
/// `timeout_secs` idle limit. Logs the number of reaped sessions each
/// cycle.
pub fn spawn_idle_reaper(state: AppState, interval_secs: u64, timeout_secs: u64) {
    let interval = std::time::Duration::from_secs(interval_secs);
    let timeout = Duration::seconds(timeout_secs as i64);

    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            let reaped = reap_idle(&state, timeout);
            if reaped > 0 {
                tracing::info!(reaped, "Idle reaper: sessions marked offline");
            } else {
                tracing::debug!("Idle reaper: nothing to do");
            }
        }
    });
}

/// One sweep: mark idle sessions offline, close their sockets, and announce
/// each departure. Returns the number of sessions reaped. Safe to run
/// concurrently with connect/message/vote/disconnect handling.
pub fn reap_idle(state: &AppState, timeout: Duration) -> usize {
    let now = Utc::now();
    let reaped = state.registry.sweep_idle(now, timeout);

    for session in &reaped {
        // Stop fanout to the evicted identity, then close its socket
        broadcast::force_close(
            &state.connections,
            &session.identity,
            CLOSE_IDLE_TIMEOUT,
            "Idle timeout",
        );

        broadcast::broadcast_to_all(
            &state.connections,
            &ServerEvent::UserLeft {
                user: session.public(),
                online_count: state.registry.online_count(),
                timestamp: now.to_rfc3339(),
            },
        );
    }

    reaped.len()
}
