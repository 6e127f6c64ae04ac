//! Actor-per-connection lifecycle.
//!
//! Splits the WebSocket into reader and writer halves:
//! - Writer task: owns the sink, forwards messages from an mpsc channel
//! - Reader task: processes incoming events, dispatches to protocol handlers
//!
//! The mpsc channel allows any part of the system to push events to this
//! client by cloning the sender, so a slow socket never blocks a caller.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::events::ServerEvent;
use crate::state::AppState;
use crate::ws::{broadcast, protocol};

/// Ping interval: server sends a WebSocket ping every 30 seconds to catch
/// abrupt disconnects.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Pong timeout: if no pong arrives within 10 seconds after a ping, close.
const PONG_TIMEOUT: Duration = Duration::from_secs(10);

/// Run the connection actor until the client disconnects.
pub async fn run_connection(socket: WebSocket, state: AppState, identity: String) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Register this connection so fanout can reach it
    state.connections.insert(identity.clone(), tx.clone());

    protocol::send_event(
        &tx,
        &ServerEvent::Welcome {
            server_time: Utc::now().to_rfc3339(),
        },
    );

    tracing::info!(identity = %identity, "Connection actor started");

    // Spawn writer task: forwards mpsc messages to the WebSocket sink
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

    // Spawn ping task: sends periodic pings and monitors pong responses
    let ping_tx = tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(PING_INTERVAL);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                // Writer task has died — connection is gone
                break;
            }

            match timeout(PONG_TIMEOUT, pong_rx.recv()).await {
                Ok(Some(())) => {
                    // Pong received, continue
                }
                _ => {
                    tracing::warn!("Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: 1001,
                        reason: "Pong timeout".into(),
                    })));
                    break;
                }
            }
        }
    });

    // Reader loop: process incoming WebSocket messages
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Text(text) => {
                    protocol::handle_text_message(text.as_str(), &tx, &state, &identity).await;
                }
                Message::Binary(_) => {
                    // The protocol is JSON text; binary frames are ignored
                    tracing::debug!(identity = %identity, "Ignoring binary frame");
                }
                Message::Pong(_) => {
                    let _ = pong_tx.send(());
                }
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Close(frame) => {
                    tracing::info!(identity = %identity, reason = ?frame, "Client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(identity = %identity, error = %e, "WebSocket receive error");
                break;
            }
            None => {
                // Stream ended — client disconnected
                tracing::info!(identity = %identity, "WebSocket stream ended");
                break;
            }
        }
    }

    // Cleanup: abort writer and ping tasks
    writer_handle.abort();
    ping_handle.abort();

    // Stop fanout targeting this identity before announcing departure
    state.connections.remove(&identity);

    // Hard-disconnect policy: drop the registry entry. Announce the
    // departure only when the session was still online (the idle reaper
    // already announced sessions it flipped offline).
    if let Some(session) = state.registry.remove(&identity) {
        if session.online {
            broadcast::broadcast_to_all(
                &state.connections,
                &ServerEvent::UserLeft {
                    user: session.public(),
                    online_count: state.registry.online_count(),
                    timestamp: Utc::now().to_rfc3339(),
                },
            );
        }
    }

    tracing::info!(identity = %identity, "Connection actor stopped");
}

/// Writer task: receives messages from the mpsc channel and forwards them
/// to the WebSocket sink.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            // WebSocket send failed — connection is broken
            break;
        }
    }
}
