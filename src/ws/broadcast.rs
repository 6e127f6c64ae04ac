//! Best-effort event fanout over the connection registry.
//!
//! Delivery reads the registry at call time; a connection that drops
//! mid-fanout may or may not receive that event. A failed send to one
//! recipient never aborts delivery to the rest and never reaches the
//! caller — failures are counted and logged.

use axum::extract::ws::{CloseFrame, Message};

use super::ConnectionRegistry;
use crate::events::ServerEvent;

/// Serialize an event once for delivery to many recipients.
fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server event");
            None
        }
    }
}

/// Deliver an event to every connected client.
pub fn broadcast_to_all(registry: &ConnectionRegistry, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };

    let mut sent = 0usize;
    let mut failed = 0usize;
    for entry in registry.iter() {
        if entry.value().send(msg.clone()).is_ok() {
            sent += 1;
        } else {
            failed += 1;
        }
    }
    if failed > 0 {
        tracing::debug!(sent, failed, "Broadcast hit closed connections");
    }
}

/// Deliver an event to every connected client except one identity.
pub fn broadcast_to_all_except(
    registry: &ConnectionRegistry,
    identity: &str,
    event: &ServerEvent,
) {
    let Some(msg) = encode(event) else { return };

    let mut failed = 0usize;
    for entry in registry.iter() {
        if entry.key() == identity {
            continue;
        }
        if entry.value().send(msg.clone()).is_err() {
            failed += 1;
        }
    }
    if failed > 0 {
        tracing::debug!(failed, "Broadcast hit closed connections");
    }
}

/// Deliver an event to a single identity, if still connected.
pub fn send_to_one(registry: &ConnectionRegistry, identity: &str, event: &ServerEvent) {
    let Some(msg) = encode(event) else { return };

    if let Some(sender) = registry.get(identity) {
        if sender.value().send(msg).is_err() {
            tracing::debug!(identity, "Send to closed connection dropped");
        }
    }
}

/// Force-close one connection with a WebSocket close frame and drop its
/// sender from the registry. Used by the idle reaper.
pub fn force_close(registry: &ConnectionRegistry, identity: &str, code: u16, reason: &str) {
    if let Some((_, sender)) = registry.remove(identity) {
        let frame = CloseFrame {
            code,
            reason: reason.to_string().into(),
        };
        let _ = sender.send(Message::Close(Some(frame)));
    }
}
