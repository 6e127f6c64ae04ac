//! Inbound event dispatch.
//!
//! Decodes a client event, validates it against the session registry,
//! mutates the message log / poll ledger, and fans the result out. Every
//! failure is answered to the originating connection as a structured
//! `error` event; nothing here is fatal to the connection.

use axum::extract::ws::Message;
use chrono::Utc;
use tokio::sync::mpsc;

use crate::error::HubError;
use crate::events::{ClientEvent, ServerEvent};
use crate::hub::log::{validate_text, ChatMessage};
use crate::hub::registry::{JoinInfo, Session};
use crate::state::AppState;
use crate::ws::broadcast::{broadcast_to_all, broadcast_to_all_except, send_to_one};

/// Handle one incoming text frame.
pub async fn handle_text_message(
    text: &str,
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
    identity: &str,
) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(identity = %identity, error = %e, "Undecodable client event");
            send_event(
                tx,
                &ServerEvent::Error {
                    kind: "invalidPayload".to_string(),
                    reason: "could not decode event".to_string(),
                },
            );
            return;
        }
    };

    match event {
        ClientEvent::Join {
            name,
            handle,
            avatar,
        } => handle_join(tx, state, identity, JoinInfo { name, handle, avatar }),
        ClientEvent::SendMessage { text } => handle_send_message(tx, state, identity, text),
        ClientEvent::Vote { option } => handle_vote(tx, state, identity, &option),
        ClientEvent::LikeMessage { message_id } => {
            handle_like_message(tx, state, identity, &message_id)
        }
        ClientEvent::Typing => handle_typing(tx, state, identity),
        ClientEvent::Heartbeat => handle_heartbeat(tx, state, identity),
        ClientEvent::ResetPoll { key } => handle_reset_poll(tx, state, identity, key.as_deref()),
    }
}

/// Look up the caller's online session; anything else is `NotRegistered`.
fn require_session(state: &AppState, identity: &str) -> Result<Session, HubError> {
    state
        .registry
        .get(identity)
        .filter(|s| s.online)
        .ok_or(HubError::NotRegistered)
}

fn handle_join(
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
    identity: &str,
    info: JoinInfo,
) {
    let session = match state.registry.register(identity, info) {
        Ok(session) => session,
        Err(e) => {
            send_error(tx, &e);
            return;
        }
    };

    // Joined-computed snapshot, to the new connection only
    send_event(
        tx,
        &ServerEvent::InitialSnapshot {
            poll: state.poll.status(),
            recent_messages: state.log.tail(state.snapshot_tail),
            roster: state.registry.snapshot_roster(),
            online_count: state.registry.online_count(),
            server_time: Utc::now().to_rfc3339(),
        },
    );

    // Announce the arrival to everyone else
    broadcast_to_all_except(
        &state.connections,
        identity,
        &ServerEvent::UserJoined {
            user: session.public(),
            online_count: state.registry.online_count(),
            timestamp: Utc::now().to_rfc3339(),
        },
    );

    // System message in the log, fanned out to everyone
    let message = ChatMessage::system(format!("{} joined the chat", session.handle));
    state.log.append(message.clone());
    broadcast_to_all(&state.connections, &ServerEvent::NewMessage { message });

    tracing::info!(identity = %identity, handle = %session.handle, "Session joined");
}

fn handle_send_message(
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
    identity: &str,
    text: String,
) {
    let session = match require_session(state, identity) {
        Ok(session) => session,
        Err(e) => {
            send_error(tx, &e);
            return;
        }
    };

    let text = match validate_text(&text) {
        Ok(text) => text,
        Err(e) => {
            send_error(tx, &e);
            return;
        }
    };

    state.registry.touch(identity);

    let message = ChatMessage::user(&session, text);
    state.log.append(message.clone());

    let id = message.id.clone();
    let timestamp = message.timestamp;
    broadcast_to_all(&state.connections, &ServerEvent::NewMessage { message });

    // Acknowledge to the sender
    send_event(tx, &ServerEvent::MessageSent { id, timestamp });
}

fn handle_vote(
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
    identity: &str,
    option: &str,
) {
    let session = match require_session(state, identity) {
        Ok(session) => session,
        Err(e) => {
            send_error(tx, &e);
            return;
        }
    };

    state.registry.touch(identity);

    let poll = match state.poll.vote(identity, option) {
        Ok(poll) => poll,
        Err(e) => {
            send_error(tx, &e);
            return;
        }
    };

    let message = ChatMessage::vote_notice(&session, option);
    state.log.append(message.clone());
    broadcast_to_all(&state.connections, &ServerEvent::NewMessage { message });
    broadcast_to_all(&state.connections, &ServerEvent::PollUpdate { poll });
}

fn handle_like_message(
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
    identity: &str,
    message_id: &str,
) {
    if let Err(e) = require_session(state, identity) {
        send_error(tx, &e);
        return;
    }

    state.registry.touch(identity);

    match state.log.like(message_id, identity) {
        Some((like_count, false)) => {
            broadcast_to_all(
                &state.connections,
                &ServerEvent::MessageLiked {
                    message_id: message_id.to_string(),
                    like_count,
                },
            );
        }
        Some((like_count, true)) => {
            // Repeat like: report the unchanged count to the caller only
            send_to_one(
                &state.connections,
                identity,
                &ServerEvent::MessageLiked {
                    message_id: message_id.to_string(),
                    like_count,
                },
            );
        }
        None => {
            tracing::debug!(identity = %identity, message_id = %message_id, "Like for unknown message ignored");
        }
    }
}

fn handle_typing(tx: &mpsc::UnboundedSender<Message>, state: &AppState, identity: &str) {
    let session = match require_session(state, identity) {
        Ok(session) => session,
        Err(e) => {
            send_error(tx, &e);
            return;
        }
    };

    state.registry.touch(identity);

    broadcast_to_all_except(
        &state.connections,
        identity,
        &ServerEvent::UserTyping {
            handle: session.handle,
        },
    );
}

fn handle_heartbeat(tx: &mpsc::UnboundedSender<Message>, state: &AppState, identity: &str) {
    // Valid before join too; touch is a no-op for unknown identities
    state.registry.touch(identity);
    send_event(
        tx,
        &ServerEvent::HeartbeatAck {
            server_time: Utc::now().to_rfc3339(),
        },
    );
}

fn handle_reset_poll(
    tx: &mpsc::UnboundedSender<Message>,
    state: &AppState,
    identity: &str,
    key: Option<&str>,
) {
    if let Err(e) = require_session(state, identity) {
        send_error(tx, &e);
        return;
    }

    // Reset is gated behind the configured capability key; with no key
    // configured it is disabled outright.
    let authorized = matches!((state.poll_reset_key.as_deref(), key), (Some(expected), Some(given)) if expected == given);
    if !authorized {
        send_error(tx, &HubError::NotAuthorized);
        return;
    }

    state.registry.touch(identity);

    let poll = state.poll.reset();
    broadcast_to_all(&state.connections, &ServerEvent::PollUpdate { poll });
    tracing::info!(identity = %identity, "Poll reset to seeded baseline");
}

/// Serialize and queue an event on one connection's outbound channel.
pub fn send_event(tx: &mpsc::UnboundedSender<Message>, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(Message::Text(json.into()));
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize server event");
        }
    }
}

/// Answer the originating connection with a structured error event.
fn send_error(tx: &mpsc::UnboundedSender<Message>, err: &HubError) {
    send_event(tx, &ServerEvent::from_error(err));
}
