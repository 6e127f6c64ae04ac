//! Wire-level event types for the per-connection message channel.
//!
//! Closed tagged-variant enums on both directions: every inbound and
//! outbound event is a named variant with explicit fields, serialized as
//! JSON with a camelCase `type` tag.

use serde::{Deserialize, Serialize};

use crate::hub::log::ChatMessage;
use crate::hub::poll::PollState;
use crate::hub::registry::PublicSession;

/// Events a client may send over its connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Enter the hub. The handle is required; name and avatar are defaulted
    /// when omitted.
    #[serde(rename_all = "camelCase")]
    Join {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        handle: Option<String>,
        #[serde(default)]
        avatar: Option<String>,
    },

    /// Post a chat message.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        #[serde(default)]
        text: String,
    },

    /// Cast or switch a poll vote.
    #[serde(rename_all = "camelCase")]
    Vote { option: String },

    /// Like a message. Repeat likes are a no-op.
    #[serde(rename_all = "camelCase")]
    LikeMessage { message_id: String },

    /// Typing indicator, relayed to everyone else.
    Typing,

    /// Liveness signal; refreshes the idle clock.
    Heartbeat,

    /// Restore the poll to its seeded baseline. Requires the configured
    /// reset key.
    #[serde(rename_all = "camelCase")]
    ResetPoll {
        #[serde(default)]
        key: Option<String>,
    },
}

/// Events the server emits to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// First event on every connection, before join.
    #[serde(rename_all = "camelCase")]
    Welcome { server_time: String },

    /// Joined-computed snapshot, delivered to the joining connection only.
    #[serde(rename_all = "camelCase")]
    InitialSnapshot {
        poll: PollState,
        recent_messages: Vec<ChatMessage>,
        roster: Vec<PublicSession>,
        online_count: usize,
        server_time: String,
    },

    #[serde(rename_all = "camelCase")]
    UserJoined {
        user: PublicSession,
        online_count: usize,
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    UserLeft {
        user: PublicSession,
        online_count: usize,
        timestamp: String,
    },

    #[serde(rename_all = "camelCase")]
    NewMessage { message: ChatMessage },

    /// Acknowledgement to the sender of a stored message.
    #[serde(rename_all = "camelCase")]
    MessageSent { id: String, timestamp: u64 },

    #[serde(rename_all = "camelCase")]
    PollUpdate { poll: PollState },

    #[serde(rename_all = "camelCase")]
    MessageLiked { message_id: String, like_count: u32 },

    #[serde(rename_all = "camelCase")]
    UserTyping { handle: String },

    #[serde(rename_all = "camelCase")]
    HeartbeatAck { server_time: String },

    /// Structured failure reply, sent to the originating connection only.
    #[serde(rename_all = "camelCase")]
    Error { kind: String, reason: String },
}

impl ServerEvent {
    /// Build an `error` event from a hub error.
    pub fn from_error(err: &crate::error::HubError) -> Self {
        ServerEvent::Error {
            kind: err.kind().to_string(),
            reason: err.to_string(),
        }
    }
}
