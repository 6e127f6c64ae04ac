//! Append-only, size-bounded message log with like-tracking.
//!
//! Trimming is batched: when an append pushes the log past its bound, the
//! head is cut down to the floor in one drain rather than one entry per
//! append. The just-appended message is never trimmed (floor >= 1).

use std::collections::{HashSet, VecDeque};

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HubError, MAX_MESSAGE_LENGTH};
use crate::hub::registry::Session;
use crate::state::AppState;

/// Default page size for message history.
const DEFAULT_LIMIT: u32 = 50;
/// Maximum page size for message history.
const MAX_LIMIT: u32 = 100;

/// Display identity stamped on server-generated messages.
const SYSTEM_NAME: &str = "Agora";
const SYSTEM_HANDLE: &str = "@agora";
const SYSTEM_AVATAR: &str = "https://ui-avatars.com/api/?name=Agora&background=1DA1F2&color=fff";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageKind {
    User,
    System,
    VoteNotice,
}

/// One log entry. Display fields are copied from the session at creation
/// time, so the entry stays valid after the sender disconnects.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub kind: MessageKind,
    /// Originating connection identity; `None` for server-generated entries.
    pub sender: Option<String>,
    pub name: String,
    pub handle: String,
    pub avatar: String,
    pub text: String,
    /// Formatted HH:MM wall-clock time (UTC).
    pub time: String,
    /// Millisecond timestamp.
    pub timestamp: u64,
    pub likes: u32,
    #[serde(skip)]
    pub liked_by: HashSet<String>,
}

impl ChatMessage {
    fn build(kind: MessageKind, sender: Option<String>, name: &str, handle: &str, avatar: &str, text: String) -> Self {
        let now = Utc::now();
        Self {
            id: format!("msg_{}", Uuid::new_v4()),
            kind,
            sender,
            name: name.to_string(),
            handle: handle.to_string(),
            avatar: avatar.to_string(),
            text,
            time: now.format("%H:%M").to_string(),
            timestamp: now.timestamp_millis() as u64,
            likes: 0,
            liked_by: HashSet::new(),
        }
    }

    /// A chat message from a registered session. The text must already be
    /// validated.
    pub fn user(session: &Session, text: String) -> Self {
        Self::build(
            MessageKind::User,
            Some(session.identity.clone()),
            &session.name,
            &session.handle,
            &session.avatar,
            text,
        )
    }

    /// A server-generated announcement (joins, resets).
    pub fn system(text: String) -> Self {
        Self::build(
            MessageKind::System,
            None,
            SYSTEM_NAME,
            SYSTEM_HANDLE,
            SYSTEM_AVATAR,
            text,
        )
    }

    /// A vote announcement attributed to the voting session.
    pub fn vote_notice(session: &Session, option: &str) -> Self {
        Self::build(
            MessageKind::VoteNotice,
            Some(session.identity.clone()),
            &session.name,
            &session.handle,
            &session.avatar,
            format!("{} voted for {}", session.handle, option),
        )
    }
}

/// Trim and bounds-check chat text. Returns the trimmed text.
pub fn validate_text(text: &str) -> Result<String, HubError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(HubError::EmptyMessage);
    }
    if trimmed.chars().count() > MAX_MESSAGE_LENGTH {
        return Err(HubError::MessageTooLong);
    }
    Ok(trimmed.to_string())
}

pub struct MessageLog {
    messages: Mutex<VecDeque<ChatMessage>>,
    /// Bound B: appends past this length trigger a trim.
    limit: usize,
    /// Floor F <= B: the length trimmed down to, in one batch.
    floor: usize,
}

impl MessageLog {
    pub fn new(limit: usize, floor: usize) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            limit: limit.max(1),
            floor: floor.clamp(1, limit.max(1)),
        }
    }

    /// Append to the tail, batch-trimming the head when the bound is
    /// exceeded.
    pub fn append(&self, message: ChatMessage) {
        let mut messages = self.messages.lock();
        messages.push_back(message);
        if messages.len() > self.limit {
            let excess = messages.len() - self.floor;
            messages.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// The most recent `n` messages, oldest first.
    pub fn tail(&self, n: usize) -> Vec<ChatMessage> {
        let messages = self.messages.lock();
        let skip = messages.len().saturating_sub(n);
        messages.iter().skip(skip).cloned().collect()
    }

    pub fn find(&self, id: &str) -> Option<ChatMessage> {
        self.messages.lock().iter().find(|m| m.id == id).cloned()
    }

    /// Record a like. Idempotent per (message, identity): a repeat like
    /// reports the unchanged count with `was_already_liked = true`. Unknown
    /// ids yield `None`.
    pub fn like(&self, id: &str, identity: &str) -> Option<(u32, bool)> {
        let mut messages = self.messages.lock();
        let message = messages.iter_mut().find(|m| m.id == id)?;
        if message.liked_by.insert(identity.to_string()) {
            message.likes += 1;
            Some((message.likes, false))
        } else {
            Some((message.likes, true))
        }
    }

    /// One page of history, newest first. Returns the page and the total
    /// log length.
    pub fn page(&self, offset: usize, limit: usize) -> (Vec<ChatMessage>, usize) {
        let messages = self.messages.lock();
        let page = messages
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        (page, messages.len())
    }
}

// --- REST endpoint handlers ---

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub offset: Option<usize>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
    pub total: usize,
    pub has_more: bool,
}

/// GET /api/messages?offset={n}&limit={n}
/// Paginated reverse-chronological message history.
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Json<HistoryResponse> {
    let offset = query.offset.unwrap_or(0);
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT) as usize;

    let (messages, total) = state.log.page(offset, limit);
    let has_more = offset + messages.len() < total;

    Json(HistoryResponse {
        messages,
        total,
        has_more,
    })
}
