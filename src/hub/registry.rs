//! Session registry: in-memory presence store.
//!
//! One entry per connection identity (DashMap for concurrent access). The
//! registry owns all session records; callers trigger broadcasts. Policy:
//! a hard disconnect removes the entry, the idle reaper only flips
//! `online` so past messages keep their attribution.

use axum::{extract::State, Json};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::error::HubError;
use crate::state::AppState;

/// Fields a client supplies on join. Only the handle is mandatory.
#[derive(Debug, Clone, Default)]
pub struct JoinInfo {
    pub name: Option<String>,
    pub handle: Option<String>,
    pub avatar: Option<String>,
}

/// Full session record. Owned exclusively by the registry.
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: String,
    pub name: String,
    pub handle: String,
    pub avatar: String,
    pub joined_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub online: bool,
}

impl Session {
    pub fn public(&self) -> PublicSession {
        PublicSession {
            name: self.name.clone(),
            handle: self.handle.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

/// Public view of a session, safe to hand to every client.
#[derive(Debug, Clone, Serialize)]
pub struct PublicSession {
    pub name: String,
    pub handle: String,
    pub avatar: String,
}

/// Generated avatar URL when the client supplies none.
fn default_avatar(name: &str) -> String {
    format!(
        "https://ui-avatars.com/api/?name={}&background=00A859&color=fff",
        name.replace(' ', "+")
    )
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Create (or replace) the session for a connection identity.
    /// Fails when the handle is absent or empty after trimming; name and
    /// avatar are defaulted when omitted.
    pub fn register(&self, identity: &str, info: JoinInfo) -> Result<Session, HubError> {
        let handle = info
            .handle
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        if handle.is_empty() {
            return Err(HubError::MissingHandle);
        }

        let name = info
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| handle.trim_start_matches('@').to_string());
        let avatar = info
            .avatar
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| default_avatar(&name));

        let now = Utc::now();
        let session = Session {
            identity: identity.to_string(),
            name,
            handle,
            avatar,
            joined_at: now,
            last_active: now,
            online: true,
        };
        self.sessions.insert(identity.to_string(), session.clone());
        Ok(session)
    }

    /// Refresh the idle clock. A missing identity is a no-op: activity can
    /// race a disconnect and must not crash.
    pub fn touch(&self, identity: &str) {
        if let Some(mut session) = self.sessions.get_mut(identity) {
            session.last_active = Utc::now();
        }
    }

    pub fn get(&self, identity: &str) -> Option<Session> {
        self.sessions.get(identity).map(|s| s.value().clone())
    }

    /// Flip a session offline, returning the prior record for the departure
    /// notice. Idempotent: an already-offline or unknown identity yields
    /// `None`, so callers emit at most one departure per session.
    pub fn mark_offline(&self, identity: &str) -> Option<Session> {
        let mut session = self.sessions.get_mut(identity)?;
        if !session.online {
            return None;
        }
        let prior = session.clone();
        session.online = false;
        Some(prior)
    }

    /// Delete the entry entirely. Used by hard disconnect only.
    pub fn remove(&self, identity: &str) -> Option<Session> {
        self.sessions.remove(identity).map(|(_, session)| session)
    }

    /// Public views of every online session. Order is stable within one
    /// call but otherwise unspecified.
    pub fn snapshot_roster(&self) -> Vec<PublicSession> {
        self.sessions
            .iter()
            .filter(|entry| entry.value().online)
            .map(|entry| entry.value().public())
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.sessions
            .iter()
            .filter(|entry| entry.value().online)
            .count()
    }

    /// Flip every online session idle for longer than `timeout` offline,
    /// returning the prior records. `now` is a parameter so sweeps are
    /// directly testable.
    pub fn sweep_idle(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<Session> {
        let mut reaped = Vec::new();
        for mut entry in self.sessions.iter_mut() {
            if entry.online && now - entry.last_active > timeout {
                reaped.push(entry.clone());
                entry.online = false;
            }
        }
        reaped
    }
}

// --- REST endpoint handlers ---

/// GET /api/roster — Public views of everyone currently online.
pub async fn get_roster(State(state): State<AppState>) -> Json<Vec<PublicSession>> {
    Json(state.registry.snapshot_roster())
}
