//! Shared application state passed to all handlers via the axum State
//! extractor.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::config::Config;
use crate::hub::log::MessageLog;
use crate::hub::poll::PollLedger;
use crate::hub::registry::SessionRegistry;
use crate::ws::{new_connection_registry, ConnectionRegistry};

#[derive(Clone)]
pub struct AppState {
    /// Session registry: presence records per connection identity
    pub registry: Arc<SessionRegistry>,
    /// Bounded chat/system/vote message log
    pub log: Arc<MessageLog>,
    /// Poll tallies and vote records
    pub poll: Arc<PollLedger>,
    /// Outbound sender per active connection
    pub connections: ConnectionRegistry,
    /// Process start, for the stats endpoint
    pub started_at: DateTime<Utc>,
    /// How many recent messages the join snapshot carries
    pub snapshot_tail: usize,
    /// Capability key gating poll reset; `None` disables reset
    pub poll_reset_key: Option<String>,
}

impl AppState {
    /// Build the four components from config.
    pub fn new(config: &Config) -> Self {
        let chat = config.chat.clone().unwrap_or_default();
        let poll = config.poll.clone().unwrap_or_default();

        Self {
            registry: Arc::new(SessionRegistry::new()),
            log: Arc::new(MessageLog::new(chat.history_limit, chat.history_floor)),
            poll: Arc::new(PollLedger::new(vec![
                (poll.option_a, poll.seed_a),
                (poll.option_b, poll.seed_b),
            ])),
            connections: new_connection_registry(),
            started_at: Utc::now(),
            snapshot_tail: chat.snapshot_tail,
            poll_reset_key: poll.reset_key,
        }
    }
}
