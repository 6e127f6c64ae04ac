pub mod actor;
pub mod broadcast;
pub mod handler;
pub mod protocol;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Type alias for the sender half of a connection's outbound channel.
/// Other parts of the system clone this to push events to a client; the
/// writer task owned by the connection's actor drains the other half.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Connection registry: one outbound sender per connection identity.
/// Arc<DashMap<Identity, ConnectionSender>>
pub type ConnectionRegistry = Arc<DashMap<String, ConnectionSender>>;

/// Create a new empty connection registry.
pub fn new_connection_registry() -> ConnectionRegistry {
    Arc::new(DashMap::new())
}
