//! Error taxonomy for the hub core.
//!
//! None of these are fatal: every variant is answered to the originating
//! connection as a structured `error` event and the connection stays open.

use thiserror::Error;

/// Maximum chat message length in characters, after trimming.
pub const MAX_MESSAGE_LENGTH: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    /// Join payload without a usable handle.
    #[error("a non-empty handle is required to join")]
    MissingHandle,

    /// Empty chat message after trimming.
    #[error("message text must not be empty")]
    EmptyMessage,

    /// Chat message over the length bound.
    #[error("message text exceeds {MAX_MESSAGE_LENGTH} characters")]
    MessageTooLong,

    /// Action attempted on a connection that has not joined.
    #[error("join before sending messages, votes or likes")]
    NotRegistered,

    /// Re-vote for the option the identity already holds.
    #[error("already voted for \"{0}\"")]
    DuplicateVote(String),

    /// Vote for a label the poll does not recognize.
    #[error("unknown poll option \"{0}\"")]
    InvalidOption(String),

    /// Poll reset without the configured capability key.
    #[error("poll reset requires a valid reset key")]
    NotAuthorized,
}

impl HubError {
    /// Wire-level error kind carried in the outbound `error` event.
    pub fn kind(&self) -> &'static str {
        match self {
            HubError::MissingHandle => "invalidInput",
            HubError::EmptyMessage | HubError::MessageTooLong => "validationError",
            HubError::NotRegistered => "notRegistered",
            HubError::DuplicateVote(_) => "duplicateVote",
            HubError::InvalidOption(_) => "invalidOption",
            HubError::NotAuthorized => "notAuthorized",
        }
    }
}
