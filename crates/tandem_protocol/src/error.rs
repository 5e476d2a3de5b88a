//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors raised while encoding, decoding or validating wire messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The frame is not valid JSON for the expected message shape.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// A client id was empty.
    #[error("empty client id in {0} message")]
    EmptyClientId(&'static str),

    /// An action entry carried an empty id.
    #[error("action entry at index {index} has an empty id")]
    EmptyEntryId {
        /// Position of the entry in the batch.
        index: usize,
    },

    /// Two entries in one batch share an id.
    #[error("duplicate action entry id {0:?}")]
    DuplicateEntryId(String),

    /// An `init` message does not list the receiving client in its presence map.
    #[error("init presence does not contain client {0}")]
    MissingSelf(String),

    /// A presence record is stored under a key that differs from its id.
    #[error("presence key {key} does not match record id {id}")]
    PresenceKeyMismatch {
        /// Map key.
        key: String,
        /// Record id.
        id: String,
    },
}

/// Failure reported by a domain state machine.
///
/// A domain returns this when an action cannot be applied to the given
/// state (unknown entity, out-of-range position, ...).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("domain rejected action: {message}")]
pub struct DomainError {
    message: String,
}

impl DomainError {
    /// Creates a new domain error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
