//! Error types for the sync engine.

use tandem_protocol::{DomainError, ProtocolError};
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur in the client engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A frame could not be decoded or failed validation.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The domain rejected a locally dispatched action.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// An action or selection was dispatched before the relay sent `init`.
    ///
    /// This is a caller bug: gate dispatches on `connected()`.
    #[error("dispatch before init: wait until the client is connected")]
    NotInitialized,

    /// A message arrived that is not valid in the current state.
    #[error("unexpected {0} message")]
    OutOfSequence(&'static str),

    /// The client driver has shut down.
    #[error("client is shut down")]
    Closed,
}

impl EngineError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
