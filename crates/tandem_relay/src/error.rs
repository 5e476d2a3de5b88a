//! Error types for the relay.

use tandem_protocol::{ClientId, ProtocolError};
use thiserror::Error;

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors that can occur in the relay.
#[derive(Error, Debug)]
pub enum RelayError {
    /// A client sent a message type only the relay may send.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A frame could not be decoded or failed validation.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A frame arrived for a connection the relay does not know.
    #[error("unknown client: {0}")]
    UnknownClient(ClientId),

    /// An `action` claimed another client's id (strict mode only).
    #[error("client id mismatch: connection is {expected}, message claims {actual}")]
    ClientIdMismatch {
        /// The connection's assigned id.
        expected: ClientId,
        /// The id the message carried.
        actual: ClientId,
    },

    /// The connection limit was reached.
    #[error("connection limit of {0} reached")]
    CapacityExceeded(usize),

    /// The relay task has stopped.
    #[error("relay is shut down")]
    Closed,

    /// WebSocket handshake or framing error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RelayError {
    /// Returns true if the error was caused by the client's input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::InvalidRequest(_)
                | RelayError::Protocol(_)
                | RelayError::UnknownClient(_)
                | RelayError::ClientIdMismatch { .. }
        )
    }

    /// Returns true if the error is the relay's own failure.
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            RelayError::CapacityExceeded(_)
                | RelayError::Closed
                | RelayError::WebSocket(_)
                | RelayError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classification() {
        assert!(RelayError::InvalidRequest("init".into()).is_client_error());
        assert!(RelayError::CapacityExceeded(10).is_server_error());
        assert!(!RelayError::Closed.is_client_error());
        assert!(!RelayError::UnknownClient(ClientId::new("x")).is_server_error());
    }

    #[test]
    fn error_display() {
        let err = RelayError::ClientIdMismatch {
            expected: ClientId::new("c1"),
            actual: ClientId::new("c2"),
        };
        let msg = err.to_string();
        assert!(msg.contains("c1"));
        assert!(msg.contains("c2"));
    }
}
