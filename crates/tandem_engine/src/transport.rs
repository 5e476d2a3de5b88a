//! Transport layer abstraction.
//!
//! A [`Connector`] opens a [`Connection`]: a pair of channels carrying whole
//! text frames. Framing below the message boundary belongs to the connector
//! (WebSocket, in-process, mock for testing, etc.).

use crate::error::{EngineError, EngineResult};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// A live connection to the relay.
///
/// The connection is considered lost once `inbound` yields `None`.
#[derive(Debug)]
pub struct Connection {
    /// Frames to the relay.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Frames from the relay.
    pub inbound: mpsc::UnboundedReceiver<String>,
}

impl Connection {
    /// Creates a connection from its two channel ends.
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self { outbound, inbound }
    }
}

/// Opens connections to the relay.
pub trait Connector: Send + Sync + 'static {
    /// Opens a new connection.
    ///
    /// Retryable errors make the client wait for the reconnect delay and try
    /// again; fatal errors stop it.
    fn connect(&self) -> impl Future<Output = EngineResult<Connection>> + Send;
}

/// The far end of a [`MockConnector`] connection.
#[derive(Debug)]
pub struct RemoteEnd {
    to_client: mpsc::UnboundedSender<String>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl RemoteEnd {
    /// Sends a frame to the client. Returns false once the client is gone.
    pub fn send(&self, frame: impl Into<String>) -> bool {
        self.to_client.send(frame.into()).is_ok()
    }

    /// Waits for the next frame from the client.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }

    /// Returns a frame from the client if one is already waiting.
    pub fn try_recv(&mut self) -> Option<String> {
        self.from_client.try_recv().ok()
    }
}

/// A connector handing out pre-arranged connections, for testing.
#[derive(Debug, Default)]
pub struct MockConnector {
    ready: Mutex<VecDeque<Connection>>,
    attempts: AtomicUsize,
}

impl MockConnector {
    /// Creates a connector with no connections prepared.
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepares the next connection and returns its far end.
    ///
    /// Dropping the returned end simulates transport loss.
    pub fn push_connection(&self) -> RemoteEnd {
        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        self.ready
            .lock()
            .push_back(Connection::new(outbound, inbound));
        RemoteEnd {
            to_client,
            from_client,
        }
    }

    /// Number of `connect` calls so far.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Connector for MockConnector {
    async fn connect(&self) -> EngineResult<Connection> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.ready
            .lock()
            .pop_front()
            .ok_or_else(|| EngineError::transport_retryable("no mock connection prepared"))
    }
}
