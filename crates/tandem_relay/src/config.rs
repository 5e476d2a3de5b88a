//! Relay configuration.

use std::net::SocketAddr;

/// Configuration for the relay server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Reject `action` messages whose `clientId` is not the sender's own id.
    pub strict_client_ids: bool,
}

impl ServerConfig {
    /// Creates a new relay configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            max_connections: 1000,
            strict_client_ids: false,
        }
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Enables or disables the client id check on `action` messages.
    pub fn with_strict_client_ids(mut self, strict: bool) -> Self {
        self.strict_client_ids = strict;
        self
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8080)))
    }
}
