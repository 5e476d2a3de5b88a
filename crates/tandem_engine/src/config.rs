//! Configuration for the sync client.

use std::time::Duration;

/// What happens to sent-but-unacknowledged entries when a new session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingPolicy {
    /// Leave them in `sending`; they are never retransmitted and may stay
    /// unacknowledged indefinitely.
    #[default]
    Keep,
    /// Move them back to the front of the queue so the next flush sends them
    /// again under the new client id.
    Resend,
}

/// Configuration for a [`SyncClient`](crate::SyncClient).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Relay URL (used by the WebSocket connector).
    pub server_url: String,
    /// Minimum spacing between flushes.
    pub flush_interval: Duration,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Presence-only heartbeat interval while idle, if any.
    pub heartbeat_interval: Option<Duration>,
    /// Handling of unacknowledged entries across reconnects.
    pub pending_policy: PendingPolicy,
}

impl EngineConfig {
    /// Creates a new configuration.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            flush_interval: Duration::from_millis(50),
            reconnect_delay: Duration::from_secs(1),
            heartbeat_interval: Some(Duration::from_secs(30)),
            pending_policy: PendingPolicy::Keep,
        }
    }

    /// Sets the flush interval.
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the heartbeat interval; `None` disables idle heartbeats.
    pub fn with_heartbeat_interval(mut self, interval: Option<Duration>) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the pending-entry policy.
    pub fn with_pending_policy(mut self, policy: PendingPolicy) -> Self {
        self.pending_policy = policy;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new("ws://127.0.0.1:8080")
    }
}
