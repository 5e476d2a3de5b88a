//! # Tandem Engine
//!
//! Client side of Tandem's shared-state protocol.
//!
//! This crate provides:
//! - Undo/redo history built on action inversion
//! - A presence store with soft-lock queries
//! - The sync state machine (queue → sending → acknowledged)
//! - A connector abstraction with a WebSocket implementation
//! - An async client driver with throttled flushing and fixed-delay reconnect
//!
//! ## Architecture
//!
//! Local edits are applied optimistically and queued. A periodic flush moves
//! the queue into the `sending` set and ships it to the relay as one `action`
//! message. The relay applies messages in arrival order and broadcasts them to
//! everyone, the sender included:
//!
//! 1. Echoes of our own messages acknowledge entries in `sending`
//! 2. Messages from other clients are applied to the confirmed document
//! 3. The visible document is the confirmed document with still-pending
//!    local entries replayed on top
//!
//! ## Key Invariants
//!
//! - The relay's arrival order is the only ordering that matters
//! - An acknowledged entry is never applied twice
//! - History is local; it survives reconnects and is never sent as such
//! - Presence is kept apart from the document and never enters history

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod error;
mod history;
mod presence;
mod state;
mod transport;
mod ws;

pub use client::SyncClient;
pub use config::{EngineConfig, PendingPolicy};
pub use error::{EngineError, EngineResult};
pub use history::{History, HistoryEntry};
pub use presence::PresenceStore;
pub use state::{SyncEngine, SyncStats};
pub use transport::{Connection, Connector, MockConnector, RemoteEnd};
pub use ws::WsConnector;
