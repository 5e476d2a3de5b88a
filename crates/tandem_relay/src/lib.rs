//! # Tandem Relay
//!
//! The single authoritative ordering point for a Tandem document.
//!
//! This crate provides:
//! - `RelayCore`, the canonical document and presence map as a plain state
//!   machine
//! - A single-writer relay task with a cloneable handle
//! - A WebSocket listener bridging connections to the relay task
//!
//! # Protocol
//!
//! On connect, every existing client receives `connected`, then the new
//! client receives `init` with the document and full presence map. Each
//! inbound `action` is applied entry by entry in arrival order and broadcast
//! verbatim to everyone, the sender included. On disconnect the remaining
//! clients receive `close`.
//!
//! The relay does no merging or locking; conflicting edits are resolved by
//! arrival order alone. State lives in memory and is lost on restart.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod actor;
mod config;
mod error;
mod handler;
mod server;

pub use actor::{Relay, RelayHandle, RelaySession, RelaySnapshot};
pub use config::ServerConfig;
pub use error::{RelayError, RelayResult};
pub use handler::{Delivery, RelayCore, RelayStats};
pub use server::RelayServer;
