//! # Tandem Protocol
//!
//! Wire protocol types for Tandem's shared-state relay.
//!
//! This crate provides:
//! - `ClientId` and `ActionEntry`, the identities matched between optimistic
//!   send and server echo
//! - `ClientRecord` / `PresenceMap` for per-client selection
//! - Protocol messages (`init`, `connected`, `close`, `action`) and their JSON codec
//! - Structural validation of inbound messages
//! - The `Domain` capability trait supplied by applications
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod domain;
mod entry;
mod error;
mod messages;
mod presence;

pub use domain::Domain;
pub use entry::{ActionEntry, ClientId};
pub use error::{DomainError, ProtocolError, ProtocolResult};
pub use messages::{
    ActionMessage, CloseMessage, ConnectedMessage, DomainMessage, InitMessage, WireMessage,
};
pub use presence::{ClientRecord, PresenceMap};
