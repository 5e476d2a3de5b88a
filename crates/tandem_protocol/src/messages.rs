//! Protocol messages for the relay.
//!
//! Every frame is a JSON object tagged by a `type` field:
//!
//! | type        | direction              | payload                          |
//! |-------------|------------------------|----------------------------------|
//! | `init`      | relay → new client     | `clientId`, `state`, `presence`  |
//! | `connected` | relay → other clients  | `client: {id, selection}`        |
//! | `close`     | relay → all clients    | `clientId`                       |
//! | `action`    | client → relay → all   | `clientId`, `selection`, `entries` |

use crate::domain::Domain;
use crate::entry::{ActionEntry, ClientId};
use crate::error::{ProtocolError, ProtocolResult};
use crate::presence::{ClientRecord, PresenceMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
#[serde(bound(
    deserialize = "St: Deserialize<'de>, A: Deserialize<'de>, Sel: Deserialize<'de> + Default"
))]
pub enum WireMessage<St, A, Sel> {
    /// Snapshot sent once to a newly connected client.
    Init(InitMessage<St, Sel>),
    /// Another client joined.
    Connected(ConnectedMessage<Sel>),
    /// A client left.
    Close(CloseMessage),
    /// A batch of entries plus the sender's selection.
    Action(ActionMessage<A, Sel>),
}

/// The message type for a given domain.
pub type DomainMessage<D> =
    WireMessage<<D as Domain>::State, <D as Domain>::Action, <D as Domain>::Selection>;

impl<St, A, Sel> WireMessage<St, A, Sel> {
    /// Returns the wire name of the message type.
    pub fn type_name(&self) -> &'static str {
        match self {
            WireMessage::Init(_) => "init",
            WireMessage::Connected(_) => "connected",
            WireMessage::Close(_) => "close",
            WireMessage::Action(_) => "action",
        }
    }

    /// Checks structural invariants that serde cannot express.
    pub fn validate(&self) -> ProtocolResult<()> {
        match self {
            WireMessage::Init(msg) => msg.validate(),
            WireMessage::Connected(msg) => msg.validate(),
            WireMessage::Close(msg) => msg.validate(),
            WireMessage::Action(msg) => msg.validate(),
        }
    }
}

impl<St, A, Sel> WireMessage<St, A, Sel>
where
    St: Serialize,
    A: Serialize,
    Sel: Serialize,
{
    /// Encodes to a JSON text frame.
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl<St, A, Sel> WireMessage<St, A, Sel>
where
    St: DeserializeOwned,
    A: DeserializeOwned,
    Sel: DeserializeOwned + Default,
{
    /// Decodes a JSON text frame.
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Snapshot for a newly connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitMessage<St, Sel> {
    /// Id assigned to the receiving client.
    pub client_id: ClientId,
    /// Canonical document at connect time.
    pub state: St,
    /// Every connected client, the receiver included.
    pub presence: PresenceMap<Sel>,
}

impl<St, Sel> InitMessage<St, Sel> {
    /// Creates a new init message.
    pub fn new(client_id: ClientId, state: St, presence: PresenceMap<Sel>) -> Self {
        Self {
            client_id,
            state,
            presence,
        }
    }

    fn validate(&self) -> ProtocolResult<()> {
        if self.client_id.is_empty() {
            return Err(ProtocolError::EmptyClientId("init"));
        }
        if !self.presence.contains_key(&self.client_id) {
            return Err(ProtocolError::MissingSelf(self.client_id.to_string()));
        }
        for (key, record) in &self.presence {
            if key != &record.id {
                return Err(ProtocolError::PresenceKeyMismatch {
                    key: key.to_string(),
                    id: record.id.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Announces a new client to everyone already connected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedMessage<Sel> {
    /// The new client's record.
    pub client: ClientRecord<Sel>,
}

impl<Sel> ConnectedMessage<Sel> {
    /// Creates a new connected message.
    pub fn new(client: ClientRecord<Sel>) -> Self {
        Self { client }
    }

    fn validate(&self) -> ProtocolResult<()> {
        if self.client.id.is_empty() {
            return Err(ProtocolError::EmptyClientId("connected"));
        }
        Ok(())
    }
}

/// Announces that a client disconnected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseMessage {
    /// The departed client.
    pub client_id: ClientId,
}

impl CloseMessage {
    /// Creates a new close message.
    pub fn new(client_id: ClientId) -> Self {
        Self { client_id }
    }

    fn validate(&self) -> ProtocolResult<()> {
        if self.client_id.is_empty() {
            return Err(ProtocolError::EmptyClientId("close"));
        }
        Ok(())
    }
}

/// A batch of actions from one client.
///
/// The relay rebroadcasts it verbatim. An empty `entries` list is a presence
/// heartbeat carrying only the selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMessage<A, Sel> {
    /// The originating client.
    pub client_id: ClientId,
    /// The originator's selection at send time.
    #[serde(default)]
    pub selection: Sel,
    /// Entries in the order they must be applied.
    #[serde(default = "Vec::new")]
    pub entries: Vec<ActionEntry<A>>,
}

impl<A, Sel> ActionMessage<A, Sel> {
    /// Creates a new action message.
    pub fn new(client_id: ClientId, selection: Sel, entries: Vec<ActionEntry<A>>) -> Self {
        Self {
            client_id,
            selection,
            entries,
        }
    }

    /// Returns true if this is a presence-only heartbeat.
    pub fn is_heartbeat(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate(&self) -> ProtocolResult<()> {
        if self.client_id.is_empty() {
            return Err(ProtocolError::EmptyClientId("action"));
        }

        let mut seen = HashSet::with_capacity(self.entries.len());
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.id.is_empty() {
                return Err(ProtocolError::EmptyEntryId { index });
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(ProtocolError::DuplicateEntryId(entry.id.clone()));
            }
        }
        Ok(())
    }
}
