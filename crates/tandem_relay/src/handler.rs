//! Relay state machine.
//!
//! [`RelayCore`] owns the canonical document and the presence map. Every
//! event returns the frames to deliver; it never touches a socket.

use crate::config::ServerConfig;
use crate::error::{RelayError, RelayResult};
use std::sync::Arc;
use tandem_protocol::{
    ClientId, ClientRecord, CloseMessage, ConnectedMessage, Domain, DomainMessage, InitMessage,
    PresenceMap, WireMessage,
};
use tracing::{debug, info, warn};

/// A frame and the clients it goes to.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Recipients, in presence order.
    pub recipients: Vec<ClientId>,
    /// The encoded frame.
    pub frame: Arc<str>,
}

impl Delivery {
    fn new(recipients: Vec<ClientId>, frame: impl Into<Arc<str>>) -> Self {
        Self {
            recipients,
            frame: frame.into(),
        }
    }
}

/// Relay statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Connections accepted.
    pub connections: u64,
    /// Connections refused at the limit.
    pub connections_refused: u64,
    /// `action` messages broadcast.
    pub messages_relayed: u64,
    /// Entries applied to the document.
    pub entries_applied: u64,
    /// Entries the domain rejected.
    pub entries_rejected: u64,
    /// Inbound frames dropped as invalid.
    pub frames_dropped: u64,
}

/// The relay's canonical state.
pub struct RelayCore<D: Domain> {
    domain: D,
    state: D::State,
    presence: PresenceMap<D::Selection>,
    initial_selection: Option<D::Selection>,
    strict_client_ids: bool,
    max_connections: usize,
    stats: RelayStats,
}

impl<D: Domain> RelayCore<D> {
    /// Creates a relay holding `state`.
    ///
    /// New clients start with `initial_selection` in the presence map.
    pub fn new(
        domain: D,
        state: D::State,
        initial_selection: Option<D::Selection>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            domain,
            state,
            presence: PresenceMap::new(),
            initial_selection,
            strict_client_ids: config.strict_client_ids,
            max_connections: config.max_connections,
            stats: RelayStats::default(),
        }
    }

    /// The canonical document.
    pub fn state(&self) -> &D::State {
        &self.state
    }

    /// Connected clients and their selections.
    pub fn presence(&self) -> &PresenceMap<D::Selection> {
        &self.presence
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.presence.len()
    }

    /// Relay statistics.
    pub fn stats(&self) -> &RelayStats {
        &self.stats
    }

    /// Registers a new client.
    ///
    /// Everyone already connected is told first; the new client then gets
    /// `init` with the document and the full presence map, itself included.
    pub fn connect(&mut self) -> RelayResult<(ClientId, Vec<Delivery>)> {
        if self.presence.len() >= self.max_connections {
            self.stats.connections_refused += 1;
            return Err(RelayError::CapacityExceeded(self.max_connections));
        }

        let id = ClientId::generate();
        let record = ClientRecord {
            id: id.clone(),
            selection: self.initial_selection.clone(),
        };

        let mut deliveries = Vec::with_capacity(2);
        if !self.presence.is_empty() {
            let connected: DomainMessage<D> =
                WireMessage::Connected(ConnectedMessage::new(record.clone()));
            deliveries.push(Delivery::new(self.recipients(), connected.encode()?));
        }

        self.presence.insert(id.clone(), record);

        let init: DomainMessage<D> = WireMessage::Init(InitMessage::new(
            id.clone(),
            self.state.clone(),
            self.presence.clone(),
        ));
        deliveries.push(Delivery::new(vec![id.clone()], init.encode()?));

        self.stats.connections += 1;
        info!(client_id = %id, clients = self.presence.len(), "client connected");
        Ok((id, deliveries))
    }

    /// Handles a text frame from `from`.
    ///
    /// Only `action` messages are accepted. Entries are applied in order;
    /// ones the domain rejects are skipped. The frame is then broadcast
    /// verbatim to every client, the sender included.
    pub fn handle_frame(&mut self, from: &ClientId, text: &str) -> RelayResult<Vec<Delivery>> {
        let result = self.relay_action(from, text);
        if result.is_err() {
            self.stats.frames_dropped += 1;
        }
        result
    }

    fn relay_action(&mut self, from: &ClientId, text: &str) -> RelayResult<Vec<Delivery>> {
        if !self.presence.contains_key(from) {
            return Err(RelayError::UnknownClient(from.clone()));
        }

        let message = DomainMessage::<D>::decode(text)?;
        message.validate()?;
        let kind = message.type_name();
        let WireMessage::Action(action) = message else {
            return Err(RelayError::InvalidRequest(format!(
                "clients may not send {kind} messages"
            )));
        };

        if self.strict_client_ids && &action.client_id != from {
            return Err(RelayError::ClientIdMismatch {
                expected: from.clone(),
                actual: action.client_id,
            });
        }

        for entry in &action.entries {
            match self.domain.apply(&self.state, &entry.action) {
                Ok(next) => {
                    self.state = next;
                    self.stats.entries_applied += 1;
                }
                Err(error) => {
                    warn!(
                        client_id = %from,
                        entry_id = %entry.id,
                        %error,
                        "skipping rejected entry"
                    );
                    self.stats.entries_rejected += 1;
                }
            }
        }

        if let Some(record) = self.presence.get_mut(&action.client_id) {
            record.selection = Some(action.selection);
        }

        self.stats.messages_relayed += 1;
        debug!(client_id = %from, entries = action.entries.len(), "relaying action");
        Ok(vec![Delivery::new(self.recipients(), text)])
    }

    /// Removes a client and tells everyone left.
    ///
    /// Unknown ids produce no deliveries.
    pub fn disconnect(&mut self, id: &ClientId) -> RelayResult<Vec<Delivery>> {
        if self.presence.remove(id).is_none() {
            return Ok(Vec::new());
        }
        info!(client_id = %id, clients = self.presence.len(), "client disconnected");

        if self.presence.is_empty() {
            return Ok(Vec::new());
        }
        let close: DomainMessage<D> = WireMessage::Close(CloseMessage::new(id.clone()));
        Ok(vec![Delivery::new(self.recipients(), close.encode()?)])
    }

    fn recipients(&self) -> Vec<ClientId> {
        self.presence.keys().cloned().collect()
    }
}
