//! The client sync state machine.
//!
//! [`SyncEngine`] is I/O free: the driver in [`crate::client`] feeds it
//! inbound frames and asks it for outbound ones.
//!
//! ## Documents
//!
//! The engine keeps two copies of the document:
//!
//! - `confirmed`: the relay's document as far as we know, built only from
//!   `init` snapshots and broadcast `action` messages in arrival order
//! - `document`: what the UI sees, i.e. `confirmed` with every pending local
//!   entry (`sending` then `queue`) replayed on top
//!
//! Rebuilding `document` after every broadcast is what makes all clients
//! converge on the relay's arrival order even when edits overlap.

use crate::config::PendingPolicy;
use crate::error::{EngineError, EngineResult};
use crate::history::History;
use crate::presence::PresenceStore;
use std::collections::HashSet;
use std::sync::Arc;
use tandem_protocol::{
    ActionEntry, ActionMessage, ClientId, ClientRecord, Domain, DomainMessage, InitMessage,
    WireMessage,
};
use tracing::{debug, info, warn};

/// Engine statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Outbound `action` messages produced.
    pub flushes: u64,
    /// Entries handed to the relay.
    pub entries_sent: u64,
    /// Entries acknowledged by their echo.
    pub entries_acknowledged: u64,
    /// Remote entries applied to the confirmed document.
    pub remote_applied: u64,
    /// Remote entries the domain rejected.
    pub remote_rejected: u64,
    /// `init` messages received.
    pub sessions: u64,
}

/// Client-side sync state for one document.
pub struct SyncEngine<D: Domain> {
    domain: Arc<D>,
    confirmed: D::State,
    document: D::State,
    selection: D::Selection,
    history: History<D>,
    queue: Vec<ActionEntry<D::Action>>,
    sending: Vec<ActionEntry<D::Action>>,
    /// Leading `sending` entries left over from a previous session.
    stale_sending: usize,
    connected: bool,
    self_id: Option<ClientId>,
    presence: PresenceStore<D::Selection>,
    policy: PendingPolicy,
    stats: SyncStats,
    revision: u64,
    dirty: bool,
}

impl<D: Domain> SyncEngine<D> {
    /// Creates a disconnected engine showing `document` until `init` arrives.
    pub fn new(
        domain: Arc<D>,
        document: D::State,
        selection: D::Selection,
        policy: PendingPolicy,
    ) -> Self {
        Self {
            domain,
            confirmed: document.clone(),
            document,
            selection,
            history: History::new(),
            queue: Vec::new(),
            sending: Vec::new(),
            stale_sending: 0,
            connected: false,
            self_id: None,
            presence: PresenceStore::new(),
            policy,
            stats: SyncStats::default(),
            revision: 0,
            dirty: false,
        }
    }

    // =========================================================================
    // Read access
    // =========================================================================

    /// The domain.
    pub fn domain(&self) -> &D {
        &self.domain
    }

    /// The document as the UI should render it.
    pub fn document(&self) -> &D::State {
        &self.document
    }

    /// The last document state confirmed by the relay.
    pub fn confirmed(&self) -> &D::State {
        &self.confirmed
    }

    /// The local selection.
    pub fn selection(&self) -> &D::Selection {
        &self.selection
    }

    /// Returns true between `init` and transport loss.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Our id for the current session.
    pub fn self_id(&self) -> Option<&ClientId> {
        self.self_id.as_ref()
    }

    /// Connected clients and their selections.
    pub fn presence(&self) -> &PresenceStore<D::Selection> {
        &self.presence
    }

    /// Local undo history.
    pub fn history(&self) -> &History<D> {
        &self.history
    }

    /// Returns true if there is something to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns true if there is something to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Entries not yet sent.
    pub fn queue(&self) -> &[ActionEntry<D::Action>] {
        &self.queue
    }

    /// Entries sent but not yet acknowledged.
    pub fn sending(&self) -> &[ActionEntry<D::Action>] {
        &self.sending
    }

    /// Engine statistics.
    pub fn stats(&self) -> &SyncStats {
        &self.stats
    }

    /// Counter bumped on every observable change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns true if there is something new to tell the relay.
    pub fn needs_flush(&self) -> bool {
        self.self_id.is_some() && self.dirty
    }

    /// Returns the client whose selection soft-locks `wanted`, if any.
    pub fn lock_holder(&self, wanted: &D::Selection) -> Option<&ClientId> {
        let domain = &self.domain;
        self.presence.lock_holder(self.self_id.as_ref(), |held| {
            domain.selections_conflict(held, wanted)
        })
    }

    /// Returns true if another client's selection soft-locks `wanted`.
    pub fn is_locked(&self, wanted: &D::Selection) -> bool {
        self.lock_holder(wanted).is_some()
    }

    // =========================================================================
    // Local operations
    // =========================================================================

    /// Applies a local edit optimistically and queues it.
    ///
    /// Fails with [`EngineError::NotInitialized`] before `init`, and with
    /// [`EngineError::Domain`] if the domain rejects the action; in both
    /// cases nothing is queued or recorded.
    pub fn dispatch(&mut self, action: D::Action) -> EngineResult<()> {
        self.require_session()?;

        self.history
            .apply(&self.domain, &mut self.document, &self.selection, &action)?;
        self.queue.push(ActionEntry::new(action));
        self.touch(true);
        Ok(())
    }

    /// Applies a selection action.
    pub fn select(&mut self, action: D::SelectionAction) -> EngineResult<()> {
        self.require_session()?;

        let next = self.domain.reduce_selection(&self.selection, &action);
        if next != self.selection {
            self.selection = next;
            self.touch(true);
        }
        Ok(())
    }

    /// Undoes the last local edit and queues the applied inverse.
    ///
    /// Returns `Ok(false)` if nothing was undone.
    pub fn undo(&mut self) -> EngineResult<bool> {
        self.require_session()?;
        if !self.history.can_undo() {
            return Ok(false);
        }

        let applied = self
            .history
            .undo(&self.domain, &mut self.document, &mut self.selection);
        Ok(self.record_step(applied))
    }

    /// Redoes the last undone edit and queues it.
    pub fn redo(&mut self) -> EngineResult<bool> {
        self.require_session()?;
        if !self.history.can_redo() {
            return Ok(false);
        }

        let applied = self
            .history
            .redo(&self.domain, &mut self.document, &mut self.selection);
        Ok(self.record_step(applied))
    }

    /// Moves the queue to `sending` and returns the outbound message.
    ///
    /// Returns `None` before `init`. An empty queue still yields a message
    /// carrying only the selection.
    pub fn flush(&mut self) -> Option<ActionMessage<D::Action, D::Selection>> {
        let client_id = self.self_id.clone()?;

        let entries = std::mem::take(&mut self.queue);
        self.sending.extend(entries.iter().cloned());
        self.dirty = false;

        self.stats.flushes += 1;
        self.stats.entries_sent += entries.len() as u64;

        Some(ActionMessage::new(client_id, self.selection.clone(), entries))
    }

    // =========================================================================
    // Protocol events
    // =========================================================================

    /// Decodes, validates and applies an inbound text frame.
    pub fn receive_text(&mut self, text: &str) -> EngineResult<()> {
        let message = DomainMessage::<D>::decode(text)?;
        message.validate()?;
        self.receive(message)
    }

    /// Applies an inbound protocol message.
    pub fn receive(&mut self, message: DomainMessage<D>) -> EngineResult<()> {
        match message {
            WireMessage::Init(init) => self.on_init(init),
            WireMessage::Connected(msg) => self.on_connected(msg.client),
            WireMessage::Close(msg) => self.on_close(&msg.client_id),
            WireMessage::Action(msg) => return self.on_action(msg),
        }
        Ok(())
    }

    /// Marks the connection as lost.
    ///
    /// History, queue and `sending` are retained; presence is cleared until
    /// the next `init`.
    pub fn disconnected(&mut self) {
        if self.self_id.is_none() && !self.connected {
            return;
        }
        info!(client_id = ?self.self_id, "connection lost");
        self.connected = false;
        self.self_id = None;
        self.presence.clear();
        self.touch(false);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn require_session(&self) -> EngineResult<()> {
        if self.self_id.is_none() {
            return Err(EngineError::NotInitialized);
        }
        Ok(())
    }

    fn touch(&mut self, dirty: bool) {
        self.revision += 1;
        self.dirty |= dirty;
    }

    fn record_step(&mut self, applied: Option<D::Action>) -> bool {
        // A discarded entry still changed the stacks.
        match applied {
            Some(action) => {
                self.queue.push(ActionEntry::new(action));
                self.touch(true);
                true
            }
            None => {
                self.touch(false);
                false
            }
        }
    }

    fn on_init(&mut self, init: InitMessage<D::State, D::Selection>) {
        info!(
            client_id = %init.client_id,
            clients = init.presence.len(),
            "session initialized"
        );

        match self.policy {
            PendingPolicy::Keep => {
                self.stale_sending = self.sending.len();
            }
            PendingPolicy::Resend => {
                let mut pending = std::mem::take(&mut self.sending);
                pending.append(&mut self.queue);
                self.queue = pending;
                self.stale_sending = 0;
            }
        }

        self.confirmed = init.state;
        self.presence.replace(init.presence);
        self.self_id = Some(init.client_id);
        self.connected = true;
        self.stats.sessions += 1;

        self.rebuild();
        self.touch(true);
    }

    fn on_connected(&mut self, client: ClientRecord<D::Selection>) {
        debug!(client_id = %client.id, "client connected");
        self.presence.insert(client);
        self.touch(false);
    }

    fn on_close(&mut self, client_id: &ClientId) {
        debug!(%client_id, "client disconnected");
        if self.presence.remove(client_id).is_some() {
            self.touch(false);
        }
    }

    fn on_action(&mut self, msg: ActionMessage<D::Action, D::Selection>) -> EngineResult<()> {
        let Some(self_id) = self.self_id.as_ref() else {
            return Err(EngineError::OutOfSequence("action"));
        };
        let own = &msg.client_id == self_id;

        for entry in &msg.entries {
            match self.domain.apply(&self.confirmed, &entry.action) {
                Ok(next) => {
                    self.confirmed = next;
                    if !own {
                        self.stats.remote_applied += 1;
                    }
                }
                Err(error) => {
                    warn!(
                        entry_id = %entry.id,
                        from = %msg.client_id,
                        %error,
                        "skipping rejected entry"
                    );
                    if !own {
                        self.stats.remote_rejected += 1;
                    }
                }
            }
        }

        if own {
            self.acknowledge(&msg.entries);
        }
        self.presence.update_selection(&msg.client_id, msg.selection);

        if !msg.entries.is_empty() {
            self.rebuild();
        }
        self.touch(false);
        Ok(())
    }

    fn acknowledge(&mut self, entries: &[ActionEntry<D::Action>]) {
        if entries.is_empty() {
            return;
        }
        let acked: HashSet<&str> = entries.iter().map(|e| e.id.as_str()).collect();

        let before = self.sending.len();
        let stale = self.stale_sending;
        let mut index = 0;
        let mut stale_removed = 0;
        self.sending.retain(|entry| {
            let keep = !acked.contains(entry.id.as_str());
            if !keep && index < stale {
                stale_removed += 1;
            }
            index += 1;
            keep
        });
        self.stale_sending -= stale_removed;

        let removed = before - self.sending.len();
        self.stats.entries_acknowledged += removed as u64;
        debug!(acknowledged = removed, outstanding = self.sending.len(), "echo received");
    }

    /// Recomputes `document` from `confirmed` plus pending entries.
    fn rebuild(&mut self) {
        let mut document = self.confirmed.clone();
        let pending = self.sending[self.stale_sending..].iter().chain(&self.queue);
        for entry in pending {
            match self.domain.apply(&document, &entry.action) {
                Ok(next) => document = next,
                Err(error) => {
                    debug!(entry_id = %entry.id, %error, "pending entry no longer applies");
                }
            }
        }
        self.document = document;
    }
}

impl<D: Domain> std::fmt::Debug for SyncEngine<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("self_id", &self.self_id)
            .field("connected", &self.connected)
            .field("queue", &self.queue.len())
            .field("sending", &self.sending.len())
            .field("presence", &self.presence.len())
            .field("revision", &self.revision)
            .finish()
    }
}
