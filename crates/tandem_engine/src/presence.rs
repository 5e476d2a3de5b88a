//! Presence store: who is connected and what they have selected.

use tandem_protocol::{ClientId, ClientRecord, PresenceMap};

/// Client-side mirror of the relay's presence map.
///
/// Updated only from protocol messages; the document never sees it.
#[derive(Debug, Clone)]
pub struct PresenceStore<S> {
    clients: PresenceMap<S>,
}

impl<S: Clone> PresenceStore<S> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            clients: PresenceMap::new(),
        }
    }

    /// Replaces the whole map (on `init`).
    pub fn replace(&mut self, clients: PresenceMap<S>) {
        self.clients = clients;
    }

    /// Adds or overwrites a client (on `connected`).
    pub fn insert(&mut self, record: ClientRecord<S>) {
        self.clients.insert(record.id.clone(), record);
    }

    /// Removes a client (on `close`). Unknown ids are ignored.
    pub fn remove(&mut self, id: &ClientId) -> Option<ClientRecord<S>> {
        self.clients.remove(id)
    }

    /// Records a client's selection (on `action`).
    ///
    /// Returns false and changes nothing if the client is unknown, so a late
    /// message from a departed client cannot resurrect it.
    pub fn update_selection(&mut self, id: &ClientId, selection: S) -> bool {
        match self.clients.get_mut(id) {
            Some(record) => {
                record.selection = Some(selection);
                true
            }
            None => false,
        }
    }

    /// Returns a client's record.
    pub fn get(&self, id: &ClientId) -> Option<&ClientRecord<S>> {
        self.clients.get(id)
    }

    /// Returns true if the client is connected.
    pub fn contains(&self, id: &ClientId) -> bool {
        self.clients.contains_key(id)
    }

    /// Number of connected clients.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Iterates records ordered by client id.
    pub fn iter(&self) -> impl Iterator<Item = &ClientRecord<S>> {
        self.clients.values()
    }

    /// Returns the underlying map.
    pub fn clients(&self) -> &PresenceMap<S> {
        &self.clients
    }

    /// Forgets everyone.
    pub fn clear(&mut self) {
        self.clients.clear();
    }

    /// Finds another client whose selection soft-locks the caller.
    ///
    /// `conflicts` is asked about every other client's selection; the local
    /// client is skipped. Locks are advisory only.
    pub fn lock_holder(
        &self,
        self_id: Option<&ClientId>,
        conflicts: impl Fn(&S) -> bool,
    ) -> Option<&ClientId> {
        self.clients
            .values()
            .filter(|record| Some(&record.id) != self_id)
            .find(|record| record.selection.as_ref().is_some_and(&conflicts))
            .map(|record| &record.id)
    }
}

impl<S: Clone> Default for PresenceStore<S> {
    fn default() -> Self {
        Self::new()
    }
}
