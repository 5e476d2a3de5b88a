//! Presence records.

use crate::entry::ClientId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Last-known selection of one connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientRecord<S> {
    /// The client's id.
    pub id: ClientId,
    /// The client's selection, absent until it reports one.
    pub selection: Option<S>,
}

impl<S> ClientRecord<S> {
    /// Creates a record with no selection.
    pub fn new(id: ClientId) -> Self {
        Self {
            id,
            selection: None,
        }
    }

    /// Creates a record with a selection.
    pub fn with_selection(id: ClientId, selection: S) -> Self {
        Self {
            id,
            selection: Some(selection),
        }
    }
}

/// Connected clients keyed by id.
///
/// Keys are exactly the set of currently connected clients. Kept apart from
/// the document so presence churn never reaches undo history.
pub type PresenceMap<S> = BTreeMap<ClientId, ClientRecord<S>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_selection_decodes_as_absent() {
        let record: ClientRecord<String> = serde_json::from_str(r#"{"id":"c1"}"#).unwrap();
        assert_eq!(record.id, ClientId::new("c1"));
        assert!(record.selection.is_none());
    }

    #[test]
    fn presence_map_is_a_json_object() {
        let mut map: PresenceMap<String> = PresenceMap::new();
        map.insert(
            ClientId::new("c1"),
            ClientRecord::with_selection(ClientId::new("c1"), "a".to_string()),
        );
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["c1"]["selection"], "a");
    }
}
