//! Property tests for action batch validation.

use proptest::prelude::*;
use std::collections::HashSet;
use tandem_protocol::{ActionEntry, ActionMessage, ClientId, ProtocolError, WireMessage};

type Msg = WireMessage<Vec<u32>, u32, Option<String>>;

fn batch(ids: &[String]) -> Msg {
    let entries = ids
        .iter()
        .enumerate()
        .map(|(i, id)| ActionEntry::with_id(id.clone(), i as u32))
        .collect();
    WireMessage::Action(ActionMessage::new(ClientId::new("c1"), None, entries))
}

proptest! {
    #[test]
    fn batch_is_valid_iff_ids_are_distinct(ids in prop::collection::vec("[a-c]{0,2}", 0..8)) {
        let msg = batch(&ids);
        let distinct = ids.iter().collect::<HashSet<_>>().len() == ids.len();
        let non_empty = ids.iter().all(|id| !id.is_empty());

        match msg.validate() {
            Ok(()) => prop_assert!(distinct && non_empty),
            Err(ProtocolError::EmptyEntryId { index }) => {
                prop_assert!(ids[index].is_empty());
                prop_assert!(ids[..index].iter().all(|id| !id.is_empty()));
            }
            Err(ProtocolError::DuplicateEntryId(id)) => {
                prop_assert!(ids.iter().filter(|other| **other == id).count() > 1);
            }
            Err(other) => prop_assert!(false, "unexpected error {other:?}"),
        }
    }

    #[test]
    fn decoded_batch_keeps_entry_order(count in 0usize..16) {
        let ids: Vec<String> = (0..count).map(|i| format!("e{i}")).collect();
        let text = batch(&ids).encode().unwrap();
        match Msg::decode(&text).unwrap() {
            WireMessage::Action(action) => {
                let decoded: Vec<&str> = action.entries.iter().map(|e| e.id.as_str()).collect();
                prop_assert_eq!(decoded, ids.iter().map(String::as_str).collect::<Vec<_>>());
            }
            other => prop_assert!(false, "unexpected {other:?}"),
        }
    }
}
