//! Property tests for undo/redo round trips.

use proptest::prelude::*;
use tandem_engine::History;
use tandem_protocol::Domain;
use tandem_todo::{Todo, TodoAction, TodoDomain, TodoState};

#[derive(Debug, Clone)]
struct Edit {
    kind: u8,
    pick: usize,
    text: String,
}

fn edit() -> impl Strategy<Value = Edit> {
    (0..3u8, any::<usize>(), "[a-z]{1,8}").prop_map(|(kind, pick, text)| Edit { kind, pick, text })
}

fn action_for(state: &TodoState, edit: &Edit, serial: usize) -> TodoAction {
    if state.is_empty() || edit.kind == 0 {
        let todo = Todo::new(format!("n{serial}"), edit.text.clone());
        return TodoAction::add(todo, edit.pick % (state.len() + 1));
    }
    let id = state.ids[edit.pick % state.len()].clone();
    match edit.kind {
        1 => TodoAction::remove(id),
        _ => TodoAction::update(id, edit.text.clone()),
    }
}

proptest! {
    #[test]
    fn undo_all_then_redo_all(
        start in prop::collection::vec("[a-z]{1,8}", 0..5),
        edits in prop::collection::vec(edit(), 1..30),
    ) {
        let domain = TodoDomain;
        let original = TodoState::from_items(
            start.iter().enumerate().map(|(i, text)| Todo::new(format!("s{i}"), text.clone())),
        );

        let mut history = History::<TodoDomain>::new();
        let mut state = original.clone();
        let mut selection: Option<String> = None;
        let mut first_selection = None;

        for (serial, edit) in edits.iter().enumerate() {
            selection = state.ids.first().cloned();
            if serial == 0 {
                first_selection = Some(selection.clone());
            }
            let action = action_for(&state, edit, serial);
            prop_assert!(domain.apply(&state, &action).is_ok());
            history.apply(&domain, &mut state, &selection, &action).unwrap();
        }
        let edited = state.clone();
        let last_selection = selection.clone();
        let steps = history.past().len();
        prop_assert_eq!(steps, edits.len());

        for _ in 0..steps {
            prop_assert!(history.undo(&domain, &mut state, &mut selection).is_some());
        }
        prop_assert_eq!(&state, &original);
        prop_assert_eq!(Some(selection.clone()), first_selection);
        prop_assert!(!history.can_undo());

        for _ in 0..steps {
            prop_assert!(history.redo(&domain, &mut state, &mut selection).is_some());
        }
        prop_assert_eq!(&state, &edited);
        prop_assert_eq!(selection, last_selection);
        prop_assert!(!history.can_redo());
    }

    #[test]
    fn fresh_edit_after_undo_drops_redo(edits in prop::collection::vec(edit(), 2..10)) {
        let domain = TodoDomain;
        let mut history = History::<TodoDomain>::new();
        let mut state = TodoState::demo();
        let mut selection = None;

        for (serial, edit) in edits.iter().enumerate() {
            let action = action_for(&state, edit, serial);
            history.apply(&domain, &mut state, &selection, &action).unwrap();
        }
        history.undo(&domain, &mut state, &mut selection);
        prop_assert!(history.can_redo());

        let action = action_for(&state, &Edit { kind: 0, pick: 0, text: "x".into() }, 999);
        history.apply(&domain, &mut state, &selection, &action).unwrap();
        prop_assert!(!history.can_redo());
    }
}
