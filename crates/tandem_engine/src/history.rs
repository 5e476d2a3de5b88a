//! Undo/redo history built on action inversion.
//!
//! Every recorded edit stores the action that undoes it together with the
//! selection to restore. Undoing applies that action and records a freshly
//! computed inverse on the redo stack, so each step is evaluated against the
//! document as it is *now*, remote edits included.
//!
//! Undo is therefore not guaranteed to restore the exact original value once
//! another client has touched the same entity in the meantime.

use tandem_protocol::{Domain, DomainError};
use tracing::warn;

/// One undo or redo step.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry<A, S> {
    /// The action to apply (already inverted).
    pub action: A,
    /// The selection to restore after applying it.
    pub selection: S,
}

type Entry<D> = HistoryEntry<<D as Domain>::Action, <D as Domain>::Selection>;

/// Past and future stacks for one client.
pub struct History<D: Domain> {
    past: Vec<Entry<D>>,
    future: Vec<Entry<D>>,
}

impl<D: Domain> History<D> {
    /// Creates an empty history.
    pub fn new() -> Self {
        Self {
            past: Vec::new(),
            future: Vec::new(),
        }
    }

    /// Applies a fresh local edit and records its inverse.
    ///
    /// The inverse is computed against the state *before* the edit. Edits
    /// without an inverse are applied but leave both stacks untouched; an
    /// undoable edit clears the redo stack.
    pub fn apply(
        &mut self,
        domain: &D,
        state: &mut D::State,
        selection: &D::Selection,
        action: &D::Action,
    ) -> Result<(), DomainError> {
        let next = domain.apply(state, action)?;

        if let Some(inverse) = domain.invert(state, action) {
            self.past.push(HistoryEntry {
                action: inverse,
                selection: selection.clone(),
            });
            self.future.clear();
        }

        *state = next;
        Ok(())
    }

    /// Undoes the most recent step.
    ///
    /// Returns the action that was applied, or `None` if there was nothing
    /// to undo or the step no longer applies.
    pub fn undo(
        &mut self,
        domain: &D,
        state: &mut D::State,
        selection: &mut D::Selection,
    ) -> Option<D::Action> {
        let entry = self.past.pop()?;
        replay(domain, state, selection, entry, &mut self.future, "undo")
    }

    /// Redoes the most recently undone step.
    pub fn redo(
        &mut self,
        domain: &D,
        state: &mut D::State,
        selection: &mut D::Selection,
    ) -> Option<D::Action> {
        let entry = self.future.pop()?;
        replay(domain, state, selection, entry, &mut self.past, "redo")
    }

    /// Returns true if there is something to undo.
    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    /// Returns true if there is something to redo.
    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    /// Undo stack, oldest first.
    pub fn past(&self) -> &[Entry<D>] {
        &self.past
    }

    /// Redo stack, oldest first.
    pub fn future(&self) -> &[Entry<D>] {
        &self.future
    }
}

impl<D: Domain> Default for History<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Domain> std::fmt::Debug for History<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("History")
            .field("past", &self.past)
            .field("future", &self.future)
            .finish()
    }
}

/// Applies a popped entry and pushes its fresh inverse onto `opposite`.
fn replay<D: Domain>(
    domain: &D,
    state: &mut D::State,
    selection: &mut D::Selection,
    entry: Entry<D>,
    opposite: &mut Vec<Entry<D>>,
    step: &'static str,
) -> Option<D::Action> {
    let next = match domain.apply(state, &entry.action) {
        Ok(next) => next,
        Err(error) => {
            warn!(step, %error, "discarding history entry that no longer applies");
            return None;
        }
    };

    if let Some(inverse) = domain.invert(state, &entry.action) {
        opposite.push(HistoryEntry {
            action: inverse,
            selection: selection.clone(),
        });
    }

    *state = next;
    *selection = entry.selection;
    Some(entry.action)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tandem_todo::{Todo, TodoAction, TodoDomain, TodoState};

    fn setup() -> (History<TodoDomain>, TodoState, Option<String>) {
        (History::new(), TodoState::demo(), None)
    }

    #[test]
    fn undo_restores_state_and_selection() {
        let (mut history, mut state, mut selection) = setup();
        let original = state.clone();

        selection = Some("a".into());
        history
            .apply(&TodoDomain, &mut state, &selection, &TodoAction::update("a", "edited"))
            .unwrap();
        selection = Some("b".into());

        let applied = history.undo(&TodoDomain, &mut state, &mut selection).unwrap();
        assert_eq!(applied, TodoAction::update("a", "Task A"));
        assert_eq!(state, original);
        assert_eq!(selection, Some("a".into()));
        assert!(!history.can_undo());
        assert!(history.can_redo());
    }

    #[test]
    fn redo_reapplies_and_restores_undo_time_selection() {
        let (mut history, mut state, mut selection) = setup();
        history
            .apply(&TodoDomain, &mut state, &selection, &TodoAction::remove("b"))
            .unwrap();
        let edited = state.clone();

        selection = Some("c".into());
        history.undo(&TodoDomain, &mut state, &mut selection).unwrap();
        assert_eq!(selection, None);

        let applied = history.redo(&TodoDomain, &mut state, &mut selection).unwrap();
        assert_eq!(applied, TodoAction::remove("b"));
        assert_eq!(state, edited);
        assert_eq!(selection, Some("c".into()));
        assert!(history.can_undo());
    }

    #[test]
    fn fresh_edit_clears_redo() {
        let (mut history, mut state, mut selection) = setup();
        history
            .apply(&TodoDomain, &mut state, &selection, &TodoAction::remove("a"))
            .unwrap();
        history.undo(&TodoDomain, &mut state, &mut selection).unwrap();
        assert!(history.can_redo());

        history
            .apply(&TodoDomain, &mut state, &selection, &TodoAction::remove("c"))
            .unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.past().len(), 1);
    }

    #[test]
    fn empty_stacks_are_noops() {
        let (mut history, mut state, mut selection) = setup();
        let before = state.clone();
        assert!(history.undo(&TodoDomain, &mut state, &mut selection).is_none());
        assert!(history.redo(&TodoDomain, &mut state, &mut selection).is_none());
        assert_eq!(state, before);
    }

    #[test]
    fn failed_edit_leaves_stacks_alone() {
        let (mut history, mut state, mut selection) = setup();
        history
            .apply(&TodoDomain, &mut state, &selection, &TodoAction::remove("a"))
            .unwrap();
        history.undo(&TodoDomain, &mut state, &mut selection).unwrap();
        let before = state.clone();

        assert!(history
            .apply(&TodoDomain, &mut state, &selection, &TodoAction::remove("zz"))
            .is_err());
        assert_eq!(state, before);
        assert_eq!(history.past().len(), 0);
        assert_eq!(history.future().len(), 1);
    }

    #[test]
    fn stale_entry_is_discarded() {
        let (mut history, mut state, mut selection) = setup();
        history
            .apply(
                &TodoDomain,
                &mut state,
                &selection,
                &TodoAction::add(Todo::new("d", "Task D"), 0),
            )
            .unwrap();

        // A remote client removed "d" before we undo.
        state = TodoDomain.apply(&state, &TodoAction::remove("d")).unwrap();
        let before = state.clone();

        assert!(history.undo(&TodoDomain, &mut state, &mut selection).is_none());
        assert_eq!(state, before);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}
