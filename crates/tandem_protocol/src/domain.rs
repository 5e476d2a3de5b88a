//! Domain capability supplied by applications.

use crate::error::DomainError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;

/// The application-defined part of a shared document.
///
/// A domain bundles the pure state-transition function, the action inverter
/// used for undo, and the selection reducer. The relay only needs
/// [`Domain::apply`]; clients use all of it.
///
/// # Example
///
/// ```
/// use tandem_protocol::{Domain, DomainError};
///
/// struct Counter;
///
/// impl Domain for Counter {
///     type State = i64;
///     type Action = i64;
///     type Selection = ();
///     type SelectionAction = ();
///
///     fn apply(&self, state: &i64, delta: &i64) -> Result<i64, DomainError> {
///         state
///             .checked_add(*delta)
///             .ok_or_else(|| DomainError::new("overflow"))
///     }
///
///     fn invert(&self, _prior: &i64, delta: &i64) -> Option<i64> {
///         Some(-delta)
///     }
///
///     fn reduce_selection(&self, _selection: &(), _action: &()) {}
/// }
///
/// assert_eq!(Counter.apply(&1, &2), Ok(3));
/// ```
pub trait Domain: Send + Sync + 'static {
    /// The shared document.
    type State: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// A single edit to the document.
    type Action: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    /// A client's cursor or selection.
    type Selection: Clone
        + Debug
        + Default
        + PartialEq
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;
    /// A local change to the selection.
    type SelectionAction: Clone + Debug + Send + Sync + 'static;

    /// Applies an action, producing the next state.
    fn apply(&self, state: &Self::State, action: &Self::Action) -> Result<Self::State, DomainError>;

    /// Returns the action that undoes `action` when applied to the state it
    /// produced, or `None` if the action is not undoable.
    ///
    /// `prior` is the state *before* `action` was applied.
    fn invert(&self, prior: &Self::State, action: &Self::Action) -> Option<Self::Action>;

    /// Applies a selection action to a selection.
    fn reduce_selection(
        &self,
        selection: &Self::Selection,
        action: &Self::SelectionAction,
    ) -> Self::Selection;

    /// Returns true if another client holding `held` soft-locks `wanted`.
    fn selections_conflict(&self, held: &Self::Selection, wanted: &Self::Selection) -> bool {
        held == wanted
    }
}
