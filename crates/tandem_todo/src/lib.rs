//! # Tandem Todo
//!
//! A shared todo list: the reference [`Domain`] used by the CLI and the
//! integration tests.
//!
//! Items live in a map keyed by id; `ids` holds their display order.
//! Every edit is invertible given the state it was applied to, which is all
//! the history layer needs for undo.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tandem_protocol::{Domain, DomainError};

/// A single todo item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Item id.
    pub id: String,
    /// Item text.
    pub todo: String,
}

impl Todo {
    /// Creates a new item.
    pub fn new(id: impl Into<String>, todo: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            todo: todo.into(),
        }
    }
}

/// The shared todo list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TodoState {
    /// Item ids in display order.
    pub ids: Vec<String>,
    /// Items by id.
    pub map: BTreeMap<String, Todo>,
}

impl TodoState {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the demo list with items a, b and c.
    pub fn demo() -> Self {
        Self::from_items([
            Todo::new("a", "Task A"),
            Todo::new("b", "Task B"),
            Todo::new("c", "Task C"),
        ])
    }

    /// Builds a list from items in display order.
    pub fn from_items(items: impl IntoIterator<Item = Todo>) -> Self {
        let mut state = Self::new();
        for item in items {
            state.ids.push(item.id.clone());
            state.map.insert(item.id.clone(), item);
        }
        state
    }

    /// Returns the item with the given id.
    pub fn get(&self, id: &str) -> Option<&Todo> {
        self.map.get(id)
    }

    /// Returns the display position of an item.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|i| i == id)
    }

    /// Iterates items in display order.
    pub fn items(&self) -> impl Iterator<Item = &Todo> {
        self.ids.iter().filter_map(|id| self.map.get(id))
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// An edit to the todo list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TodoAction {
    /// Inserts an item at a position.
    #[serde(rename = "todo-add")]
    Add {
        /// The new item.
        todo: Todo,
        /// Insert position; clamped to the list length.
        position: usize,
    },
    /// Removes an item.
    #[serde(rename = "todo-remove")]
    Remove {
        /// Item id.
        id: String,
    },
    /// Replaces an item's text.
    #[serde(rename = "todo-update")]
    Update {
        /// Item id.
        id: String,
        /// New text.
        todo: String,
    },
}

impl TodoAction {
    /// Shorthand for [`TodoAction::Add`].
    pub fn add(todo: Todo, position: usize) -> Self {
        TodoAction::Add { todo, position }
    }

    /// Shorthand for [`TodoAction::Remove`].
    pub fn remove(id: impl Into<String>) -> Self {
        TodoAction::Remove { id: id.into() }
    }

    /// Shorthand for [`TodoAction::Update`].
    pub fn update(id: impl Into<String>, todo: impl Into<String>) -> Self {
        TodoAction::Update {
            id: id.into(),
            todo: todo.into(),
        }
    }
}

/// The selected item, if any.
pub type TodoSelection = Option<String>;

/// A change to the local selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SelectionAction {
    /// Selects an item.
    #[serde(rename = "todo-select", rename_all = "camelCase")]
    Select {
        /// Item id.
        todo_id: String,
    },
    /// Clears the selection.
    #[serde(rename = "clear-select")]
    Clear,
}

/// The todo-list domain.
#[derive(Debug, Clone, Copy, Default)]
pub struct TodoDomain;

impl Domain for TodoDomain {
    type State = TodoState;
    type Action = TodoAction;
    type Selection = TodoSelection;
    type SelectionAction = SelectionAction;

    fn apply(&self, state: &TodoState, action: &TodoAction) -> Result<TodoState, DomainError> {
        let mut next = state.clone();
        match action {
            TodoAction::Add { todo, position } => {
                if next.map.contains_key(&todo.id) {
                    return Err(DomainError::new(format!("todo {} already exists", todo.id)));
                }
                let position = (*position).min(next.ids.len());
                next.ids.insert(position, todo.id.clone());
                next.map.insert(todo.id.clone(), todo.clone());
            }
            TodoAction::Remove { id } => {
                if next.map.remove(id).is_none() {
                    return Err(DomainError::new(format!("unknown todo {id}")));
                }
                next.ids.retain(|i| i != id);
            }
            TodoAction::Update { id, todo } => match next.map.get_mut(id) {
                Some(item) => item.todo = todo.clone(),
                None => return Err(DomainError::new(format!("unknown todo {id}"))),
            },
        }
        Ok(next)
    }

    fn invert(&self, prior: &TodoState, action: &TodoAction) -> Option<TodoAction> {
        match action {
            TodoAction::Add { todo, .. } => Some(TodoAction::remove(todo.id.clone())),
            TodoAction::Remove { id } => {
                let todo = prior.get(id)?.clone();
                let position = prior.position(id)?;
                Some(TodoAction::Add { todo, position })
            }
            TodoAction::Update { id, .. } => {
                let item = prior.get(id)?;
                Some(TodoAction::update(id.clone(), item.todo.clone()))
            }
        }
    }

    fn reduce_selection(
        &self,
        _selection: &TodoSelection,
        action: &SelectionAction,
    ) -> TodoSelection {
        match action {
            SelectionAction::Select { todo_id } => Some(todo_id.clone()),
            SelectionAction::Clear => None,
        }
    }

    fn selections_conflict(&self, held: &TodoSelection, wanted: &TodoSelection) -> bool {
        matches!((held, wanted), (Some(a), Some(b)) if a == b)
    }
}
