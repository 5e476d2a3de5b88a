//! Client and action identities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier the relay assigns to a connection.
///
/// Stable for the lifetime of one connection; a reconnecting client gets a
/// fresh id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(String);

impl ClientId {
    /// Wraps an existing id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Allocates a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClientId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A domain action tagged with the id used to match its echo.
///
/// The id is assigned once when the action is first dispatched and never
/// changes, so the sender can recognise its own entry in the broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry<A> {
    /// Unique entry id.
    pub id: String,
    /// The domain action.
    pub action: A,
}

impl<A> ActionEntry<A> {
    /// Wraps an action with a freshly generated id.
    pub fn new(action: A) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            action,
        }
    }

    /// Wraps an action with a caller-supplied id.
    pub fn with_id(id: impl Into<String>, action: A) -> Self {
        Self {
            id: id.into(),
            action,
        }
    }
}
