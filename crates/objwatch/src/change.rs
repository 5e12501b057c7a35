//! Change records emitted by observed objects.

use std::fmt;

use crate::value::Value;

/// What happened to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyState {
    /// Reserved for property creation. Assignments that create a property
    /// currently report [`PropertyState::Updated`].
    New,
    Updated,
    Deleted,
}

impl fmt::Display for PropertyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "new",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        })
    }
}

/// A single observed mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Property that changed.
    pub name: String,
    /// Value after the change (`Undefined` for deletions).
    pub value: Value,
    /// Value before the change.
    pub previous_value: Value,
    pub state: PropertyState,
}

impl ChangeRecord {
    #[must_use]
    pub fn updated(name: impl Into<String>, value: Value, previous_value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            previous_value,
            state: PropertyState::Updated,
        }
    }

    #[must_use]
    pub fn deleted(name: impl Into<String>, previous_value: Value) -> Self {
        Self {
            name: name.into(),
            value: Value::Undefined,
            previous_value,
            state: PropertyState::Deleted,
        }
    }
}
