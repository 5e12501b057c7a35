//! Error types for the observation layer.

use thiserror::Error;

use crate::value::ValueKind;

/// Error raised by a caller-supplied hook or function body.
///
/// Hooks are user code; the layer never inspects these, it only carries
/// them back to the read or write site that triggered the hook.
pub type HookError = Box<dyn std::error::Error>;

/// Result type returned by hooks and native function bodies.
pub type HookResult<T = ()> = std::result::Result<T, HookError>;

pub type Result<T> = std::result::Result<T, ObserveError>;

#[derive(Debug, Error)]
pub enum ObserveError {
    /// Only objects (or already observed wrappers) can be wrapped.
    #[error("cannot observe a value of kind {kind}: only objects can be wrapped")]
    NotAnObject { kind: ValueKind },

    /// A hook or a called function failed. The original error is kept as
    /// the source.
    #[error("hook for property '{property}' failed: {source}")]
    Hook {
        property: String,
        #[source]
        source: HookError,
    },

    #[error("property '{property}' is read-only")]
    ReadOnly { property: String },

    #[error("property '{property}' is not configurable")]
    NonConfigurable { property: String },

    #[error("property '{property}' is not callable")]
    NotCallable { property: String },

    #[error("path '{path}' does not resolve to an object")]
    PathNotFound { path: String },
}

impl ObserveError {
    /// Property name the error is attached to, if any.
    #[must_use]
    pub fn property(&self) -> Option<&str> {
        match self {
            Self::Hook { property, .. }
            | Self::ReadOnly { property }
            | Self::NonConfigurable { property }
            | Self::NotCallable { property } => Some(property),
            Self::NotAnObject { .. } | Self::PathNotFound { .. } => None,
        }
    }

    /// Whether this error carries a failure from caller code.
    #[must_use]
    pub fn is_hook_failure(&self) -> bool {
        matches!(self, Self::Hook { .. })
    }

    pub(crate) fn hook(property: &str, source: HookError) -> Self {
        Self::Hook {
            property: property.to_owned(),
            source,
        }
    }
}
