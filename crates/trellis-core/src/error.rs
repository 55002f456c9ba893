#![forbid(unsafe_code)]

//! Error taxonomy shared by the host substrate and the runtime.
//!
//! Every user callback (getters, setters, connect factories, disposers,
//! render functions) returns [`Result`], so failures travel to the caller
//! one level up from where they happened. Nothing here retries.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The name is already bound to a definition that may not be replaced.
    #[error("element '{name}' already defined")]
    DuplicateDefinition { name: String },

    /// The name is not a valid custom element name.
    #[error("invalid element name '{name}': {reason}")]
    InvalidName { name: String, reason: &'static str },

    /// A descriptor failed the structural checks of the normalizer.
    #[error("malformed descriptor for '{key}': {reason}")]
    MalformedDescriptor { key: String, reason: String },

    #[error("circular get invocation is forbidden: '{key}'")]
    CircularGet { key: String },

    #[error("cannot set '{key}' of <{element}> inside a get call")]
    SetDuringGet { key: String, element: String },

    #[error("cannot invalidate '{key}' of <{element}> inside a get call")]
    InvalidateDuringGet { key: String, element: String },

    /// Write to a key whose descriptor has no `set`.
    #[error("property '{key}' of <{element}> is read-only")]
    ReadOnly { key: String, element: String },

    #[error("unknown property '{key}' on <{element}>")]
    UnknownProperty { key: String, element: String },

    /// Property access on a node that is not backed by a component class.
    #[error("<{element}> is not a component instance")]
    NotAComponent { element: String },

    #[error("cannot coerce {found} into {expected} for '{key}'")]
    Coercion {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Invalid tree mutation.
    #[error("hierarchy request failed: {0}")]
    Hierarchy(&'static str),

    /// Failure raised by user code.
    #[error("{0}")]
    Custom(String),
}

impl Error {
    /// Wrap an arbitrary message raised by a user callback.
    #[must_use]
    pub fn custom(message: impl Into<String>) -> Self {
        Self::Custom(message.into())
    }

    #[must_use]
    pub fn malformed(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDescriptor {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a definition conflict.
    #[must_use]
    pub fn is_duplicate_definition(&self) -> bool {
        matches!(self, Self::DuplicateDefinition { .. })
    }
}
