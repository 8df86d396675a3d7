//! Validation errors for identity components and the key scheme.

use thiserror::Error;

/// Errors raised when an identity component or key text is malformed.
#[derive(Debug, Error)]
pub enum KeyError {
    /// The namespace is empty or contains forbidden characters.
    #[error("invalid namespace {name:?}: {reason}")]
    InvalidNamespace { name: String, reason: String },

    /// The entity kind is empty or contains forbidden characters.
    #[error("invalid entity kind {kind:?}: {reason}")]
    InvalidKind { kind: String, reason: String },

    /// The association name is empty or contains forbidden characters.
    #[error("invalid association name {name:?}: {reason}")]
    InvalidAssociationName { name: String, reason: String },

    /// A key string does not match the `namespace:kind:id` form.
    #[error("malformed entity key {key:?}: {reason}")]
    MalformedKey { key: String, reason: String },
}

/// Convenience type alias for key-scheme operations.
pub type Result<T> = std::result::Result<T, KeyError>;
