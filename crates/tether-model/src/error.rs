//! Error types for the object mapping layer.

use thiserror::Error;

use tether_store::StoreError;
use tether_types::KeyError;

use crate::schema::AssociationKind;

/// Errors from schema declaration and lookup.
///
/// Raised while building a [`Schema`](crate::schema::Schema) or when an
/// operation names an entity kind, property, or association the schema does
/// not declare.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The entity kind is not registered in the schema.
    #[error("unknown entity kind: {kind}")]
    UnknownEntity { kind: String },

    /// The same entity kind was declared twice.
    #[error("duplicate entity kind: {kind}")]
    DuplicateEntity { kind: String },

    /// The same property was declared twice on one kind (including the
    /// implicit `{association}_id` foreign key of a `has_one`).
    #[error("duplicate property: {kind}.{name}")]
    DuplicateProperty { kind: String, name: String },

    /// The same association name was declared twice on one kind.
    #[error("duplicate association: {kind}.{name}")]
    DuplicateAssociation { kind: String, name: String },

    /// The kind declares no association with this name.
    #[error("unknown association: {kind}.{name}")]
    UnknownAssociation { kind: String, name: String },

    /// The association exists but has the other cardinality.
    #[error("association {kind}.{name} is declared {actual:?}, not {expected:?}")]
    WrongCardinality {
        kind: String,
        name: String,
        expected: AssociationKind,
        actual: AssociationKind,
    },

    /// An association targets a kind that is not registered.
    #[error("association {kind}.{name} targets unregistered kind: {target}")]
    UnknownTarget {
        kind: String,
        name: String,
        target: String,
    },

    /// A declared reverse relation does not resolve to a `has_one` on the
    /// target kind pointing back at the declaring kind.
    #[error(
        "association {kind}.{name}: reverse {reverse:?} does not resolve to a has_one on {target} pointing back at {kind}"
    )]
    UnresolvedReverse {
        kind: String,
        name: String,
        target: String,
        reverse: String,
    },

    /// A property was written that the kind does not declare.
    #[error("undeclared property: {kind}.{name}")]
    UndeclaredProperty { kind: String, name: String },

    /// An entity of the wrong kind was passed to an association.
    #[error("association {kind}.{name} targets {expected}, got an entity of kind {found}")]
    TargetMismatch {
        kind: String,
        name: String,
        expected: String,
        found: String,
    },

    /// An identity component in a declaration is malformed.
    #[error("invalid identifier: {0}")]
    Key(#[from] KeyError),
}

/// Errors from entity and association operations.
#[derive(Debug, Error)]
pub enum ModelError {
    /// No record exists at the given key. Covers direct lookups, id lookups
    /// within an association, and dangling references discovered during
    /// resolution.
    #[error("entity not found: {key}")]
    NotFound { key: String },

    /// A reference list is present but cannot be decoded.
    #[error("corrupt association data at {key}: {reason}")]
    CorruptAssociation { key: String, reason: String },

    /// An entity record is present but cannot be decoded.
    #[error("corrupt entity record at {key}: {reason}")]
    CorruptRecord { key: String, reason: String },

    /// The reverse-pointer write of a `create`/`add` failed after the
    /// reference list was already appended. The list is left as written;
    /// both halves are identified so the caller can reconcile.
    #[error("reverse pointer write for {child} failed after {list_key} was appended: {source}")]
    ReversePointer {
        list_key: String,
        child: String,
        #[source]
        source: Box<ModelError>,
    },

    /// Serialization failure while encoding a persisted value.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An identity component is malformed.
    #[error("key error: {0}")]
    Key(#[from] KeyError),

    /// The backing store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// A schema declaration or lookup failed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
}

/// Result alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
