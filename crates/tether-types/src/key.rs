//! The canonical key scheme: `namespace:kind:id` entity keys and the
//! `{key}_{association}` slots for to-many reference lists.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::KeyError;
use crate::identity::{validate_segment, EntityId, Namespace};

/// Validate an entity kind segment, returning `Ok(())` if valid.
///
/// Kinds must be non-empty and must not contain `:`, whitespace, or control
/// characters.
pub fn validate_kind(kind: &str) -> Result<(), KeyError> {
    validate_segment(kind).map_err(|reason| KeyError::InvalidKind {
        kind: kind.to_string(),
        reason,
    })
}

/// Validate an association name, returning `Ok(())` if valid.
///
/// Same rules as entity kinds.
pub fn validate_association_name(name: &str) -> Result<(), KeyError> {
    validate_segment(name).map_err(|reason| KeyError::InvalidAssociationName {
        name: name.to_string(),
        reason,
    })
}

/// The canonical storage address of an entity.
///
/// A key embeds the entity kind, so ids from different kinds never collide
/// within a namespace. Keys are pure values: constructing or rendering one
/// has no side effects, and `parse(render(k)) == k` holds exactly.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    namespace: Namespace,
    kind: String,
    id: EntityId,
}

impl EntityKey {
    /// Build a key from its components, validating the kind.
    pub fn new(
        namespace: Namespace,
        kind: impl Into<String>,
        id: EntityId,
    ) -> Result<Self, KeyError> {
        let kind = kind.into();
        validate_kind(&kind)?;
        Ok(Self {
            namespace,
            kind,
            id,
        })
    }

    /// The namespace segment.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The entity kind segment.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The id segment.
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The canonical `namespace:kind:id` text form.
    pub fn render(&self) -> String {
        format!("{}:{}:{}", self.namespace, self.kind, self.id)
    }

    /// Parse a key from its canonical text form.
    pub fn parse(text: &str) -> Result<Self, KeyError> {
        let malformed = |reason: &str| KeyError::MalformedKey {
            key: text.to_string(),
            reason: reason.to_string(),
        };

        let mut segments = text.split(':');
        let (Some(namespace), Some(kind), Some(id), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return Err(malformed("expected exactly three ':'-separated segments"));
        };

        let namespace = Namespace::new(namespace)?;
        let id = id
            .parse::<EntityId>()
            .map_err(|_| malformed("id segment is not a non-negative integer"))?;
        Self::new(namespace, kind, id)
    }

    /// The storage slot for one of this entity's to-many associations.
    ///
    /// Ids are numeric, so `{key}_{name}` can never be mistaken for an
    /// entity record key.
    pub fn association_key(&self, name: &str) -> Result<String, KeyError> {
        validate_association_name(name)?;
        Ok(format!("{}_{}", self.render(), name))
    }

    /// The key prefix shared by every entity of `kind` in `namespace`.
    ///
    /// Used to enumerate records of one kind with a store scan.
    pub fn kind_prefix(namespace: &Namespace, kind: &str) -> Result<String, KeyError> {
        validate_kind(kind)?;
        Ok(format!("{namespace}:{kind}:"))
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({})", self.render())
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render())
    }
}
