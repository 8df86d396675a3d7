//! Association descriptors and the process-wide schema registry.
//!
//! Entity kinds and their relationships are declared once, up front, through
//! [`SchemaBuilder`]; the resulting [`Schema`] is read-only and shared
//! (`Arc`) by every [`Context`](crate::context::Context). Declarations are
//! validated at build time so that use-time code never meets a dangling
//! target kind or an unresolved reverse relation.

use std::collections::{BTreeMap, BTreeSet};

use tether_types::{validate_association_name, validate_kind};

use crate::error::SchemaError;

/// Cardinality of a declared association.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssociationKind {
    /// A to-one relationship, backed by a foreign-key property.
    HasOne,
    /// A to-many relationship, backed by a persisted reference list.
    HasMany,
}

/// One declared relationship on an entity kind.
#[derive(Clone, Debug)]
pub struct AssociationDescriptor {
    /// Association name, unique per declaring kind.
    pub name: String,
    /// Cardinality.
    pub cardinality: AssociationKind,
    /// Target entity kind.
    pub target: String,
    /// For a `has_many`: the name of the `has_one` on the target kind that
    /// points back at the declaring kind. Maintained automatically by the
    /// many-side accessor on `create`/`add`.
    pub reverse: Option<String>,
}

/// The property name backing a `has_one` association.
///
/// A `has_one` named `puzzle` stores its pointer in the scalar property
/// `puzzle_id` on the declaring kind.
pub fn foreign_key_property(association: &str) -> String {
    format!("{association}_id")
}

/// Declared shape of one entity kind: scalar properties and associations.
#[derive(Clone, Debug)]
pub struct EntityDescriptor {
    kind: String,
    properties: BTreeSet<String>,
    associations: BTreeMap<String, AssociationDescriptor>,
}

impl EntityDescriptor {
    /// The entity kind this descriptor describes.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns `true` if `name` is a declared property (explicit, or the
    /// implicit foreign key of a `has_one`).
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains(name)
    }

    /// The declared association with this name, if any.
    pub fn association(&self, name: &str) -> Option<&AssociationDescriptor> {
        self.associations.get(name)
    }

    /// All declared associations, in name order.
    pub fn associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations.values()
    }

    /// All declared property names, in order.
    pub fn properties(&self) -> impl Iterator<Item = &str> {
        self.properties.iter().map(String::as_str)
    }
}

/// The validated, read-only registry of entity declarations.
#[derive(Debug)]
pub struct Schema {
    entities: BTreeMap<String, EntityDescriptor>,
}

impl Schema {
    /// Start declaring a schema.
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    /// The descriptor for an entity kind.
    pub fn descriptor(&self, kind: &str) -> Result<&EntityDescriptor, SchemaError> {
        self.entities
            .get(kind)
            .ok_or_else(|| SchemaError::UnknownEntity {
                kind: kind.to_string(),
            })
    }

    /// The descriptor for one association of an entity kind.
    pub fn association(
        &self,
        kind: &str,
        name: &str,
    ) -> Result<&AssociationDescriptor, SchemaError> {
        self.descriptor(kind)?
            .association(name)
            .ok_or_else(|| SchemaError::UnknownAssociation {
                kind: kind.to_string(),
                name: name.to_string(),
            })
    }

    /// All registered entity descriptors, in kind order.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.values()
    }
}

/// Builder collecting entity declarations; validated as a whole by
/// [`build`](SchemaBuilder::build).
#[derive(Default)]
pub struct SchemaBuilder {
    entities: Vec<EntityBuilder>,
}

impl SchemaBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare one entity kind.
    pub fn entity(
        mut self,
        kind: impl Into<String>,
        declare: impl FnOnce(EntityBuilder) -> EntityBuilder,
    ) -> Self {
        self.entities.push(declare(EntityBuilder::new(kind.into())));
        self
    }

    /// Validate every declaration and produce the registry.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut entities: BTreeMap<String, EntityDescriptor> = BTreeMap::new();

        for builder in self.entities {
            validate_kind(&builder.kind)?;
            if entities.contains_key(&builder.kind) {
                return Err(SchemaError::DuplicateEntity { kind: builder.kind });
            }

            let mut properties = BTreeSet::new();
            for name in &builder.properties {
                if !properties.insert(name.clone()) {
                    return Err(SchemaError::DuplicateProperty {
                        kind: builder.kind.clone(),
                        name: name.clone(),
                    });
                }
            }

            let mut associations = BTreeMap::new();
            for descriptor in builder.associations {
                validate_association_name(&descriptor.name)?;
                if associations.contains_key(&descriptor.name) {
                    return Err(SchemaError::DuplicateAssociation {
                        kind: builder.kind.clone(),
                        name: descriptor.name,
                    });
                }
                if descriptor.cardinality == AssociationKind::HasOne {
                    let fk = foreign_key_property(&descriptor.name);
                    if !properties.insert(fk.clone()) {
                        return Err(SchemaError::DuplicateProperty {
                            kind: builder.kind.clone(),
                            name: fk,
                        });
                    }
                }
                associations.insert(descriptor.name.clone(), descriptor);
            }

            entities.insert(
                builder.kind.clone(),
                EntityDescriptor {
                    kind: builder.kind,
                    properties,
                    associations,
                },
            );
        }

        // Cross-entity checks, now that every kind is registered.
        for descriptor in entities.values() {
            for assoc in descriptor.associations.values() {
                let Some(target) = entities.get(&assoc.target) else {
                    return Err(SchemaError::UnknownTarget {
                        kind: descriptor.kind.clone(),
                        name: assoc.name.clone(),
                        target: assoc.target.clone(),
                    });
                };
                if let Some(reverse) = &assoc.reverse {
                    let resolves = matches!(
                        target.associations.get(reverse),
                        Some(back)
                            if back.cardinality == AssociationKind::HasOne
                                && back.target == descriptor.kind
                    );
                    if !resolves {
                        return Err(SchemaError::UnresolvedReverse {
                            kind: descriptor.kind.clone(),
                            name: assoc.name.clone(),
                            target: assoc.target.clone(),
                            reverse: reverse.clone(),
                        });
                    }
                }
            }
        }

        Ok(Schema { entities })
    }
}

/// Builder for one entity kind's properties and associations.
pub struct EntityBuilder {
    kind: String,
    properties: Vec<String>,
    associations: Vec<AssociationDescriptor>,
}

impl EntityBuilder {
    fn new(kind: String) -> Self {
        Self {
            kind,
            properties: Vec::new(),
            associations: Vec::new(),
        }
    }

    /// Declare a scalar property.
    pub fn property(mut self, name: impl Into<String>) -> Self {
        self.properties.push(name.into());
        self
    }

    /// Declare a to-many association. `reverse`, if given, names the
    /// `has_one` on the target kind that points back at this kind.
    pub fn has_many(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        reverse: Option<&str>,
    ) -> Self {
        self.associations.push(AssociationDescriptor {
            name: name.into(),
            cardinality: AssociationKind::HasMany,
            target: target.into(),
            reverse: reverse.map(str::to_string),
        });
        self
    }

    /// Declare a to-one association, implicitly declaring its
    /// `{name}_id` foreign-key property.
    pub fn has_one(mut self, name: impl Into<String>, target: impl Into<String>) -> Self {
        self.associations.push(AssociationDescriptor {
            name: name.into(),
            cardinality: AssociationKind::HasOne,
            target: target.into(),
            reverse: None,
        });
        self
    }
}
