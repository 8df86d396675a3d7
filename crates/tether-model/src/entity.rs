//! The [`Entity`]: an addressable record with scalar properties and
//! lazily resolved associations.
//!
//! An entity's identity is its key; two instances are equal iff their keys
//! are equal, regardless of what either has loaded. Each instance owns its
//! association caches exclusively. Cached state is stamped with the
//! instance's epoch; [`Entity::reload`] bumps the epoch, which invalidates
//! every cached association at once without touching them individually.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use tether_types::{EntityId, EntityKey, Scalar};

use crate::association::{HasMany, HasOne};
use crate::context::Context;
use crate::error::{ModelResult, SchemaError};
use crate::schema::AssociationKind;

/// Cached resolution state for one association of one entity instance.
#[derive(Clone, Debug)]
pub(crate) struct AssociationCache {
    pub(crate) epoch: u64,
    pub(crate) state: CacheState,
}

/// The resolved value of an association.
#[derive(Clone, Debug)]
pub(crate) enum CacheState {
    /// A resolved to-many list, deduplicated, in first-occurrence order.
    Many(Vec<Entity>),
    /// A resolved to-one target; `None` caches "pointer unset".
    One(Option<Entity>),
}

/// A typed record identified by namespace, kind, and id.
#[derive(Clone)]
pub struct Entity {
    key: EntityKey,
    context: Context,
    properties: BTreeMap<String, Scalar>,
    edits: BTreeMap<String, Scalar>,
    epoch: u64,
    caches: HashMap<String, AssociationCache>,
}

impl Entity {
    pub(crate) fn new(
        key: EntityKey,
        context: Context,
        properties: BTreeMap<String, Scalar>,
    ) -> Self {
        Self {
            key,
            context,
            properties,
            edits: BTreeMap::new(),
            epoch: 0,
            caches: HashMap::new(),
        }
    }

    /// The canonical key identifying this entity.
    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// The entity id.
    pub fn id(&self) -> EntityId {
        self.key.id()
    }

    /// The entity kind.
    pub fn kind(&self) -> &str {
        self.key.kind()
    }

    /// The context this entity was loaded through.
    pub(crate) fn context(&self) -> &Context {
        &self.context
    }

    // -----------------------------------------------------------------------
    // Properties
    // -----------------------------------------------------------------------

    /// Read a property. Unsaved local edits shadow the loaded value.
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.edits.get(name).or_else(|| self.properties.get(name))
    }

    /// Stage a local edit to a declared property.
    ///
    /// The edit is not persisted until [`save`](Entity::save) and is
    /// discarded by [`reload`](Entity::reload).
    pub fn set(&mut self, name: &str, value: impl Into<Scalar>) -> ModelResult<()> {
        let declared = {
            let schema = self.context.schema_handle();
            schema.descriptor(self.kind())?.has_property(name)
        };
        if !declared {
            return Err(SchemaError::UndeclaredProperty {
                kind: self.kind().to_string(),
                name: name.to_string(),
            }
            .into());
        }
        self.edits.insert(name.to_string(), value.into());
        Ok(())
    }

    /// Persist the merged property map.
    pub fn save(&mut self) -> ModelResult<()> {
        let edits = std::mem::take(&mut self.edits);
        for (name, value) in edits {
            self.properties.insert(name, value);
        }
        self.context.save_properties(&self.key, &self.properties)?;
        debug!(key = %self.key, "saved entity");
        Ok(())
    }

    /// Discard cached association state and local edits, then re-read the
    /// scalar properties from the store.
    ///
    /// Subsequent association access re-resolves against current store
    /// state, picking up externally made mutations — including a
    /// reference-list key deleted out-of-band, which resolves to an empty
    /// association.
    pub fn reload(&mut self) -> ModelResult<()> {
        self.epoch += 1;
        self.caches.clear();
        self.edits.clear();
        self.properties = self.context.load_properties(&self.key)?;
        debug!(key = %self.key, epoch = self.epoch, "reloaded entity");
        Ok(())
    }

    /// Delete this entity's record and its own reference-list slots.
    ///
    /// References to this entity held by other owners are not chased; they
    /// dangle and fail loudly at their next resolution.
    pub fn delete(self) -> ModelResult<()> {
        let schema = self.context.schema_handle();
        let descriptor = schema.descriptor(self.kind())?;
        for assoc in descriptor.associations() {
            if assoc.cardinality == AssociationKind::HasMany {
                self.context
                    .store()
                    .delete(&self.key.association_key(&assoc.name)?)?;
            }
        }
        self.context.store().delete(&self.key.render())?;
        debug!(key = %self.key, "deleted entity");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Associations
    // -----------------------------------------------------------------------

    /// The accessor for a declared to-many association.
    pub fn has_many(&mut self, name: &str) -> ModelResult<HasMany<'_>> {
        let descriptor = {
            let schema = self.context.schema_handle();
            schema.association(self.kind(), name)?.clone()
        };
        if descriptor.cardinality != AssociationKind::HasMany {
            return Err(SchemaError::WrongCardinality {
                kind: self.kind().to_string(),
                name: name.to_string(),
                expected: AssociationKind::HasMany,
                actual: descriptor.cardinality,
            }
            .into());
        }
        Ok(HasMany::new(self, descriptor))
    }

    /// The accessor for a declared to-one association.
    pub fn has_one(&mut self, name: &str) -> ModelResult<HasOne<'_>> {
        let descriptor = {
            let schema = self.context.schema_handle();
            schema.association(self.kind(), name)?.clone()
        };
        if descriptor.cardinality != AssociationKind::HasOne {
            return Err(SchemaError::WrongCardinality {
                kind: self.kind().to_string(),
                name: name.to_string(),
                expected: AssociationKind::HasOne,
                actual: descriptor.cardinality,
            }
            .into());
        }
        Ok(HasOne::new(self, descriptor))
    }

    // -----------------------------------------------------------------------
    // Cache plumbing (used by the accessors)
    // -----------------------------------------------------------------------

    pub(crate) fn cached(&self, name: &str) -> Option<&CacheState> {
        self.caches
            .get(name)
            .filter(|cache| cache.epoch == self.epoch)
            .map(|cache| &cache.state)
    }

    pub(crate) fn cached_mut(&mut self, name: &str) -> Option<&mut CacheState> {
        let epoch = self.epoch;
        self.caches
            .get_mut(name)
            .filter(|cache| cache.epoch == epoch)
            .map(|cache| &mut cache.state)
    }

    pub(crate) fn cached_many(&self, name: &str) -> Option<&[Entity]> {
        match self.cached(name) {
            Some(CacheState::Many(list)) => Some(list),
            _ => None,
        }
    }

    pub(crate) fn put_cache(&mut self, name: &str, state: CacheState) {
        self.caches.insert(
            name.to_string(),
            AssociationCache {
                epoch: self.epoch,
                state,
            },
        );
    }

    /// A copy carrying this entity's identity and effective properties but
    /// none of its cached association state.
    pub(crate) fn snapshot(&self) -> Entity {
        let mut properties = self.properties.clone();
        for (name, value) in &self.edits {
            properties.insert(name.clone(), value.clone());
        }
        Entity::new(self.key.clone(), self.context.clone(), properties)
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("key", &self.key)
            .field("epoch", &self.epoch)
            .field("properties", &self.properties.len())
            .field("edits", &self.edits.len())
            .finish()
    }
}
