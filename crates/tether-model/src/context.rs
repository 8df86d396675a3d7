//! The [`Context`]: a namespace bound to a schema and a store backend.
//!
//! Everything that touches the store is threaded through a `Context`,
//! never through ambient global state. Contexts are cheap to clone
//! (shared interior) and every [`Entity`] carries one, so a process can
//! hold any number of isolated namespaces, each over its own backend.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use tether_store::KvStore;
use tether_types::{EntityId, EntityKey, Namespace, Scalar};

use crate::codec;
use crate::entity::Entity;
use crate::error::{ModelError, ModelResult, SchemaError};
use crate::schema::Schema;

/// Handle binding a namespace, a [`Schema`], and a [`KvStore`] backend.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    namespace: Namespace,
    schema: Arc<Schema>,
    store: Arc<dyn KvStore>,
}

impl Context {
    /// Open a context over `namespace`, backed by `store`, with entity
    /// declarations from `schema`.
    pub fn new(namespace: Namespace, schema: Arc<Schema>, store: Arc<dyn KvStore>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                namespace,
                schema,
                store,
            }),
        }
    }

    /// The namespace this context scopes.
    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    /// The schema registry.
    pub fn schema(&self) -> &Schema {
        &self.inner.schema
    }

    pub(crate) fn schema_handle(&self) -> Arc<Schema> {
        Arc::clone(&self.inner.schema)
    }

    pub(crate) fn store(&self) -> &dyn KvStore {
        self.inner.store.as_ref()
    }

    /// Create an entity of `kind` with the given initial properties.
    ///
    /// Allocates a fresh id from the kind's counter, persists the property
    /// map, and returns a fully loaded instance. Every attribute must be a
    /// declared property of the kind.
    pub fn create(&self, kind: &str, attributes: &[(&str, Scalar)]) -> ModelResult<Entity> {
        let schema = self.schema_handle();
        let descriptor = schema.descriptor(kind)?;

        let mut properties = BTreeMap::new();
        for (name, value) in attributes {
            if !descriptor.has_property(name) {
                return Err(SchemaError::UndeclaredProperty {
                    kind: kind.to_string(),
                    name: (*name).to_string(),
                }
                .into());
            }
            properties.insert((*name).to_string(), value.clone());
        }

        let id = self.inner.store.incr(&self.sequence_key(kind)?)?;
        let key = EntityKey::new(self.inner.namespace.clone(), kind, EntityId::new(id))?;
        self.save_properties(&key, &properties)?;
        debug!(key = %key, "created entity");
        Ok(Entity::new(key, self.clone(), properties))
    }

    /// Load the entity of `kind` with the given id.
    ///
    /// Fails with [`ModelError::NotFound`] if no record exists at that key;
    /// never returns a placeholder.
    pub fn find(&self, kind: &str, id: u64) -> ModelResult<Entity> {
        let key = EntityKey::new(self.inner.namespace.clone(), kind, EntityId::new(id))?;
        self.find_by_key(&key)
    }

    pub(crate) fn find_by_key(&self, key: &EntityKey) -> ModelResult<Entity> {
        let properties = self.load_properties(key)?;
        Ok(Entity::new(key.clone(), self.clone(), properties))
    }

    /// Load every entity of `kind` in this namespace, sorted by id.
    pub fn all(&self, kind: &str) -> ModelResult<Vec<Entity>> {
        self.schema().descriptor(kind)?;
        let prefix = EntityKey::kind_prefix(self.namespace(), kind)?;
        let keys = self.inner.store.scan(&prefix)?;

        let mut entities = Vec::new();
        for text in keys {
            // The prefix also covers association slots and the id counter;
            // only well-formed entity keys name records.
            let Ok(key) = EntityKey::parse(&text) else {
                continue;
            };
            entities.push(self.find_by_key(&key)?);
        }
        entities.sort_by_key(|e| e.id());
        Ok(entities)
    }

    pub(crate) fn load_properties(
        &self,
        key: &EntityKey,
    ) -> ModelResult<BTreeMap<String, Scalar>> {
        let rendered = key.render();
        let Some(raw) = self.inner.store.get(&rendered)? else {
            return Err(ModelError::NotFound { key: rendered });
        };
        codec::decode_properties(&rendered, &raw)
    }

    pub(crate) fn save_properties(
        &self,
        key: &EntityKey,
        properties: &BTreeMap<String, Scalar>,
    ) -> ModelResult<()> {
        let encoded = codec::encode_properties(properties)?;
        self.inner.store.set(&key.render(), &encoded)?;
        Ok(())
    }

    /// The counter key allocating ids for `kind`.
    ///
    /// The `~seq` suffix is not a valid id, so the counter can never shadow
    /// an entity record.
    fn sequence_key(&self, kind: &str) -> ModelResult<String> {
        let prefix = EntityKey::kind_prefix(self.namespace(), kind)?;
        Ok(format!("{prefix}~seq"))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("namespace", &self.inner.namespace)
            .finish()
    }
}
