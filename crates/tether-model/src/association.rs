//! Lazy, cached association accessors.
//!
//! An accessor is a short-lived view bound to one owner instance and one
//! declared association. Resolution happens at most once per owner cache
//! epoch: the first read decodes the persisted state, maps every referenced
//! key through the context, and parks the result on the owner. Mutation
//! (`create`/`add`) writes through to the store and keeps a live cache
//! consistent.
//!
//! Resolution is loud about integrity drift: a reference to a target that
//! no longer exists fails the whole resolution instead of silently
//! shrinking the collection, and a corrupt reference list is an error, not
//! an empty association.

use std::collections::HashSet;

use tracing::debug;

use tether_types::{EntityId, EntityKey, Scalar};

use crate::codec;
use crate::entity::{CacheState, Entity};
use crate::error::{ModelError, ModelResult, SchemaError};
use crate::schema::{foreign_key_property, AssociationDescriptor};

/// Mutable view of a to-many association on one owner instance.
#[derive(Debug)]
pub struct HasMany<'a> {
    owner: &'a mut Entity,
    descriptor: AssociationDescriptor,
}

impl<'a> HasMany<'a> {
    pub(crate) fn new(owner: &'a mut Entity, descriptor: AssociationDescriptor) -> Self {
        Self { owner, descriptor }
    }

    /// Number of distinct entities in the association.
    pub fn size(&mut self) -> ModelResult<usize> {
        Ok(self.resolved()?.len())
    }

    /// Returns `true` if the association resolves to nothing.
    pub fn is_empty(&mut self) -> ModelResult<bool> {
        Ok(self.resolved()?.is_empty())
    }

    /// The resolved entities, deduplicated, in first-occurrence order.
    pub fn entities(&mut self) -> ModelResult<&[Entity]> {
        self.resolved()
    }

    /// The entity at `index`, or `None` past the end.
    pub fn get(&mut self, index: usize) -> ModelResult<Option<Entity>> {
        Ok(self.resolved()?.get(index).cloned())
    }

    /// The member with the given id.
    ///
    /// This is id lookup within the resolved association, not a store-wide
    /// scan; fails with [`ModelError::NotFound`] if no member matches.
    pub fn find(&mut self, id: u64) -> ModelResult<Entity> {
        let id = EntityId::new(id);
        let missing = EntityKey::new(
            self.owner.key().namespace().clone(),
            self.descriptor.target.clone(),
            id,
        )?;
        match self.resolved()?.iter().find(|e| e.id() == id) {
            Some(entity) => Ok(entity.clone()),
            None => Err(ModelError::NotFound {
                key: missing.render(),
            }),
        }
    }

    /// Create a new target entity and associate it with the owner.
    ///
    /// The new entity is persisted, its key is appended to the reference
    /// list, and, when this association declares a reverse relation, the
    /// child's foreign-key pointer is durably written back to the owner —
    /// after which the child answers its reverse lookup from cache, with no
    /// further store round-trip. A live owner cache is extended in place.
    pub fn create(&mut self, attributes: &[(&str, Scalar)]) -> ModelResult<Entity> {
        let mut child = self
            .owner
            .context()
            .create(&self.descriptor.target, attributes)?;
        self.append(child.key().clone())?;
        self.wire_reverse(&mut child)?;
        if let Some(CacheState::Many(list)) = self.owner.cached_mut(&self.descriptor.name) {
            list.push(child.clone());
        }
        Ok(child)
    }

    /// Associate an already-persisted entity with the owner.
    ///
    /// The key is appended without a presence check: repeated `add` of the
    /// same entity duplicates it in the persisted list, and the duplicate
    /// collapses at the next resolution's dedup step. The reverse relation,
    /// when declared, is maintained exactly as in
    /// [`create`](HasMany::create).
    pub fn add(&mut self, child: &mut Entity) -> ModelResult<()> {
        if child.kind() != self.descriptor.target {
            return Err(SchemaError::TargetMismatch {
                kind: self.owner.kind().to_string(),
                name: self.descriptor.name.clone(),
                expected: self.descriptor.target.clone(),
                found: child.kind().to_string(),
            }
            .into());
        }
        self.append(child.key().clone())?;
        self.wire_reverse(child)?;
        if let Some(CacheState::Many(list)) = self.owner.cached_mut(&self.descriptor.name) {
            // The materialized view holds each entity at most once even
            // though the persisted list may now carry a duplicate.
            if !list.iter().any(|e| e.key() == child.key()) {
                list.push(child.clone());
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    fn resolved(&mut self) -> ModelResult<&[Entity]> {
        if self.owner.cached_many(&self.descriptor.name).is_none() {
            let list = self.load()?;
            self.owner
                .put_cache(&self.descriptor.name, CacheState::Many(list));
        }
        Ok(self
            .owner
            .cached_many(&self.descriptor.name)
            .expect("association cache populated during resolution"))
    }

    /// Decode the reference list and map every key through the context.
    ///
    /// Duplicate keys resolve once, keeping first-occurrence order; the
    /// persisted list is not corrected. A dangling reference is a hard
    /// failure.
    fn load(&self) -> ModelResult<Vec<Entity>> {
        let slot = self.slot()?;
        let raw = self.owner.context().store().get(&slot)?;
        let keys = codec::decode_list(&slot, raw.as_deref())?;

        let mut seen = HashSet::new();
        let mut entities = Vec::new();
        for text in keys {
            if !seen.insert(text.clone()) {
                continue;
            }
            let key = EntityKey::parse(&text)?;
            entities.push(self.owner.context().find_by_key(&key)?);
        }
        debug!(slot = %slot, count = entities.len(), "resolved has_many association");
        Ok(entities)
    }

    /// Append `child_key` to the persisted reference list.
    ///
    /// Read-modify-write over single-key store operations; concurrent
    /// writers to the same owner can lose an update.
    fn append(&self, child_key: EntityKey) -> ModelResult<()> {
        let slot = self.slot()?;
        let store = self.owner.context().store();
        let raw = store.get(&slot)?;
        let mut keys = codec::decode_list(&slot, raw.as_deref())?;
        keys.push(child_key.render());
        store.set(&slot, &codec::encode_list(&keys)?)?;
        debug!(slot = %slot, appended = %child_key, "appended to reference list");
        Ok(())
    }

    /// Write the child's foreign-key pointer back at the owner and let the
    /// child answer its reverse lookup from cache.
    ///
    /// Runs after the reference list was appended. A failure here is
    /// reported with both halves identified; the appended list stays as
    /// written.
    fn wire_reverse(&self, child: &mut Entity) -> ModelResult<()> {
        let Some(reverse) = self.descriptor.reverse.clone() else {
            return Ok(());
        };
        let fk = foreign_key_property(&reverse);
        child.set(&fk, Scalar::Int(self.owner.id().value() as i64))?;
        if let Err(source) = child.save() {
            return Err(ModelError::ReversePointer {
                list_key: self.slot()?,
                child: child.key().render(),
                source: Box::new(source),
            });
        }
        child.put_cache(&reverse, CacheState::One(Some(self.owner.snapshot())));
        Ok(())
    }

    fn slot(&self) -> ModelResult<String> {
        Ok(self.owner.key().association_key(&self.descriptor.name)?)
    }
}

/// Read view of a to-one association on one owner instance.
#[derive(Debug)]
pub struct HasOne<'a> {
    owner: &'a mut Entity,
    descriptor: AssociationDescriptor,
}

impl<'a> HasOne<'a> {
    pub(crate) fn new(owner: &'a mut Entity, descriptor: AssociationDescriptor) -> Self {
        Self { owner, descriptor }
    }

    /// The target entity, or `None` if the pointer is unset.
    ///
    /// Resolves through the `{name}_id` foreign-key property; an unset
    /// pointer is absence, not an error, while a pointer at a missing
    /// record fails with [`ModelError::NotFound`]. The result — including
    /// absence — is cached until the owner reloads.
    pub fn get(&mut self) -> ModelResult<Option<Entity>> {
        if let Some(CacheState::One(cached)) = self.owner.cached(&self.descriptor.name) {
            return Ok(cached.clone());
        }
        let resolved = self.lookup()?;
        self.owner
            .put_cache(&self.descriptor.name, CacheState::One(resolved.clone()));
        Ok(resolved)
    }

    fn lookup(&self) -> ModelResult<Option<Entity>> {
        let fk = foreign_key_property(&self.descriptor.name);
        match self.owner.get(&fk) {
            None => Ok(None),
            Some(Scalar::Int(id)) if *id >= 0 => {
                let entity = self
                    .owner
                    .context()
                    .find(&self.descriptor.target, *id as u64)?;
                debug!(owner = %self.owner.key(), target = %entity.key(), "resolved has_one association");
                Ok(Some(entity))
            }
            Some(other) => Err(ModelError::CorruptRecord {
                key: self.owner.key().render(),
                reason: format!("foreign key {fk} holds non-id value: {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, RwLock};

    use tether_store::{InMemoryKvStore, KvStore, StoreError, StoreResult};
    use tether_types::Namespace;

    use crate::context::Context;
    use crate::schema::Schema;

    fn schema() -> Arc<Schema> {
        Arc::new(
            Schema::builder()
                .entity("puzzle", |e| {
                    e.property("topic")
                        .has_many("pieces", "piece", Some("puzzle"))
                })
                .entity("piece", |e| e.property("color").has_one("puzzle", "puzzle"))
                .build()
                .unwrap(),
        )
    }

    fn context() -> (Context, Arc<InMemoryKvStore>) {
        let store = Arc::new(InMemoryKvStore::new());
        let ctx = Context::new(Namespace::ephemeral(), schema(), store.clone());
        (ctx, store)
    }

    fn color_of(entity: &Entity) -> Option<&str> {
        entity.get("color").and_then(Scalar::as_str)
    }

    /// Store double counting reads, for asserting cache behavior.
    struct CountingStore {
        inner: InMemoryKvStore,
        reads: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryKvStore::new(),
                reads: AtomicUsize::new(0),
            }
        }

        fn reads(&self) -> usize {
            self.reads.load(Ordering::SeqCst)
        }
    }

    impl KvStore for CountingStore {
        fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> StoreResult<bool> {
            self.inner.delete(key)
        }

        fn incr(&self, key: &str) -> StoreResult<u64> {
            self.inner.incr(key)
        }

        fn scan(&self, prefix: &str) -> StoreResult<Vec<String>> {
            self.inner.scan(prefix)
        }
    }

    /// Store double that fails writes to keys containing a fragment, for
    /// exercising partial dual-write failures.
    struct FailingStore {
        inner: InMemoryKvStore,
        deny: RwLock<Option<String>>,
    }

    impl FailingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryKvStore::new(),
                deny: RwLock::new(None),
            }
        }

        fn deny_writes_to(&self, fragment: &str) {
            *self.deny.write().expect("lock poisoned") = Some(fragment.to_string());
        }
    }

    impl KvStore for FailingStore {
        fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            if let Some(fragment) = self.deny.read().expect("lock poisoned").as_deref() {
                if key.contains(fragment) {
                    return Err(StoreError::Backend("injected write failure".into()));
                }
            }
            self.inner.set(key, value)
        }

        fn delete(&self, key: &str) -> StoreResult<bool> {
            self.inner.delete(key)
        }

        fn incr(&self, key: &str) -> StoreResult<u64> {
            self.inner.incr(key)
        }

        fn scan(&self, prefix: &str) -> StoreResult<Vec<String>> {
            self.inner.scan(prefix)
        }
    }

    // -----------------------------------------------------------------------
    // Resolution
    // -----------------------------------------------------------------------

    #[test]
    fn empty_by_default() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut pieces = puzzle.has_many("pieces").unwrap();
        assert_eq!(pieces.size().unwrap(), 0);
        assert!(pieces.is_empty().unwrap());
        assert!(pieces.entities().unwrap().is_empty());
    }

    #[test]
    fn resolves_children_written_out_of_band() {
        let (ctx, store) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let red = ctx.create("piece", &[("color", "red".into())]).unwrap();
        let blue = ctx.create("piece", &[("color", "blue".into())]).unwrap();
        let slot = puzzle.key().association_key("pieces").unwrap();
        store
            .set(&slot, &format!(r#"["{}","{}"]"#, red.key(), blue.key()))
            .unwrap();

        let mut pieces = puzzle.has_many("pieces").unwrap();
        assert_eq!(pieces.size().unwrap(), 2);
        let first = pieces.get(0).unwrap().unwrap();
        assert_eq!(first.kind(), "piece");
        assert_eq!(color_of(&first), Some("red"));
    }

    #[test]
    fn duplicate_references_resolve_once_preserving_first_occurrence() {
        let (ctx, store) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let red = ctx.create("piece", &[("color", "red".into())]).unwrap();
        let slot = puzzle.key().association_key("pieces").unwrap();
        store
            .set(&slot, &format!(r#"["{0}","{0}"]"#, red.key()))
            .unwrap();

        let mut pieces = puzzle.has_many("pieces").unwrap();
        assert_eq!(pieces.size().unwrap(), 1);
        assert_eq!(color_of(&pieces.get(0).unwrap().unwrap()), Some("red"));
    }

    #[test]
    fn indexed_access_past_the_end_is_none() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        assert!(puzzle.has_many("pieces").unwrap().get(5).unwrap().is_none());
    }

    #[test]
    fn dangling_reference_fails_resolution() {
        let (ctx, store) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let piece = puzzle.has_many("pieces").unwrap().create(&[]).unwrap();
        store.delete(&piece.key().render()).unwrap();
        puzzle.reload().unwrap();

        let err = puzzle.has_many("pieces").unwrap().size().unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }

    #[test]
    fn corrupt_reference_list_is_an_error_not_empty() {
        let (ctx, store) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let slot = puzzle.key().association_key("pieces").unwrap();
        store.set(&slot, "{broken").unwrap();

        let err = puzzle.has_many("pieces").unwrap().size().unwrap_err();
        assert!(matches!(err, ModelError::CorruptAssociation { .. }));
    }

    // -----------------------------------------------------------------------
    // Caching and reload
    // -----------------------------------------------------------------------

    #[test]
    fn resolution_is_cached_until_reload() {
        let (ctx, store) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        puzzle.has_many("pieces").unwrap().create(&[]).unwrap();
        assert_eq!(puzzle.has_many("pieces").unwrap().size().unwrap(), 1);

        let slot = puzzle.key().association_key("pieces").unwrap();
        store.delete(&slot).unwrap();

        // Still served from the instance cache.
        assert_eq!(puzzle.has_many("pieces").unwrap().size().unwrap(), 1);

        puzzle.reload().unwrap();
        assert_eq!(puzzle.has_many("pieces").unwrap().size().unwrap(), 0);
    }

    #[test]
    fn reload_resets_associations_deleted_out_of_band() {
        let (ctx, store) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        puzzle
            .has_many("pieces")
            .unwrap()
            .create(&[("color", "black".into())])
            .unwrap();

        let slot = puzzle.key().association_key("pieces").unwrap();
        store.delete(&slot).unwrap();
        puzzle.reload().unwrap();
        assert!(puzzle.has_many("pieces").unwrap().is_empty().unwrap());
    }

    #[test]
    fn two_children_then_out_of_band_delete_then_reload() {
        let (ctx, store) = context();
        let mut owner = ctx.create("puzzle", &[]).unwrap();
        {
            let mut items = owner.has_many("pieces").unwrap();
            items.create(&[]).unwrap();
            items.create(&[]).unwrap();
            assert_eq!(items.size().unwrap(), 2);
        }

        let slot = owner.key().association_key("pieces").unwrap();
        store.delete(&slot).unwrap();
        owner.reload().unwrap();
        assert_eq!(owner.has_many("pieces").unwrap().size().unwrap(), 0);
    }

    #[test]
    fn cached_resolution_does_not_reread_the_store() {
        let store = Arc::new(CountingStore::new());
        let ctx = Context::new(Namespace::ephemeral(), schema(), store.clone());
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        puzzle.has_many("pieces").unwrap().create(&[]).unwrap();

        let mut pieces = puzzle.has_many("pieces").unwrap();
        pieces.size().unwrap();
        let after_first = store.reads();
        pieces.size().unwrap();
        pieces.entities().unwrap();
        assert_eq!(store.reads(), after_first);
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    #[test]
    fn create_works_without_attributes() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let piece = puzzle.has_many("pieces").unwrap().create(&[]).unwrap();
        assert_eq!(piece.kind(), "piece");
    }

    #[test]
    fn create_stores_a_new_child() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        puzzle
            .has_many("pieces")
            .unwrap()
            .create(&[("color", "green".into())])
            .unwrap();
        assert_eq!(puzzle.has_many("pieces").unwrap().size().unwrap(), 1);

        puzzle.reload().unwrap();
        let mut pieces = puzzle.has_many("pieces").unwrap();
        assert_eq!(pieces.size().unwrap(), 1);
        let first = pieces.get(0).unwrap().unwrap();
        assert_eq!(first.kind(), "piece");
        assert_eq!(color_of(&first), Some("green"));
    }

    #[test]
    fn create_extends_a_live_cache() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut pieces = puzzle.has_many("pieces").unwrap();
        assert_eq!(pieces.size().unwrap(), 0); // resolve first
        pieces.create(&[("color", "green".into())]).unwrap();
        assert_eq!(pieces.size().unwrap(), 1);
    }

    #[test]
    fn create_then_find_without_reload() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut pieces = puzzle.has_many("pieces").unwrap();
        let created = pieces.create(&[("color", "blue".into())]).unwrap();
        let found = pieces.find(created.id().value()).unwrap();
        assert_eq!(found, created);
    }

    #[test]
    fn create_associates_the_child_with_the_owner() {
        let (ctx, _) = context();
        let mut puzzle = ctx
            .create("puzzle", &[("topic", "provence".into())])
            .unwrap();
        let mut piece = puzzle
            .has_many("pieces")
            .unwrap()
            .create(&[("color", "green".into())])
            .unwrap();

        let parent = piece.has_one("puzzle").unwrap().get().unwrap().unwrap();
        assert_eq!(parent, puzzle);
        assert_eq!(parent.get("topic").and_then(Scalar::as_str), Some("provence"));
    }

    #[test]
    fn reverse_pointer_resolves_without_a_store_read() {
        let store = Arc::new(CountingStore::new());
        let ctx = Context::new(Namespace::ephemeral(), schema(), store.clone());
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut piece = puzzle.has_many("pieces").unwrap().create(&[]).unwrap();

        let before = store.reads();
        let parent = piece.has_one("puzzle").unwrap().get().unwrap().unwrap();
        assert_eq!(store.reads(), before);
        assert_eq!(parent, puzzle);
    }

    #[test]
    fn reverse_pointer_is_durable() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let piece = puzzle.has_many("pieces").unwrap().create(&[]).unwrap();

        // A fresh instance resolves the pointer from the store.
        let mut refetched = ctx.find("piece", piece.id().value()).unwrap();
        let parent = refetched.has_one("puzzle").unwrap().get().unwrap().unwrap();
        assert_eq!(parent, puzzle);
    }

    // -----------------------------------------------------------------------
    // Add
    // -----------------------------------------------------------------------

    #[test]
    fn add_associates_an_existing_entity() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut piece = ctx.create("piece", &[("color", "white".into())]).unwrap();

        puzzle.has_many("pieces").unwrap().add(&mut piece).unwrap();
        assert_eq!(puzzle.has_many("pieces").unwrap().size().unwrap(), 1);

        puzzle.reload().unwrap();
        let mut pieces = puzzle.has_many("pieces").unwrap();
        assert_eq!(pieces.size().unwrap(), 1);
        assert_eq!(color_of(&pieces.get(0).unwrap().unwrap()), Some("white"));
    }

    #[test]
    fn add_maintains_the_reverse_pointer() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut piece = ctx.create("piece", &[]).unwrap();

        puzzle.has_many("pieces").unwrap().add(&mut piece).unwrap();
        let parent = piece.has_one("puzzle").unwrap().get().unwrap().unwrap();
        assert_eq!(parent, puzzle);
    }

    #[test]
    fn add_twice_duplicates_the_list_but_resolves_once() {
        let (ctx, store) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut piece = ctx.create("piece", &[]).unwrap();

        {
            let mut pieces = puzzle.has_many("pieces").unwrap();
            pieces.add(&mut piece).unwrap();
            pieces.add(&mut piece).unwrap();
        }

        // The persisted list carries the duplicate; it is not corrected.
        let slot = puzzle.key().association_key("pieces").unwrap();
        let raw = store.get(&slot).unwrap().unwrap();
        let persisted: Vec<String> = serde_json::from_str(&raw).unwrap();
        assert_eq!(persisted.len(), 2);

        assert_eq!(puzzle.has_many("pieces").unwrap().size().unwrap(), 1);
        puzzle.reload().unwrap();
        assert_eq!(puzzle.has_many("pieces").unwrap().size().unwrap(), 1);
    }

    #[test]
    fn add_twice_with_a_live_cache_keeps_the_view_deduplicated() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut piece = ctx.create("piece", &[]).unwrap();

        let mut pieces = puzzle.has_many("pieces").unwrap();
        assert_eq!(pieces.size().unwrap(), 0); // resolve before mutating
        pieces.add(&mut piece).unwrap();
        pieces.add(&mut piece).unwrap();
        assert_eq!(pieces.size().unwrap(), 1);
    }

    #[test]
    fn add_rejects_an_entity_of_the_wrong_kind() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut other = ctx.create("puzzle", &[]).unwrap();

        let err = puzzle.has_many("pieces").unwrap().add(&mut other).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Schema(SchemaError::TargetMismatch { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Find within the association
    // -----------------------------------------------------------------------

    #[test]
    fn find_returns_the_member_with_the_given_id() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut pieces = puzzle.has_many("pieces").unwrap();
        for _ in 0..5 {
            pieces.create(&[("color", "blue".into())]).unwrap();
        }

        let third = pieces.get(2).unwrap().unwrap();
        assert_eq!(pieces.find(third.id().value()).unwrap(), third);
    }

    #[test]
    fn find_fails_for_an_id_outside_the_association() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut pieces = puzzle.has_many("pieces").unwrap();
        pieces.create(&[]).unwrap();

        let err = pieces.find(999).unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }

    #[test]
    fn find_does_not_scan_the_store_for_foreign_members() {
        let (ctx, _) = context();
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        // A piece that exists in the store but not in this association.
        let stray = ctx.create("piece", &[]).unwrap();

        let err = puzzle
            .has_many("pieces")
            .unwrap()
            .find(stray.id().value())
            .unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }

    // -----------------------------------------------------------------------
    // Partial dual-write failure
    // -----------------------------------------------------------------------

    #[test]
    fn reverse_write_failure_reports_both_halves_and_keeps_the_list() {
        let store = Arc::new(FailingStore::new());
        let ctx = Context::new(Namespace::ephemeral(), schema(), store.clone());
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut piece = ctx.create("piece", &[]).unwrap();
        store.deny_writes_to(&piece.key().render());

        let err = puzzle.has_many("pieces").unwrap().add(&mut piece).unwrap_err();
        let slot = puzzle.key().association_key("pieces").unwrap();
        match err {
            ModelError::ReversePointer {
                list_key, child, ..
            } => {
                assert_eq!(list_key, slot);
                assert_eq!(child, piece.key().render());
            }
            other => panic!("expected ReversePointer, got {other:?}"),
        }

        // The appended list is left intact: reported, not rolled back.
        let raw = store.get(&slot).unwrap().unwrap();
        assert!(raw.contains(&piece.key().render()));
    }

    #[test]
    fn list_append_failure_surfaces_as_a_store_error() {
        let store = Arc::new(FailingStore::new());
        let ctx = Context::new(Namespace::ephemeral(), schema(), store.clone());
        let mut puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut piece = ctx.create("piece", &[]).unwrap();
        store.deny_writes_to("_pieces");

        let err = puzzle.has_many("pieces").unwrap().add(&mut piece).unwrap_err();
        assert!(matches!(err, ModelError::Store(_)));
    }

    // -----------------------------------------------------------------------
    // HasOne
    // -----------------------------------------------------------------------

    #[test]
    fn unset_pointer_is_absent_not_an_error() {
        let (ctx, _) = context();
        let mut piece = ctx.create("piece", &[]).unwrap();
        assert!(piece.has_one("puzzle").unwrap().get().unwrap().is_none());
    }

    #[test]
    fn foreign_key_property_resolves_through_find() {
        let (ctx, _) = context();
        let puzzle = ctx.create("puzzle", &[("topic", "alps".into())]).unwrap();
        let mut piece = ctx.create("piece", &[]).unwrap();
        piece
            .set("puzzle_id", Scalar::Int(puzzle.id().value() as i64))
            .unwrap();

        let parent = piece.has_one("puzzle").unwrap().get().unwrap().unwrap();
        assert_eq!(parent, puzzle);
    }

    #[test]
    fn dangling_foreign_key_fails_loudly() {
        let (ctx, _) = context();
        let mut piece = ctx.create("piece", &[]).unwrap();
        piece.set("puzzle_id", Scalar::Int(99)).unwrap();

        let err = piece.has_one("puzzle").unwrap().get().unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }

    #[test]
    fn non_numeric_foreign_key_is_corruption() {
        let (ctx, _) = context();
        let mut piece = ctx.create("piece", &[]).unwrap();
        piece.set("puzzle_id", "nope").unwrap();

        let err = piece.has_one("puzzle").unwrap().get().unwrap_err();
        assert!(matches!(err, ModelError::CorruptRecord { .. }));
    }

    #[test]
    fn absent_result_is_cached_until_reload() {
        let store = Arc::new(CountingStore::new());
        let ctx = Context::new(Namespace::ephemeral(), schema(), store.clone());
        let mut piece = ctx.create("piece", &[]).unwrap();

        assert!(piece.has_one("puzzle").unwrap().get().unwrap().is_none());
        let after_first = store.reads();
        assert!(piece.has_one("puzzle").unwrap().get().unwrap().is_none());
        assert_eq!(store.reads(), after_first);
    }

    #[test]
    fn reload_invalidates_the_cached_pointer() {
        let (ctx, store) = context();
        let puzzle = ctx.create("puzzle", &[]).unwrap();
        let mut piece = ctx.create("piece", &[]).unwrap();
        piece
            .set("puzzle_id", Scalar::Int(puzzle.id().value() as i64))
            .unwrap();
        piece.save().unwrap();
        assert!(piece.has_one("puzzle").unwrap().get().unwrap().is_some());

        store.delete(&puzzle.key().render()).unwrap();
        // Cached across the out-of-band delete...
        assert!(piece.has_one("puzzle").unwrap().get().unwrap().is_some());
        // ...until reload, after which the dangling pointer fails loudly.
        piece.reload().unwrap();
        let err = piece.has_one("puzzle").unwrap().get().unwrap_err();
        assert!(matches!(err, ModelError::NotFound { .. }));
    }
}
