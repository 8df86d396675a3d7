//! Core object mapping for Tether.
//!
//! This crate turns a schemaless string-valued key-value store into typed
//! entities with declared relationships. Application code registers entity
//! kinds and their associations in a [`Schema`], opens a [`Context`] over a
//! namespace and a store backend, and works with [`Entity`] instances whose
//! to-many and to-one relationships resolve lazily through [`HasMany`] and
//! [`HasOne`] accessors.
//!
//! # Architecture
//!
//! - **Schema registry** — association declarations are process-wide
//!   metadata built once via [`SchemaBuilder`] and validated up front:
//!   every target kind must be registered, and every declared reverse
//!   relation must resolve to a matching `has_one` on the target.
//! - **Reference lists** — a to-many association persists as an ordered
//!   JSON array of entity keys at `{owner-key}_{association}`. An absent
//!   slot is an empty association; present-but-undecodable data is a
//!   corruption error, never silently treated as empty.
//! - **Lazy caching** — each entity instance owns its resolved association
//!   state, stamped with the instance's cache epoch. `reload` bumps the
//!   epoch, invalidating every cached association at once.
//! - **Referential maintenance** — `create`/`add` on a `has_many` append to
//!   the persisted reference list and, when a reverse relation is declared,
//!   durably write the child's foreign-key pointer back to the owner. The
//!   two writes are not transactional; a failure of the second is reported
//!   with both halves identified, and the first is left in place.
//!
//! # Modules
//!
//! - [`error`] — [`ModelError`] and [`SchemaError`]
//! - [`schema`] — Association descriptors and the [`Schema`] registry
//! - [`codec`] — Persisted representations: reference lists, property maps
//! - [`context`] — [`Context`]: entity CRUD over a namespace + store
//! - [`entity`] — [`Entity`]: properties, epochs, reload
//! - [`association`] — The [`HasMany`] and [`HasOne`] accessors

pub mod association;
pub mod codec;
pub mod context;
pub mod entity;
pub mod error;
pub mod schema;

pub use association::{HasMany, HasOne};
pub use context::Context;
pub use entity::Entity;
pub use error::{ModelError, ModelResult, SchemaError};
pub use schema::{
    foreign_key_property, AssociationDescriptor, AssociationKind, EntityBuilder, EntityDescriptor,
    Schema, SchemaBuilder,
};
