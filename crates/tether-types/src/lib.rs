//! Foundation types for Tether: entity identity and scalar values.
//!
//! Tether maps typed entities with declared relationships onto a schemaless
//! string-valued key-value store. This crate holds the pieces everything else
//! builds on: validated namespaces, numeric entity ids, the canonical key
//! scheme, and the scalar values an entity's properties may hold.
//!
//! # Key scheme
//!
//! Every entity is addressed by a [`EntityKey`] rendered as
//! `namespace:kind:id` (e.g. `app:puzzle:7`). The kind is embedded in the
//! key so that heterogeneous ids never collide within a namespace. A
//! to-many association is stored under the owner's key plus an underscore
//! and the association name (`app:puzzle:7_pieces`); since ids are numeric,
//! association slots can never collide with entity records.
//!
//! # Modules
//!
//! - [`error`] — Validation errors for identity components
//! - [`identity`] — [`Namespace`] and [`EntityId`]
//! - [`key`] — [`EntityKey`] and the association key scheme
//! - [`scalar`] — [`Scalar`], the property value type

pub mod error;
pub mod identity;
pub mod key;
pub mod scalar;

pub use error::{KeyError, Result};
pub use identity::{EntityId, Namespace};
pub use key::{validate_association_name, validate_kind, EntityKey};
pub use scalar::Scalar;
