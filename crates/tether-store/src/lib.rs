//! Key-value store boundary for Tether.
//!
//! Tether never talks to a backend directly; everything above goes through
//! the [`KvStore`] trait. Any string-valued hash store (Redis-like servers,
//! embedded maps, test doubles) can sit behind it. The trait deliberately
//! stays small: point reads and writes, an atomic counter for id
//! allocation, and a prefix scan for enumeration. There are no
//! transactions — multi-key sequences built on top of this boundary are
//! exactly as atomic as their individual operations.
//!
//! # Modules
//!
//! - [`error`] — [`StoreError`], the backend failure type
//! - [`traits`] — The [`KvStore`] trait defining the storage interface
//! - [`memory`] — In-memory [`InMemoryKvStore`] for tests and embedding

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryKvStore;
pub use traits::KvStore;
