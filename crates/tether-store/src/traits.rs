//! The [`KvStore`] trait defining the storage interface.
//!
//! Any backend (in-memory, Redis-like server, embedded database) implements
//! this trait to hold Tether's entity records and reference lists.

use crate::error::StoreResult;

/// String-valued key-value store backend.
///
/// All implementations must satisfy these invariants:
/// - A single `get`, `set`, or `delete` is atomic with respect to other
///   callers of the same key.
/// - `incr` is an atomic counter primitive: concurrent callers never
///   observe the same value.
/// - Absent keys are a normal condition (`get` returns `Ok(None)`), never
///   an error.
/// - All backend failures are propagated, never silently ignored.
///
/// The trait provides no multi-key atomicity. Read-modify-write sequences
/// layered on top (such as appending to a reference list) are subject to a
/// lost-update race under concurrent writers; callers that need stronger
/// guarantees must serialize externally.
pub trait KvStore: Send + Sync {
    /// Read the value at `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write `value` at `key`, creating or overwriting.
    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete the value at `key`. Returns `true` if the key existed.
    fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Atomically increment the counter at `key` and return the new value.
    ///
    /// An absent key counts from zero, so the first call returns 1. Fails
    /// with [`StoreError::NonNumericCounter`] if the key holds a value that
    /// is not an unsigned integer.
    ///
    /// [`StoreError::NonNumericCounter`]: crate::error::StoreError::NonNumericCounter
    fn incr(&self, key: &str) -> StoreResult<u64>;

    /// List all keys starting with `prefix`, sorted.
    ///
    /// Pass `""` to list every key.
    fn scan(&self, prefix: &str) -> StoreResult<Vec<String>>;
}
