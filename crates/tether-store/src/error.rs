//! Error types for key-value store operations.

use thiserror::Error;

/// Errors from key-value store operations.
///
/// Every backend failure is surfaced through this type; the store layer
/// never retries and never swallows an error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend rejected or failed the operation.
    #[error("backend error: {0}")]
    Backend(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// `incr` hit a key whose current value is not an unsigned integer.
    #[error("counter key {key:?} holds a non-numeric value")]
    NonNumericCounter { key: String },
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
