use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::KeyError;

/// Characters that are forbidden in namespaces, kinds, and association names.
///
/// `:` separates key segments, whitespace breaks log and wire formats.
const FORBIDDEN_CHARS: &[char] = &[':', ' ', '\t', '\n', '\r'];

/// A validated namespace scoping a set of entity records.
///
/// All keys produced for entities of one [`Namespace`] share its name as
/// their first segment, so two namespaces never see each other's records
/// even on a shared backend.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(String);

impl Namespace {
    /// Create a namespace, validating the name.
    ///
    /// Names must be non-empty and must not contain `:`, whitespace, or
    /// control characters.
    pub fn new(name: impl Into<String>) -> Result<Self, KeyError> {
        let name = name.into();
        validate_segment(&name).map_err(|reason| KeyError::InvalidNamespace {
            name: name.clone(),
            reason,
        })?;
        Ok(Self(name))
    }

    /// Create a unique throwaway namespace for tests and demos.
    pub fn ephemeral() -> Self {
        Self(format!("ns-{}", uuid::Uuid::now_v7().simple()))
    }

    /// The namespace name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Namespace({})", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A numeric entity identifier, assigned at creation and immutable.
///
/// Ids are allocated from a per-kind counter in the backing store, so they
/// are monotonic within one `(namespace, kind)` pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u64);

impl EntityId {
    /// Wrap a raw id value.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw id value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(Self)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Validate one key segment (namespace or kind), returning the reason on
/// failure.
pub(crate) fn validate_segment(segment: &str) -> Result<(), String> {
    if segment.is_empty() {
        return Err("must not be empty".into());
    }
    for ch in FORBIDDEN_CHARS {
        if segment.contains(*ch) {
            return Err(format!("contains forbidden character: {ch:?}"));
        }
    }
    Ok(())
}
