//! Persisted representations: reference lists and property maps.
//!
//! The backing store holds strings, so everything Tether persists goes
//! through this module. A reference list is a JSON array of entity key
//! strings; a property map is a plain JSON object of scalars. Decoding is
//! tolerant of absence (an absent reference list is an empty association)
//! but never of corruption: present-but-undecodable data surfaces as an
//! error instead of masquerading as empty.

use std::collections::BTreeMap;

use tether_types::Scalar;

use crate::error::{ModelError, ModelResult};

/// Encode an ordered reference list for storage.
///
/// Empty input encodes to an empty array; an encoded empty array and an
/// absent slot both decode to an empty list.
pub fn encode_list(keys: &[String]) -> ModelResult<String> {
    serde_json::to_string(keys).map_err(|e| ModelError::Serialization(e.to_string()))
}

/// Decode a reference list read from `slot`.
///
/// `None` (the slot is absent) decodes to an empty list. Present data that
/// is not a JSON array of strings is a [`ModelError::CorruptAssociation`].
pub fn decode_list(slot: &str, raw: Option<&str>) -> ModelResult<Vec<String>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    serde_json::from_str(raw).map_err(|e| ModelError::CorruptAssociation {
        key: slot.to_string(),
        reason: e.to_string(),
    })
}

/// Encode a property map for storage at an entity key.
pub fn encode_properties(properties: &BTreeMap<String, Scalar>) -> ModelResult<String> {
    serde_json::to_string(properties).map_err(|e| ModelError::Serialization(e.to_string()))
}

/// Decode the property map read from an entity record at `key`.
///
/// Absence is not handled here: a missing record is a lookup miss, which
/// the caller reports as not-found before decoding.
pub fn decode_properties(key: &str, raw: &str) -> ModelResult<BTreeMap<String, Scalar>> {
    serde_json::from_str(raw).map_err(|e| ModelError::CorruptRecord {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
