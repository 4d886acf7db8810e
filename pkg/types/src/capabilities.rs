//! Tolerant parsing of capability name lists.
//!
//! Descriptor builders upstream do not agree on how a list is serialized.
//! The same `drop` list can arrive as:
//!
//! ```json
//! ["ALL", "NET_ADMIN"]
//! "ALL"
//! {"1": "NET_ADMIN", "0": "ALL"}
//! ```
//!
//! The last form comes from indexed-property serialization. Its entries are
//! collected in ascending numeric key order; keys that are not plain 32-bit
//! integers (including ones with surrounding whitespace) are skipped.

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

/// The shapes a capability list can arrive in.
#[derive(Debug, Clone, PartialEq)]
pub enum CapabilityListShape {
    Array(Vec<Value>),
    Scalar(Value),
    SparseMap(Map<String, Value>),
}

impl CapabilityListShape {
    /// Classify a raw JSON value. `null` means "no list given".
    pub fn detect(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Array(items) => Some(Self::Array(items)),
            Value::Object(map) => Some(Self::SparseMap(map)),
            scalar => Some(Self::Scalar(scalar)),
        }
    }

    /// Normalize into an ordered list of capability names.
    pub fn into_list(self) -> Vec<String> {
        match self {
            Self::Array(items) => items.into_iter().filter_map(entry_to_string).collect(),
            Self::Scalar(value) => entry_to_string(value).into_iter().collect(),
            Self::SparseMap(map) => {
                let mut indexed = BTreeMap::new();
                for (key, value) in map {
                    let Ok(index) = key.parse::<i32>() else {
                        warn!("Ignoring non-numeric key in capabilities: {}", key);
                        continue;
                    };
                    if let Some(name) = entry_to_string(value) {
                        indexed.insert(index, name);
                    }
                }
                indexed.into_values().collect()
            }
        }
    }
}

/// Normalize any accepted shape into an ordered list. `None` for `null`.
pub fn normalize_capability_list(value: Value) -> Option<Vec<String>> {
    CapabilityListShape::detect(value).map(CapabilityListShape::into_list)
}

fn entry_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null => None,
        other => {
            warn!("Ignoring non-scalar capability entry: {}", other);
            None
        }
    }
}

/// `deserialize_with` adapter for `Option<Vec<String>>` capability fields.
pub fn deserialize_capability_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(normalize_capability_list(value))
}
