//! Common behavior of runtime options documents.
//!
//! The same JSON document carries options for several customizers; each one
//! deserializes the keys it knows and ignores the rest.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

pub trait RuntimeOptions: DeserializeOwned + Default {
    /// Short label used in log and error messages.
    const KIND: &'static str;

    /// Combine `self` (global) with per-workload options; the per-workload
    /// side wins wherever it has a value.
    fn merge(&self, workload: &Self) -> Self;

    /// Parse from a JSON string. Blank input and `null` give the empty
    /// document.
    fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::default());
        }
        let opts: Option<Self> = serde_json::from_str(json)
            .with_context(|| format!("invalid {} runtime options JSON", Self::KIND))?;
        Ok(opts.unwrap_or_default())
    }

    /// Parse from an already decoded configuration map.
    fn from_config_map(config: &Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(config.clone()))
            .with_context(|| format!("invalid {} runtime options in configuration", Self::KIND))
    }
}
