//! Canonical JSON for artifacts.
//!
//! Object keys are sorted at every level and output uses a fixed 2-space
//! pretty format, so equal values always produce equal bytes. `meta.json`
//! is written this way and model hashes are taken over the same bytes.

use serde::{ser::Error as SerdeSerError, Serialize};
use serde_json::{ser::PrettyFormatter, Map, Serializer, Value};
use std::path::Path;

use crate::errors::Result;

/// Convert `value` to a JSON tree with recursively sorted object keys
pub fn to_canonical_value<T: Serialize>(value: &T) -> serde_json::Result<Value> {
    Ok(sort_keys(serde_json::to_value(value)?))
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(&b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, inner)| (key, sort_keys(inner)))
                    .collect::<Map<_, _>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        scalar => scalar,
    }
}

/// Canonical encoding as raw bytes
pub fn canonical_json_bytes<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
    let canonical = to_canonical_value(value)?;
    let mut out = Vec::new();
    let mut serializer = Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"  "));
    canonical.serialize(&mut serializer)?;
    Ok(out)
}

/// Canonical encoding as a string
pub fn canonical_json_string<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let bytes = canonical_json_bytes(value)?;
    String::from_utf8(bytes).map_err(|err| SerdeSerError::custom(err.to_string()))
}

/// Write the canonical encoding of `value` to `path`, replacing any file there
pub fn write_canonical_json_file<T: Serialize, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    std::fs::write(path, canonical_json_bytes(value)?)?;
    Ok(())
}
