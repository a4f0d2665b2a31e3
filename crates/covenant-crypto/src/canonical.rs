// canonical.rs - Canonical JSON encoding for content hashing.
//
// Two values with the same content must hash identically, so objects are
// written with their keys in sorted order and without whitespace. The sort
// is done here explicitly rather than relying on serde_json's map ordering,
// which changes when the `preserve_order` feature is enabled anywhere in
// the dependency graph.

use serde::Serialize;
use serde_json::Value;

use crate::error::CryptoError;
use crate::hasher::hash_str;

/// Render a JSON value in canonical form: sorted keys, compact separators.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

/// Serialize `value` to canonical JSON and return its SHA-256 hex digest.
pub fn hash_object<T: Serialize + ?Sized>(value: &T) -> Result<String, CryptoError> {
    let value = serde_json::to_value(value)?;
    Ok(hash_str(&canonical_json(&value)))
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                // Scalars (strings included) go through serde_json for escaping.
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}
