//! Canonical JSON serialisation and content hashing.
//!
//! Two payloads that differ only in object key order must hash identically,
//! so object keys are sorted at every level before anything is fed to the
//! hasher. Output never depends on how the `serde_json::Map` happens to be
//! ordered in memory.

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Serialise `value` with object keys sorted recursively and no whitespace.
pub fn canonical_json(value: &Value) -> String {
  let mut out = String::new();
  write_canonical(value, &mut out);
  out
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
        // Strings serialise infallibly.
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

/// Hex SHA-256 over the canonical serialisation of `value`.
pub fn content_hash(value: &Value) -> String {
  let mut hasher = Sha256::new();
  hasher.update(canonical_json(value).as_bytes());
  hex::encode(hasher.finalize())
}
