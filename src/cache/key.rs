//! Deterministic cache keys.
//!
//! A key is the SHA-256 of `method:params`, where params are serialized
//! with object keys sorted at every nesting level. Two parameter sets that
//! differ only in key order therefore share a key.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Hex-encoded cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Compute the key for a method and its params.
    ///
    /// Absent (`null`) params are keyed like an empty object.
    pub fn new(method: &str, params: &Value) -> Self {
        let canonical = match params {
            Value::Null => Value::Object(Map::new()),
            other => canonicalize(other),
        };

        let mut hasher = Sha256::new();
        hasher.update(method.as_bytes());
        hasher.update(b":");
        hasher.update(canonical.to_string().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// The key as a hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Rebuild `value` with object keys inserted in sorted order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
