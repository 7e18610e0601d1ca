//! Canonical serialization for reproducible hashing.
//!
//! The kernel's determinism property ("same state vector and same fixed
//! constants produce the same gate decision") only holds end-to-end if every
//! hash taken along the way — audit entries, attestation links, key schedule
//! checkpoints — is computed over a byte-identical encoding regardless of
//! struct field order or `HashMap` iteration order. This module is the single
//! place that encoding happens.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::error::Result;

/// Serialize `value` to JSON with all object keys sorted recursively, so the
/// resulting bytes are independent of field declaration order or map
/// insertion order.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let v = serde_json::to_value(value)?;
    let sorted = sort_value(v);
    Ok(serde_json::to_vec(&sorted)?)
}

/// SHA-256 digest of [`canonical_bytes`], hex-encoded.
pub fn fingerprint<T: Serialize>(value: &T) -> Result<String> {
    let bytes = canonical_bytes(value)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

fn sort_value(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_value(v))).collect();
            serde_json::to_value(sorted).unwrap_or(Value::Null)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_value).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;
    use std::collections::HashMap;

    #[derive(Serialize)]
    struct A {
        b: u32,
        a: u32,
    }

    #[derive(Serialize)]
    struct B {
        a: u32,
        b: u32,
    }

    #[test]
    fn field_order_does_not_affect_fingerprint() {
        let a = A { b: 2, a: 1 };
        let b = B { a: 1, b: 2 };
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
    }

    #[test]
    fn map_insertion_order_does_not_affect_fingerprint() {
        let mut m1: HashMap<String, u32> = HashMap::new();
        m1.insert("x".into(), 1);
        m1.insert("y".into(), 2);

        let mut m2: HashMap<String, u32> = HashMap::new();
        m2.insert("y".into(), 2);
        m2.insert("x".into(), 1);

        assert_eq!(fingerprint(&m1).unwrap(), fingerprint(&m2).unwrap());
    }

    #[test]
    fn fingerprint_is_deterministic_and_distinguishing() {
        let a = A { b: 2, a: 1 };
        let a2 = A { b: 3, a: 1 };
        assert_eq!(fingerprint(&a).unwrap(), fingerprint(&a).unwrap());
        assert_ne!(fingerprint(&a).unwrap(), fingerprint(&a2).unwrap());
    }
}
