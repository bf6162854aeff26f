//! Deterministic cache identities for request arguments.
//!
//! The identity of an argument object is a UUID v5 (DNS namespace) of its
//! canonical form: nested objects and arrays flattened into dotted keys,
//! keys sorted, `null` leaves replaced by `{NULL_SENTINEL: true}`. Key order
//! and nesting layout do not matter; an explicit `null` differs from an
//! absent key and from any string value.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use uuid::Uuid;

/// Tag of the object that stands in for a `null` leaf.
///
/// Flattening never emits a non-empty object as a leaf, so the tagged
/// object cannot collide with any real argument value.
pub const NULL_SENTINEL: &str = "__null__";

fn null_leaf() -> Value {
    let mut tagged = Map::new();
    tagged.insert(NULL_SENTINEL.to_owned(), Value::Bool(true));
    Value::Object(tagged)
}

/// Flattens `value` into sorted `dotted.path -> leaf` pairs.
///
/// Empty objects and arrays are kept as leaves.
pub fn flatten(value: &Value) -> BTreeMap<String, Value> {
    let mut out = BTreeMap::new();
    flatten_into(String::new(), value, &mut out);
    out
}

fn flatten_into(path: String, value: &Value, out: &mut BTreeMap<String, Value>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(join(&path, key), child, out);
            }
        }
        Value::Array(items) if !items.is_empty() => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(join(&path, &index.to_string()), child, out);
            }
        }
        Value::Null => {
            out.insert(path, null_leaf());
        }
        leaf => {
            out.insert(path, leaf.clone());
        }
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() { key.to_owned() } else { format!("{path}.{key}") }
}

/// The canonical JSON text hashed for `value`.
pub fn canonicalize(value: &Value) -> String {
    let object: Map<String, Value> = flatten(value).into_iter().collect();
    Value::Object(object).to_string()
}

pub fn identity_hash(value: &Value) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_DNS, canonicalize(value).as_bytes())
}

/// `prefix.uuid`, the key stored in the cache backend.
pub fn cache_key(prefix: &str, identity: &Value) -> String {
    format!("{prefix}.{}", identity_hash(identity))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({ "id": 1, "filter": { "status": "open", "limit": 10 } });
        let b = json!({ "filter": { "limit": 10, "status": "open" }, "id": 1 });
        assert_eq!(identity_hash(&a), identity_hash(&b));
    }

    #[test]
    fn explicit_null_differs_from_absent() {
        let with_null = json!({ "id": 1, "cursor": null });
        let without = json!({ "id": 1 });
        assert_ne!(identity_hash(&with_null), identity_hash(&without));
    }

    #[test]
    fn nulls_in_the_same_place_hash_equal() {
        let a = json!({ "cursor": null, "id": 1 });
        let b = json!({ "id": 1, "cursor": null });
        assert_eq!(identity_hash(&a), identity_hash(&b));
    }

    #[test]
    fn null_differs_from_sentinel_lookalike_types() {
        assert_ne!(identity_hash(&json!({ "a": null })), identity_hash(&json!({ "a": 0 })));
        assert_ne!(identity_hash(&json!({ "a": null })), identity_hash(&json!({})));
    }

    #[test]
    fn null_differs_from_its_tag_as_data() {
        let null = identity_hash(&json!({ "a": null }));
        assert_ne!(null, identity_hash(&json!({ "a": NULL_SENTINEL })));
        assert_ne!(null, identity_hash(&json!({ "a": { NULL_SENTINEL: true } })));
    }

    #[test]
    fn nested_values_flatten_to_dotted_keys() {
        let flat = flatten(&json!({ "a": { "b": [1, { "c": null }] }, "d": {} }));
        assert_eq!(flat["a.b.0"], json!(1));
        assert_eq!(flat["a.b.1.c"], json!({ NULL_SENTINEL: true }));
        assert_eq!(flat["d"], json!({}));
        assert_eq!(flat.len(), 3);
    }

    #[test]
    fn keys_are_prefixed_and_fixed_length() {
        let key = cache_key("timeouts.list", &json!({ "page": 2 }));
        let (prefix, hash) = key.rsplit_once('.').unwrap();
        assert_eq!(prefix, "timeouts.list");
        assert_eq!(hash.len(), 36);
        assert_eq!(key, cache_key("timeouts.list", &json!({ "page": 2 })));
    }

    #[test]
    fn values_change_the_hash() {
        assert_ne!(identity_hash(&json!({ "page": 1 })), identity_hash(&json!({ "page": 2 })));
    }
}
