//! response cache
//!
//! bounded, insertion-ordered map of decoded response bodies. when full the
//! oldest inserted entry is evicted; there is no ttl.

use crate::operation::OperationKind;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::{Mutex, MutexGuard};

/// cache key for an operation call
///
/// variables are rendered as canonical json (object keys sorted).
pub fn cache_key(namespace: &str, kind: OperationKind, name: &str, variables: &Value) -> String {
    let mut key = format!("{namespace}:{kind}:{name}:");
    write_canonical(variables, &mut key);
    key
}

// sorted independently of the map type; `preserve_order` keeps insertion order
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (idx, (key, item)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// fifo response cache shared by concurrent calls
#[derive(Debug)]
pub struct ResponseCache {
    capacity: usize,
    entries: Mutex<IndexMap<String, Value>>,
}

impl ResponseCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// store a body; an existing key keeps its position and takes the new value
    pub fn insert(&self, key: String, value: Value) {
        let mut entries = self.lock();
        if let Some(existing) = entries.get_mut(&key) {
            *existing = value;
            return;
        }
        while entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(key, value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, IndexMap<String, Value>> {
        // a panic while holding the lock leaves the map consistent
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_is_canonical() {
        let a = cache_key(
            "http://localhost/api",
            OperationKind::Query,
            "getUser",
            &json!({"id": 1, "a": true}),
        );
        let b = cache_key(
            "http://localhost/api",
            OperationKind::Query,
            "getUser",
            &json!({"a": true, "id": 1}),
        );
        assert_eq!(a, b);
        assert_eq!(a, "http://localhost/api:query:getUser:{\"a\":true,\"id\":1}");
    }

    #[test]
    fn test_cache_key_sorts_nested_objects() {
        let mut inner = serde_json::Map::new();
        inner.insert("z".to_string(), json!("last"));
        inner.insert("b".to_string(), json!([{"y": 2, "x": 1}]));
        let mut variables = serde_json::Map::new();
        variables.insert("filter".to_string(), Value::Object(inner));
        variables.insert("after".to_string(), json!(null));

        let key = cache_key(
            "ns",
            OperationKind::Query,
            "users",
            &Value::Object(variables),
        );
        assert_eq!(
            key,
            "ns:query:users:{\"after\":null,\"filter\":{\"b\":[{\"x\":1,\"y\":2}],\"z\":\"last\"}}"
        );
    }

    #[test]
    fn test_fifo_eviction_at_capacity() {
        let cache = ResponseCache::new(30);
        for idx in 0..31 {
            cache.insert(format!("key-{idx}"), json!(idx));
        }
        assert_eq!(cache.len(), 30);
        assert!(!cache.contains_key("key-0"));
        assert!(cache.contains_key("key-1"));
        assert_eq!(cache.get("key-30"), Some(json!(30)));
    }

    #[test]
    fn test_reinsert_keeps_position() {
        let cache = ResponseCache::new(2);
        cache.insert("a".to_string(), json!(1));
        cache.insert("b".to_string(), json!(2));
        cache.insert("a".to_string(), json!(3));
        cache.insert("c".to_string(), json!(4));
        assert!(!cache.contains_key("a"));
        assert_eq!(cache.get("b"), Some(json!(2)));
        assert_eq!(cache.get("c"), Some(json!(4)));
    }

    #[test]
    fn test_clear() {
        let cache = ResponseCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("a".to_string(), json!(null));
        assert!(!cache.is_empty());
        cache.clear();
        assert!(cache.is_empty());
    }
}
