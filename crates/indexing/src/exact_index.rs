use std::collections::{
    HashMap,
    HashSet,
};

use parking_lot::RwLock;
use value::Value;

/// `value.to_canonical_string() → {ids}`. Gives `equal(value)` amortized
/// O(1) lookup regardless of table size; this is the sub-index uniqueness
/// checks go through.
pub struct ExactIndex {
    buckets: RwLock<HashMap<String, HashSet<i64>>>,
}

impl ExactIndex {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
        }
    }

    pub fn add(&self, value: &Value, id: i64) {
        self.buckets.write().entry(value.to_canonical_string()).or_default().insert(id);
    }

    pub fn remove(&self, value: &Value, id: i64) {
        let mut buckets = self.buckets.write();
        let key = value.to_canonical_string();
        if let Some(bucket) = buckets.get_mut(&key) {
            bucket.remove(&id);
            if bucket.is_empty() {
                buckets.remove(&key);
            }
        }
    }

    pub fn equal(&self, value: &Value) -> Vec<i64> {
        self.buckets
            .read()
            .get(&value.to_canonical_string())
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

impl Default for ExactIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use value::Text;

    use super::*;

    #[test]
    fn equal_returns_every_id_with_that_value() {
        let idx = ExactIndex::new();
        idx.add(&Value::Text(Text::new("a")), 1);
        idx.add(&Value::Text(Text::new("a")), 2);
        idx.add(&Value::Text(Text::new("b")), 3);

        let mut got = idx.equal(&Value::Text(Text::new("a")));
        got.sort();
        assert_eq!(got, vec![1, 2]);
        assert_eq!(idx.equal(&Value::Text(Text::new("z"))), Vec::<i64>::new());
    }

    #[test]
    fn remove_drops_empty_buckets() {
        let idx = ExactIndex::new();
        idx.add(&Value::Text(Text::new("a")), 1);
        idx.remove(&Value::Text(Text::new("a")), 1);
        assert!(idx.equal(&Value::Text(Text::new("a"))).is_empty());
        assert!(idx.buckets.read().is_empty());
    }
}
