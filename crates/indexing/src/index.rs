use regex::Regex;
use value::Value;

use crate::{
    exact_index::ExactIndex,
    sorted_index::SortedIndex,
    value_index::ValueIndex,
};

/// The three coherent sub-indexes kept for a single indexed field: a
/// shard-parallel value index (full-scan predicates), a hash-bucketed
/// exact index (`equal`), and a lazily-sorted array (`larger`/`smaller`).
/// Each sub-index is independently lockable; a writer touches all three in
/// a fixed order (value → exact → sorted) so two concurrent writers never
/// deadlock against each other.
pub struct Index {
    values: ValueIndex,
    exact: ExactIndex,
    sorted: SortedIndex,
}

impl Index {
    pub fn new() -> Self {
        Self {
            values: ValueIndex::new(),
            exact: ExactIndex::new(),
            sorted: SortedIndex::new(),
        }
    }

    pub fn add(&self, value: Value, id: i64) {
        self.values.add(id, value.clone());
        self.exact.add(&value, id);
        self.sorted.add(id);
    }

    pub fn remove(&self, value: &Value, id: i64) {
        self.values.remove(id);
        self.exact.remove(value, id);
        self.sorted.remove(id);
    }

    pub fn get_value(&self, id: i64) -> Option<Value> {
        self.values.get_value(id)
    }

    pub fn equal(&self, value: &Value) -> Vec<i64> {
        self.exact.equal(value)
    }

    pub fn not(&self, value: &Value) -> Vec<i64> {
        self.values.scan(|_, v| !v.equal(value).unwrap_or(false))
    }

    pub fn matches(&self, re: &Regex) -> Vec<i64> {
        self.values.scan(|_, v| v.matches(re))
    }

    pub fn larger(&self, value: &Value) -> Vec<i64> {
        self.sorted.larger(value, &self.values)
    }

    pub fn smaller(&self, value: &Value) -> Vec<i64> {
        self.sorted.smaller(value, &self.values)
    }

    pub fn between(&self, lo: &Value, hi: &Value) -> Vec<i64> {
        self.values.scan(|_, v| v.between(lo, hi).unwrap_or(false))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn all_ids(&self) -> Vec<i64> {
        self.values.all_ids()
    }
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}
