use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use parking_lot::Mutex;
use value::Value;

use crate::value_index::ValueIndex;

/// A vector of ids kept (lazily) sorted ascending by the current value of
/// each id. `add` appends and marks the array dirty; a full ascending
/// resort runs on the first `larger`/`smaller` call after a dirty mark.
/// `remove` is a plain filter of an already-sorted array, so it never needs
/// to mark dirty — order is preserved for free.
pub struct SortedIndex {
    ids: Mutex<Vec<i64>>,
    dirty: AtomicBool,
}

impl SortedIndex {
    pub fn new() -> Self {
        Self {
            ids: Mutex::new(Vec::new()),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn add(&self, id: i64) {
        self.ids.lock().push(id);
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn remove(&self, id: i64) {
        self.ids.lock().retain(|&existing| existing != id);
    }

    fn ensure_sorted(&self, values: &ValueIndex) {
        if self.dirty.swap(false, Ordering::SeqCst) {
            let mut ids = self.ids.lock();
            ids.sort_by(|a, b| {
                let (va, vb) = (values.get_value(*a), values.get_value(*b));
                match (va, vb) {
                    (Some(va), Some(vb)) if va.larger(&vb).unwrap_or(false) => std::cmp::Ordering::Greater,
                    (Some(va), Some(vb)) if va.smaller(&vb).unwrap_or(false) => std::cmp::Ordering::Less,
                    _ => std::cmp::Ordering::Equal,
                }
            });
        }
    }

    /// Ids whose current value is strictly greater than `v`, in ascending
    /// order. Binary search for the first element satisfying the
    /// (monotonic, once sorted) predicate, then the rest follow.
    pub fn larger(&self, v: &Value, values: &ValueIndex) -> Vec<i64> {
        self.ensure_sorted(values);
        let ids = self.ids.lock();
        let start = partition_point(&ids, values, |candidate| !candidate.larger(v).unwrap_or(false));
        ids[start..].to_vec()
    }

    /// Ids whose current value is strictly less than `v`, returned in
    /// descending order (the reversed ascending prefix), matching the
    /// spec's `smaller` contract.
    pub fn smaller(&self, v: &Value, values: &ValueIndex) -> Vec<i64> {
        self.ensure_sorted(values);
        let ids = self.ids.lock();
        let end = partition_point(&ids, values, |candidate| candidate.smaller(v).unwrap_or(false));
        let mut prefix = ids[..end].to_vec();
        prefix.reverse();
        prefix
    }

    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SortedIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// First index in `ids` (assumed already sorted by `values`) for which
/// `predicate(value)` is false — i.e. the boundary between the prefix where
/// `predicate` holds and the suffix where it doesn't. Returns `ids.len()`
/// if `predicate` holds everywhere. A missing value (shouldn't happen for
/// an id present in the sorted index) is treated as not satisfying the
/// predicate.
fn partition_point(ids: &[i64], values: &ValueIndex, predicate: impl Fn(&Value) -> bool) -> usize {
    let mut lo = 0usize;
    let mut hi = ids.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        let holds = values.get_value(ids[mid]).map(|v| predicate(&v)).unwrap_or(false);
        if holds {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

#[cfg(test)]
mod tests {
    use value::Number;

    use super::*;

    fn setup() -> (SortedIndex, ValueIndex) {
        let values = ValueIndex::with_shard_count(2);
        let sorted = SortedIndex::new();
        for (id, n) in [(1, 5.0), (2, 1.0), (3, 3.0), (4, 4.0), (5, 2.0)] {
            values.add(id, Value::Number(Number::new(n)));
            sorted.add(id);
        }
        (sorted, values)
    }

    #[test]
    fn larger_returns_ascending_suffix() {
        let (sorted, values) = setup();
        let ids = sorted.larger(&Value::Number(Number::new(3.0)), &values);
        let vals: Vec<f64> = ids.iter().map(|id| values.get_value(*id).unwrap().as_number().unwrap().value().unwrap()).collect();
        assert_eq!(vals, vec![4.0, 5.0]);
    }

    #[test]
    fn smaller_returns_descending_prefix() {
        let (sorted, values) = setup();
        let ids = sorted.smaller(&Value::Number(Number::new(3.0)), &values);
        let vals: Vec<f64> = ids.iter().map(|id| values.get_value(*id).unwrap().as_number().unwrap().value().unwrap()).collect();
        assert_eq!(vals, vec![2.0, 1.0]);
    }

    #[test]
    fn between_excludes_both_endpoints() {
        let (sorted, values) = setup();
        // emulate BETWEEN 1_5 (exclusive): larger(1) intersected with smaller(5)
        let larger = sorted.larger(&Value::Number(Number::new(1.0)), &values);
        let smaller = sorted.smaller(&Value::Number(Number::new(5.0)), &values);
        let between: std::collections::HashSet<_> = larger.into_iter().filter(|id| smaller.contains(id)).collect();
        let mut vals: Vec<f64> = between.iter().map(|id| values.get_value(*id).unwrap().as_number().unwrap().value().unwrap()).collect();
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(vals, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn remove_preserves_sort_order_without_marking_dirty() {
        let (sorted, values) = setup();
        let _ = sorted.larger(&Value::Number(Number::new(0.0)), &values); // force initial sort
        sorted.remove(3);
        assert!(!sorted.dirty.load(Ordering::SeqCst));
        let ids = sorted.larger(&Value::Number(Number::new(0.0)), &values);
        assert_eq!(ids.len(), 4);
    }
}
