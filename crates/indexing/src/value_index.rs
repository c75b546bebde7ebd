use std::{
    collections::HashMap,
    sync::atomic::{
        AtomicUsize,
        Ordering,
    },
    thread,
};

use parking_lot::RwLock;
use value::Value;

/// `id → value` partitioned into `N` shards (N = CPU count) assigned
/// round-robin at insertion. Predicates that must visit every record
/// (`not`, `match`, `between`) fan out one thread per shard and concatenate
/// the per-shard results — the only sub-index whose reads parallelize,
/// since `equal` and range lookups go through the exact/sorted indexes
/// instead.
pub struct ValueIndex {
    shards: Vec<RwLock<HashMap<i64, Value>>>,
    next_shard: AtomicUsize,
}

impl ValueIndex {
    pub fn new() -> Self {
        Self::with_shard_count(num_cpus::get().max(1))
    }

    pub fn with_shard_count(shards: usize) -> Self {
        Self {
            shards: (0..shards.max(1)).map(|_| RwLock::new(HashMap::new())).collect(),
            next_shard: AtomicUsize::new(0),
        }
    }

    fn shard_for(&self, id: i64) -> usize {
        (id.rem_euclid(self.shards.len() as i64)) as usize
    }

    pub fn add(&self, id: i64, value: Value) {
        // Partitioning by id (rather than true round-robin insertion order)
        // makes `remove` and `get_value` O(1) to route without a second
        // side table, while still spreading records evenly across shards.
        self.shards[self.shard_for(id)].write().insert(id, value);
    }

    pub fn remove(&self, id: i64) {
        self.shards[self.shard_for(id)].write().remove(&id);
    }

    pub fn get_value(&self, id: i64) -> Option<Value> {
        self.shards[self.shard_for(id)].read().get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all_ids(&self) -> Vec<i64> {
        self.scan(|_, _| true)
    }

    /// Runs `predicate(id, value)` against every record, one thread per
    /// shard, and concatenates the ids that pass. Shard iteration order is
    /// preserved within each shard but no global order is guaranteed across
    /// shards — callers that need an order sort afterward (the sorted
    /// index, or the query evaluator's explicit sort step).
    pub fn scan(&self, predicate: impl Fn(i64, &Value) -> bool + Sync) -> Vec<i64> {
        thread::scope(|scope| {
            let handles: Vec<_> = self
                .shards
                .iter()
                .map(|shard| {
                    let predicate = &predicate;
                    scope.spawn(move || {
                        shard
                            .read()
                            .iter()
                            .filter(|(id, v)| predicate(**id, v))
                            .map(|(id, _)| *id)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
        })
    }
}

impl Default for ValueIndex {
    fn default() -> Self {
        Self::new()
    }
}
