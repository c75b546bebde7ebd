use std::{
    collections::HashMap,
    sync::{
        atomic::{
            AtomicBool,
            AtomicI64,
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};

use parking_lot::RwLock;
use value::Value;

use crate::record::Record;

const EVICTION_INTERVAL: Duration = Duration::from_secs(60);

struct Entry {
    fields: HashMap<String, Value>,
    priority: AtomicI64,
}

/// Bounded `id → field map` cache with priority-based eviction, sitting in
/// front of the event file for `Storage::get_object`/`get_objects`. Every
/// hit bumps the entry's priority; a periodic collector (not a strict LRU)
/// keeps only the `max` highest-priority entries once the soft cap is
/// exceeded.
pub struct RecordCache {
    entries: RwLock<HashMap<i64, Entry>>,
    count: AtomicUsize,
    max: usize,
    active: AtomicBool,
}

impl RecordCache {
    pub fn new(max: usize) -> Arc<Self> {
        let cache = Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            count: AtomicUsize::new(0),
            max,
            active: AtomicBool::new(true),
        });
        cache.clone().spawn_collector();
        cache
    }

    fn spawn_collector(self: Arc<Self>) {
        tokio::spawn(async move {
            while self.active.load(Ordering::SeqCst) {
                tokio::time::sleep(EVICTION_INTERVAL).await;
                if !self.active.load(Ordering::SeqCst) {
                    break;
                }
                self.collect();
            }
        });
    }

    pub fn set(&self, record: &Record) {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.entries.write().insert(
            record.id,
            Entry {
                fields: record.fields.clone(),
                priority: AtomicI64::new(0),
            },
        );
    }

    pub fn get(&self, id: i64) -> Option<HashMap<String, Value>> {
        let entries = self.entries.read();
        let entry = entries.get(&id)?;
        entry.priority.fetch_add(1, Ordering::SeqCst);
        Some(entry.fields.clone())
    }

    pub fn remove(&self, id: i64) {
        self.entries.write().remove(&id);
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Retains the `max` highest-priority entries, dropping the rest, when
    /// the soft cap has been exceeded. A no-op below the cap.
    pub fn collect(&self) {
        let mut entries = self.entries.write();
        if entries.len() <= self.max {
            self.count.store(entries.len(), Ordering::SeqCst);
            return;
        }
        let mut by_priority: Vec<(i64, i64)> =
            entries.iter().map(|(id, e)| (*id, e.priority.load(Ordering::SeqCst))).collect();
        by_priority.sort_by(|a, b| b.1.cmp(&a.1));
        by_priority.truncate(self.max);
        let keep: std::collections::HashSet<i64> = by_priority.into_iter().map(|(id, _)| id).collect();
        entries.retain(|id, _| keep.contains(id));
        self.count.store(entries.len(), Ordering::SeqCst);
    }

    pub fn kill(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap as Map;

    use value::Number;

    use super::*;

    fn record(id: i64) -> Record {
        let mut fields = Map::new();
        fields.insert("n".to_string(), Value::Number(Number::new(id as f64)));
        Record::new(id, fields)
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = RecordCache::new(10);
        cache.set(&record(1));
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_none());
        cache.kill();
    }

    #[tokio::test]
    async fn remove_drops_the_entry() {
        let cache = RecordCache::new(10);
        cache.set(&record(1));
        cache.remove(1);
        assert!(cache.get(1).is_none());
        cache.kill();
    }

    #[tokio::test]
    async fn collect_keeps_highest_priority_entries_under_cap() {
        let cache = RecordCache::new(2);
        for id in 0..5 {
            cache.set(&record(id));
        }
        // touch 3 and 4 repeatedly so they outrank the others
        for _ in 0..5 {
            cache.get(3);
            cache.get(4);
        }
        cache.collect();
        assert_eq!(cache.len(), 2);
        assert!(cache.get(3).is_some());
        assert!(cache.get(4).is_some());
        cache.kill();
    }
}
