use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        atomic::{
            AtomicBool,
            AtomicI64,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};

use events::{
    Event,
    EventFile,
    TailWatcher,
};
use metrics::MetricsSink;
use parking_lot::Mutex;
use value::{
    Field,
    Value,
};

use crate::{
    cache::RecordCache,
    record::Record,
};

const WRITE_QUEUE_DRAIN_INTERVAL: Duration = Duration::from_secs(1);

/// Narrow capability the storage engine calls into whenever it observes a
/// record come into existence or go away — an ADD/UPDATE producing a
/// current version, or an UPDATE/REMOVE retiring one. `Table` is the only
/// implementor; this interface exists so `Storage` can notify its owner
/// without owning it back.
pub trait StorageCallbacks: Send + Sync + 'static {
    fn added_object(&self, record: Record);
    fn deleted_object(&self, record: Record);
}

enum PendingEvent {
    Add(HashMap<String, Value>),
    Update { refers_to: i64, fields: HashMap<String, Value> },
    Remove { refers_to: i64 },
}

/// Owns one table's event file and record cache. Mutations
/// (`add_object`/`update_object`/`remove_object`) enqueue onto an in-memory
/// write queue; a background ticker drains it and performs the actual
/// batched append under the file lock once per second — this is what lets
/// several concurrent callers share one append without each paying the
/// lock's poll latency individually.
pub struct Storage {
    file: Arc<EventFile>,
    cache: Arc<RecordCache>,
    schema: Arc<HashMap<String, Field>>,
    callbacks: Arc<dyn StorageCallbacks>,
    metrics: Arc<dyn MetricsSink>,
    write_queue: Mutex<Vec<PendingEvent>>,
    object_count: AtomicI64,
    write_enabled: AtomicBool,
    tail_watcher: Mutex<Option<TailWatcher>>,
}

impl Storage {
    /// Opens (creating if needed) the event file at `path`, replays its
    /// full contents to rebuild `object_count` and drive `callbacks` for
    /// every still-active record, then starts the write-queue ticker and a
    /// tail-follow watcher for lines appended by another process.
    pub fn open(
        path: impl Into<PathBuf>,
        schema: Arc<HashMap<String, Field>>,
        cache_size: usize,
        callbacks: Arc<dyn StorageCallbacks>,
        metrics: Arc<dyn MetricsSink>,
    ) -> anyhow::Result<Arc<Self>> {
        let file = Arc::new(EventFile::open(path)?);
        let cache = RecordCache::new(cache_size);

        let storage = Arc::new(Self {
            file: file.clone(),
            cache,
            schema,
            callbacks,
            metrics,
            write_queue: Mutex::new(Vec::new()),
            object_count: AtomicI64::new(0),
            write_enabled: AtomicBool::new(true),
            tail_watcher: Mutex::new(None),
        });

        file.replay(|id, event| storage.handle_event(id, event))?;

        let watcher = {
            let storage = storage.clone();
            file.spawn_tail_watcher(move |id, event| {
                if let Err(err) = storage.handle_event(id, event) {
                    tracing::error!(?err, event_line = id, "fatal: could not index externally-appended event");
                }
            })?
        };
        *storage.tail_watcher.lock() = Some(watcher);
        storage.spawn_write_queue_ticker();

        Ok(storage)
    }

    fn spawn_write_queue_ticker(self: &Arc<Self>) {
        let storage = self.clone();
        tokio::spawn(async move {
            while storage.write_enabled.load(Ordering::SeqCst) {
                tokio::time::sleep(WRITE_QUEUE_DRAIN_INTERVAL).await;
                storage.drain_write_queue().await;
            }
        });
    }

    /// Forces an immediate drain of whatever mutations are currently
    /// queued, without waiting for the next ticker interval. Used by
    /// callers (notably tests) that need a just-written mutation to be
    /// indexed and readable before proceeding.
    pub async fn flush(self: &Arc<Self>) {
        self.drain_write_queue().await;
    }

    async fn drain_write_queue(self: &Arc<Self>) {
        let storage = self.clone();
        let result = tokio::task::spawn_blocking(move || storage.drain_write_queue_blocking())
            .await
            .expect("write queue drain task panicked");
        if let Err(err) = result {
            tracing::error!(?err, "could not drain storage write queue; mutations remain queued for retry");
        }
    }

    fn drain_write_queue_blocking(&self) -> anyhow::Result<()> {
        let queue = std::mem::take(&mut *self.write_queue.lock());
        if queue.is_empty() {
            return Ok(());
        }

        let events: Vec<Event> = queue
            .iter()
            .map(|pending| match pending {
                PendingEvent::Add(fields) => Event::Add { data: Record::new(0, fields.clone()).to_event_data() },
                PendingEvent::Update { refers_to, fields } => {
                    Event::Update { data: Record::new(0, fields.clone()).to_event_data(), refers_to: *refers_to }
                },
                PendingEvent::Remove { refers_to } => Event::Remove { refers_to: *refers_to },
            })
            .collect();

        let ids = self.file.append(&events)?;
        for (id, event) in ids.into_iter().zip(events.into_iter()) {
            self.handle_event(id, event)?;
        }
        Ok(())
    }

    fn handle_event(&self, id: i64, event: Event) -> anyhow::Result<()> {
        match event {
            Event::Add { data } => {
                let fields = Record::fields_from_event_data(&self.schema, &data)?;
                let record = Record::new(id, fields);
                self.cache.set(&record);
                self.object_count.fetch_add(1, Ordering::SeqCst);
                self.metrics.total_objects(self.object_count.load(Ordering::SeqCst).max(0) as u64);
                self.callbacks.added_object(record);
            },
            Event::Update { data, refers_to } => {
                self.cache.remove(refers_to);
                self.cache.remove(id);
                if let Some(old) = self.get_object_blocking(refers_to)? {
                    self.callbacks.deleted_object(old);
                }
                let fields = Record::fields_from_event_data(&self.schema, &data)?;
                let record = Record::new(id, fields);
                self.cache.set(&record);
                self.callbacks.added_object(record);
            },
            Event::Remove { refers_to } => {
                self.cache.remove(refers_to);
                self.cache.remove(id);
                if let Some(old) = self.get_object_blocking(refers_to)? {
                    self.object_count.fetch_sub(1, Ordering::SeqCst);
                    self.metrics.total_objects(self.object_count.load(Ordering::SeqCst).max(0) as u64);
                    self.callbacks.deleted_object(old);
                }
            },
        }
        Ok(())
    }

    fn get_object_blocking(&self, id: i64) -> anyhow::Result<Option<Record>> {
        if let Some(fields) = self.cache.get(id) {
            return Ok(Some(Record::new(id, fields)));
        }
        let lines = self.file.read(vec![id])?;
        let Some(line) = lines.get(&id) else {
            return Ok(None);
        };
        match Event::from_line(line)? {
            Event::Add { data } | Event::Update { data, .. } => {
                let fields = Record::fields_from_event_data(&self.schema, &data)?;
                let record = Record::new(id, fields);
                self.cache.set(&record);
                Ok(Some(record))
            },
            Event::Remove { .. } => Ok(None),
        }
    }

    pub async fn get_object(self: &Arc<Self>, id: i64) -> anyhow::Result<Option<Record>> {
        let storage = self.clone();
        tokio::task::spawn_blocking(move || storage.get_object_blocking(id)).await.expect("get_object task panicked")
    }

    pub async fn get_objects(self: &Arc<Self>, ids: Vec<i64>) -> anyhow::Result<Vec<Record>> {
        let storage = self.clone();
        tokio::task::spawn_blocking(move || {
            let mut misses = Vec::new();
            let mut out = Vec::with_capacity(ids.len());
            for id in &ids {
                if let Some(fields) = storage.cache.get(*id) {
                    out.push((*id, Some(Record::new(*id, fields))));
                } else {
                    misses.push(*id);
                    out.push((*id, None));
                }
            }
            if !misses.is_empty() {
                misses.sort_unstable();
                let lines = storage.file.read(misses)?;
                for (id, slot) in out.iter_mut() {
                    if slot.is_none() {
                        if let Some(line) = lines.get(id) {
                            if let Event::Add { data } | Event::Update { data, .. } = Event::from_line(line)? {
                                let fields = Record::fields_from_event_data(&storage.schema, &data)?;
                                let record = Record::new(*id, fields);
                                storage.cache.set(&record);
                                *slot = Some(record);
                            }
                        }
                    }
                }
            }
            Ok(out.into_iter().filter_map(|(_, r)| r).collect())
        })
        .await
        .expect("get_objects task panicked")
    }

    pub fn add_object(&self, fields: HashMap<String, Value>) {
        self.write_queue.lock().push(PendingEvent::Add(fields));
    }

    pub fn update_object(&self, refers_to: i64, fields: HashMap<String, Value>) {
        self.write_queue.lock().push(PendingEvent::Update { refers_to, fields });
    }

    pub fn remove_object(&self, refers_to: i64) {
        self.write_queue.lock().push(PendingEvent::Remove { refers_to });
    }

    pub fn number_of_objects(&self) -> i64 {
        self.object_count.load(Ordering::SeqCst)
    }

    /// Stops the write-queue ticker, performs one final synchronous drain
    /// so nothing queued is lost, and stops the record cache's eviction
    /// loop. The tail watcher stops when its guard is dropped along with
    /// `self`.
    pub fn kill(&self) {
        self.write_enabled.store(false, Ordering::SeqCst);
        if let Err(err) = self.drain_write_queue_blocking() {
            tracing::error!(?err, "final write queue drain on shutdown failed");
        }
        self.cache.kill();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use metrics::NullMetricsSink;
    use tempfile::tempdir;
    use value::{
        Field,
        Text,
        ValueType,
    };

    use super::*;

    #[derive(Default)]
    struct RecordingCallbacks {
        added: StdMutex<Vec<Record>>,
        deleted: StdMutex<Vec<Record>>,
    }

    impl StorageCallbacks for RecordingCallbacks {
        fn added_object(&self, record: Record) {
            self.added.lock().unwrap().push(record);
        }

        fn deleted_object(&self, record: Record) {
            self.deleted.lock().unwrap().push(record);
        }
    }

    fn schema() -> Arc<HashMap<String, Field>> {
        let mut schema = HashMap::new();
        schema.insert("name".to_string(), Field::new("name", ValueType::Text, true, false, false).unwrap());
        Arc::new(schema)
    }

    fn fields(name: &str) -> HashMap<String, Value> {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), Value::Text(Text::new(name)));
        fields
    }

    #[tokio::test]
    async fn add_then_drain_delivers_added_object_and_is_readable() {
        let dir = tempdir().unwrap();
        let callbacks = Arc::new(RecordingCallbacks::default());
        let storage =
            Storage::open(dir.path().join("objects.idb"), schema(), 10, callbacks.clone(), Arc::new(NullMetricsSink)).unwrap();

        storage.add_object(fields("alice"));
        storage.drain_write_queue().await;

        assert_eq!(callbacks.added.lock().unwrap().len(), 1);
        assert_eq!(storage.number_of_objects(), 1);

        let fetched = storage.get_object(0).await.unwrap().unwrap();
        assert_eq!(fetched.get("name").unwrap(), &Value::Text(Text::new("alice")));
        storage.kill();
    }

    #[tokio::test]
    async fn update_then_remove_round_trip_through_callbacks() {
        let dir = tempdir().unwrap();
        let callbacks = Arc::new(RecordingCallbacks::default());
        let storage =
            Storage::open(dir.path().join("objects.idb"), schema(), 10, callbacks.clone(), Arc::new(NullMetricsSink)).unwrap();

        storage.add_object(fields("alice"));
        storage.drain_write_queue().await;

        storage.update_object(0, fields("alicia"));
        storage.drain_write_queue().await;
        assert_eq!(storage.number_of_objects(), 1);
        assert!(storage.get_object(0).await.unwrap().is_none());
        let current = storage.get_object(1).await.unwrap().unwrap();
        assert_eq!(current.get("name").unwrap(), &Value::Text(Text::new("alicia")));

        storage.remove_object(1);
        storage.drain_write_queue().await;
        assert_eq!(storage.number_of_objects(), 0);
        assert!(storage.get_object(1).await.unwrap().is_none());

        assert_eq!(callbacks.added.lock().unwrap().len(), 2);
        assert_eq!(callbacks.deleted.lock().unwrap().len(), 2);
        storage.kill();
    }

    #[tokio::test]
    async fn replay_rebuilds_object_count_on_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("objects.idb");
        {
            let callbacks = Arc::new(RecordingCallbacks::default());
            let storage = Storage::open(&path, schema(), 10, callbacks, Arc::new(NullMetricsSink)).unwrap();
            storage.add_object(fields("alice"));
            storage.add_object(fields("bob"));
            storage.drain_write_queue().await;
            storage.kill();
        }

        let callbacks = Arc::new(RecordingCallbacks::default());
        let storage = Storage::open(&path, schema(), 10, callbacks.clone(), Arc::new(NullMetricsSink)).unwrap();
        assert_eq!(storage.number_of_objects(), 2);
        assert_eq!(callbacks.added.lock().unwrap().len(), 2);
        storage.kill();
    }
}
