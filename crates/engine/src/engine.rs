//! The top-level surface: holds every loaded [`Database`], loads them all
//! at startup, and routes every mutating/reading operation through a
//! bounded [`WorkerPool`].
//!
//! `ready` tracks whether startup has finished loading every database
//! directory; every public method other than [`Engine::is_ready`] rejects
//! with `IdbNotReady` until it flips.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{
        atomic::{
            AtomicBool,
            AtomicU64,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};

use database::{
    Database,
    EngineConfig,
    Implement,
    Table,
    TableConfig,
};
use metrics::MetricsSink;
use parking_lot::RwLock;
use query::{
    Query,
    Sort,
};

use crate::worker_pool::WorkerPool;

const METRICS_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// A single row returned from [`Engine::get_from_database_table`]: the
/// record's own fields, any `additionalFields` a query function wrote, and
/// any `implement` joins, all flattened into one JSON object — exactly the
/// shape a transport layer serializes back to a caller.
pub type Row = serde_json::Map<String, serde_json::Value>;

pub struct Engine {
    data_dir: PathBuf,
    cache_size: usize,
    metrics: Arc<dyn MetricsSink>,
    databases: RwLock<HashMap<String, Arc<Database>>>,
    ready: Arc<AtomicBool>,
    alive: Arc<AtomicBool>,
    pool: WorkerPool,
    inserted_since_tick: AtomicU64,
}

impl Engine {
    /// Constructs the engine and kicks off its async startup (parallel
    /// load of every database directory under `config.data_dir`) and its
    /// once-per-second metrics tick in the background. The engine rejects
    /// every operation with `IdbNotReady` until startup finishes.
    pub fn start(config: EngineConfig, metrics: Arc<dyn MetricsSink>) -> Arc<Self> {
        let engine = Arc::new(Self {
            data_dir: config.data_dir,
            cache_size: config.cache_size,
            metrics,
            databases: RwLock::new(HashMap::new()),
            ready: Arc::new(AtomicBool::new(false)),
            alive: Arc::new(AtomicBool::new(true)),
            pool: WorkerPool::new(config.workers),
            inserted_since_tick: AtomicU64::new(0),
        });
        engine.clone().spawn_startup_load();
        engine.clone().spawn_metrics_ticker();
        engine
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn require_ready(&self) -> anyhow::Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(errors::idb_not_ready())
        }
    }

    fn spawn_startup_load(self: Arc<Self>) {
        tokio::spawn(async move {
            if let Err(err) = self.load_all_databases().await {
                tracing::error!(?err, "engine startup failed to load databases");
            }
            self.ready.store(true, Ordering::SeqCst);
            tracing::info!(databases = self.databases.read().len(), "engine ready");
        });
    }

    /// Loads every subdirectory of `data_dir` as a database, in parallel —
    /// each `Database::open` does blocking filesystem IO, so every load is
    /// dispatched onto a blocking task and the results joined.
    async fn load_all_databases(&self) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| errors::internal("could not create data directory", e))?;

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.data_dir).map_err(|e| errors::internal("could not list data directory", e))? {
            let entry = entry.map_err(|e| errors::internal("could not read data directory entry", e))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }

        let mut tasks = Vec::with_capacity(names.len());
        for name in names {
            let data_dir = self.data_dir.clone();
            let cache_size = self.cache_size;
            let metrics = self.metrics.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                Database::open(&name, data_dir.join(&name), cache_size, metrics).map(|db| (name, db))
            }));
        }

        for task in tasks {
            match task.await.expect("database load task panicked") {
                Ok((name, db)) => {
                    self.databases.write().insert(name, db);
                },
                Err(err) => tracing::error!(?err, "could not load a database at startup"),
            }
        }
        Ok(())
    }

    fn spawn_metrics_ticker(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut last_total: Option<u64> = None;
            while self.alive.load(Ordering::SeqCst) {
                tokio::time::sleep(METRICS_TICK_INTERVAL).await;

                let rate = self.inserted_since_tick.swap(0, Ordering::SeqCst);
                self.metrics.objects_inserted_per_second(rate);

                let total: u64 = self
                    .databases
                    .read()
                    .values()
                    .flat_map(|db| db.table_names().into_iter().filter_map(|name| db.get_table(&name)))
                    .map(|table| table.number_of_objects().max(0) as u64)
                    .sum();
                if last_total != Some(total) {
                    self.metrics.total_objects(total);
                    last_total = Some(total);
                }
            }
        });
    }

    fn database(&self, name: &str) -> anyhow::Result<Arc<Database>> {
        self.databases.read().get(name).cloned().ok_or_else(errors::database_does_not_exist)
    }

    fn table(&self, database_name: &str, table_name: &str) -> anyhow::Result<Arc<Table>> {
        self.database(database_name)?.get_table(table_name).ok_or_else(errors::table_does_not_exist)
    }

    pub fn get_databases(&self) -> anyhow::Result<Vec<String>> {
        self.require_ready()?;
        Ok(self.databases.read().keys().cloned().collect())
    }

    pub fn get_database(&self, name: &str) -> anyhow::Result<Arc<Database>> {
        self.require_ready()?;
        self.database(name)
    }

    pub async fn create_database(&self, name: &str) -> anyhow::Result<Arc<Database>> {
        self.require_ready()?;
        let name = name.to_string();
        self.pool
            .run(|| async {
                let dir = self.data_dir.join(&name);
                let db = Database::create(&name, dir, self.cache_size, self.metrics.clone())?;
                self.databases.write().insert(name, db.clone());
                Ok(db)
            })
            .await
    }

    pub async fn delete_database(&self, name: &str) -> anyhow::Result<()> {
        self.require_ready()?;
        let name = name.to_string();
        self.pool
            .run(|| async {
                let db = self.databases.write().remove(&name).ok_or_else(errors::database_does_not_exist)?;
                db.delete()
            })
            .await
    }

    pub fn get_database_table(&self, database_name: &str, table_name: &str) -> anyhow::Result<Arc<Table>> {
        self.require_ready()?;
        self.table(database_name, table_name)
    }

    pub async fn create_table_in_database(&self, database_name: &str, table_name: &str, config: TableConfig) -> anyhow::Result<Arc<Table>> {
        self.require_ready()?;
        let db = self.database(database_name)?;
        let table_name = table_name.to_string();
        self.pool.run(|| async move { db.create_table(table_name, config) }).await
    }

    pub async fn delete_table_in_database(&self, database_name: &str, table_name: &str) -> anyhow::Result<()> {
        self.require_ready()?;
        let db = self.database(database_name)?;
        let table_name = table_name.to_string();
        self.pool.run(|| async move { db.delete_table(&table_name) }).await
    }

    pub async fn insert_to_database_table(
        &self,
        database_name: &str,
        table_name: &str,
        raw: HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<()> {
        self.require_ready()?;
        let table = self.table(database_name, table_name)?;
        self.pool
            .run(|| async move {
                table.insert(raw)?;
                self.inserted_since_tick.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
    }

    pub async fn update_in_database_table(
        &self,
        database_name: &str,
        table_name: &str,
        raw: HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<()> {
        self.require_ready()?;
        let table = self.table(database_name, table_name)?;
        self.pool.run(|| async move { table.update(raw).await }).await
    }

    pub async fn remove_from_database_table(&self, database_name: &str, table_name: &str, id: i64) -> anyhow::Result<()> {
        self.require_ready()?;
        let table = self.table(database_name, table_name)?;
        self.pool
            .run(|| async move {
                table.remove(id);
                Ok(())
            })
            .await
    }

    /// Runs a query end to end: where/and/or/functions evaluation, an
    /// optional sort, skip/limit, a batch fetch of the surviving records,
    /// and any `implement` joins — returning flattened JSON rows ready to
    /// serialize.
    #[allow(clippy::too_many_arguments)]
    pub async fn get_from_database_table(
        &self,
        database_name: &str,
        table_name: &str,
        query: &Query,
        sort: Option<&Sort>,
        skip: usize,
        limit: Option<usize>,
        implements: &[Implement],
    ) -> anyhow::Result<Vec<Row>> {
        self.require_ready()?;
        let db = self.database(database_name)?;
        let table = db.get_table(table_name).ok_or_else(errors::table_does_not_exist)?;
        let query = query.clone();
        let sort = sort.cloned();

        self.pool
            .run(|| async move {
                let (mut ids, additional_fields) = table.query(&query)?;
                if let Some(sort) = &sort {
                    ids = table.sort(&ids, &additional_fields, sort)?;
                }
                let ids = Table::skip_and_limit(ids, skip, limit);
                let records = table.get_objects(ids).await?;

                let mut attachments = Vec::with_capacity(implements.len());
                for spec in implements {
                    let attached = db.implement(&records, spec).await?;
                    attachments.push((spec.attach_as().to_string(), attached));
                }

                let rows = records
                    .into_iter()
                    .map(|record| {
                        let mut row: Row = record.fields.iter().map(|(name, value)| (name.clone(), value.to_json())).collect();
                        if let Some(extra) = additional_fields.get(&record.id) {
                            for (name, value) in extra {
                                row.insert(name.clone(), value.to_json());
                            }
                        }
                        for (as_name, attached) in &attachments {
                            if let Some(value) = attached.get(&record.id) {
                                row.insert(as_name.clone(), value.clone());
                            }
                        }
                        row
                    })
                    .collect();
                Ok(rows)
            })
            .await
    }

    /// Stops the metrics ticker and every loaded database's watchers and
    /// storage engines. Does not delete anything on disk; a fresh
    /// `Engine::start` against the same `data_dir` replays every event log
    /// and is back to the same state.
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
        for db in self.databases.read().values() {
            db.kill();
        }
    }
}
