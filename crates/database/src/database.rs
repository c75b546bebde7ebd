//! A single database: a named directory holding a registry of tables, plus
//! a cross-table join ("implement") that attaches a related row (or rows)
//! from another table onto each result.
//!
//! A filesystem watcher on the tables directory picks up a new subdirectory
//! appearing under `tables/` automatically, so a table created by some
//! other process (or restored from a snapshot) is loaded without a
//! restart.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        mpsc,
        Arc,
    },
    thread,
    time::Duration,
};

use metrics::MetricsSink;
use notify::{
    RecursiveMode,
    Watcher,
};
use parking_lot::RwLock;
use query::{
    Operator,
    Query,
    Where,
};
use storage::Record;

use crate::{
    table::Table,
    table_config::TableConfig,
    validate::validate_name,
};

const WATCHER_SETTLE_DELAY: Duration = Duration::from_millis(100);

/// A per-row join from a base table's records into another table.
///
/// `field` names the base table's field whose value is looked up in the
/// `from` table under `from_field`; matching rows are attached under `as_`
/// (defaulting to the `from` table's name). More than one match, or
/// `force_array`, attaches a list; otherwise a single object (or null, if
/// nothing matched).
#[derive(Debug, Clone)]
pub struct Implement {
    pub from_table: String,
    pub from_field: String,
    pub field: String,
    pub as_: Option<String>,
    pub force_array: bool,
}

impl Implement {
    pub fn attach_as(&self) -> &str {
        self.as_.as_deref().unwrap_or(&self.from_table)
    }
}

pub struct Database {
    name: String,
    dir: PathBuf,
    cache_size: usize,
    metrics: Arc<dyn MetricsSink>,
    tables: RwLock<HashMap<String, Arc<Table>>>,
    watch: Arc<AtomicBool>,
}

impl Database {
    fn tables_dir(dir: &std::path::Path) -> PathBuf {
        dir.join("tables")
    }

    fn table_json_path(tables_dir: &std::path::Path, table_name: &str) -> PathBuf {
        tables_dir.join(table_name).join("table.json")
    }

    /// Creates a brand-new database directory. Errors with
    /// `DatabaseAlreadyExists` if `dir` already exists.
    pub fn create(name: impl Into<String>, dir: PathBuf, cache_size: usize, metrics: Arc<dyn MetricsSink>) -> anyhow::Result<Arc<Self>> {
        let name = name.into();
        validate_name(&name)?;
        if dir.exists() {
            return Err(errors::database_already_exists());
        }
        fs::create_dir_all(Self::tables_dir(&dir)).map_err(|e| errors::internal("could not create database directory", e))?;
        tracing::info!(database = %name, "created database");
        Self::open_dir(name, dir, cache_size, metrics)
    }

    /// Opens an existing database directory, loading every table found
    /// under `tables/`. Errors with `DatabaseDoesNotExist` if `dir` is
    /// missing.
    pub fn open(name: impl Into<String>, dir: PathBuf, cache_size: usize, metrics: Arc<dyn MetricsSink>) -> anyhow::Result<Arc<Self>> {
        let name = name.into();
        if !dir.exists() {
            return Err(errors::database_does_not_exist());
        }
        Self::open_dir(name, dir, cache_size, metrics)
    }

    fn open_dir(name: String, dir: PathBuf, cache_size: usize, metrics: Arc<dyn MetricsSink>) -> anyhow::Result<Arc<Self>> {
        let tables_dir = Self::tables_dir(&dir);
        fs::create_dir_all(&tables_dir).map_err(|e| errors::internal("could not create tables directory", e))?;

        let mut tables = HashMap::new();
        let entries = fs::read_dir(&tables_dir).map_err(|e| errors::internal("could not list tables directory", e))?;
        for entry in entries {
            let entry = entry.map_err(|e| errors::internal("could not read tables directory entry", e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let table_name = entry.file_name().to_string_lossy().to_string();
            let table = Self::load_table(&name, &tables_dir, &table_name, cache_size, metrics.clone())?;
            tables.insert(table_name, table);
        }

        let db = Arc::new(Self {
            name,
            dir,
            cache_size,
            metrics,
            tables: RwLock::new(tables),
            watch: Arc::new(AtomicBool::new(true)),
        });
        db.clone().spawn_tables_watcher();
        Ok(db)
    }

    fn load_table(
        database_name: &str,
        tables_dir: &std::path::Path,
        table_name: &str,
        cache_size: usize,
        metrics: Arc<dyn MetricsSink>,
    ) -> anyhow::Result<Arc<Table>> {
        let config_path = Self::table_json_path(tables_dir, table_name);
        let raw = fs::read_to_string(&config_path).map_err(|e| errors::internal("could not read table.json", e))?;
        let config: TableConfig = serde_json::from_str(&raw).map_err(|e| errors::internal("could not parse table.json", e))?;
        config.validate()?;
        Table::open(database_name, table_name, tables_dir.join(table_name), config, cache_size, metrics)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_names(&self) -> Vec<String> {
        self.tables.read().keys().cloned().collect()
    }

    pub fn get_table(&self, name: &str) -> Option<Arc<Table>> {
        self.tables.read().get(name).cloned()
    }

    /// Creates a new table: validates the name and field config, persists
    /// `table.json`, then opens its storage engine. `TableAlreadyExists` if
    /// a table with this name is already registered.
    pub fn create_table(&self, name: impl Into<String>, config: TableConfig) -> anyhow::Result<Arc<Table>> {
        let name = name.into();
        validate_name(&name)?;
        config.validate()?;

        let mut tables = self.tables.write();
        if tables.contains_key(&name) {
            return Err(errors::table_already_exists());
        }

        let tables_dir = Self::tables_dir(&self.dir);
        let table_dir = tables_dir.join(&name);
        fs::create_dir_all(&table_dir).map_err(|e| errors::internal("could not create table directory", e))?;
        let json = serde_json::to_string_pretty(&config).map_err(|e| errors::internal("could not serialize table.json", e))?;
        fs::write(Self::table_json_path(&tables_dir, &name), json).map_err(|e| errors::internal("could not write table.json", e))?;

        let table = Table::open(&self.name, &name, table_dir, config, self.cache_size, self.metrics.clone())?;
        tables.insert(name, table.clone());
        Ok(table)
    }

    /// Deletes a table and its directory. `TableDoesNotExist` if no such
    /// table is registered.
    pub fn delete_table(&self, name: &str) -> anyhow::Result<()> {
        let table = self.tables.write().remove(name).ok_or_else(errors::table_does_not_exist)?;
        table.delete()
    }

    /// Row-wise join: for every base record, looks up `implement.field`'s
    /// value and queries the `from` table for rows where `from_field`
    /// equals it, returning the attached JSON value per base record id.
    /// `TableDoesNotExist` if the `from` table isn't registered.
    pub async fn implement(&self, base: &[Record], spec: &Implement) -> anyhow::Result<HashMap<i64, serde_json::Value>> {
        let from_table = self.get_table(&spec.from_table).ok_or_else(errors::table_does_not_exist)?;

        let mut out = HashMap::with_capacity(base.len());
        for record in base {
            let Some(value) = record.get(&spec.field) else { continue };
            let query = Query::from_where(Where::new(&spec.from_field, Operator::Equals, value.to_json()));
            let (ids, _) = from_table.query(&query)?;
            let matches = from_table.get_objects(ids).await?;

            let json_rows: Vec<serde_json::Value> = matches.iter().map(record_to_json).collect();
            let attached = if spec.force_array || json_rows.len() > 1 {
                serde_json::Value::Array(json_rows)
            } else {
                json_rows.into_iter().next().unwrap_or(serde_json::Value::Null)
            };
            out.insert(record.id, attached);
        }
        Ok(out)
    }

    /// Stops the tables watcher and every table's storage engine, but
    /// leaves the on-disk directories intact.
    pub fn kill(&self) {
        self.watch.store(false, Ordering::SeqCst);
        for table in self.tables.read().values() {
            table.kill();
        }
    }

    /// Kills everything and removes the database directory entirely.
    pub fn delete(&self) -> anyhow::Result<()> {
        self.kill();
        fs::remove_dir_all(&self.dir).map_err(|e| errors::internal("could not delete database directory", e))
    }

    /// Watches `tables/` for subdirectories created or removed by some
    /// other process: on create, waits briefly for the writer to finish
    /// laying down `table.json` and then loads the table (a no-op if
    /// already registered); on remove, kills and forgets it. Exits when
    /// `self.watch` is cleared (see [`Self::kill`]).
    fn spawn_tables_watcher(self: Arc<Self>) {
        let tables_dir = Self::tables_dir(&self.dir);
        let (tx, rx) = mpsc::channel();
        let mut watcher = match notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        }) {
            Ok(w) => w,
            Err(e) => {
                tracing::warn!(database = %self.name, ?e, "could not create tables directory watcher");
                return;
            },
        };
        if let Err(e) = watcher.watch(&tables_dir, RecursiveMode::NonRecursive) {
            tracing::warn!(database = %self.name, ?e, "could not watch tables directory");
            return;
        }

        thread::spawn(move || {
            let _watcher = watcher;
            while self.watch.load(Ordering::SeqCst) {
                match rx.recv_timeout(Duration::from_millis(200)) {
                    Ok(Ok(event)) => self.handle_tables_dir_event(&tables_dir, event),
                    Ok(Err(e)) => tracing::warn!(database = %self.name, ?e, "tables directory watcher error"),
                    Err(mpsc::RecvTimeoutError::Timeout) => {},
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
        });
    }

    fn handle_tables_dir_event(&self, tables_dir: &std::path::Path, event: notify::Event) {
        use notify::EventKind;

        for path in &event.paths {
            let Some(table_name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else { continue };
            match event.kind {
                EventKind::Create(_) => {
                    if self.tables.read().contains_key(&table_name) {
                        continue;
                    }
                    thread::sleep(WATCHER_SETTLE_DELAY);
                    match Self::load_table(&self.name, tables_dir, &table_name, self.cache_size, self.metrics.clone()) {
                        Ok(table) => {
                            tracing::info!(database = %self.name, table = %table_name, "loaded externally created table");
                            self.tables.write().insert(table_name, table);
                        },
                        Err(e) => tracing::warn!(database = %self.name, table = %table_name, ?e, "could not load externally created table"),
                    }
                },
                EventKind::Remove(_) => {
                    if let Some(table) = self.tables.write().remove(&table_name) {
                        table.kill();
                        tracing::info!(database = %self.name, table = %table_name, "forgot externally removed table");
                    }
                },
                _ => {},
            }
        }
    }
}

fn record_to_json(record: &Record) -> serde_json::Value {
    serde_json::Value::Object(record.fields.iter().map(|(name, value)| (name.clone(), value.to_json())).collect())
}
