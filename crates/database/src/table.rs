//! A single table: schema, per-field indexes, the storage engine, and the
//! where/query/insert/update/remove/sort behaviors built on top of them.
//!
//! `TableCallbacks` holds only the `IndexSet`, never the table itself, so
//! the callback wiring between `Storage` and this table's indexes carries
//! no ownership cycle.

use std::{
    collections::{
        HashMap,
        HashSet,
    },
    path::PathBuf,
    sync::Arc,
};

use indexing::{
    Index,
    IndexSet,
};
use metrics::{
    MetricsSink,
    OperationTimer,
};
use query::{
    AdditionalFields,
    FieldSource,
    Operator,
    Query,
    Sort,
    SortDirection,
    Where,
};
use regex::Regex;
use storage::{
    Record,
    Storage,
    StorageCallbacks,
};
use value::{
    Field,
    Number,
    Value,
    ValueType,
    INTERNAL_OBJECT_ID,
};

use crate::table_config::TableConfig;

struct TableCallbacks {
    indexes: Arc<IndexSet>,
}

impl StorageCallbacks for TableCallbacks {
    fn added_object(&self, record: Record) {
        self.indexes.index_record(record.id, &record.fields);
        if let Some(index) = self.indexes.get(INTERNAL_OBJECT_ID) {
            index.add(Value::Number(Number::new(record.id as f64)), record.id);
        }
    }

    fn deleted_object(&self, record: Record) {
        self.indexes.unindex_record(record.id, &record.fields);
        if let Some(index) = self.indexes.get(INTERNAL_OBJECT_ID) {
            index.remove(&Value::Number(Number::new(record.id as f64)), record.id);
        }
    }
}

/// A single compiled `where` predicate, ready to be run either against an
/// index directly or against a pre-filtered AND context id by id.
enum CompiledWhere {
    Equals(Value),
    Not(Value),
    Match(Regex),
    Larger(Value),
    Smaller(Value),
    Between(Value, Value),
}

pub struct Table {
    name: String,
    database_name: String,
    dir: PathBuf,
    config: TableConfig,
    all_fields: HashMap<String, Field>,
    indexes: Arc<IndexSet>,
    storage: Arc<Storage>,
    metrics: Arc<dyn MetricsSink>,
}

impl Table {
    /// Opens a table's on-disk directory (creating it if necessary),
    /// rebuilds its indexes from the event log, and starts its storage
    /// engine's write queue and tail watcher. `config` is assumed already
    /// validated (a freshly-created table validates at creation time; a
    /// reloaded one was validated when it was written).
    pub fn open(
        database_name: impl Into<String>,
        name: impl Into<String>,
        dir: PathBuf,
        config: TableConfig,
        cache_size: usize,
        metrics: Arc<dyn MetricsSink>,
    ) -> anyhow::Result<Arc<Self>> {
        let name = name.into();
        let database_name = database_name.into();

        let mut all_fields = config.fields.clone();
        all_fields.insert(INTERNAL_OBJECT_ID.to_string(), Field::internal_object_id());

        let indexes = Arc::new(IndexSet::new(&all_fields));
        let schema = Arc::new(config.fields.clone());
        let callbacks: Arc<dyn StorageCallbacks> = Arc::new(TableCallbacks { indexes: indexes.clone() });

        std::fs::create_dir_all(&dir).map_err(|e| errors::internal("could not create table directory", e))?;
        let storage = Storage::open(dir.join("objects.idb"), schema, cache_size, callbacks, metrics.clone())?;

        tracing::info!(database = %database_name, table = %name, objects = storage.number_of_objects(), "loaded table");

        Ok(Arc::new(Self {
            name,
            database_name,
            dir,
            config,
            all_fields,
            indexes,
            storage,
            metrics,
        }))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    pub fn number_of_objects(&self) -> i64 {
        self.storage.number_of_objects()
    }

    fn field(&self, name: &str) -> anyhow::Result<&Field> {
        self.all_fields.get(name).ok_or_else(|| errors::cannot_find_field(name))
    }

    fn all_ids(&self) -> Vec<i64> {
        self.indexes.get(INTERNAL_OBJECT_ID).map(Index::all_ids).unwrap_or_default()
    }

    fn values_from_raw(&self, raw: &HashMap<String, serde_json::Value>) -> anyhow::Result<HashMap<String, Value>> {
        self.config
            .fields
            .values()
            .map(|field| {
                let value = match raw.get(&field.name) {
                    Some(json) => Value::from_json(field.value_type, json)?,
                    None => Value::null(field.value_type),
                };
                Ok((field.name.clone(), value))
            })
            .collect()
    }

    fn required_fields_present(&self, values: &HashMap<String, Value>) -> anyhow::Result<()> {
        for field in self.config.fields.values() {
            if field.null {
                continue;
            }
            let is_null = values.get(&field.name).map(Value::is_null).unwrap_or(true);
            if is_null {
                return Err(errors::object_does_not_have_value_for_field(&field.name));
            }
        }
        Ok(())
    }

    /// Checks single-field and combined-uniques constraints against the
    /// current indexes. `exclude_id` is the record being updated (its own
    /// still-indexed old values must not count as a collision against
    /// itself); `None` for inserts.
    fn check_uniqueness(&self, values: &HashMap<String, Value>, exclude_id: Option<i64>) -> anyhow::Result<()> {
        for field in self.config.fields.values() {
            if !field.unique {
                continue;
            }
            let Some(index) = self.indexes.get(&field.name) else { continue };
            let value = values.get(&field.name).cloned().unwrap_or_else(|| Value::null(field.value_type));
            let collides = index.equal(&value).into_iter().any(|id| Some(id) != exclude_id);
            if collides {
                return Err(errors::found_existing_object_with_field(&field.name));
            }
        }

        for group in &self.config.options.combined_uniques {
            let mut matches: Option<HashSet<i64>> = None;
            for field_name in group {
                let Some(index) = self.indexes.get(field_name) else { continue };
                let value_type = self.field(field_name)?.value_type;
                let value = values.get(field_name).cloned().unwrap_or_else(|| Value::null(value_type));
                let ids: HashSet<i64> = index.equal(&value).into_iter().collect();
                matches = Some(match matches {
                    None => ids,
                    Some(prev) => prev.intersection(&ids).copied().collect(),
                });
            }
            let collides = matches.unwrap_or_default().into_iter().any(|id| Some(id) != exclude_id);
            if collides {
                return Err(errors::found_existing_object_with_combined_uniques());
            }
        }

        Ok(())
    }

    pub fn insert(&self, raw: HashMap<String, serde_json::Value>) -> anyhow::Result<()> {
        let _timer = OperationTimer::new("table.insert", self.metrics.as_ref());
        let values = self.values_from_raw(&raw)?;
        self.required_fields_present(&values)?;
        self.check_uniqueness(&values, None)?;
        self.storage.add_object(values);
        Ok(())
    }

    /// Locates the record to update by any indexed-and-unique field present
    /// in `raw`.
    fn find_existing(&self, raw: &HashMap<String, serde_json::Value>) -> anyhow::Result<i64> {
        for field in self.config.fields.values() {
            if !(field.indexed && field.unique) {
                continue;
            }
            let Some(json) = raw.get(&field.name) else { continue };
            let value = Value::from_json(field.value_type, json)?;
            let Some(index) = self.indexes.get(&field.name) else { continue };
            if let Some(&id) = index.equal(&value).first() {
                return Ok(id);
            }
        }
        Err(errors::could_not_find_object_with_at_least_one_indexed_and_unique_value())
    }

    pub async fn update(self: &Arc<Self>, raw: HashMap<String, serde_json::Value>) -> anyhow::Result<()> {
        let _timer = OperationTimer::new("table.update", self.metrics.as_ref());
        let existing_id = self.find_existing(&raw)?;
        let existing = self
            .storage
            .get_object(existing_id)
            .await?
            .ok_or_else(errors::could_not_find_object_with_at_least_one_indexed_and_unique_value)?;

        let mut merged = existing.fields;
        for field in self.config.fields.values() {
            if let Some(json) = raw.get(&field.name) {
                merged.insert(field.name.clone(), Value::from_json(field.value_type, json)?);
            }
        }

        self.required_fields_present(&merged)?;
        self.check_uniqueness(&merged, Some(existing_id))?;
        self.storage.update_object(existing_id, merged);
        Ok(())
    }

    pub fn remove(&self, id: i64) {
        self.storage.remove_object(id);
    }

    pub async fn get_object(self: &Arc<Self>, id: i64) -> anyhow::Result<Option<Record>> {
        self.storage.get_object(id).await
    }

    pub async fn get_objects(self: &Arc<Self>, ids: Vec<i64>) -> anyhow::Result<Vec<Record>> {
        self.storage.get_objects(ids).await
    }

    fn compile_where(&self, where_: &Where) -> anyhow::Result<(String, CompiledWhere)> {
        where_.validate()?;
        let field = self.field(&where_.field)?;

        let compiled = match where_.operator {
            Operator::Match => {
                let raw = where_.value.as_ref().ok_or_else(errors::not_a_valid_operator)?;
                let pattern = raw.as_str().ok_or_else(errors::value_is_not_text)?;
                CompiledWhere::Match(Regex::new(pattern).map_err(|_| errors::invalid_regex(pattern))?)
            },
            Operator::Between => {
                let raw = where_.value.as_ref().ok_or_else(errors::not_a_valid_operator)?;
                let combined = raw.as_str().ok_or_else(errors::value_is_not_text)?;
                let parts: Vec<&str> = combined.splitn(2, '_').collect();
                if parts.len() < 2 {
                    return Err(errors::not_enough_values_for_operator("between"));
                }
                let lo = Value::from_stored_string(field.value_type, Some(parts[0]))?;
                let hi = Value::from_stored_string(field.value_type, Some(parts[1]))?;
                CompiledWhere::Between(lo, hi)
            },
            op => {
                let raw = where_.value.as_ref().ok_or_else(errors::not_a_valid_operator)?;
                let value = Value::from_json(field.value_type, raw)?;
                match op {
                    Operator::Equals => CompiledWhere::Equals(value),
                    Operator::Not => CompiledWhere::Not(value),
                    Operator::Larger => CompiledWhere::Larger(value),
                    Operator::Smaller => CompiledWhere::Smaller(value),
                    Operator::Match | Operator::Between => unreachable!("handled above"),
                }
            },
        };

        Ok((where_.field.clone(), compiled))
    }

    fn index_lookup(&self, field_name: &str, pred: &CompiledWhere) -> anyhow::Result<Vec<i64>> {
        let index = self.indexes.get(field_name).ok_or_else(|| errors::cannot_find_field(field_name))?;
        Ok(match pred {
            CompiledWhere::Equals(v) => index.equal(v),
            CompiledWhere::Not(v) => index.not(v),
            CompiledWhere::Match(re) => index.matches(re),
            CompiledWhere::Larger(v) => index.larger(v),
            CompiledWhere::Smaller(v) => index.smaller(v),
            CompiledWhere::Between(lo, hi) => index.between(lo, hi),
        })
    }

    fn matches_in_and_context(&self, index: &Index, id: i64, pred: &CompiledWhere) -> bool {
        let Some(current) = index.get_value(id) else { return false };
        match pred {
            CompiledWhere::Equals(v) => current.equal(v).unwrap_or(false),
            CompiledWhere::Not(v) => current.not(v).unwrap_or(false),
            CompiledWhere::Match(re) => current.matches(re),
            CompiledWhere::Larger(v) => current.larger(v).unwrap_or(false),
            CompiledWhere::Smaller(v) => current.smaller(v).unwrap_or(false),
            CompiledWhere::Between(lo, hi) => current.between(lo, hi).unwrap_or(false),
        }
    }

    fn eval_where(&self, where_: &Where, and_context: Option<&[i64]>) -> anyhow::Result<Vec<i64>> {
        if where_.needs_expansion() {
            let expanded = where_.expand().expect("needs_expansion implies expand returns Some");
            let (ids, _) = self.eval_node(&expanded, and_context)?;
            return Ok(ids);
        }

        let (field_name, pred) = self.compile_where(where_)?;
        match and_context {
            None => self.index_lookup(&field_name, &pred),
            Some(ctx) => {
                let index = self.indexes.get(&field_name).ok_or_else(|| errors::cannot_find_field(&field_name))?;
                Ok(ctx.iter().copied().filter(|id| self.matches_in_and_context(index, *id, &pred)).collect())
            },
        }
    }

    /// The recursive where/functions/and/or evaluator.
    fn eval_node(&self, query: &Query, and_context: Option<&[i64]>) -> anyhow::Result<(Vec<i64>, AdditionalFields)> {
        query.validate()?;

        let mut ids = match &query.where_ {
            Some(w) => self.eval_where(w, and_context)?,
            None => and_context.map(<[i64]>::to_vec).unwrap_or_else(|| self.all_ids()),
        };

        let mut additional_fields = AdditionalFields::new();
        for call in &query.functions {
            let function = query::resolve_function(call)?;
            function.run(self, &ids, &mut additional_fields)?;
        }

        if let Some(and) = &query.and {
            let (and_ids, and_fields) = self.eval_node(and, Some(&ids))?;
            ids = and_ids;
            merge_additional_fields(&mut additional_fields, and_fields);
        } else if let Some(or) = &query.or {
            let (or_ids, or_fields) = self.eval_node(or, and_context)?;
            let mut seen: HashSet<i64> = ids.iter().copied().collect();
            for id in or_ids {
                if seen.insert(id) {
                    ids.push(id);
                }
            }
            merge_additional_fields(&mut additional_fields, or_fields);
        }

        Ok((ids, additional_fields))
    }

    pub fn query(&self, query: &Query) -> anyhow::Result<(Vec<i64>, AdditionalFields)> {
        let _timer = OperationTimer::new("table.query", self.metrics.as_ref());
        query.validate_tree()?;
        self.eval_node(query, None)
    }

    /// Stable sort of `ids` by `sort.field`, reading from `additional_fields`
    /// when the field was produced by a function, else from the index.
    pub fn sort(&self, ids: &[i64], additional_fields: &AdditionalFields, sort: &Sort) -> anyhow::Result<Vec<i64>> {
        let mut decorated = Vec::with_capacity(ids.len());
        for &id in ids {
            let value = query::resolve_value(self, additional_fields, id, &sort.field).ok_or_else(|| errors::cannot_find_field(&sort.field))?;
            decorated.push((id, value));
        }

        let mut sort_error = None;
        decorated.sort_by(|(_, a), (_, b)| {
            let (lo, hi) = match sort.direction {
                SortDirection::Ascending => (a, b),
                SortDirection::Descending => (b, a),
            };
            match lo.equal(hi) {
                Ok(true) => std::cmp::Ordering::Equal,
                Ok(false) => match lo.smaller(hi) {
                    Ok(true) => std::cmp::Ordering::Less,
                    Ok(false) => std::cmp::Ordering::Greater,
                    Err(e) => {
                        sort_error.get_or_insert(e);
                        std::cmp::Ordering::Equal
                    },
                },
                Err(e) => {
                    sort_error.get_or_insert(e);
                    std::cmp::Ordering::Equal
                },
            }
        });

        if let Some(e) = sort_error {
            return Err(e);
        }
        Ok(decorated.into_iter().map(|(id, _)| id).collect())
    }

    pub fn skip_and_limit(ids: Vec<i64>, skip: usize, limit: Option<usize>) -> Vec<i64> {
        let skipped = ids.into_iter().skip(skip);
        match limit {
            Some(n) => skipped.take(n).collect(),
            None => skipped.collect(),
        }
    }

    /// Forces the storage engine's write queue to drain immediately. Used
    /// by callers (notably tests) that need a just-written mutation to be
    /// indexed and readable before the next call.
    pub async fn flush(&self) {
        self.storage.flush().await;
    }

    pub fn kill(&self) {
        self.storage.kill();
    }

    pub fn delete(&self) -> anyhow::Result<()> {
        self.storage.kill();
        std::fs::remove_dir_all(&self.dir).map_err(|e| errors::internal("could not delete table directory", e))
    }
}

impl FieldSource for Table {
    fn field_type(&self, field_name: &str) -> Option<ValueType> {
        self.all_fields.get(field_name).map(|f| f.value_type)
    }

    fn value_of(&self, object_id: i64, field_name: &str) -> Option<Value> {
        self.indexes.get(field_name)?.get_value(object_id)
    }
}

fn merge_additional_fields(into: &mut AdditionalFields, other: AdditionalFields) {
    for (id, fields) in other {
        into.entry(id).or_default().extend(fields);
    }
}
