use std::collections::HashMap;

use value::{
    Field,
    Value,
};

use crate::index::Index;

/// One [`Index`] per indexed field on a table, including the implicit
/// `INTERNAL_OBJECT_ID` field every table carries. Built from the table's
/// field declarations at table-open time; fields that aren't `indexed`
/// simply have no entry here and can't be queried except by a full
/// in-memory filter (not supported — the spec requires `where` to go
/// through an index).
pub struct IndexSet {
    indexes: HashMap<String, Index>,
}

impl IndexSet {
    pub fn new(fields: &HashMap<String, Field>) -> Self {
        let indexes = fields
            .values()
            .filter(|f| f.indexed)
            .map(|f| (f.name.clone(), Index::new()))
            .collect();
        Self { indexes }
    }

    pub fn get(&self, field_name: &str) -> Option<&Index> {
        self.indexes.get(field_name)
    }

    pub fn contains(&self, field_name: &str) -> bool {
        self.indexes.contains_key(field_name)
    }

    /// Indexes `record_id`'s value for every field present in `values` that
    /// has an index, in the deterministic field-name order of `values`'
    /// iteration — callers that care about cross-field ordering should sort
    /// `values` themselves; the spec only orders additions within a single
    /// field's index (value → exact → sorted, handled inside `Index::add`).
    pub fn index_record(&self, record_id: i64, values: &HashMap<String, Value>) {
        for (field_name, value) in values {
            if let Some(index) = self.indexes.get(field_name) {
                index.add(value.clone(), record_id);
            }
        }
    }

    pub fn unindex_record(&self, record_id: i64, values: &HashMap<String, Value>) {
        for (field_name, value) in values {
            if let Some(index) = self.indexes.get(field_name) {
                index.remove(value, record_id);
            }
        }
    }
}
