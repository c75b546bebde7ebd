//! The `table.json` sidecar: field declarations plus combined-uniques
//! options, persisted once at table creation.

use std::collections::HashMap;

use serde::{
    Deserialize,
    Serialize,
};
use value::Field;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableOptions {
    #[serde(rename = "combinedUniques", default)]
    pub combined_uniques: Vec<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub fields: HashMap<String, Field>,
    #[serde(default)]
    pub options: TableOptions,
}

impl TableConfig {
    pub fn new(fields: HashMap<String, Field>, options: TableOptions) -> Self {
        Self { fields, options }
    }

    /// Validates that every field's `unique ⇒ indexed` invariant holds and
    /// that every field referenced by a combined-uniques tuple actually
    /// exists on the table. `Field::new` already enforces the first
    /// constraint for fields built through it, but a config loaded from
    /// `table.json` may have been hand-edited, so this re-checks on load.
    pub fn validate(&self) -> anyhow::Result<()> {
        for field in self.fields.values() {
            if field.unique && !field.indexed {
                return Err(errors::field_cannot_be_unique_without_being_indexed());
            }
        }
        for group in &self.options.combined_uniques {
            for field_name in group {
                if !self.fields.contains_key(field_name) {
                    return Err(errors::cannot_find_field(field_name));
                }
            }
        }
        Ok(())
    }
}
