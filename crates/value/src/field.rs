use serde::{
    Deserialize,
    Serialize,
};

use crate::ValueType;

/// The field name every table indexes implicitly, regardless of what the
/// table's own config declares. Its value is the record id (the event
/// log's line number), so it is always numeric, always indexed, always
/// unique, and never null.
pub const INTERNAL_OBJECT_ID: &str = "INTERNAL_OBJECT_ID";

/// A single column in a table's schema.
///
/// `unique` implies `indexed` — a unique field with no index would need a
/// full scan to check uniqueness on every insert, which defeats the point.
/// Callers that build a `Field` by hand rather than through
/// [`Field::new`]/parsing should not construct a unique, non-indexed one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: ValueType,
    pub indexed: bool,
    pub unique: bool,
    pub null: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, value_type: ValueType, indexed: bool, unique: bool, null: bool) -> anyhow::Result<Self> {
        if unique && !indexed {
            return Err(errors::field_cannot_be_unique_without_being_indexed());
        }
        Ok(Self {
            name: name.into(),
            value_type,
            indexed,
            unique,
            null,
        })
    }

    /// The implicit `INTERNAL_OBJECT_ID` field every table carries:
    /// numeric, indexed, unique, not nullable.
    pub fn internal_object_id() -> Self {
        Self {
            name: INTERNAL_OBJECT_ID.to_string(),
            value_type: ValueType::Number,
            indexed: true,
            unique: true,
            null: false,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.name == INTERNAL_OBJECT_ID
    }
}
