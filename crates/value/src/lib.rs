//! The `Value`/`DBType` model: the tagged union of field values the
//! indexes, storage engine and query evaluator all operate on.
//!
//! A `Value` never carries its own type tag on disk — events store plain
//! JSON scalars (string/number/bool/null) — so converting between JSON and
//! `Value` always happens together with the table's declared
//! [`ValueType`] for that field.

mod boolean;
mod field;
mod number;
mod text;
mod value_type;

use regex::Regex;

pub use boolean::Bool;
pub use field::{
    Field,
    INTERNAL_OBJECT_ID,
};
pub use number::Number;
pub use text::Text;
pub use value_type::ValueType;

/// A single field value: text, number or bool, each independently
/// nullable. Comparisons between values of different variants are a
/// validation error — callers are expected to only compare values drawn
/// from the same indexed field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(Text),
    Number(Number),
    Bool(Bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Text(_) => ValueType::Text,
            Value::Number(_) => ValueType::Number,
            Value::Bool(_) => ValueType::Bool,
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            Value::Text(v) => v.is_null(),
            Value::Number(v) => v.is_null(),
            Value::Bool(v) => v.is_null(),
        }
    }

    pub fn null(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Text => Value::Text(Text::null()),
            ValueType::Number => Value::Number(Number::null()),
            ValueType::Bool => Value::Bool(Bool::null()),
        }
    }

    /// The canonical string form used both as the exact-index hash key and
    /// as the text rendering of a value in error messages. `"null"` for any
    /// null value regardless of declared type.
    pub fn to_canonical_string(&self) -> String {
        match self {
            Value::Text(v) => v.to_canonical_string(),
            Value::Number(v) => v.to_canonical_string(),
            Value::Bool(v) => v.to_canonical_string(),
        }
    }

    pub fn matches(&self, re: &Regex) -> bool {
        match self {
            Value::Text(v) => v.matches(re),
            Value::Number(v) => v.matches(re),
            Value::Bool(v) => v.matches(re),
        }
    }

    pub fn larger(&self, other: &Value) -> anyhow::Result<bool> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Ok(a.larger(b)),
            (Value::Number(a), Value::Number(b)) => Ok(a.larger(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.larger(b)),
            _ => Err(errors::type_not_supported(other.value_type().as_str())),
        }
    }

    pub fn smaller(&self, other: &Value) -> anyhow::Result<bool> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Ok(a.smaller(b)),
            (Value::Number(a), Value::Number(b)) => Ok(a.smaller(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.smaller(b)),
            _ => Err(errors::type_not_supported(other.value_type().as_str())),
        }
    }

    pub fn equal(&self, other: &Value) -> anyhow::Result<bool> {
        match (self, other) {
            (Value::Text(a), Value::Text(b)) => Ok(a.equal(b)),
            (Value::Number(a), Value::Number(b)) => Ok(a.equal(b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(a.equal(b)),
            _ => Err(errors::type_not_supported(other.value_type().as_str())),
        }
    }

    pub fn not(&self, other: &Value) -> anyhow::Result<bool> {
        self.equal(other).map(|eq| !eq)
    }

    pub fn between(&self, lo: &Value, hi: &Value) -> anyhow::Result<bool> {
        Ok(self.larger(lo)? && self.smaller(hi)?)
    }

    /// Build a `Value` from a raw JSON scalar and the field's declared
    /// type. `serde_json::Value::Null` always yields the null marker for
    /// `value_type`, regardless of what `value_type` is.
    pub fn from_json(value_type: ValueType, raw: &serde_json::Value) -> anyhow::Result<Value> {
        if raw.is_null() {
            return Ok(Value::null(value_type));
        }

        match value_type {
            ValueType::Text => raw
                .as_str()
                .map(|s| Value::Text(Text::new(s)))
                .ok_or_else(errors::value_is_not_text),
            ValueType::Number => raw
                .as_f64()
                .map(|n| Value::Number(Number::new(n)))
                .ok_or_else(errors::value_is_not_number),
            ValueType::Bool => raw
                .as_bool()
                .map(|b| Value::Bool(Bool::new(b)))
                .ok_or_else(errors::value_is_not_bool),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Text(v) => match v.as_str() {
                Some(s) => serde_json::Value::String(s.to_string()),
                None => serde_json::Value::Null,
            },
            Value::Number(v) => match v.value() {
                Some(n) => serde_json::Number::from_f64(n)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null),
                None => serde_json::Value::Null,
            },
            Value::Bool(v) => match v.value() {
                Some(b) => serde_json::Value::Bool(b),
                None => serde_json::Value::Null,
            },
        }
    }

    /// Builds a `Value` from the event log's string representation of a
    /// field (or its absence, which is how null is represented on disk —
    /// the log never writes the literal word `"null"` for a field that
    /// simply wasn't set). `raw` is `None` when the field key was missing
    /// from the event's `data` map.
    pub fn from_stored_string(value_type: ValueType, raw: Option<&str>) -> anyhow::Result<Value> {
        let Some(raw) = raw else {
            return Ok(Value::null(value_type));
        };
        match value_type {
            ValueType::Text => Ok(Value::Text(Text::new(raw))),
            ValueType::Number => raw
                .parse::<f64>()
                .map(|n| Value::Number(Number::new(n)))
                .map_err(|_| errors::type_parse_error(raw, "number")),
            ValueType::Bool => Ok(Value::Bool(Bool::new(raw == "true"))),
        }
    }

    /// The string this value is persisted as in an event line: identical to
    /// [`Self::to_canonical_string`], but named for the call site that
    /// writes it to disk.
    pub fn to_stored_string(&self) -> String {
        self.to_canonical_string()
    }

    pub fn as_text(&self) -> anyhow::Result<&Text> {
        match self {
            Value::Text(v) => Ok(v),
            _ => Err(errors::value_is_not_text()),
        }
    }

    pub fn as_number(&self) -> anyhow::Result<&Number> {
        match self {
            Value::Number(v) => Ok(v),
            _ => Err(errors::value_is_not_number()),
        }
    }

    pub fn as_bool(&self) -> anyhow::Result<&Bool> {
        match self {
            Value::Bool(v) => Ok(v),
            _ => Err(errors::value_is_not_bool()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_round_trips_through_json_for_every_type() {
        for t in [ValueType::Text, ValueType::Number, ValueType::Bool] {
            let v = Value::from_json(t, &serde_json::Value::Null).unwrap();
            assert!(v.is_null());
            assert_eq!(v.to_json(), serde_json::Value::Null);
            assert_eq!(v.to_canonical_string(), "null");
        }
    }

    #[test]
    fn mismatched_json_scalar_is_a_validation_error() {
        let raw = serde_json::json!("not a number");
        let err = Value::from_json(ValueType::Number, &raw).unwrap_err();
        assert_eq!(errors::metadata(&err).unwrap().short_msg, "ValueIsNotNumber");
    }

    #[test]
    fn comparing_across_variants_is_an_error() {
        let a = Value::Text(Text::new("a"));
        let b = Value::Number(Number::new(1.0));
        assert!(a.equal(&b).is_err());
    }

    #[test]
    fn two_nulls_are_equal_and_never_ordered() {
        let a = Value::null(ValueType::Number);
        let b = Value::null(ValueType::Number);
        assert!(a.equal(&b).unwrap());
        assert!(!a.larger(&b).unwrap());
        assert!(!a.smaller(&b).unwrap());
    }
}
