use std::fmt;

use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};

/// The three field types a table schema can declare. Carried alongside a
/// [`crate::Value`] everywhere a raw JSON scalar needs to be interpreted —
/// the JSON on disk never carries its own type tag, the table's field
/// declaration does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    Number,
    Bool,
}

impl ValueType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "text" => Some(ValueType::Text),
            "number" => Some(ValueType::Number),
            "bool" => Some(ValueType::Bool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Number => "number",
            ValueType::Bool => "bool",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializes/deserializes as the same lowercase strings `ValueType::parse`
/// and `as_str` use, so `table.json` stays the plain `{"type":"number"}`
/// form rather than a serde-derived enum tag.
impl Serialize for ValueType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ValueType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ValueType::parse(&s).ok_or_else(|| serde::de::Error::custom(format!("type {s} not supported")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_type_names() {
        assert_eq!(ValueType::parse("text"), Some(ValueType::Text));
        assert_eq!(ValueType::parse("number"), Some(ValueType::Number));
        assert_eq!(ValueType::parse("bool"), Some(ValueType::Bool));
        assert_eq!(ValueType::parse("blob"), None);
    }

    #[test]
    fn round_trips_through_as_str() {
        for t in [ValueType::Text, ValueType::Number, ValueType::Bool] {
            assert_eq!(ValueType::parse(t.as_str()), Some(t));
        }
    }
}
