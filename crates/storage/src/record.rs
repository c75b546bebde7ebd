use std::collections::{
    BTreeMap,
    HashMap,
};

use value::{
    Field,
    Value,
};

/// An in-memory record: its id (the event-log line number of the event
/// that produced its current version) and a fully-populated field map —
/// every field the table declares has an entry, null or not.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: i64,
    pub fields: HashMap<String, Value>,
}

impl Record {
    pub fn new(id: i64, fields: HashMap<String, Value>) -> Self {
        Self { id, fields }
    }

    pub fn get(&self, field_name: &str) -> Option<&Value> {
        self.fields.get(field_name)
    }

    /// Renders this record's fields as the event log's `data` map:
    /// canonical string form for every non-null field. A null field is
    /// omitted rather than written as the literal string `"null"` — that's
    /// how [`Self::fields_from_event_data`]/`Value::from_stored_string`
    /// already interpret absence. Used to build an ADD or UPDATE event.
    pub fn to_event_data(&self) -> BTreeMap<String, String> {
        self.fields.iter().filter(|(_, value)| !value.is_null()).map(|(name, value)| (name.clone(), value.to_stored_string())).collect()
    }

    /// Reconstructs a full field map from an event's `data` map and the
    /// table's schema: every declared field gets an entry, parsed per its
    /// type, defaulting to that type's null when absent from `data`.
    pub fn fields_from_event_data(schema: &HashMap<String, Field>, data: &BTreeMap<String, String>) -> anyhow::Result<HashMap<String, Value>> {
        schema
            .values()
            .map(|field| {
                let raw = data.get(&field.name).map(String::as_str);
                Value::from_stored_string(field.value_type, raw).map(|v| (field.name.clone(), v))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use value::ValueType;

    use super::*;

    #[test]
    fn round_trips_through_event_data_and_back() {
        let mut schema = HashMap::new();
        schema.insert("name".to_string(), Field::new("name", ValueType::Text, true, false, false).unwrap());
        schema.insert("age".to_string(), Field::new("age", ValueType::Number, false, false, true).unwrap());

        let mut fields = HashMap::new();
        fields.insert("name".to_string(), Value::Text(value::Text::new("a")));
        fields.insert("age".to_string(), Value::null(ValueType::Number));
        let record = Record::new(0, fields.clone());

        let data = record.to_event_data();
        let back = Record::fields_from_event_data(&schema, &data).unwrap();
        assert_eq!(back, fields);
    }

    #[test]
    fn absent_field_becomes_null_not_an_error() {
        let mut schema = HashMap::new();
        schema.insert("age".to_string(), Field::new("age", ValueType::Number, false, false, true).unwrap());
        let data = BTreeMap::new();
        let fields = Record::fields_from_event_data(&schema, &data).unwrap();
        assert!(fields["age"].is_null());
    }
}
