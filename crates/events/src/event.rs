use std::collections::BTreeMap;

use serde::{
    Deserialize,
    Serialize,
};

/// One line of the event log.
///
/// Serializes exactly to the on-disk line format: `{"type":"ADD","data":{…}}`,
/// `{"type":"UPDATE","data":{…},"refersTo":N}`, or `{"type":"REMOVE","refersTo":N}`.
/// `data` maps field name to the value's canonical string form (see
/// `value::Value::to_canonical_string`) — the event file never stores typed
/// values, only strings; the table's schema is what gives them meaning
/// again on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "ADD")]
    Add { data: BTreeMap<String, String> },
    #[serde(rename = "UPDATE")]
    Update {
        data: BTreeMap<String, String>,
        #[serde(rename = "refersTo")]
        refers_to: i64,
    },
    #[serde(rename = "REMOVE")]
    Remove {
        #[serde(rename = "refersTo")]
        refers_to: i64,
    },
}

impl Event {
    pub fn refers_to(&self) -> Option<i64> {
        match self {
            Event::Add { .. } => None,
            Event::Update { refers_to, .. } | Event::Remove { refers_to } => Some(*refers_to),
        }
    }

    pub fn data(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Event::Add { data } | Event::Update { data, .. } => Some(data),
            Event::Remove { .. } => None,
        }
    }

    /// Parse a single event-file line. A malformed line is a fatal,
    /// process-aborting condition — the caller decides how to escalate;
    /// this just reports the parse failure.
    pub fn from_line(line: &str) -> anyhow::Result<Self> {
        serde_json::from_str(line).map_err(|e| errors::internal("corrupt event log line", e))
    }

    pub fn to_line(&self) -> anyhow::Result<String> {
        serde_json::to_string(self).map_err(|e| errors::internal("could not serialize event", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_serializes_without_refers_to() {
        let mut data = BTreeMap::new();
        data.insert("name".to_string(), "a".to_string());
        let ev = Event::Add { data };
        let line = ev.to_line().unwrap();
        assert_eq!(line, r#"{"type":"ADD","data":{"name":"a"}}"#);
    }

    #[test]
    fn update_carries_refers_to() {
        let ev = Event::Update {
            data: BTreeMap::new(),
            refers_to: 3,
        };
        let line = ev.to_line().unwrap();
        assert!(line.contains("\"refersTo\":3"));
        assert_eq!(Event::from_line(&line).unwrap(), ev);
    }

    #[test]
    fn remove_has_no_data_field() {
        let ev = Event::Remove { refers_to: 7 };
        let line = ev.to_line().unwrap();
        assert_eq!(line, r#"{"type":"REMOVE","refersTo":7}"#);
        assert_eq!(Event::from_line(&line).unwrap().refers_to(), Some(7));
    }

    #[test]
    fn corrupt_line_is_an_internal_error() {
        let err = Event::from_line("not json").unwrap_err();
        assert_eq!(errors::metadata(&err).unwrap().short_msg, "Internal");
    }
}
