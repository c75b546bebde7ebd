use value::{
    Value,
    ValueType,
};

use crate::function::{
    resolve_value,
    AdditionalFields,
    FieldSource,
    FunctionCall,
    QueryFunction,
};

/// Levenshtein edit distance between a constant `value` and a text field,
/// written to `as` (default `"levenshtein"`).
pub struct LevenshteinFunction {
    pub value: String,
    pub field_name: String,
    pub as_name: String,
}

impl LevenshteinFunction {
    pub fn parse(call: &FunctionCall) -> anyhow::Result<Self> {
        let value = call.string_param("value")?;
        let field_name = call.string_param("fieldName")?;
        let as_name = call.optional_string_param("as", "levenshtein");
        Ok(Self {
            value,
            field_name,
            as_name,
        })
    }
}

impl QueryFunction for LevenshteinFunction {
    fn run(&self, source: &dyn FieldSource, object_ids: &[i64], additional_fields: &mut AdditionalFields) -> anyhow::Result<()> {
        if source.field_type(&self.field_name) != Some(ValueType::Text) {
            return Err(errors::field_has_unsupported_type_for_this_function(&self.field_name));
        }

        for &id in object_ids {
            let distance = match resolve_value(source, additional_fields, id, &self.field_name) {
                Some(Value::Text(t)) => match t.as_str() {
                    Some(s) => levenshtein(&self.value, s),
                    None => continue,
                },
                _ => continue,
            };
            additional_fields
                .entry(id)
                .or_default()
                .insert(self.as_name.clone(), Value::Number(value::Number::new(distance as f64)));
        }
        Ok(())
    }
}

/// Single-row dynamic-programming edit distance, counted over chars.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for i in 1..=a.len() {
        curr[0] = i;
        for j in 1..=b.len() {
            let cost = if a[i - 1] == b[j - 1] { 0 } else { 1 };
            curr[j] = (prev[j] + 1).min(curr[j - 1] + 1).min(prev[j - 1] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use value::Text;

    use super::*;

    struct FakeSource(HashMap<i64, Value>);

    impl FieldSource for FakeSource {
        fn field_type(&self, _field_name: &str) -> Option<ValueType> {
            Some(ValueType::Text)
        }

        fn value_of(&self, object_id: i64, _field_name: &str) -> Option<Value> {
            self.0.get(&object_id).cloned()
        }
    }

    #[test]
    fn kitten_to_sitting_is_three() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
    }

    #[test]
    fn identical_strings_are_zero_distance() {
        let mut values = HashMap::new();
        values.insert(1, Value::Text(Text::new("hello".to_string())));
        let source = FakeSource(values);
        let call = FunctionCall::new(
            "levenshtein",
            HashMap::from([
                ("value".to_string(), serde_json::Value::from("hello")),
                ("fieldName".to_string(), serde_json::Value::from("name")),
            ]),
        );
        let f = LevenshteinFunction::parse(&call).unwrap();
        let mut additional = AdditionalFields::new();
        f.run(&source, &[1], &mut additional).unwrap();
        assert_eq!(additional[&1]["levenshtein"], Value::Number(value::Number::new(0.0)));
    }
}
