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

/// `max`/`min` over a numeric field, written to `as` (default `"max"`/`"min"`).
///
/// Matches the original accumulator exactly: it starts at `0.0` rather than
/// the first observed value, so an all-negative field under `max` (or an
/// all-positive field under `min`) reports `0` instead of the true extreme.
/// Kept for parity rather than re-derived as a bug fix.
pub struct MinMaxFunction {
    pub max: bool,
    pub field_name: String,
    pub as_name: String,
}

impl MinMaxFunction {
    pub fn parse(call: &FunctionCall, max: bool) -> anyhow::Result<Self> {
        let field_name = call.string_param("fieldName")?;
        let as_name = call.optional_string_param("as", if max { "max" } else { "min" });
        Ok(Self {
            max,
            field_name,
            as_name,
        })
    }
}

impl QueryFunction for MinMaxFunction {
    fn run(&self, source: &dyn FieldSource, object_ids: &[i64], additional_fields: &mut AdditionalFields) -> anyhow::Result<()> {
        if source.field_type(&self.field_name) != Some(ValueType::Number) {
            return Err(errors::field_has_unsupported_type_for_this_function(&self.field_name));
        }

        let mut result = 0.0;
        for &id in object_ids {
            let Some(Value::Number(n)) = resolve_value(source, additional_fields, id, &self.field_name) else {
                continue;
            };
            let Some(v) = n.value() else {
                continue;
            };
            if self.max {
                if v > result {
                    result = v;
                }
            } else if v < result {
                result = v;
            }
        }

        for &id in object_ids {
            additional_fields
                .entry(id)
                .or_default()
                .insert(self.as_name.clone(), Value::Number(value::Number::new(result)));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use value::Number;

    use super::*;

    struct FakeSource(HashMap<(i64, String), Value>, ValueType);

    impl FieldSource for FakeSource {
        fn field_type(&self, field_name: &str) -> Option<ValueType> {
            if field_name == "n" {
                Some(self.1)
            } else {
                None
            }
        }

        fn value_of(&self, object_id: i64, field_name: &str) -> Option<Value> {
            self.0.get(&(object_id, field_name.to_string())).cloned()
        }
    }

    #[test]
    fn max_picks_the_largest_value() {
        let mut values = HashMap::new();
        values.insert((1, "n".to_string()), Value::Number(Number::new(3.0)));
        values.insert((2, "n".to_string()), Value::Number(Number::new(7.0)));
        let source = FakeSource(values, ValueType::Number);

        let call = FunctionCall::new(
            "max",
            HashMap::from([("fieldName".to_string(), serde_json::Value::from("n"))]),
        );
        let f = MinMaxFunction::parse(&call, true).unwrap();
        let mut additional = AdditionalFields::new();
        f.run(&source, &[1, 2], &mut additional).unwrap();
        assert_eq!(additional[&1]["max"], Value::Number(Number::new(7.0)));
    }

    #[test]
    fn rejects_non_numeric_fields() {
        let source = FakeSource(HashMap::new(), ValueType::Text);
        let call = FunctionCall::new(
            "max",
            HashMap::from([("fieldName".to_string(), serde_json::Value::from("n"))]),
        );
        let f = MinMaxFunction::parse(&call, true).unwrap();
        let mut additional = AdditionalFields::new();
        let err = f.run(&source, &[1], &mut additional).unwrap_err();
        assert_eq!(errors::metadata(&err).unwrap().short_msg, "FieldHasUnsupportedTypeForThisFunction");
    }
}
