use std::collections::HashMap;

use value::{
    Value,
    ValueType,
};

/// Per-object computed-field overlay a function call produces. Keyed by
/// object id, then by the field name the function wrote (its `as` name or
/// default); consulted before the table's own indexed fields so a function
/// earlier in the chain can feed one later in the chain.
pub type AdditionalFields = HashMap<i64, HashMap<String, Value>>;

/// The capability a `query` function needs from whatever holds the actual
/// field data — a table's [`crate`]-external index set, in practice. Kept
/// as a trait so this crate never depends on table storage internals.
pub trait FieldSource {
    fn field_type(&self, field_name: &str) -> Option<ValueType>;
    fn value_of(&self, object_id: i64, field_name: &str) -> Option<Value>;
}

/// A built-in, additive computation run over the current result set.
/// Implementations read input fields via [`FieldSource`] (falling back to
/// [`AdditionalFields`] written by an earlier function in the chain) and
/// write their result into `additional_fields` under their `as` name.
pub trait QueryFunction {
    fn run(
        &self,
        source: &dyn FieldSource,
        object_ids: &[i64],
        additional_fields: &mut AdditionalFields,
    ) -> anyhow::Result<()>;
}

/// A function invocation as it appears in a query: the function name plus
/// its raw JSON parameters, not yet resolved against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub function: String,
    pub parameters: HashMap<String, serde_json::Value>,
}

impl FunctionCall {
    pub fn new(function: impl Into<String>, parameters: HashMap<String, serde_json::Value>) -> Self {
        Self {
            function: function.into(),
            parameters,
        }
    }

    pub fn string_param(&self, name: &str) -> anyhow::Result<String> {
        self.parameters
            .get(name)
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| errors::is_not_a_string(name))
    }

    pub fn number_param(&self, name: &str) -> anyhow::Result<f64> {
        self.parameters.get(name).and_then(|v| v.as_f64()).ok_or_else(|| errors::is_not_a_number(name))
    }

    pub fn optional_string_param(&self, name: &str, default: impl Into<String>) -> String {
        self.parameters.get(name).and_then(|v| v.as_str()).map(str::to_string).unwrap_or_else(|| default.into())
    }
}

/// Resolves a field's value for a function call: prefer a value an earlier
/// function already computed for this object, otherwise fall back to the
/// table's own indexed data.
pub fn resolve_value(
    source: &dyn FieldSource,
    additional_fields: &AdditionalFields,
    object_id: i64,
    field_name: &str,
) -> Option<Value> {
    if let Some(value) = additional_fields.get(&object_id).and_then(|fields| fields.get(field_name)) {
        return Some(value.clone());
    }
    source.value_of(object_id, field_name)
}
