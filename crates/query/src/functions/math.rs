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

/// A whitespace-tokenized arithmetic formula, evaluated strictly
/// left-to-right with no operator precedence: `"1 + 2 * 3"` is `9`, not
/// `7`. Tokens are numeric literals, `+ - * /`, or `$fieldName` references
/// resolved per-object (additional fields first, then the table's own
/// indexed value). Written to `as` (default `"math"`).
pub struct MathFunction {
    pub formula: String,
    pub as_name: String,
}

impl MathFunction {
    pub fn parse(call: &FunctionCall) -> anyhow::Result<Self> {
        Ok(Self {
            formula: call.string_param("formula")?,
            as_name: call.optional_string_param("as", "math"),
        })
    }
}

impl QueryFunction for MathFunction {
    fn run(&self, source: &dyn FieldSource, object_ids: &[i64], additional_fields: &mut AdditionalFields) -> anyhow::Result<()> {
        let tokens: Vec<&str> = self.formula.split_whitespace().collect();

        for &id in object_ids {
            let result = evaluate(&tokens, source, additional_fields, id)?;
            additional_fields
                .entry(id)
                .or_default()
                .insert(self.as_name.clone(), Value::Number(value::Number::new(result)));
        }
        Ok(())
    }
}

fn evaluate(tokens: &[&str], source: &dyn FieldSource, additional_fields: &AdditionalFields, object_id: i64) -> anyhow::Result<f64> {
    let mut tokens = tokens.iter();
    let mut result = operand(tokens.next(), source, additional_fields, object_id)?;

    loop {
        let Some(op) = tokens.next() else {
            break;
        };
        let rhs = operand(tokens.next(), source, additional_fields, object_id)?;
        result = match *op {
            "+" => result + rhs,
            "-" => result - rhs,
            "*" => result * rhs,
            "/" => {
                if rhs == 0.0 {
                    return Err(errors::cannot_divide_by_zero());
                }
                result / rhs
            }
            _ => return Err(errors::could_not_parse_formula()),
        };
    }
    Ok(result)
}

fn operand(
    token: Option<&&str>,
    source: &dyn FieldSource,
    additional_fields: &AdditionalFields,
    object_id: i64,
) -> anyhow::Result<f64> {
    let token = token.ok_or_else(errors::could_not_parse_formula)?;
    if let Some(field_name) = token.strip_prefix('$') {
        if source.field_type(field_name) != Some(ValueType::Number) {
            return Err(errors::field_has_unsupported_type_for_this_function(field_name));
        }
        match resolve_value(source, additional_fields, object_id, field_name) {
            Some(Value::Number(n)) => n.value().ok_or_else(errors::could_not_parse_formula),
            _ => Err(errors::could_not_parse_formula()),
        }
    } else {
        token.parse::<f64>().map_err(|_| errors::could_not_parse_formula())
    }
}
