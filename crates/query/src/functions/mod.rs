mod distance;
mod levenshtein;
mod math;
mod min_max;

pub use distance::DistanceFunction;
pub use levenshtein::LevenshteinFunction;
pub use math::MathFunction;
pub use min_max::MinMaxFunction;

use crate::function::{
    FunctionCall,
    QueryFunction,
};

/// Resolves a function call's name against the built-in registry.
/// `"math"` is accepted here even though it is absent from the wire
/// request parser's switch — it is reachable only through this registry,
/// not through the external request surface.
pub fn resolve(call: &FunctionCall) -> anyhow::Result<Box<dyn QueryFunction>> {
    match call.function.as_str() {
        "max" => Ok(Box::new(MinMaxFunction::parse(call, true)?)),
        "min" => Ok(Box::new(MinMaxFunction::parse(call, false)?)),
        "levenshtein" => Ok(Box::new(LevenshteinFunction::parse(call)?)),
        "distance" => Ok(Box::new(DistanceFunction::parse(call)?)),
        "math" => Ok(Box::new(MathFunction::parse(call)?)),
        _ => Err(errors::not_a_valid_function()),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn unknown_function_name_is_rejected() {
        let call = FunctionCall::new("frobnicate", HashMap::new());
        let err = resolve(&call).unwrap_err();
        assert_eq!(errors::metadata(&err).unwrap().short_msg, "NotAValidFunction");
    }
}
