use serde_json::Value as RawValue;

use crate::{
    operator::Operator,
    query_ast::Query,
};

/// A single predicate: `field operator value`. Exactly one of `value`,
/// `all`, or `any` may be set — violating that is `OnlyValueAllOrAny`
/// (checked by [`Self::validate`], called while building a [`Query`]).
#[derive(Debug, Clone, PartialEq)]
pub struct Where {
    pub field: String,
    pub operator: Operator,
    pub value: Option<RawValue>,
    pub all: Option<Vec<RawValue>>,
    pub any: Option<Vec<RawValue>>,
}

impl Where {
    pub fn new(field: impl Into<String>, operator: Operator, value: RawValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value: Some(value),
            all: None,
            any: None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let set_count =
            [self.value.is_some(), self.all.as_ref().is_some_and(|v| !v.is_empty()), self.any.as_ref().is_some_and(|v| !v.is_empty())]
                .into_iter()
                .filter(|present| *present)
                .count();
        if set_count > 1 {
            return Err(errors::only_value_all_or_any());
        }
        Ok(())
    }

    /// True when this predicate needs expansion into an and/or chain
    /// before it can be evaluated directly against an index.
    pub fn needs_expansion(&self) -> bool {
        self.all.as_ref().is_some_and(|v| !v.is_empty()) || self.any.as_ref().is_some_and(|v| !v.is_empty())
    }

    /// Rewrites `all`/`any` into a right-leaning chain of plain,
    /// single-value `where` clauses joined by `and` (for `all`) or `or`
    /// (for `any`) on the same field/operator — matching the spec's
    /// expansion rule exactly. Returns `None` if there is nothing to
    /// expand (plain `value` predicate, or a single-element all/any).
    pub fn expand(&self) -> Option<Query> {
        let (values, join_and) = if let Some(all) = &self.all {
            if all.is_empty() {
                return None;
            }
            (all, true)
        } else if let Some(any) = &self.any {
            if any.is_empty() {
                return None;
            }
            (any, false)
        } else {
            return None;
        };

        let mut iter = values.iter().rev();
        let last = iter.next().expect("non-empty values checked above");
        let mut query = Query::from_where(Where::new(&self.field, self.operator, last.clone()));
        for value in iter {
            let node = Query::from_where(Where::new(&self.field, self.operator, value.clone()));
            query = if join_and { node.with_and(query) } else { node.with_or(query) };
        }
        Some(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_and_all_together_is_rejected() {
        let w = Where {
            field: "n".into(),
            operator: Operator::Equals,
            value: Some(RawValue::from(1)),
            all: Some(vec![RawValue::from(1)]),
            any: None,
        };
        let err = w.validate().unwrap_err();
        assert_eq!(errors::metadata(&err).unwrap().short_msg, "OnlyValueAllOrAny");
    }

    #[test]
    fn all_expands_to_a_right_leaning_and_chain() {
        let w = Where {
            field: "n".into(),
            operator: Operator::Equals,
            value: None,
            all: Some(vec![RawValue::from(1), RawValue::from(2), RawValue::from(3)]),
            any: None,
        };
        let expanded = w.expand().unwrap();
        assert_eq!(expanded.where_.as_ref().unwrap().value, Some(RawValue::from(1)));
        let and = expanded.and.unwrap();
        assert_eq!(and.where_.as_ref().unwrap().value, Some(RawValue::from(2)));
        let and2 = and.and.unwrap();
        assert_eq!(and2.where_.as_ref().unwrap().value, Some(RawValue::from(3)));
        assert!(and2.and.is_none());
    }

    #[test]
    fn any_expands_to_an_or_chain() {
        let w = Where {
            field: "n".into(),
            operator: Operator::Equals,
            value: None,
            all: None,
            any: Some(vec![RawValue::from(1), RawValue::from(2)]),
        };
        let expanded = w.expand().unwrap();
        assert_eq!(expanded.where_.as_ref().unwrap().value, Some(RawValue::from(1)));
        assert_eq!(expanded.or.unwrap().where_.as_ref().unwrap().value, Some(RawValue::from(2)));
    }

    #[test]
    fn plain_value_where_needs_no_expansion() {
        let w = Where::new("n", Operator::Equals, RawValue::from(1));
        assert!(w.expand().is_none());
        assert!(!w.needs_expansion());
    }
}
