use crate::{
    function::FunctionCall,
    where_clause::Where,
};

/// A node in the recursive where/functions/and/or query tree.
///
/// Evaluation order at each node is: resolve `where` (expanding `all`/`any`
/// first if present) into a set of object ids, run `functions` over the
/// result, then recurse into `and` (narrowing the result further) or `or`
/// (unioning in an independently-evaluated branch). `and` and `or` are
/// mutually exclusive on the same node — `CannotHaveAndAndOrInOneQuery`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub where_: Option<Where>,
    pub functions: Vec<FunctionCall>,
    pub and: Option<Box<Query>>,
    pub or: Option<Box<Query>>,
}

impl Query {
    pub fn from_where(where_: Where) -> Self {
        Self {
            where_: Some(where_),
            functions: Vec::new(),
            and: None,
            or: None,
        }
    }

    pub fn with_and(mut self, and: Query) -> Self {
        self.and = Some(Box::new(and));
        self
    }

    pub fn with_or(mut self, or: Query) -> Self {
        self.or = Some(Box::new(or));
        self
    }

    /// Checks the structural invariants that hold at every node: `and`/`or`
    /// are mutually exclusive, and a present `where` must itself be valid.
    /// Does not recurse — callers walk the tree and validate each node.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.and.is_some() && self.or.is_some() {
            return Err(errors::cannot_have_and_and_or_in_one_query());
        }
        if let Some(where_) = &self.where_ {
            where_.validate()?;
        }
        Ok(())
    }

    pub fn validate_tree(&self) -> anyhow::Result<()> {
        self.validate()?;
        if let Some(and) = &self.and {
            and.validate_tree()?;
        }
        if let Some(or) = &self.or {
            or.validate_tree()?;
        }
        Ok(())
    }
}
