//! The where/and/or/functions query AST: parsing-free types a caller
//! builds directly (the HTTP layer owns wire decoding), the built-in
//! function registry, and the [`FieldSource`] contract a table implements
//! so functions can read field data without this crate depending on
//! table storage internals.

mod function;
mod functions;
mod operator;
mod query_ast;
mod sort;
mod where_clause;

pub use function::{
    resolve_value,
    AdditionalFields,
    FieldSource,
    FunctionCall,
    QueryFunction,
};
pub use functions::resolve as resolve_function;
pub use operator::Operator;
pub use query_ast::Query;
pub use sort::{
    Sort,
    SortDirection,
};
pub use where_clause::Where;
