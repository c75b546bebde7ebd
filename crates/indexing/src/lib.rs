//! Per-field indexes: the value/exact/sorted triple that backs every
//! `where` predicate a table can evaluate, plus the [`IndexSet`] that maps
//! a table's indexed field names onto one [`Index`] each.

mod exact_index;
mod index;
mod index_set;
mod sorted_index;
mod value_index;

pub use exact_index::ExactIndex;
pub use index::Index;
pub use index_set::IndexSet;
pub use sorted_index::SortedIndex;
pub use value_index::ValueIndex;
