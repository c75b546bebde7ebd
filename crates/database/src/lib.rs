//! Table and database lifecycle: schema, per-field indexes, the
//! insert/update/remove/query/sort pipeline, and cross-table joins.
//!
//! The `engine` crate builds on top of this to add the top-level
//! multi-database surface, startup loading, and the bounded worker pool.

mod config;
mod database;
mod table;
mod table_config;
mod validate;

pub use config::EngineConfig;
pub use database::{
    Database,
    Implement,
};
pub use table::Table;
pub use table_config::{
    TableConfig,
    TableOptions,
};
pub use validate::validate_name;
