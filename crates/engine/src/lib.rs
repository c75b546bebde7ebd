//! The InfiniteDB engine: the top-level object a transport layer (a
//! WebSocket/HTTP surface, outside this crate's scope) holds one of. Owns
//! every loaded database, starts up asynchronously, and bounds concurrent
//! work through a worker pool.

mod engine;
mod worker_pool;

pub use database::{
    Database,
    EngineConfig,
    Implement,
    Table,
    TableConfig,
    TableOptions,
};
pub use engine::{
    Engine,
    Row,
};
pub use query::{
    FunctionCall,
    Operator,
    Query,
    Sort,
    SortDirection,
    Where,
};
pub use worker_pool::WorkerPool;
