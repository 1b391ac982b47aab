//! Persistence layer — document store backends for conversation memory and
//! activity logs.

pub mod libsql_backend;
pub mod memory_backend;
pub mod traits;

pub use libsql_backend::LibSqlStore;
pub use memory_backend::InMemoryStore;
pub use traits::DocumentStore;
