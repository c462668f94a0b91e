//! Persistence layer: libSQL-backed storage for processed results.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{DashboardRow, Database, NewResult, StoredResult};
