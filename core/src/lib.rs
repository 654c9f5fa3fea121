pub mod error;
pub mod order;
pub mod sql;
pub mod tracing;

// Re-export key types and traits
pub use error::{Result, TrawlError};
pub use order::OrderBy;
pub use sql::{CompiledQuery, Sql, SqlChunk, SqlParam};
