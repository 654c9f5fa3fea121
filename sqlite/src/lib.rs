//! SQLite row-search implementation for Trawl.
//!
//! This crate turns one declarative search request (filters, sort, page
//! bookmark, relationship expansion) into one parameterized SQLite statement,
//! executes it through a pluggable driver, and re-projects the flat joined
//! rows into nested documents.

pub mod alias;
pub mod catalog;
pub mod compile;
pub mod drivers;
pub mod executor;
pub mod fields;
pub mod filter;
pub mod plan;
pub mod project;
pub mod relationships;
pub mod search;
pub mod value;

pub use alias::TableAliaser;
pub use catalog::{
    Cardinality, CatalogSnapshot, FieldDefinition, MemoryCatalog, ScalarKind, Table, TableCatalog,
};
pub use compile::QueryCompiler;
pub use executor::{Row, SchemaSync, SqlExecutor};
pub use filter::{RangeFilter, SearchFilters};
pub use project::ProcessOptions;
pub use search::{RowSearch, SearchParams, SearchResponse, SortOrder};
pub use value::SqliteValue;

#[cfg(feature = "rusqlite")]
pub use drivers::RusqliteDriver;
