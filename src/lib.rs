//! # Trawl
//!
//! Declarative row search over embedded SQLite. One search request carries
//! structured filters, a sort, page-number pagination and implicit one-hop
//! relationship expansion; it compiles into a single parameterized SQL
//! statement, and the flat joined results are re-projected into nested
//! documents. When the engine's derived schema has drifted behind the table
//! catalog, the pipeline resynchronizes it and retries once.
//!
//! ## Quick Start
//!
//! ```rust
//! use trawl::prelude::*;
//!
//! # fn main() -> trawl::Result<()> {
//! let mut catalog = MemoryCatalog::new();
//! catalog.insert(
//!     Table::new("ta_inv", "invoices")
//!         .with_field("amount", FieldDefinition::scalar(ScalarKind::Number)),
//! );
//!
//! let engine = RusqliteDriver::open_in_memory()?;
//! engine.sync_definition(&catalog.list_tables()?)?;
//!
//! let search = RowSearch::new(&catalog, &engine);
//! let response = search.search(&SearchParams {
//!     table_id: "ta_inv".into(),
//!     ..Default::default()
//! })?;
//! assert!(response.rows.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Engine Support
//!
//! | Engine | Driver   | Feature Flag | Status |
//! |--------|----------|--------------|--------|
//! | SQLite | rusqlite | `rusqlite`   | ✅     |

/// Result type for search operations
pub use trawl_core::error::Result;

/// Error types
pub mod error {
    pub use trawl_core::error::TrawlError;
}

/// SQL fragment types shared by every component.
///
/// - **Types**: [`Sql`](core::Sql), [`SqlChunk`](core::SqlChunk),
///   [`CompiledQuery`](core::CompiledQuery), [`OrderBy`](core::OrderBy)
/// - **Traits**: [`SqlParam`](core::SqlParam)
pub mod core {
    pub use trawl_core::{CompiledQuery, OrderBy, Sql, SqlChunk, SqlParam};
}

/// SQLite-specific search pipeline, catalog model and drivers.
pub mod sqlite {
    pub use trawl_sqlite::{
        Cardinality, CatalogSnapshot, FieldDefinition, MemoryCatalog, ProcessOptions,
        QueryCompiler, RangeFilter, Row, RowSearch, ScalarKind, SchemaSync, SearchFilters,
        SearchParams, SearchResponse, SortOrder, SqlExecutor, SqliteValue, Table, TableAliaser,
        TableCatalog,
    };

    // Sub-modules for advanced use
    pub use trawl_sqlite::{alias, catalog, compile, fields, filter, plan, project, search};

    #[cfg(feature = "rusqlite")]
    pub mod rusqlite {
        pub use ::rusqlite::Connection;
        pub use trawl_sqlite::drivers::RusqliteDriver;
    }
}

/// One-stop imports for embedders.
pub mod prelude {
    pub use crate::Result;
    pub use trawl_core::error::TrawlError;

    pub use trawl_sqlite::{
        Cardinality, FieldDefinition, MemoryCatalog, ProcessOptions, RangeFilter, Row, RowSearch,
        ScalarKind, SchemaSync, SearchFilters, SearchParams, SearchResponse, SortOrder,
        SqlExecutor, Table, TableCatalog,
    };

    #[cfg(feature = "rusqlite")]
    pub use trawl_sqlite::RusqliteDriver;
}
