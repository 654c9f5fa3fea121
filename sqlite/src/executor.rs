//! Traits decoupling the search pipeline from the storage engine.

use serde_json::Value;
use trawl_core::error::Result;

use crate::catalog::Table;
use crate::value::SqliteValue;

/// A flat engine row or a projected document.
pub type Row = serde_json::Map<String, Value>;

/// Raw statement execution against the embedded engine.
pub trait SqlExecutor {
    /// Runs one statement and returns its rows.
    ///
    /// A missing internal schema artifact must surface as
    /// `TrawlError::SchemaDrift` naming the artifact, so the search pipeline
    /// can resynchronize and retry; any other engine failure is terminal.
    fn execute(&self, sql: &str, bindings: &[SqliteValue]) -> Result<Vec<Row>>;
}

/// Rebuilds the derived schema artifact from the authoritative table
/// definitions.
pub trait SchemaSync {
    fn sync_definition(&self, tables: &[Table]) -> Result<()>;
}
