use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrawlError {
    /// A table or field named by the request does not exist in the catalog
    #[error("Not found: {0}")]
    NotFound(String),

    /// A relationship field points at a table that is absent from the catalog
    #[error("Broken relationship {table}.{field}: missing table {target}")]
    BrokenRelationship {
        table: String,
        field: String,
        target: String,
    },

    /// The request asked for something the compiler refuses to express
    #[error("Unsupported query shape: {0}")]
    UnsupportedQueryShape(String),

    /// Pagination input the caller must correct before retrying
    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),

    /// A derived schema artifact is missing from the engine; recoverable by resync
    #[error("Missing schema artifact: {artifact}")]
    SchemaDrift { artifact: String },

    /// Error executing a statement against the engine
    #[error("Unable to search by SQL - {message}")]
    Execution {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error mapping data
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Rusqlite specific errors
    #[cfg(feature = "rusqlite")]
    #[error("Rusqlite error: {0}")]
    Rusqlite(#[from] rusqlite::Error),
}

impl TrawlError {
    /// True for failures a definition resync may repair.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TrawlError::SchemaDrift { .. })
    }
}

/// Result type for search operations
pub type Result<T> = std::result::Result<T, TrawlError>;
