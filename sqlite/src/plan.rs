//! Intermediate representation handed from the search pipeline to the
//! aliaser and compiler. Built fresh per call, never cached.

use trawl_core::order::OrderBy;

use crate::catalog::Table;
use crate::filter::SearchFilters;
use crate::relationships::Relationship;

/// Datasource tag for the embedded engine; searches always query ourselves.
pub const INTERNAL_DATASOURCE: &str = "internal";

/// Operation kind carried on the endpoint. Search only ever reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
}

/// Where the compiled statement is aimed.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
    pub datasource_id: String,
    /// Base table id; rewritten to its alias before compilation.
    pub entity_id: String,
    pub operation: Operation,
}

/// Comparison mode for ORDER BY, chosen from the sort field's scalar kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKind {
    Numeric,
    Text,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortSpec {
    pub field: String,
    pub order: OrderBy,
    pub kind: SortKind,
}

/// Page-number pagination. `limit` is the caller's page size; the compiler
/// requests one extra row as the next-page probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginate {
    pub limit: usize,
    /// 1-based page number.
    pub page: usize,
}

/// Largest literal SQLite accepts in LIMIT/OFFSET position.
const MAX_SQLITE_INT: usize = i64::MAX as usize;

impl Paginate {
    /// Rows to skip. Saturates within SQLite's integer range, so an absurd
    /// page number selects an empty far-off window instead of overflowing.
    pub fn offset(&self) -> usize {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.limit)
            .min(MAX_SQLITE_INT)
    }

    /// Rows to request: the page size plus one next-page probe row.
    pub fn fetch(&self) -> usize {
        self.limit.saturating_add(1).min(MAX_SQLITE_INT)
    }
}


/// Everything the compiler needs for one statement.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    pub endpoint: Endpoint,
    /// Base table, snapshot-renamed.
    pub table: Table,
    /// Relations the statement may reference: the catalog snapshot, plus the
    /// junction tables once the plan is aliased.
    pub tables: Vec<Table>,
    pub filters: SearchFilters,
    pub relationships: Vec<Relationship>,
    /// Ordered qualified output columns (`table.column`).
    pub fields: Vec<String>,
    pub sort: Option<SortSpec>,
    pub paginate: Option<Paginate>,
}
