//! Logical table catalog: definitions, snapshots and the junction scheme.
//!
//! Tables are documents in an external store; this module only models the
//! read-only view a search call needs. A [`CatalogSnapshot`] renames every
//! table to its stable id before any SQL work, because human names collide
//! with engine reserved words and are not unique.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use trawl_core::error::{Result, TrawlError};

/// Internal bookkeeping columns present on every stored row, in output order.
pub const INTERNAL_ROW_COLS: [&str; 6] =
    ["_id", "_rev", "type", "createdAt", "updatedAt", "tableId"];

/// Junction column holding the row id of the lexicographically smaller table.
/// The dot is part of the column name, not a qualifier.
pub const JUNCTION_COL_FIRST: &str = "doc1.rowId";
/// Junction column holding the row id of the lexicographically larger table.
pub const JUNCTION_COL_SECOND: &str = "doc2.rowId";

/// Derives the junction table id for a pair of related tables.
///
/// Ids are ordered lexicographically so both sides derive the same name.
pub fn junction_table_id(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("lnk_{first}_{second}")
}

/// Scalar column kinds the engine can store and filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ScalarKind {
    Text,
    Number,
    Boolean,
    Datetime,
    Options,
    Json,
}

impl ScalarKind {
    /// Numeric kinds sort with numeric comparison instead of lexicographic.
    pub fn is_numeric(self) -> bool {
        matches!(self, ScalarKind::Number)
    }

    /// SQLite column type used when materializing the derived schema artifact.
    pub(crate) fn sqlite_type(self) -> &'static str {
        match self {
            ScalarKind::Number => "REAL",
            ScalarKind::Boolean => "NUMERIC",
            ScalarKind::Text | ScalarKind::Datetime | ScalarKind::Options | ScalarKind::Json => {
                "TEXT"
            }
        }
    }
}

/// How many related rows a relationship field can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    One,
    Many,
}

/// A field in a table schema: a stored scalar column or a link to another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldDefinition {
    #[serde(rename_all = "camelCase")]
    Scalar {
        kind: ScalarKind,
        #[serde(default = "default_visible")]
        visible: bool,
    },
    #[serde(rename_all = "camelCase")]
    Relationship {
        table_id: String,
        cardinality: Cardinality,
    },
}

fn default_visible() -> bool {
    true
}

impl FieldDefinition {
    pub fn scalar(kind: ScalarKind) -> Self {
        FieldDefinition::Scalar {
            kind,
            visible: true,
        }
    }

    pub fn hidden(kind: ScalarKind) -> Self {
        FieldDefinition::Scalar {
            kind,
            visible: false,
        }
    }

    pub fn relationship(table_id: impl Into<String>, cardinality: Cardinality) -> Self {
        FieldDefinition::Relationship {
            table_id: table_id.into(),
            cardinality,
        }
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self, FieldDefinition::Relationship { .. })
    }
}

/// A logical table definition.
///
/// The schema map is ordered so field iteration, and therefore compiled
/// column order, is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_display: Option<String>,
    #[serde(default)]
    pub schema: BTreeMap<String, FieldDefinition>,
}

impl Table {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Table {
            id: id.into(),
            name: name.into(),
            original_name: None,
            primary_display: None,
            schema: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, name: impl Into<String>, definition: FieldDefinition) -> Self {
        self.schema.insert(name.into(), definition);
        self
    }

    pub fn with_primary_display(mut self, field: impl Into<String>) -> Self {
        self.primary_display = Some(field.into());
        self
    }

    /// Copy of this table with `visible: false` scalar fields removed.
    pub fn without_hidden_fields(&self) -> Table {
        let mut table = self.clone();
        table.schema.retain(|_, definition| {
            !matches!(
                definition,
                FieldDefinition::Scalar { visible: false, .. }
            )
        });
        table
    }
}

/// Read-only source of table definitions for one workspace.
pub trait TableCatalog {
    fn list_tables(&self) -> Result<Vec<Table>>;
    fn get_table(&self, id: &str) -> Result<Table>;
}

/// In-memory catalog for embedders and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    tables: HashMap<String, Table>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.id.clone(), table);
    }
}

impl TableCatalog for MemoryCatalog {
    /// Ordered by id so downstream alias assignment is deterministic.
    fn list_tables(&self) -> Result<Vec<Table>> {
        let mut tables: Vec<Table> = self.tables.values().cloned().collect();
        tables.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tables)
    }

    fn get_table(&self, id: &str) -> Result<Table> {
        self.tables
            .get(id)
            .cloned()
            .ok_or_else(|| TrawlError::NotFound(format!("table {id}")))
    }
}

/// Per-call working copy of the catalog with the rename invariant applied:
/// `name` holds the stable id and the human name moves to `original_name`.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    tables: Vec<Table>,
    by_id: HashMap<String, usize>,
}

impl CatalogSnapshot {
    pub fn new(tables: Vec<Table>) -> Self {
        let mut renamed = tables;
        for table in &mut renamed {
            // never query by human name
            table.original_name = Some(std::mem::replace(&mut table.name, table.id.clone()));
        }
        let by_id = renamed
            .iter()
            .enumerate()
            .map(|(index, table)| (table.id.clone(), index))
            .collect();
        CatalogSnapshot {
            tables: renamed,
            by_id,
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }

    pub fn get(&self, id: &str) -> Option<&Table> {
        self.by_id.get(id).map(|&index| &self.tables[index])
    }

    /// Table ids participating in this snapshot, in catalog order.
    pub fn table_ids(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|table| table.id.as_str())
    }

    /// Copy of the snapshot with hidden fields stripped from every table.
    pub fn without_hidden_fields(&self) -> CatalogSnapshot {
        let mut snapshot = self.clone();
        for table in &mut snapshot.tables {
            *table = table.without_hidden_fields();
        }
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_renames_tables_to_ids() {
        let snapshot = CatalogSnapshot::new(vec![Table::new("ta_aaa", "invoices")]);
        let table = snapshot.get("ta_aaa").unwrap();
        assert_eq!(table.name, "ta_aaa");
        assert_eq!(table.original_name.as_deref(), Some("invoices"));
    }

    #[test]
    fn test_junction_id_orders_lexicographically() {
        assert_eq!(junction_table_id("ta_bbb", "ta_aaa"), "lnk_ta_aaa_ta_bbb");
        assert_eq!(junction_table_id("ta_aaa", "ta_bbb"), "lnk_ta_aaa_ta_bbb");
    }

    #[test]
    fn test_memory_catalog_lists_in_id_order() {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(Table::new("ta_bbb", "two"));
        catalog.insert(Table::new("ta_aaa", "one"));
        let ids: Vec<String> = catalog
            .list_tables()
            .unwrap()
            .into_iter()
            .map(|t| t.id)
            .collect();
        assert_eq!(ids, vec!["ta_aaa", "ta_bbb"]);
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let catalog = MemoryCatalog::new();
        assert!(matches!(
            catalog.get_table("ta_zzz"),
            Err(TrawlError::NotFound(_))
        ));
    }

    #[test]
    fn test_without_hidden_fields_drops_invisible_scalars() {
        let table = Table::new("ta_aaa", "invoices")
            .with_field("amount", FieldDefinition::scalar(ScalarKind::Number))
            .with_field("secret", FieldDefinition::hidden(ScalarKind::Text));
        let stripped = table.without_hidden_fields();
        assert!(stripped.schema.contains_key("amount"));
        assert!(!stripped.schema.contains_key("secret"));
    }
}
