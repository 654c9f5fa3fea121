//! Join graph derivation for one search call.
//!
//! Every relationship between two tables is stored through a junction table
//! (see [`crate::catalog::junction_table_id`]) whose two columns carry a dot
//! inside the column name itself. Which side of the junction a table joins
//! through is fixed by lexicographic id order, so both ends of a relationship
//! derive the same wiring independently.

use trawl_core::error::{Result, TrawlError};

use crate::catalog::{
    CatalogSnapshot, FieldDefinition, JUNCTION_COL_FIRST, JUNCTION_COL_SECOND, Table,
    junction_table_id,
};

/// One edge of the join graph: base table to a directly related table.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    /// Related table id.
    pub table_id: String,
    /// Relationship field name on the base table; related documents nest here.
    pub column: String,
    /// Junction table id.
    pub through: String,
    /// Junction column joined against the base table's primary key.
    pub from: String,
    /// Junction column joined against the related table's primary key.
    pub to: String,
    pub from_primary: String,
    pub to_primary: String,
    pub cardinality: crate::catalog::Cardinality,
}

/// Derives one [`Relationship`] per relationship field of the base table.
///
/// The compiler emits exactly the joins this graph declares and no others.
/// A target id missing from the snapshot is a catalog defect and aborts the
/// search.
pub fn build_internal_relationships(
    table: &Table,
    snapshot: &CatalogSnapshot,
) -> Result<Vec<Relationship>> {
    let mut relationships = Vec::new();
    for (name, definition) in &table.schema {
        let FieldDefinition::Relationship {
            table_id,
            cardinality,
        } = definition
        else {
            continue;
        };
        let related = snapshot
            .get(table_id)
            .ok_or_else(|| TrawlError::BrokenRelationship {
                table: table.id.clone(),
                field: name.clone(),
                target: table_id.clone(),
            })?;

        let (from, to) = if table.id <= related.id {
            (JUNCTION_COL_FIRST, JUNCTION_COL_SECOND)
        } else {
            (JUNCTION_COL_SECOND, JUNCTION_COL_FIRST)
        };
        relationships.push(Relationship {
            table_id: related.id.clone(),
            column: name.clone(),
            through: junction_table_id(&table.id, &related.id),
            from: from.to_string(),
            to: to.to_string(),
            from_primary: "_id".to_string(),
            to_primary: "_id".to_string(),
            cardinality: *cardinality,
        });
    }
    Ok(relationships)
}
