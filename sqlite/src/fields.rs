//! Expansion of a table schema into the flat, fully-qualified column list a
//! search selects.

use trawl_core::error::{Result, TrawlError};

use crate::catalog::{CatalogSnapshot, FieldDefinition, INTERNAL_ROW_COLS, Table};

/// Builds the ordered `"<tableId>.<column>"` output list for one table.
///
/// The six internal bookkeeping columns always come first. Relationship
/// fields expand the target table's own list exactly one hop deep: the
/// recursive call passes `relationships = false`, so a related table's
/// relationship fields never contribute columns, no matter how deep the
/// underlying graph goes.
pub fn build_internal_field_list(
    table: &Table,
    snapshot: &CatalogSnapshot,
    relationships: bool,
) -> Result<Vec<String>> {
    let mut fields: Vec<String> = INTERNAL_ROW_COLS
        .iter()
        .map(|col| format!("{}.{col}", table.id))
        .collect();

    for (name, definition) in &table.schema {
        match definition {
            FieldDefinition::Relationship { table_id, .. } => {
                if !relationships {
                    continue;
                }
                let related =
                    snapshot
                        .get(table_id)
                        .ok_or_else(|| TrawlError::BrokenRelationship {
                            table: table.id.clone(),
                            field: name.clone(),
                            target: table_id.clone(),
                        })?;
                fields.extend(build_internal_field_list(related, snapshot, false)?);
            }
            FieldDefinition::Scalar { .. } => {
                fields.push(format!("{}.{name}", table.id));
            }
        }
    }
    Ok(fields)
}
