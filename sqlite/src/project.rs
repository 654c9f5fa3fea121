//! Re-projection of flat joined rows into nested documents.
//!
//! The compiled statement returns one flat row per join combination, keyed
//! `tableId.column` after alias reversal. This pass splits each flat row into
//! a base document and per-table related documents, merges duplicates the
//! join fan-out produced, and nests related documents under their
//! relationship fields.

use hashbrown::{HashMap, HashSet};
use serde_json::Value;
use trawl_core::error::{Result, TrawlError};

use crate::catalog::{Cardinality, CatalogSnapshot, INTERNAL_ROW_COLS, Table};
use crate::executor::Row;
use crate::relationships::Relationship;

/// Output shaping knobs for [`sql_output_processing`].
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    /// Keep relationship fields on the output documents.
    pub preserve_links: bool,
    /// Collapse each related document to its id and display value.
    pub squash: bool,
}

impl Default for ProcessOptions {
    fn default() -> Self {
        ProcessOptions {
            preserve_links: true,
            squash: true,
        }
    }
}

struct DocGroup {
    base: Row,
    /// Related documents per relationship column, in arrival order.
    related: HashMap<String, Vec<Row>>,
    /// Related ids already collected per relationship column.
    seen: HashMap<String, HashSet<String>>,
}

/// Rebuilds nested documents from the engine's flat output.
///
/// Rows sharing a base `_id` merge into one document, keeping first-arrival
/// order. Related documents dedupe by their own `_id` and nest under the
/// relationship field as a single object or an array, following the field's
/// cardinality. Columns absent from the table schema and not bookkeeping are
/// dropped.
pub fn sql_output_processing(
    rows: &[Row],
    table: &Table,
    snapshot: &CatalogSnapshot,
    relationships: &[Relationship],
    opts: &ProcessOptions,
) -> Result<Vec<Row>> {
    let mut ordered: Vec<DocGroup> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for flat in rows {
        let mut base = Row::new();
        let mut by_table: HashMap<&str, Row> = HashMap::new();
        for (key, value) in flat {
            match key.split_once('.') {
                Some((prefix, field)) if prefix == table.id => {
                    base.insert(field.to_string(), value.clone());
                }
                Some((prefix, field))
                    if relationships.iter().any(|rel| rel.table_id == prefix) =>
                {
                    by_table
                        .entry(prefix)
                        .or_default()
                        .insert(field.to_string(), value.clone());
                }
                // junction bookkeeping and unknown qualifiers
                Some(_) => {}
                None => {
                    base.insert(key.clone(), value.clone());
                }
            }
        }

        // a LEFT JOIN miss materializes as an all-NULL related document
        by_table.retain(|_, doc| doc.values().any(|value| !value.is_null()));

        let id = match base.get("_id") {
            Some(Value::String(id)) => id.clone(),
            Some(other) if !other.is_null() => other.to_string(),
            _ => {
                return Err(TrawlError::Mapping(
                    "joined row is missing the base _id".into(),
                ));
            }
        };
        let at = if let Some(&at) = index.get(&id) {
            at
        } else {
            let at = ordered.len();
            index.insert(id, at);
            ordered.push(DocGroup {
                base,
                related: HashMap::new(),
                seen: HashMap::new(),
            });
            at
        };

        let group = &mut ordered[at];
        for relationship in relationships {
            let Some(doc) = by_table.get(relationship.table_id.as_str()) else {
                continue;
            };
            let docs = group.related.entry(relationship.column.clone()).or_default();
            let seen = group.seen.entry(relationship.column.clone()).or_default();
            match doc.get("_id").and_then(Value::as_str) {
                Some(rel_id) => {
                    if seen.insert(rel_id.to_string()) {
                        docs.push(doc.clone());
                    }
                }
                None => docs.push(doc.clone()),
            }
        }
    }

    let mut output = Vec::with_capacity(ordered.len());
    for group in ordered {
        let mut doc = filter_fields(group.base, table);
        if opts.preserve_links {
            let mut related = group.related;
            for relationship in relationships {
                let Some(docs) = related.remove(&relationship.column) else {
                    continue;
                };
                if docs.is_empty() {
                    continue;
                }
                let related_table = snapshot.get(&relationship.table_id).ok_or_else(|| {
                    TrawlError::BrokenRelationship {
                        table: table.id.clone(),
                        field: relationship.column.clone(),
                        target: relationship.table_id.clone(),
                    }
                })?;
                let nested: Vec<Value> = docs
                    .into_iter()
                    .map(|doc| finalize_related(doc, related_table, opts))
                    .collect();
                let value = match relationship.cardinality {
                    Cardinality::One => nested.into_iter().next().unwrap_or(Value::Null),
                    Cardinality::Many => Value::Array(nested),
                };
                doc.insert(relationship.column.clone(), value);
            }
        }
        output.push(doc);
    }
    Ok(output)
}

fn finalize_related(doc: Row, table: &Table, opts: &ProcessOptions) -> Value {
    if opts.squash {
        let mut squashed = Row::new();
        if let Some(id) = doc.get("_id") {
            squashed.insert("_id".to_string(), id.clone());
        }
        if let Some(display) = table.primary_display.as_deref()
            && let Some(value) = doc.get(display)
        {
            squashed.insert("primaryDisplay".to_string(), value.clone());
        }
        Value::Object(squashed)
    } else {
        Value::Object(filter_fields(doc, table))
    }
}

fn filter_fields(doc: Row, table: &Table) -> Row {
    doc.into_iter()
        .filter(|(key, _)| {
            table.schema.contains_key(key) || INTERNAL_ROW_COLS.contains(&key.as_str())
        })
        .collect()
}
