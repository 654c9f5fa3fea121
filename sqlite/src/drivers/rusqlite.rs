//! Embedded SQLite driver backed by `rusqlite` with the bundled engine.

use hashbrown::HashSet;
use rusqlite::{Connection, params_from_iter};
use serde_json::Value;
use trawl_core::error::{Result, TrawlError};

use crate::catalog::{
    FieldDefinition, INTERNAL_ROW_COLS, JUNCTION_COL_FIRST, JUNCTION_COL_SECOND, Table,
    junction_table_id,
};
use crate::executor::{Row, SchemaSync, SqlExecutor};
use crate::value::SqliteValue;

pub struct RusqliteDriver {
    conn: Connection,
}

impl RusqliteDriver {
    pub fn new(conn: Connection) -> Self {
        RusqliteDriver { conn }
    }

    /// Opens a fresh in-memory engine.
    pub fn open_in_memory() -> Result<Self> {
        Ok(RusqliteDriver {
            conn: Connection::open_in_memory()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl SqlExecutor for RusqliteDriver {
    fn execute(&self, sql: &str, bindings: &[SqliteValue]) -> Result<Vec<Row>> {
        let mut stmt = self.conn.prepare(sql).map_err(map_engine_error)?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| name.to_string())
            .collect();
        let mut rows = stmt
            .query(params_from_iter(bindings.iter()))
            .map_err(map_engine_error)?;
        let mut output = Vec::new();
        while let Some(row) = rows.next()? {
            let mut document = Row::new();
            for (index, column) in columns.iter().enumerate() {
                let value: SqliteValue = row.get(index)?;
                document.insert(column.clone(), Value::from(value));
            }
            output.push(document);
        }
        Ok(output)
    }
}

impl SchemaSync for RusqliteDriver {
    /// Rebuilds the derived SQLite schema from the table definitions.
    ///
    /// Existing tables are left alone, so a resync after drift only fills in
    /// the missing artifacts.
    fn sync_definition(&self, tables: &[Table]) -> Result<()> {
        let mut statements: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        for table in tables {
            statements.push(create_table_sql(table));
            for definition in table.schema.values() {
                if let FieldDefinition::Relationship { table_id, .. } = definition {
                    let junction = junction_table_id(&table.id, table_id);
                    // both ends derive the same junction
                    if seen.insert(junction.clone()) {
                        statements.push(create_junction_sql(&junction));
                    }
                }
            }
        }
        self.conn.execute_batch(&statements.join("\n"))?;
        Ok(())
    }
}

/// The engine reports a missing table as a plain message; recognize the
/// shape so the pipeline can resynchronize instead of failing the call.
fn map_engine_error(err: rusqlite::Error) -> TrawlError {
    if let rusqlite::Error::SqliteFailure(_, Some(message)) = &err
        && let Some(artifact) = message.strip_prefix("no such table: ")
    {
        return TrawlError::SchemaDrift {
            artifact: artifact.to_string(),
        };
    }
    TrawlError::Rusqlite(err)
}

fn create_table_sql(table: &Table) -> String {
    let mut parts = Vec::new();
    for col in INTERNAL_ROW_COLS {
        if col == "_id" {
            parts.push(format!("\t{} TEXT PRIMARY KEY", quote(col)));
        } else {
            parts.push(format!("\t{} TEXT", quote(col)));
        }
    }
    for (name, definition) in &table.schema {
        if let FieldDefinition::Scalar { kind, .. } = definition {
            // bookkeeping names are reserved
            if INTERNAL_ROW_COLS.contains(&name.as_str()) {
                continue;
            }
            parts.push(format!("\t{} {}", quote(name), kind.sqlite_type()));
        }
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n{}\n);",
        quote(&table.id),
        parts.join(",\n")
    )
}

fn create_junction_sql(junction: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n\t{} TEXT,\n\t{} TEXT\n);",
        quote(junction),
        quote(JUNCTION_COL_FIRST),
        quote(JUNCTION_COL_SECOND)
    )
}

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
