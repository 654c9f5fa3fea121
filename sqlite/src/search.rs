//! The search pipeline: normalize, plan, alias, compile, execute, re-project.
//!
//! One synchronous pipeline per call. All per-call state (snapshot, plan,
//! alias table) is local, so concurrent searches need no coordination. A
//! missing derived schema artifact triggers exactly one definition resync and
//! retry; the retry flag is explicit and never recursive.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use trawl_core::error::{Result, TrawlError};
use trawl_core::order::OrderBy;
use trawl_core::{trawl_trace_heal, trawl_trace_query};

use crate::alias::TableAliaser;
use crate::catalog::{CatalogSnapshot, FieldDefinition, Table, TableCatalog};
use crate::compile::QueryCompiler;
use crate::executor::{Row, SchemaSync, SqlExecutor};
use crate::fields::build_internal_field_list;
use crate::filter::SearchFilters;
use crate::plan::{
    Endpoint, INTERNAL_DATASOURCE, Operation, Paginate, QueryPlan, SortKind, SortSpec,
};
use crate::project::{ProcessOptions, sql_output_processing};
use crate::relationships::build_internal_relationships;

/// Sort direction requested by the caller.
///
/// Anything but an explicit `Ascending` sorts descending, newest-first being
/// the useful default for stored rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One declarative search request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchParams {
    pub table_id: String,
    pub filters: SearchFilters,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    pub paginate: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// 1-based page number. Only numbers paginate; a string bookmark is
    /// rejected before any SQL work.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchResponse {
    pub rows: Vec<Row>,
    /// Next page number, present on paginated calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bookmark: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_next_page: Option<bool>,
}

/// Declarative row search against one catalog and one engine.
pub struct RowSearch<'a, C, E> {
    catalog: &'a C,
    engine: &'a E,
}

impl<'a, C, E> RowSearch<'a, C, E>
where
    C: TableCatalog,
    E: SqlExecutor + SchemaSync,
{
    pub fn new(catalog: &'a C, engine: &'a E) -> Self {
        RowSearch { catalog, engine }
    }

    /// Runs one search call end to end.
    ///
    /// On `SchemaDrift` the engine's derived schema is rebuilt from the
    /// catalog and the call retried once; a second drift is terminal.
    pub fn search(&self, params: &SearchParams) -> Result<SearchResponse> {
        let page = parse_bookmark(params.bookmark.as_ref())?;
        let mut resynced = false;
        loop {
            match self.search_once(params, page) {
                Err(TrawlError::SchemaDrift { artifact }) if !resynced => {
                    trawl_trace_heal!(artifact, 1);
                    let tables = self.catalog.list_tables()?;
                    self.engine.sync_definition(&tables)?;
                    resynced = true;
                }
                other => return other,
            }
        }
    }

    fn search_once(&self, params: &SearchParams, page: usize) -> Result<SearchResponse> {
        let snapshot = CatalogSnapshot::new(self.catalog.list_tables()?);
        let table = snapshot
            .get(&params.table_id)
            .ok_or_else(|| TrawlError::NotFound(format!("table {}", params.table_id)))?;

        let relationships = build_internal_relationships(table, &snapshot)?;
        let fields = build_internal_field_list(table, &snapshot, true)?;
        let filters = params.filters.normalize(&snapshot);
        let sort = match &params.sort {
            Some(field) => Some(sort_spec(field, params.sort_order, table)?),
            None => None,
        };
        let paginate = match (params.paginate, params.limit) {
            // limit 0 cannot page; fall through to the full result set
            (true, Some(limit)) if limit > 0 => Some(Paginate { limit, page }),
            _ => None,
        };

        let plan = QueryPlan {
            endpoint: Endpoint {
                datasource_id: INTERNAL_DATASOURCE.to_string(),
                entity_id: table.id.clone(),
                operation: Operation::Read,
            },
            table: table.clone(),
            tables: snapshot.tables().to_vec(),
            filters,
            relationships: relationships.clone(),
            fields,
            sort,
            paginate,
        };

        let mut aliaser = TableAliaser::new(snapshot.table_ids());
        let compiled = aliaser.compile_with_aliases(&plan, QueryCompiler::compile)?;
        trawl_trace_query!(compiled.sql, compiled.params.len());

        let flat = match self.engine.execute(&compiled.sql, &compiled.params) {
            Ok(rows) => rows,
            Err(err @ TrawlError::SchemaDrift { .. }) => return Err(err),
            Err(err) => {
                return Err(TrawlError::Execution {
                    message: err.to_string(),
                    source: Box::new(err),
                });
            }
        };
        let mut flat = aliaser.reverse(flat);

        // the probe row only signals a next page, it is never returned
        let mut has_next_page = None;
        if let Some(paginate) = plan.paginate {
            has_next_page = Some(flat.len() > paginate.limit);
            flat.truncate(paginate.limit);
        }

        let visible = table.without_hidden_fields();
        let stripped = snapshot.without_hidden_fields();
        let rows = sql_output_processing(
            &flat,
            &visible,
            &stripped,
            &relationships,
            &ProcessOptions::default(),
        )?;

        if plan.paginate.is_some() {
            Ok(SearchResponse {
                rows,
                bookmark: Some((page as u64).saturating_add(1)),
                has_next_page,
            })
        } else {
            Ok(SearchResponse {
                rows,
                bookmark: None,
                has_next_page: None,
            })
        }
    }
}

fn sort_spec(field: &str, order: Option<SortOrder>, table: &Table) -> Result<SortSpec> {
    let definition = table
        .schema
        .get(field)
        .ok_or_else(|| TrawlError::NotFound(format!("sort field {field}")))?;
    let kind = match definition {
        FieldDefinition::Scalar { kind, .. } if kind.is_numeric() => SortKind::Numeric,
        _ => SortKind::Text,
    };
    let order = match order {
        Some(SortOrder::Ascending) => OrderBy::Asc,
        _ => OrderBy::Desc,
    };
    Ok(SortSpec {
        field: field.to_string(),
        order,
        kind,
    })
}

/// Resolves the caller's bookmark to a 1-based page number.
fn parse_bookmark(bookmark: Option<&Value>) -> Result<usize> {
    let Some(bookmark) = bookmark else {
        return Ok(1);
    };
    match bookmark {
        Value::Null => Ok(1),
        Value::Number(number) => match number.as_u64() {
            Some(0) => Ok(1),
            Some(page) => Ok(page as usize),
            None => Err(TrawlError::InvalidPagination(format!(
                "bookmark {number} is not a positive page number"
            ))),
        },
        _ => Err(TrawlError::InvalidPagination(
            "Unable to paginate with string based bookmarks".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Cardinality, FieldDefinition, MemoryCatalog, ScalarKind};
    use crate::value::SqliteValue;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    struct MockEngine {
        rows: Vec<Row>,
        drift_remaining: Cell<usize>,
        executions: Cell<usize>,
        syncs: Cell<usize>,
        last_sql: RefCell<String>,
    }

    impl MockEngine {
        fn new(rows: Vec<Row>) -> Self {
            MockEngine {
                rows,
                drift_remaining: Cell::new(0),
                executions: Cell::new(0),
                syncs: Cell::new(0),
                last_sql: RefCell::new(String::new()),
            }
        }

        fn drifting(rows: Vec<Row>, times: usize) -> Self {
            let engine = Self::new(rows);
            engine.drift_remaining.set(times);
            engine
        }
    }

    impl SqlExecutor for MockEngine {
        fn execute(&self, sql: &str, _bindings: &[SqliteValue]) -> Result<Vec<Row>> {
            self.executions.set(self.executions.get() + 1);
            *self.last_sql.borrow_mut() = sql.to_string();
            if self.drift_remaining.get() > 0 {
                self.drift_remaining.set(self.drift_remaining.get() - 1);
                return Err(TrawlError::SchemaDrift {
                    artifact: "lnk_ta_cus_ta_inv".into(),
                });
            }
            Ok(self.rows.clone())
        }
    }

    impl SchemaSync for MockEngine {
        fn sync_definition(&self, _tables: &[Table]) -> Result<()> {
            self.syncs.set(self.syncs.get() + 1);
            Ok(())
        }
    }

    fn catalog() -> MemoryCatalog {
        let mut catalog = MemoryCatalog::new();
        catalog.insert(
            Table::new("ta_inv", "invoices")
                .with_field("amount", FieldDefinition::scalar(ScalarKind::Number))
                .with_field(
                    "customer",
                    FieldDefinition::relationship("ta_cus", Cardinality::One),
                ),
        );
        catalog.insert(
            Table::new("ta_cus", "customers")
                .with_field("name", FieldDefinition::scalar(ScalarKind::Text))
                .with_primary_display("name"),
        );
        catalog
    }

    fn flat_row(id: &str, amount: i64) -> Row {
        [
            ("ta_inv._id".to_string(), json!(id)),
            ("ta_inv.amount".to_string(), json!(amount)),
            ("ta_cus._id".to_string(), json!("cus1")),
            ("ta_cus.name".to_string(), json!("Acme")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_search_nests_relationships() {
        let catalog = catalog();
        let engine = MockEngine::new(vec![flat_row("inv1", 100)]);
        let response = RowSearch::new(&catalog, &engine)
            .search(&SearchParams {
                table_id: "ta_inv".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(response.rows.len(), 1);
        assert_eq!(
            response.rows[0].get("customer"),
            Some(&json!({"_id": "cus1", "primaryDisplay": "Acme"}))
        );
        assert_eq!(response.bookmark, None);
        assert_eq!(response.has_next_page, None);
    }

    #[test]
    fn test_compiled_sql_qualifies_columns_only_through_aliases() {
        let catalog = catalog();
        let engine = MockEngine::new(Vec::new());
        RowSearch::new(&catalog, &engine)
            .search(&SearchParams {
                table_id: "ta_inv".into(),
                ..Default::default()
            })
            .unwrap();
        let sql = engine.last_sql.borrow();
        // raw ids surface exactly once each, bound to their alias
        assert!(sql.contains(r#"FROM "ta_inv" AS "b""#));
        assert!(sql.contains(r#"LEFT JOIN "lnk_ta_cus_ta_inv" AS "c""#));
        assert!(sql.contains(r#"LEFT JOIN "ta_cus" AS "a""#));
        assert!(!sql.contains(r#""ta_inv"."#));
        assert!(!sql.contains(r#""ta_cus"."#));
    }

    #[test]
    fn test_sort_defaults_to_descending_numeric() {
        let catalog = catalog();
        let engine = MockEngine::new(Vec::new());
        RowSearch::new(&catalog, &engine)
            .search(&SearchParams {
                table_id: "ta_inv".into(),
                sort: Some("amount".into()),
                ..Default::default()
            })
            .unwrap();
        let sql = engine.last_sql.borrow();
        assert!(sql.contains(r#"ORDER BY CAST("b"."amount" AS NUMERIC) DESC"#));
    }

    #[test]
    fn test_explicit_ascending_sort() {
        let catalog = catalog();
        let engine = MockEngine::new(Vec::new());
        RowSearch::new(&catalog, &engine)
            .search(&SearchParams {
                table_id: "ta_inv".into(),
                sort: Some("amount".into()),
                sort_order: Some(SortOrder::Ascending),
                ..Default::default()
            })
            .unwrap();
        assert!(engine.last_sql.borrow().ends_with("ASC"));
    }

    #[test]
    fn test_pagination_truncates_probe_row() {
        let catalog = catalog();
        let engine = MockEngine::new(vec![
            flat_row("inv1", 1),
            flat_row("inv2", 2),
            flat_row("inv3", 3),
        ]);
        let response = RowSearch::new(&catalog, &engine)
            .search(&SearchParams {
                table_id: "ta_inv".into(),
                paginate: true,
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(response.rows.len(), 2);
        assert_eq!(response.has_next_page, Some(true));
        assert_eq!(response.bookmark, Some(2));
        assert!(engine.last_sql.borrow().contains("LIMIT 3 OFFSET 0"));
    }

    #[test]
    fn test_last_page_has_no_next() {
        let catalog = catalog();
        let engine = MockEngine::new(vec![flat_row("inv1", 1)]);
        let response = RowSearch::new(&catalog, &engine)
            .search(&SearchParams {
                table_id: "ta_inv".into(),
                paginate: true,
                limit: Some(2),
                bookmark: Some(json!(3)),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(response.has_next_page, Some(false));
        assert_eq!(response.bookmark, Some(4));
        assert!(engine.last_sql.borrow().contains("LIMIT 3 OFFSET 4"));
    }

    #[test]
    fn test_string_bookmark_never_reaches_engine() {
        let catalog = catalog();
        let engine = MockEngine::new(Vec::new());
        let result = RowSearch::new(&catalog, &engine).search(&SearchParams {
            table_id: "ta_inv".into(),
            paginate: true,
            limit: Some(10),
            bookmark: Some(json!("abc")),
            ..Default::default()
        });
        assert!(matches!(result, Err(TrawlError::InvalidPagination(_))));
        assert_eq!(engine.executions.get(), 0);
    }

    #[test]
    fn test_parse_bookmark_edge_cases() {
        assert_eq!(parse_bookmark(None).unwrap(), 1);
        assert_eq!(parse_bookmark(Some(&json!(null))).unwrap(), 1);
        assert_eq!(parse_bookmark(Some(&json!(0))).unwrap(), 1);
        assert_eq!(parse_bookmark(Some(&json!(3))).unwrap(), 3);
        assert!(parse_bookmark(Some(&json!(-1))).is_err());
        assert!(parse_bookmark(Some(&json!(2.5))).is_err());
        assert!(parse_bookmark(Some(&json!(["nested"]))).is_err());
    }

    #[test]
    fn test_schema_drift_resyncs_once_then_succeeds() {
        let catalog = catalog();
        let engine = MockEngine::drifting(vec![flat_row("inv1", 1)], 1);
        let response = RowSearch::new(&catalog, &engine)
            .search(&SearchParams {
                table_id: "ta_inv".into(),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(response.rows.len(), 1);
        assert_eq!(engine.executions.get(), 2);
        assert_eq!(engine.syncs.get(), 1);
    }

    #[test]
    fn test_second_drift_is_terminal() {
        let catalog = catalog();
        let engine = MockEngine::drifting(Vec::new(), 2);
        let result = RowSearch::new(&catalog, &engine).search(&SearchParams {
            table_id: "ta_inv".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(TrawlError::SchemaDrift { .. })));
        assert_eq!(engine.executions.get(), 2);
        assert_eq!(engine.syncs.get(), 1);
    }

    #[test]
    fn test_missing_table_is_not_found() {
        let catalog = catalog();
        let engine = MockEngine::new(Vec::new());
        let result = RowSearch::new(&catalog, &engine).search(&SearchParams {
            table_id: "ta_zzz".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(TrawlError::NotFound(_))));
        assert_eq!(engine.executions.get(), 0);
    }

    #[test]
    fn test_params_deserialize_camel_case() {
        let params: SearchParams = serde_json::from_value(json!({
            "tableId": "ta_inv",
            "paginate": true,
            "limit": 25,
            "sortOrder": "descending",
            "filters": {"equal": {"amount": 100}}
        }))
        .unwrap();
        assert_eq!(params.table_id, "ta_inv");
        assert_eq!(params.sort_order, Some(SortOrder::Descending));
        assert_eq!(params.filters.equal.get("amount"), Some(&json!(100)));
    }
}
