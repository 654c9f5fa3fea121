//! Compilation of a [`QueryPlan`] into one parameterized SQLite statement.
//!
//! The compiler receives the plan after aliasing, so every column qualifier
//! it renders is a safe short alias; FROM and JOIN bind each alias to the
//! relation's real id. It emits exactly the joins the relationship graph
//! declares, and every user-supplied literal flows through the binding list.

use serde_json::Value;
use trawl_core::error::{Result, TrawlError};
use trawl_core::sql::{CompiledQuery, Sql};

use crate::filter::SearchFilters;
use crate::plan::{QueryPlan, SortKind};
use crate::relationships::Relationship;
use crate::value::SqliteValue;

type Fragment = Sql<SqliteValue>;

pub struct QueryCompiler;

impl QueryCompiler {
    pub fn compile(plan: &QueryPlan) -> Result<CompiledQuery<SqliteValue>> {
        let mut clauses: Vec<Fragment> = Vec::new();

        clauses.push(Sql::raw("SELECT").append(select_list(&plan.fields)));
        clauses.push(Sql::raw("FROM").append(relation_ref(
            resolve_relation_id(plan, &plan.endpoint.entity_id),
            &plan.endpoint.entity_id,
        )));

        for relationship in &plan.relationships {
            let (junction, related) = join_clauses(plan, relationship);
            clauses.push(junction);
            clauses.push(related);
        }

        let predicate = compile_filters(&plan.filters, plan);
        if !predicate.chunks.is_empty() {
            clauses.push(Sql::raw("WHERE").append(predicate));
        }

        if let Some(sort) = &plan.sort {
            let column = Sql::column(&plan.table.name, &sort.field);
            let expr = match sort.kind {
                SortKind::Numeric => Sql::raw("CAST(").append(column).append_raw(" AS NUMERIC)"),
                SortKind::Text => column,
            };
            clauses.push(Sql::raw("ORDER BY").append(sort.order.append_to(expr)));
        }

        if let Some(paginate) = &plan.paginate {
            // one extra row probes for the next page
            clauses.push(Sql::raw(format!("LIMIT {}", paginate.fetch())));
            clauses.push(Sql::raw(format!("OFFSET {}", paginate.offset())));
        }

        let compiled = Sql::join(clauses, " ").compile();
        if statement_count(&compiled.sql) > 1 {
            return Err(TrawlError::UnsupportedQueryShape(
                "cannot execute multiple statements in one search".into(),
            ));
        }
        Ok(compiled)
    }
}

/// Every column is re-aliased to its dotted field key, so the engine reports
/// result columns as `alias.column` instead of the bare column name.
fn select_list(fields: &[String]) -> Fragment {
    let columns = fields.iter().map(|field| match field.split_once('.') {
        Some((table, column)) => Sql::column(table, column)
            .append(Sql::raw("AS"))
            .append(Sql::ident(field)),
        None => Sql::ident(field),
    });
    Sql::join(columns, ", ")
}

fn join_clauses(plan: &QueryPlan, relationship: &Relationship) -> (Fragment, Fragment) {
    let junction = Sql::raw("LEFT JOIN")
        .append(relation_ref(
            resolve_relation_id(plan, &relationship.through),
            &relationship.through,
        ))
        .append_raw(" ON ")
        .append(Sql::column(&plan.table.name, &relationship.from_primary))
        .append_raw("=")
        .append(Sql::column(&relationship.through, &relationship.from));
    let related = Sql::raw("LEFT JOIN")
        .append(relation_ref(
            resolve_relation_id(plan, &relationship.table_id),
            &relationship.table_id,
        ))
        .append_raw(" ON ")
        .append(Sql::column(&relationship.through, &relationship.to))
        .append_raw("=")
        .append(Sql::column(&relationship.table_id, &relationship.to_primary));
    (junction, related)
}

/// `"real" AS "alias"`, or the bare name when the relation runs under its
/// own id.
fn relation_ref(id: &str, alias: &str) -> Fragment {
    if id == alias {
        Sql::ident(id)
    } else {
        Sql::ident(id).append(Sql::raw("AS")).append(Sql::ident(alias))
    }
}

/// Real relation id behind an alias, looked up in the plan's table list.
fn resolve_relation_id<'a>(plan: &'a QueryPlan, alias: &'a str) -> &'a str {
    plan.tables
        .iter()
        .find(|table| table.name == alias)
        .map(|table| table.id.as_str())
        .unwrap_or(alias)
}

fn compile_filters(filters: &SearchFilters, plan: &QueryPlan) -> Fragment {
    let mut predicates: Vec<Fragment> = Vec::new();

    for (key, value) in &filters.equal {
        predicates.push(
            column_ref(key, plan)
                .append_raw("=")
                .append(Sql::parameter(SqliteValue::from(value))),
        );
    }
    for (key, value) in &filters.not_equal {
        predicates.push(
            column_ref(key, plan)
                .append_raw("<>")
                .append(Sql::parameter(SqliteValue::from(value))),
        );
    }
    for (key, value) in &filters.string {
        let pattern = format!("{}%", text_of(value));
        predicates.push(
            column_ref(key, plan)
                .append(Sql::raw("LIKE"))
                .append(Sql::parameter(SqliteValue::Text(pattern))),
        );
    }
    for (key, value) in &filters.fuzzy {
        let pattern = format!("%{}%", text_of(value));
        predicates.push(
            column_ref(key, plan)
                .append(Sql::raw("LIKE"))
                .append(Sql::parameter(SqliteValue::Text(pattern))),
        );
    }
    for (key, range) in &filters.range {
        if let Some(low) = &range.low {
            predicates.push(
                column_ref(key, plan)
                    .append_raw(">=")
                    .append(Sql::parameter(SqliteValue::from(low))),
            );
        }
        if let Some(high) = &range.high {
            predicates.push(
                column_ref(key, plan)
                    .append_raw("<=")
                    .append(Sql::parameter(SqliteValue::from(high))),
            );
        }
    }
    for (key, values) in &filters.one_of {
        if values.is_empty() {
            // nothing matches an empty set
            predicates.push(Sql::raw("1 = 0"));
            continue;
        }
        predicates.push(
            column_ref(key, plan)
                .append_raw("IN (")
                .append(Sql::parameters(values.iter().map(SqliteValue::from)))
                .append_raw(")"),
        );
    }
    for (key, values) in &filters.contains {
        let members: Vec<Fragment> = values
            .iter()
            .map(|value| {
                Sql::raw("EXISTS (SELECT 1 FROM json_each(")
                    .append(column_ref(key, plan))
                    .append_raw(") WHERE value")
                    .append_raw("=")
                    .append(Sql::parameter(SqliteValue::from(value)))
                    .append_raw(")")
            })
            .collect();
        if !members.is_empty() {
            predicates.push(and(members));
        }
    }
    for key in filters.empty.keys() {
        let column = column_ref(key, plan);
        predicates.push(
            Sql::raw("(")
                .append(column.clone())
                .append(Sql::raw("IS NULL OR"))
                .append(column)
                .append_raw("= '')"),
        );
    }
    for key in filters.not_empty.keys() {
        let column = column_ref(key, plan);
        predicates.push(
            Sql::raw("(")
                .append(column.clone())
                .append(Sql::raw("IS NOT NULL AND"))
                .append(column)
                .append_raw("!= '')"),
        );
    }

    if filters.all_or {
        or(predicates)
    } else {
        and(predicates)
    }
}

/// Resolves a filter key to a qualified column. Keys may carry a leading `:`
/// from relationship qualification; the qualifier is matched against the
/// plan's table names and unqualified keys land on the base table.
fn column_ref(key: &str, plan: &QueryPlan) -> Fragment {
    let key = key.strip_prefix(':').unwrap_or(key);
    if let Some((prefix, rest)) = key.split_once('.')
        && plan.tables.iter().any(|table| table.name == prefix)
    {
        return Sql::column(prefix, rest);
    }
    Sql::column(&plan.table.name, key)
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn and(conditions: Vec<Fragment>) -> Fragment {
    combine(conditions, "AND")
}

fn or(conditions: Vec<Fragment>) -> Fragment {
    combine(conditions, "OR")
}

fn combine(conditions: Vec<Fragment>, separator: &'static str) -> Fragment {
    let mut iter = conditions.into_iter();
    match iter.next() {
        None => Sql::empty(),
        Some(first) => {
            let Some(second) = iter.next() else {
                return first;
            };
            let all = std::iter::once(first)
                .chain(std::iter::once(second))
                .chain(iter);
            Sql::raw("(").append(Sql::join(all, separator)).append_raw(")")
        }
    }
}

/// Counts statements in rendered SQL. Semicolons inside quoted strings or
/// identifiers do not split statements; a trailing semicolon does not start
/// an empty one.
fn statement_count(sql: &str) -> usize {
    let mut statements = 1;
    let mut in_single = false;
    let mut in_double = false;
    for (index, ch) in sql.char_indices() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            ';' if !in_single && !in_double => {
                if !sql[index + 1..].trim().is_empty() {
                    statements += 1;
                }
            }
            _ => {}
        }
    }
    statements
}
