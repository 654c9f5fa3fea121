//! Collision-safe identifier aliasing.
//!
//! Raw table ids are document ids: they can contain dots, dashes or reserved
//! words, none of which survive the engine's identifier rules unescaped. The
//! aliaser substitutes short deterministic aliases before compilation and
//! reverses them on the result rows. A raw id appears in the compiled SQL
//! exactly once, quoted and bound to its alias in FROM or JOIN position;
//! every column qualifier goes through the alias.

use std::collections::BTreeMap;

use compact_str::CompactString;
use hashbrown::HashMap;
use trawl_core::error::Result;
use trawl_core::sql::CompiledQuery;

use crate::catalog::Table;
use crate::executor::Row;
use crate::filter::SearchFilters;
use crate::plan::QueryPlan;
use crate::value::SqliteValue;

/// Per-call alias table. Catalog tables are assigned eagerly in catalog
/// order; junction tables pick up aliases lazily while the plan is rewritten.
#[derive(Debug)]
pub struct TableAliaser {
    aliases: HashMap<String, CompactString>,
    reversed: HashMap<CompactString, String>,
    /// Known names, longest first, for prefix matching in `alias_field`.
    by_len: Vec<String>,
    next: usize,
}

impl TableAliaser {
    pub fn new<I, S>(table_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut aliaser = TableAliaser {
            aliases: HashMap::new(),
            reversed: HashMap::new(),
            by_len: Vec::new(),
            next: 0,
        };
        for name in table_names {
            let name = name.into();
            aliaser.get_or_assign(&name);
        }
        aliaser
    }

    /// Alias already assigned to a table name, if any.
    pub fn alias_of(&self, table_name: &str) -> Option<&str> {
        self.aliases.get(table_name).map(|alias| alias.as_str())
    }

    fn get_or_assign(&mut self, name: &str) -> CompactString {
        if let Some(alias) = self.aliases.get(name) {
            return alias.clone();
        }
        let alias = alias_for_index(self.next);
        self.next += 1;
        self.aliases.insert(name.to_string(), alias.clone());
        self.reversed.insert(alias.clone(), name.to_string());
        self.by_len.push(name.to_string());
        self.by_len.sort_by(|a, b| b.len().cmp(&a.len()));
        alias
    }

    /// Rewrites the table qualifier of a `table.column` reference to its
    /// alias. The longest known table name contained in the qualifier wins,
    /// and only the name itself is replaced, so decorations like a leading
    /// `:` and dotted column remainders survive. Unknown qualifiers and
    /// plain field names pass through untouched.
    pub fn alias_field(&self, field: &str) -> String {
        let Some((prefix, _)) = field.split_once('.') else {
            return field.to_string();
        };
        for name in &self.by_len {
            if prefix.contains(name.as_str())
                && let Some(alias) = self.aliases.get(name)
            {
                return field.replacen(name.as_str(), alias.as_str(), 1);
            }
        }
        field.to_string()
    }

    /// Aliases the plan, hands it to the compile callback, then runs the
    /// junction fix-up pass over the produced SQL text.
    pub fn compile_with_aliases<F>(
        &mut self,
        plan: &QueryPlan,
        compile: F,
    ) -> Result<CompiledQuery<SqliteValue>>
    where
        F: FnOnce(&QueryPlan) -> Result<CompiledQuery<SqliteValue>>,
    {
        let aliased = self.alias_plan(plan);
        let mut compiled = compile(&aliased)?;
        compiled.sql = patch_junction_quoting(&compiled.sql);
        Ok(compiled)
    }

    fn alias_plan(&mut self, plan: &QueryPlan) -> QueryPlan {
        let mut aliased = plan.clone();
        aliased.endpoint.entity_id = self.get_or_assign(&plan.endpoint.entity_id).to_string();
        aliased.table.name = self.get_or_assign(&plan.table.name).to_string();
        for table in &mut aliased.tables {
            let name = table.name.clone();
            table.name = self.get_or_assign(&name).to_string();
        }
        aliased.fields = plan
            .fields
            .iter()
            .map(|field| self.alias_field(field))
            .collect();
        self.alias_filter_keys(&mut aliased.filters);
        if let Some(sort) = &mut aliased.sort {
            sort.field = self.alias_field(&sort.field);
        }
        for relationship in &mut aliased.relationships {
            let related = relationship.table_id.clone();
            relationship.table_id = self.get_or_assign(&related).to_string();
            let through = relationship.through.clone();
            relationship.through = self.get_or_assign(&through).to_string();
            // junctions are not in the snapshot; the compiler resolves join
            // targets through the plan's table list
            if !aliased.tables.iter().any(|table| table.id == through) {
                aliased
                    .tables
                    .push(Table::new(through, relationship.through.clone()));
            }
        }
        aliased
    }

    fn alias_filter_keys(&self, filters: &mut SearchFilters) {
        alias_map_keys(&mut filters.equal, self);
        alias_map_keys(&mut filters.not_equal, self);
        alias_map_keys(&mut filters.string, self);
        alias_map_keys(&mut filters.fuzzy, self);
        alias_map_keys(&mut filters.range, self);
        alias_map_keys(&mut filters.one_of, self);
        alias_map_keys(&mut filters.contains, self);
        alias_map_keys(&mut filters.empty, self);
        alias_map_keys(&mut filters.not_empty, self);
    }

    /// Maps `alias.column` row keys back to `tableId.column`.
    pub fn reverse(&self, rows: Vec<Row>) -> Vec<Row> {
        rows.into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|(key, value)| {
                        let rewritten = key.split_once('.').and_then(|(prefix, rest)| {
                            self.reversed
                                .get(prefix)
                                .map(|name| format!("{name}.{rest}"))
                        });
                        (rewritten.unwrap_or(key), value)
                    })
                    .collect()
            })
            .collect()
    }
}

fn alias_map_keys<T>(map: &mut BTreeMap<String, T>, aliaser: &TableAliaser) {
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        let new_key = aliaser.alias_field(&key);
        if new_key != key
            && let Some(value) = map.remove(&key)
        {
            map.insert(new_key, value);
        }
    }
}

/// Alias sequence: `a`..`z`, `aa`, `ab`, ..
fn alias_for_index(mut index: usize) -> CompactString {
    let mut alias = CompactString::default();
    loop {
        alias.push((b'a' + (index % 26) as u8) as char);
        index /= 26;
        if index == 0 {
            break;
        }
        index -= 1;
    }
    alias.chars().rev().collect()
}

/// Rewrites the junction column fragments a dot-splitting SQL builder would
/// mis-quote. Exactly two fragments are targeted; everything else, including
/// already-correct `"doc1.rowId"` references, is left alone.
pub fn patch_junction_quoting(sql: &str) -> String {
    sql.replace(r#""doc1"."rowId""#, r#""doc1.rowId""#)
        .replace(r#""doc2"."rowId""#, r#""doc2.rowId""#)
}
