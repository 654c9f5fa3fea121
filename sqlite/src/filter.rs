//! Search filter tree and its normalization pass.
//!
//! Filters arrive keyed by operator, then by field key. A field key is either
//! a plain column, a `table.column` qualified reference, or a relationship
//! reference of the shape `:<tableName>.<column>` written against the human
//! table name. Normalization rewrites those qualifiers to stable table ids
//! and drops predicates whose value is the empty string, which callers use to
//! mean "no filter".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::CatalogSnapshot;

/// Inclusive bounds for a `range` predicate; either side may be open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RangeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub high: Option<Value>,
}

/// A declarative filter tree, one map per operator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub equal: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub not_equal: BTreeMap<String, Value>,
    /// Prefix match: compiles to `LIKE 'value%'`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub string: BTreeMap<String, Value>,
    /// Substring match: compiles to `LIKE '%value%'`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fuzzy: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub range: BTreeMap<String, RangeFilter>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub one_of: BTreeMap<String, Vec<Value>>,
    /// Membership in an array-typed column.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub contains: BTreeMap<String, Vec<Value>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub empty: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub not_empty: BTreeMap<String, Value>,
    /// Join predicates with OR instead of AND.
    #[serde(skip_serializing_if = "is_false")]
    pub all_or: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl SearchFilters {
    /// True when no operator map holds any predicate.
    pub fn is_empty(&self) -> bool {
        self.equal.is_empty()
            && self.not_equal.is_empty()
            && self.string.is_empty()
            && self.fuzzy.is_empty()
            && self.range.is_empty()
            && self.one_of.is_empty()
            && self.contains.is_empty()
            && self.empty.is_empty()
            && self.not_empty.is_empty()
    }

    /// Produces the engine-ready filter tree for one search call.
    ///
    /// Empty-string leaves are removed and `:<tableName>.` qualifiers are
    /// rewritten to `:<tableId>.`. Unknown qualifiers pass through untouched.
    /// The caller's filters and the snapshot are never mutated.
    pub fn normalize(&self, snapshot: &CatalogSnapshot) -> SearchFilters {
        let mut filters = self.clone();
        for map in [
            &mut filters.equal,
            &mut filters.not_equal,
            &mut filters.string,
            &mut filters.fuzzy,
            &mut filters.empty,
            &mut filters.not_empty,
        ] {
            drop_empty_values(map);
            rewrite_keys(map, snapshot);
        }
        rewrite_keys(&mut filters.range, snapshot);
        rewrite_keys(&mut filters.one_of, snapshot);
        rewrite_keys(&mut filters.contains, snapshot);
        filters
    }
}

fn drop_empty_values(map: &mut BTreeMap<String, Value>) {
    map.retain(|_, value| value.as_str() != Some(""));
}

fn rewrite_keys<T>(map: &mut BTreeMap<String, T>, snapshot: &CatalogSnapshot) {
    let keys: Vec<String> = map.keys().cloned().collect();
    for key in keys {
        if let Some(new_key) = rewrite_qualifier(&key, snapshot)
            && let Some(value) = map.remove(&key)
        {
            map.insert(new_key, value);
        }
    }
}

/// Rewrites the first `:<originalName>.` qualifier found in the key to the
/// owning table's stable id. Returns `None` when no qualifier matches.
fn rewrite_qualifier(key: &str, snapshot: &CatalogSnapshot) -> Option<String> {
    for table in snapshot.tables() {
        let Some(original) = table.original_name.as_deref() else {
            continue;
        };
        let pattern = format!(":{original}.");
        if key.contains(&pattern) {
            return Some(key.replacen(&pattern, &format!(":{}.", table.id), 1));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Table;
    use serde_json::json;

    fn snapshot() -> CatalogSnapshot {
        CatalogSnapshot::new(vec![
            Table::new("ta_aaa", "invoices"),
            Table::new("ta_bbb", "customers"),
        ])
    }

    #[test]
    fn test_normalize_drops_empty_string_leaves() {
        let mut filters = SearchFilters::default();
        filters.equal.insert("amount".into(), json!(""));
        filters.equal.insert("status".into(), json!("paid"));
        filters.fuzzy.insert("notes".into(), json!(""));

        let normalized = filters.normalize(&snapshot());
        assert!(!normalized.equal.contains_key("amount"));
        assert_eq!(normalized.equal.get("status"), Some(&json!("paid")));
        assert!(normalized.fuzzy.is_empty());
        // caller's tree untouched
        assert!(filters.equal.contains_key("amount"));
    }

    #[test]
    fn test_normalize_rewrites_name_qualifier_to_id() {
        let mut filters = SearchFilters::default();
        filters.equal.insert(":customers.name".into(), json!("Acme"));

        let normalized = filters.normalize(&snapshot());
        assert_eq!(normalized.equal.get(":ta_bbb.name"), Some(&json!("Acme")));
        assert!(!normalized.equal.contains_key(":customers.name"));
    }

    #[test]
    fn test_normalize_leaves_unknown_qualifiers() {
        let mut filters = SearchFilters::default();
        filters.equal.insert(":ghosts.name".into(), json!("x"));
        filters.equal.insert("plain".into(), json!("y"));

        let normalized = filters.normalize(&snapshot());
        assert!(normalized.equal.contains_key(":ghosts.name"));
        assert!(normalized.equal.contains_key("plain"));
    }

    #[test]
    fn test_normalize_rewrites_structured_operator_keys() {
        let mut filters = SearchFilters::default();
        filters.range.insert(
            ":invoices.amount".into(),
            RangeFilter {
                low: Some(json!(1)),
                high: None,
            },
        );
        filters.one_of.insert(":customers.tier".into(), vec![json!("gold")]);

        let normalized = filters.normalize(&snapshot());
        assert!(normalized.range.contains_key(":ta_aaa.amount"));
        assert!(normalized.one_of.contains_key(":ta_bbb.tier"));
    }

    #[test]
    fn test_filters_deserialize_camel_case() {
        let filters: SearchFilters = serde_json::from_value(json!({
            "notEqual": { "status": "void" },
            "oneOf": { "tier": ["gold", "silver"] },
            "allOr": true
        }))
        .unwrap();
        assert_eq!(filters.not_equal.get("status"), Some(&json!("void")));
        assert_eq!(filters.one_of["tier"].len(), 2);
        assert!(filters.all_or);
    }
}
