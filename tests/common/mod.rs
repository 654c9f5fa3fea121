#![cfg(feature = "rusqlite")]
#![allow(dead_code)]

use serde_json::Value;
use trawl::prelude::*;

/// Two linked tables: invoices carry a to-one `customer` link, customers the
/// inverse to-many `invoices` link. Both sides derive the same junction.
pub fn catalog() -> MemoryCatalog {
    let mut catalog = MemoryCatalog::new();
    catalog.insert(
        Table::new("ta_inv", "invoices")
            .with_field("amount", FieldDefinition::scalar(ScalarKind::Number))
            .with_field("notes", FieldDefinition::scalar(ScalarKind::Text))
            .with_field("tags", FieldDefinition::scalar(ScalarKind::Json))
            .with_field("secret", FieldDefinition::hidden(ScalarKind::Text))
            .with_field(
                "customer",
                FieldDefinition::relationship("ta_cus", Cardinality::One),
            )
            .with_primary_display("notes"),
    );
    catalog.insert(
        Table::new("ta_cus", "customers")
            .with_field("name", FieldDefinition::scalar(ScalarKind::Text))
            .with_field("tier", FieldDefinition::scalar(ScalarKind::Options))
            .with_field(
                "invoices",
                FieldDefinition::relationship("ta_inv", Cardinality::Many),
            )
            .with_primary_display("name"),
    );
    catalog
}

/// Fresh in-memory engine with the derived schema synced and seed rows
/// inserted. `doc1.rowId` is the customer side of the junction because
/// `ta_cus` sorts before `ta_inv`.
pub fn engine(catalog: &MemoryCatalog) -> RusqliteDriver {
    let driver = RusqliteDriver::open_in_memory().expect("Failed to open in-memory engine");
    driver
        .sync_definition(&catalog.list_tables().expect("Failed to list tables"))
        .expect("Failed to sync derived schema");
    seed(&driver);
    driver
}

fn seed(driver: &RusqliteDriver) {
    driver
        .connection()
        .execute_batch(
            r#"
            INSERT INTO "ta_cus" ("_id", "name", "tier") VALUES ('ro_cus1', 'Acme Ltd', 'gold');
            INSERT INTO "ta_cus" ("_id", "name", "tier") VALUES ('ro_cus2', 'Globex', 'silver');
            INSERT INTO "ta_inv" ("_id", "amount", "notes", "secret", "tags")
                VALUES ('ro_inv1', 100, 'first invoice', 'hush', '["red","blue"]');
            INSERT INTO "ta_inv" ("_id", "amount", "notes", "secret", "tags")
                VALUES ('ro_inv2', 250, 'second invoice', 'hush', '["blue"]');
            INSERT INTO "ta_inv" ("_id", "amount", "notes", "secret", "tags")
                VALUES ('ro_inv3', 50, 'third invoice', 'hush', '[]');
            INSERT INTO "ta_inv" ("_id", "amount", "tags")
                VALUES ('ro_inv4', 175, '["green"]');
            INSERT INTO "lnk_ta_cus_ta_inv" ("doc1.rowId", "doc2.rowId") VALUES ('ro_cus1', 'ro_inv1');
            INSERT INTO "lnk_ta_cus_ta_inv" ("doc1.rowId", "doc2.rowId") VALUES ('ro_cus2', 'ro_inv2');
            INSERT INTO "lnk_ta_cus_ta_inv" ("doc1.rowId", "doc2.rowId") VALUES ('ro_cus1', 'ro_inv3');
            "#,
        )
        .expect("Failed to seed rows");
}

/// Row ids in response order.
pub fn ids(response: &SearchResponse) -> Vec<String> {
    response
        .rows
        .iter()
        .filter_map(|row| row.get("_id"))
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect()
}

/// Row ids sorted, for assertions that do not pin an order.
pub fn sorted_ids(response: &SearchResponse) -> Vec<String> {
    let mut ids = ids(response);
    ids.sort();
    ids
}

pub fn doc<'a>(response: &'a SearchResponse, id: &str) -> &'a Row {
    response
        .rows
        .iter()
        .find(|row| row.get("_id").and_then(Value::as_str) == Some(id))
        .unwrap_or_else(|| panic!("row {id} missing from response"))
}
