mod common;

use brickstore_core::{
    CoreLogger, ItemRecord, ItemService, LookupCause, MergePolicy, RepoError, SchemaService,
    SqliteTableRepository, StoreError, UpsertOutcome, ITEM_TABLE,
};
use common::{capturing_logger, memory_db};
use rusqlite::Connection;

fn initialized_db() -> Connection {
    let conn = memory_db();
    SchemaService::new(
        SqliteTableRepository::new(&conn),
        ITEM_TABLE,
        CoreLogger::discard(),
    )
    .initialize()
    .unwrap();
    conn
}

fn engine(conn: &Connection) -> ItemService<SqliteTableRepository<'_>> {
    ItemService::new(
        SqliteTableRepository::new(conn),
        ITEM_TABLE,
        CoreLogger::discard(),
    )
}

#[test]
fn first_upsert_inserts_and_read_returns_unit_price() {
    let conn = initialized_db();
    let items = engine(&conn);

    let outcome = items.upsert(&ItemRecord::new("K", "10", "5")).unwrap();

    assert_eq!(outcome, UpsertOutcome::Inserted);
    assert_eq!(items.read_by_key("K").unwrap(), b"10".to_vec());
}

#[test]
fn second_upsert_appends_every_column() {
    let conn = initialized_db();
    let items = engine(&conn);

    items.upsert(&ItemRecord::new("A", "10", "5")).unwrap();
    let outcome = items.upsert(&ItemRecord::new("A", "20", "3")).unwrap();

    assert_eq!(outcome, UpsertOutcome::Merged);
    assert_eq!(items.read_by_key("A").unwrap(), b"10 20".to_vec());

    let (key, quantity): (String, String) = conn
        .query_row(
            "SELECT Item_ID, Item_Quantity FROM Brick_Item;",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(key, "A A");
    assert_eq!(quantity, "5 3");
}

#[test]
fn merged_row_stays_addressable_by_original_key() {
    let conn = initialized_db();
    let items = engine(&conn);

    items.upsert(&ItemRecord::new("A", "1", "x")).unwrap();
    items.upsert(&ItemRecord::new("A", "2", "y")).unwrap();
    items.upsert(&ItemRecord::new("A", "3", "z")).unwrap();

    assert_eq!(
        items.get_record("A").unwrap(),
        Some(ItemRecord::new("A A A", "1 2 3", "x y z"))
    );
    assert_eq!(items.get_record("A A").unwrap(), None);

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM Brick_Item;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn merged_key_text_can_collide_with_a_new_key() {
    let conn = initialized_db();
    let items = engine(&conn);

    items.upsert(&ItemRecord::new("A", "1", "2")).unwrap();
    items.upsert(&ItemRecord::new("A", "3", "4")).unwrap();
    let outcome = items.upsert(&ItemRecord::new("A A", "9", "9")).unwrap();

    // Rows are addressed by their insert key, not by the merged key column.
    assert_eq!(outcome, UpsertOutcome::Inserted);
    assert_eq!(items.read_by_key("A").unwrap(), b"1 3".to_vec());
    assert_eq!(items.read_by_key("A A").unwrap(), b"9".to_vec());

    let same_key_column: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM Brick_Item WHERE Item_ID = 'A A';",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(same_key_column, 2);
}

#[test]
fn read_of_never_upserted_key_is_lookup_failed() {
    let conn = initialized_db();
    let items = engine(&conn);

    let err = items.read_by_key("ZZZ").unwrap_err();
    assert!(matches!(
        err,
        StoreError::LookupFailed {
            cause: LookupCause::RowNotFound,
            ..
        }
    ));
}

#[test]
fn read_never_returns_quantity_slot() {
    let conn = initialized_db();
    let items = engine(&conn);

    items.upsert(&ItemRecord::new("B", "1", "2")).unwrap();

    let payload = items.read_by_key("B").unwrap();
    assert_eq!(payload, b"1".to_vec());
    assert_ne!(payload, b"2".to_vec());
}

#[test]
fn keys_are_independent() {
    let conn = initialized_db();
    let items = engine(&conn);

    items.upsert(&ItemRecord::new("A", "10", "1")).unwrap();
    items.upsert(&ItemRecord::new("B", "20", "2")).unwrap();
    items.upsert(&ItemRecord::new("A", "11", "1")).unwrap();

    assert_eq!(items.read_by_key("A").unwrap(), b"10 11".to_vec());
    assert_eq!(items.read_by_key("B").unwrap(), b"20".to_vec());
}

#[test]
fn operations_before_initialize_fail_with_lookup_failed() {
    let conn = memory_db();
    let items = engine(&conn);

    let err = items.upsert(&ItemRecord::new("A", "10", "5")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::LookupFailed {
            cause: LookupCause::Backend(RepoError::TableNotFound(_)),
            ..
        }
    ));

    let err = items.read_by_key("A").unwrap_err();
    assert!(matches!(err, StoreError::LookupFailed { .. }));
}

#[test]
fn overwrite_policy_replaces_value_slots() {
    let conn = initialized_db();
    let items = engine(&conn).with_merge_policy(MergePolicy::Overwrite);

    items.upsert(&ItemRecord::new("A", "10", "5")).unwrap();
    items.upsert(&ItemRecord::new("A", "20", "3")).unwrap();

    assert_eq!(items.read_by_key("A").unwrap(), b"20".to_vec());
    assert_eq!(
        items.get_record("A").unwrap(),
        Some(ItemRecord::new("A", "20", "3"))
    );
}

#[test]
fn upsert_logs_keys_but_not_values() {
    let conn = initialized_db();
    let (logger, sink) = capturing_logger();
    let items = ItemService::new(SqliteTableRepository::new(&conn), ITEM_TABLE, logger);

    items
        .upsert(&ItemRecord::new("SKU1", "price-secret", "qty-secret"))
        .unwrap();
    items.read_by_key("SKU1").unwrap();

    let lines = sink.lines();
    assert!(lines
        .iter()
        .any(|line| line.contains("event=item_upsert") && line.contains("key=SKU1")));
    assert!(lines.iter().any(|line| line.contains("event=item_read")));
    assert!(lines.iter().all(|line| !line.contains("secret")));
}
