//! Backend catalog bootstrap.
//!
//! The catalog is the pair of bookkeeping tables describing every table the
//! backend created. Tables created through `TableRepository::create_table`
//! live beside it and are never touched here.
//!
//! # Invariants
//! - `PRAGMA user_version` is 0 before bootstrap and `CATALOG_VERSION` after.
//! - Bootstrap runs under the write lock and re-reads the version there, so
//!   connections opening a fresh file at the same time create the catalog once.

use crate::db::{DbError, DbResult};
use rusqlite::{Connection, TransactionBehavior};

/// Catalog layout version written by this binary.
pub const CATALOG_VERSION: u32 = 1;

pub(crate) const CATALOG_TABLES: [&str; 2] = ["brickstore_tables", "brickstore_columns"];

const CATALOG_SQL: &str = include_str!("catalog.sql");

/// Creates the catalog on a fresh database or checks an existing one.
///
/// # Errors
/// - `CatalogTooNew` when the file was written by a newer binary.
/// - `CatalogMissing` when the version is set but a catalog table is gone.
pub fn ensure_catalog(conn: &mut Connection) -> DbResult<()> {
    if catalog_version(conn)? == 0 {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        if catalog_version(&tx)? == 0 {
            tx.execute_batch(CATALOG_SQL)?;
            tx.pragma_update(None, "user_version", CATALOG_VERSION)?;
        }
        tx.commit()?;
    }

    let found = catalog_version(conn)?;
    if found > CATALOG_VERSION {
        return Err(DbError::CatalogTooNew {
            found,
            supported: CATALOG_VERSION,
        });
    }
    for table in CATALOG_TABLES {
        if !table_exists(conn, table)? {
            return Err(DbError::CatalogMissing { table });
        }
    }
    Ok(())
}

fn catalog_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.pragma_query_value(None, "user_version", |row| row.get::<_, u32>(0))?)
}

fn table_exists(conn: &Connection, table: &str) -> DbResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1);",
        [table],
        |row| row.get::<_, bool>(0),
    )?)
}
