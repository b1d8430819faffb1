//! Table-storage contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create-table and keyed row get/insert/replace primitives.
//! - Keep SQL details inside the backend boundary.
//!
//! # Invariants
//! - Every created table is recorded in the catalog with its ordered columns.
//! - Rows are validated against the catalog definition before any write.
//! - A row is addressed by the key column values it was inserted with.
//!   Replacing its columns never moves it to a different address.
//! - Insert and replace report "not applied" as a value, not as an error.

use crate::db::DbError;
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

const ROW_KEY_COLUMN: &str = "row_key";
const RESERVED_TABLE_PREFIXES: &[&str] = &["brickstore_", "sqlite_"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Backend error for table definition and row operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    TableNotFound(String),
    TableExists(String),
    InvalidDefinition(String),
    RowShape(String),
    InvalidData(String),
    /// An operation failed and undoing its partial writes failed too.
    RollbackFailed {
        cause: Box<RepoError>,
        rollback: rusqlite::Error,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::TableNotFound(name) => write!(f, "table `{name}` does not exist"),
            Self::TableExists(name) => write!(f, "table `{name}` already exists"),
            Self::InvalidDefinition(message) => write!(f, "invalid table definition: {message}"),
            Self::RowShape(message) => write!(f, "row does not match table definition: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted row data: {message}"),
            Self::RollbackFailed { cause, rollback } => {
                write!(f, "{cause} (rollback also failed: {rollback})")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::RollbackFailed { cause, .. } => Some(cause.as_ref()),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    String,
    Int32,
    Int64,
    Uint32,
    Bytes,
    Bool,
}

impl ColumnType {
    /// Stable catalog name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Bytes => "bytes",
            Self::Bool => "bool",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "string" => Some(Self::String),
            "int32" => Some(Self::Int32),
            "int64" => Some(Self::Int64),
            "uint32" => Some(Self::Uint32),
            "bytes" => Some(Self::Bytes),
            "bool" => Some(Self::Bool),
            _ => None,
        }
    }

    fn sql_affinity(self) -> &'static str {
        match self {
            Self::String => "TEXT",
            Self::Int32 | Self::Int64 | Self::Uint32 | Self::Bool => "INTEGER",
            Self::Bytes => "BLOB",
        }
    }
}

/// One `(name, type, is_key)` entry of a table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub kind: ColumnType,
    pub key: bool,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, kind: ColumnType, key: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            key,
        }
    }
}

/// Typed value of one column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnValue {
    String(String),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Bytes(Vec<u8>),
    Bool(bool),
}

impl ColumnValue {
    pub fn kind(&self) -> ColumnType {
        match self {
            Self::String(_) => ColumnType::String,
            Self::Int32(_) => ColumnType::Int32,
            Self::Int64(_) => ColumnType::Int64,
            Self::Uint32(_) => ColumnType::Uint32,
            Self::Bytes(_) => ColumnType::Bytes,
            Self::Bool(_) => ColumnType::Bool,
        }
    }

    /// Returns the text of a string column.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Raw stored bytes: UTF-8 for strings, big-endian for integers.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::String(value) => value.as_bytes().to_vec(),
            Self::Int32(value) => value.to_be_bytes().to_vec(),
            Self::Int64(value) => value.to_be_bytes().to_vec(),
            Self::Uint32(value) => value.to_be_bytes().to_vec(),
            Self::Bytes(value) => value.clone(),
            Self::Bool(value) => vec![u8::from(*value)],
        }
    }

    fn to_sql_value(&self) -> Value {
        match self {
            Self::String(value) => Value::Text(value.clone()),
            Self::Int32(value) => Value::Integer(i64::from(*value)),
            Self::Int64(value) => Value::Integer(*value),
            Self::Uint32(value) => Value::Integer(i64::from(*value)),
            Self::Bytes(value) => Value::Blob(value.clone()),
            Self::Bool(value) => Value::Integer(i64::from(*value)),
        }
    }
}

impl From<&str> for ColumnValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ColumnValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

/// Ordered column values of one row. An empty row means "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub columns: Vec<ColumnValue>,
}

impl Row {
    pub fn new(columns: Vec<ColumnValue>) -> Self {
        Self { columns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&ColumnValue> {
        self.columns.get(position)
    }
}

/// Non-error result of a row write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Applied,
    /// The backend accepted the call but did not change anything.
    NotApplied,
}

impl WriteOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Repository interface for keyed table storage.
pub trait TableRepository {
    /// Creates a table. Fails when it already exists.
    fn create_table(&self, name: &str, columns: &[ColumnDefinition]) -> RepoResult<()>;
    /// Returns the ordered definition of an existing table.
    fn get_table(&self, name: &str) -> RepoResult<Vec<ColumnDefinition>>;
    /// Equality lookup on the full key. Returns an empty row when absent.
    fn get_row(&self, table: &str, key: &[ColumnValue]) -> RepoResult<Row>;
    /// Inserts a row; `NotApplied` when its key is already taken.
    fn insert_row(&self, table: &str, row: &Row) -> RepoResult<WriteOutcome>;
    /// Replaces the columns of the row stored under `key`; `NotApplied` when absent.
    fn replace_row(&self, table: &str, key: &[ColumnValue], row: &Row)
        -> RepoResult<WriteOutcome>;
}

impl<R: TableRepository + ?Sized> TableRepository for &R {
    fn create_table(&self, name: &str, columns: &[ColumnDefinition]) -> RepoResult<()> {
        (**self).create_table(name, columns)
    }

    fn get_table(&self, name: &str) -> RepoResult<Vec<ColumnDefinition>> {
        (**self).get_table(name)
    }

    fn get_row(&self, table: &str, key: &[ColumnValue]) -> RepoResult<Row> {
        (**self).get_row(table, key)
    }

    fn insert_row(&self, table: &str, row: &Row) -> RepoResult<WriteOutcome> {
        (**self).insert_row(table, row)
    }

    fn replace_row(
        &self,
        table: &str,
        key: &[ColumnValue],
        row: &Row,
    ) -> RepoResult<WriteOutcome> {
        (**self).replace_row(table, key, row)
    }
}

/// SQLite-backed table repository.
///
/// Accepts any `&Connection`, including a `Transaction` through deref, so the
/// caller decides the transaction boundary.
pub struct SqliteTableRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTableRepository<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn load_definition(&self, table: &str) -> RepoResult<Vec<ColumnDefinition>> {
        let known = self
            .conn
            .query_row(
                "SELECT 1 FROM brickstore_tables WHERE name = ?1;",
                [table],
                |_| Ok(()),
            )
            .optional()?;
        if known.is_none() {
            return Err(RepoError::TableNotFound(table.to_string()));
        }

        let mut stmt = self.conn.prepare(
            "SELECT name, type, is_key
             FROM brickstore_columns
             WHERE table_name = ?1
             ORDER BY position ASC;",
        )?;
        let mut rows = stmt.query([table])?;
        let mut columns = Vec::new();
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let type_text: String = row.get(1)?;
            let kind = ColumnType::parse(&type_text).ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "invalid column type `{type_text}` for `{table}.{name}`"
                ))
            })?;
            let key = match row.get::<_, i64>(2)? {
                0 => false,
                1 => true,
                other => {
                    return Err(RepoError::InvalidData(format!(
                        "invalid is_key value `{other}` for `{table}.{name}`"
                    )));
                }
            };
            columns.push(ColumnDefinition { name, kind, key });
        }

        if columns.is_empty() {
            return Err(RepoError::InvalidData(format!(
                "table `{table}` has no catalog columns"
            )));
        }
        Ok(columns)
    }
}

impl TableRepository for SqliteTableRepository<'_> {
    fn create_table(&self, name: &str, columns: &[ColumnDefinition]) -> RepoResult<()> {
        validate_definition(name, columns)?;

        let exists = self
            .conn
            .query_row(
                "SELECT 1 FROM brickstore_tables WHERE name = ?1 COLLATE NOCASE;",
                [name],
                |_| Ok(()),
            )
            .optional()?;
        if exists.is_some() {
            return Err(RepoError::TableExists(name.to_string()));
        }

        let column_sql = columns
            .iter()
            .map(|column| format!("\"{}\" {}", column.name, column.kind.sql_affinity()))
            .collect::<Vec<_>>()
            .join(", ");
        let create_sql = format!(
            "CREATE TABLE \"{name}\" ({ROW_KEY_COLUMN} BLOB PRIMARY KEY NOT NULL, {column_sql});"
        );

        with_savepoint(self.conn, "brickstore_create_table", |conn| {
            conn.execute_batch(&create_sql)?;
            conn.execute("INSERT INTO brickstore_tables (name) VALUES (?1);", [name])?;
            for (position, column) in columns.iter().enumerate() {
                conn.execute(
                    "INSERT INTO brickstore_columns (table_name, position, name, type, is_key)
                     VALUES (?1, ?2, ?3, ?4, ?5);",
                    params![
                        name,
                        position as i64,
                        column.name.as_str(),
                        column.kind.as_str(),
                        i64::from(column.key),
                    ],
                )?;
            }
            Ok(())
        })
    }

    fn get_table(&self, name: &str) -> RepoResult<Vec<ColumnDefinition>> {
        self.load_definition(name)
    }

    fn get_row(&self, table: &str, key: &[ColumnValue]) -> RepoResult<Row> {
        let columns = self.load_definition(table)?;
        check_key(&columns, key)?;

        let sql = format!(
            "SELECT {} FROM \"{table}\" WHERE {ROW_KEY_COLUMN} = ?1;",
            quoted_names(&columns)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query([encode_row_key(key)])?;
        match rows.next()? {
            Some(row) => parse_row(table, &columns, row),
            None => Ok(Row::empty()),
        }
    }

    fn insert_row(&self, table: &str, row: &Row) -> RepoResult<WriteOutcome> {
        let columns = self.load_definition(table)?;
        check_row(&columns, row)?;

        let key = key_values(&columns, row);
        let placeholders = (0..=columns.len())
            .map(|index| format!("?{}", index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT OR IGNORE INTO \"{table}\" ({ROW_KEY_COLUMN}, {}) VALUES ({placeholders});",
            quoted_names(&columns)
        );

        let mut bind_values = Vec::with_capacity(columns.len() + 1);
        bind_values.push(Value::Blob(encode_row_key(&key)));
        bind_values.extend(row.columns.iter().map(ColumnValue::to_sql_value));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(write_outcome(changed))
    }

    fn replace_row(
        &self,
        table: &str,
        key: &[ColumnValue],
        row: &Row,
    ) -> RepoResult<WriteOutcome> {
        let columns = self.load_definition(table)?;
        check_key(&columns, key)?;
        check_row(&columns, row)?;

        let assignments = columns
            .iter()
            .enumerate()
            .map(|(index, column)| format!("\"{}\" = ?{}", column.name, index + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "UPDATE \"{table}\" SET {assignments} WHERE {ROW_KEY_COLUMN} = ?{};",
            columns.len() + 1
        );

        let mut bind_values = row
            .columns
            .iter()
            .map(ColumnValue::to_sql_value)
            .collect::<Vec<_>>();
        bind_values.push(Value::Blob(encode_row_key(key)));

        let changed = self.conn.execute(&sql, params_from_iter(bind_values))?;
        Ok(write_outcome(changed))
    }
}

/// Returns whether `value` is usable as a table or column name.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Encodes key column values into the row address.
///
/// Each value is written as a type tag, a big-endian `u32` length and its raw
/// bytes, so distinct key tuples never collide.
pub fn encode_row_key(key: &[ColumnValue]) -> Vec<u8> {
    let mut encoded = Vec::new();
    for value in key {
        let bytes = value.to_bytes();
        encoded.push(type_tag(value.kind()));
        encoded.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        encoded.extend_from_slice(&bytes);
    }
    encoded
}

fn type_tag(kind: ColumnType) -> u8 {
    match kind {
        ColumnType::String => 1,
        ColumnType::Int32 => 2,
        ColumnType::Int64 => 3,
        ColumnType::Uint32 => 4,
        ColumnType::Bytes => 5,
        ColumnType::Bool => 6,
    }
}

fn validate_definition(name: &str, columns: &[ColumnDefinition]) -> RepoResult<()> {
    if !is_valid_identifier(name) {
        return Err(RepoError::InvalidDefinition(format!(
            "invalid table name `{name}`"
        )));
    }
    let lowered = name.to_ascii_lowercase();
    if RESERVED_TABLE_PREFIXES
        .iter()
        .any(|prefix| lowered.starts_with(prefix))
    {
        return Err(RepoError::InvalidDefinition(format!(
            "table name `{name}` uses a reserved prefix"
        )));
    }
    if columns.is_empty() {
        return Err(RepoError::InvalidDefinition(format!(
            "table `{name}` has no columns"
        )));
    }
    if !columns.iter().any(|column| column.key) {
        return Err(RepoError::InvalidDefinition(format!(
            "table `{name}` has no key column"
        )));
    }

    let mut seen = HashSet::new();
    for column in columns {
        if !is_valid_identifier(&column.name) {
            return Err(RepoError::InvalidDefinition(format!(
                "invalid column name `{}`",
                column.name
            )));
        }
        let lowered = column.name.to_ascii_lowercase();
        if lowered == ROW_KEY_COLUMN {
            return Err(RepoError::InvalidDefinition(format!(
                "column name `{}` is reserved",
                column.name
            )));
        }
        if !seen.insert(lowered) {
            return Err(RepoError::InvalidDefinition(format!(
                "duplicate column name `{}`",
                column.name
            )));
        }
    }
    Ok(())
}

fn check_key(columns: &[ColumnDefinition], key: &[ColumnValue]) -> RepoResult<()> {
    let key_columns = columns
        .iter()
        .filter(|column| column.key)
        .collect::<Vec<_>>();
    if key_columns.len() != key.len() {
        return Err(RepoError::RowShape(format!(
            "expected {} key column(s), got {}",
            key_columns.len(),
            key.len()
        )));
    }
    for (column, value) in key_columns.iter().zip(key) {
        if column.kind != value.kind() {
            return Err(RepoError::RowShape(format!(
                "key column `{}` expects {}, got {}",
                column.name,
                column.kind.as_str(),
                value.kind().as_str()
            )));
        }
    }
    Ok(())
}

fn check_row(columns: &[ColumnDefinition], row: &Row) -> RepoResult<()> {
    if columns.len() != row.columns.len() {
        return Err(RepoError::RowShape(format!(
            "expected {} column(s), got {}",
            columns.len(),
            row.columns.len()
        )));
    }
    for (column, value) in columns.iter().zip(&row.columns) {
        if column.kind != value.kind() {
            return Err(RepoError::RowShape(format!(
                "column `{}` expects {}, got {}",
                column.name,
                column.kind.as_str(),
                value.kind().as_str()
            )));
        }
    }
    Ok(())
}

fn key_values(columns: &[ColumnDefinition], row: &Row) -> Vec<ColumnValue> {
    columns
        .iter()
        .zip(&row.columns)
        .filter(|(column, _)| column.key)
        .map(|(_, value)| value.clone())
        .collect()
}

fn quoted_names(columns: &[ColumnDefinition]) -> String {
    columns
        .iter()
        .map(|column| format!("\"{}\"", column.name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_row(
    table: &str,
    columns: &[ColumnDefinition],
    row: &rusqlite::Row<'_>,
) -> RepoResult<Row> {
    let mut values = Vec::with_capacity(columns.len());
    for (index, column) in columns.iter().enumerate() {
        let raw: Value = row.get(index)?;
        let invalid = || {
            RepoError::InvalidData(format!(
                "unexpected value in `{table}.{}` for type {}",
                column.name,
                column.kind.as_str()
            ))
        };
        let value = match (column.kind, raw) {
            (ColumnType::String, Value::Text(text)) => ColumnValue::String(text),
            (ColumnType::Int32, Value::Integer(number)) => {
                ColumnValue::Int32(i32::try_from(number).map_err(|_| invalid())?)
            }
            (ColumnType::Int64, Value::Integer(number)) => ColumnValue::Int64(number),
            (ColumnType::Uint32, Value::Integer(number)) => {
                ColumnValue::Uint32(u32::try_from(number).map_err(|_| invalid())?)
            }
            (ColumnType::Bytes, Value::Blob(bytes)) => ColumnValue::Bytes(bytes),
            (ColumnType::Bool, Value::Integer(0)) => ColumnValue::Bool(false),
            (ColumnType::Bool, Value::Integer(1)) => ColumnValue::Bool(true),
            _ => return Err(invalid()),
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

fn write_outcome(changed: usize) -> WriteOutcome {
    if changed == 0 {
        WriteOutcome::NotApplied
    } else {
        WriteOutcome::Applied
    }
}

/// Runs `f` inside a named savepoint so multi-statement writes stay atomic
/// whether or not the caller already opened a transaction.
fn with_savepoint<T>(
    conn: &Connection,
    name: &str,
    f: impl FnOnce(&Connection) -> RepoResult<T>,
) -> RepoResult<T> {
    conn.execute_batch(&format!("SAVEPOINT {name};"))?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch(&format!("RELEASE {name};"))?;
            Ok(value)
        }
        Err(err) => match conn
            .execute_batch(&format!("ROLLBACK TO {name};"))
            .and_then(|()| conn.execute_batch(&format!("RELEASE {name};")))
        {
            Ok(()) => Err(err),
            Err(rollback) => Err(RepoError::RollbackFailed {
                cause: Box::new(err),
                rollback,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::{encode_row_key, is_valid_identifier, validate_definition, with_savepoint};
    use super::{ColumnDefinition, ColumnType, ColumnValue, RepoError};
    use rusqlite::Connection;
    use std::error::Error;

    #[test]
    fn row_key_encoding_keeps_tuple_boundaries() {
        let left = encode_row_key(&[ColumnValue::from("a b"), ColumnValue::from("c")]);
        let right = encode_row_key(&[ColumnValue::from("a"), ColumnValue::from("b c")]);
        assert_ne!(left, right);
    }

    #[test]
    fn row_key_encoding_distinguishes_types_with_equal_bytes() {
        let text = encode_row_key(&[ColumnValue::String("\u{1}".to_string())]);
        let flag = encode_row_key(&[ColumnValue::Bool(true)]);
        assert_ne!(text, flag);
    }

    #[test]
    fn identifiers_follow_sql_name_rules() {
        assert!(is_valid_identifier("Brick_Item"));
        assert!(is_valid_identifier("_private1"));
        assert!(!is_valid_identifier("1table"));
        assert!(!is_valid_identifier("drop table;"));
        assert!(!is_valid_identifier(""));
    }

    #[test]
    fn definition_requires_key_and_unique_names() {
        let no_key = [ColumnDefinition::new("a", ColumnType::String, false)];
        assert!(matches!(
            validate_definition("t", &no_key),
            Err(RepoError::InvalidDefinition(_))
        ));

        let duplicate = [
            ColumnDefinition::new("id", ColumnType::String, true),
            ColumnDefinition::new("ID", ColumnType::String, false),
        ];
        assert!(matches!(
            validate_definition("t", &duplicate),
            Err(RepoError::InvalidDefinition(_))
        ));

        let reserved = [ColumnDefinition::new("row_key", ColumnType::String, true)];
        assert!(validate_definition("t", &reserved).is_err());
        assert!(validate_definition(
            "sqlite_master",
            &[ColumnDefinition::new("id", ColumnType::String, true)]
        )
        .is_err());
    }

    #[test]
    fn string_values_expose_raw_utf8_bytes() {
        assert_eq!(ColumnValue::from("10 20").to_bytes(), b"10 20".to_vec());
        assert_eq!(ColumnValue::Uint32(1).to_bytes(), vec![0, 0, 0, 1]);
        assert_eq!(ColumnValue::from("x").as_str(), Some("x"));
        assert_eq!(ColumnValue::Bool(true).as_str(), None);
    }

    #[test]
    fn savepoint_failure_rolls_back_partial_writes() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER);").unwrap();

        let result: Result<(), RepoError> = with_savepoint(&conn, "sp_test", |conn| {
            conn.execute_batch("INSERT INTO t VALUES (1);")?;
            Err(RepoError::InvalidData("boom".to_string()))
        });

        assert!(matches!(result, Err(RepoError::InvalidData(_))));
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM t;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, 0);
        assert!(conn.is_autocommit());
    }

    #[test]
    fn failed_savepoint_rollback_is_reported_with_the_cause() {
        let conn = Connection::open_in_memory().unwrap();

        let result: Result<(), RepoError> = with_savepoint(&conn, "sp_test", |conn| {
            conn.execute_batch("RELEASE sp_test;")?;
            Err(RepoError::InvalidData("boom".to_string()))
        });

        let err = result.unwrap_err();
        match &err {
            RepoError::RollbackFailed { cause, .. } => {
                assert!(matches!(cause.as_ref(), RepoError::InvalidData(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("boom"));
        assert!(err.to_string().contains("rollback also failed"));
        assert!(err.source().is_some());
    }
}
