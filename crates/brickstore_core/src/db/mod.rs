//! SQLite connection bootstrap for the table backend.
//!
//! # Invariants
//! - No table operation runs on a connection whose catalog check failed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod catalog;
mod open;

pub use open::{open_db, open_db_in_memory, DbOptions};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file carries a catalog layout this binary does not know.
    CatalogTooNew { found: u32, supported: u32 },
    /// The catalog version is set but one of its tables is absent.
    CatalogMissing { table: &'static str },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::CatalogTooNew { found, supported } => write!(
                f,
                "catalog version {found} is newer than supported version {supported}"
            ),
            Self::CatalogMissing { table } => {
                write!(f, "catalog table `{table}` is missing")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::CatalogTooNew { .. } | Self::CatalogMissing { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
