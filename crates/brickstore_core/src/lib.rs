//! Core of brickstore: a single-table, key-indexed item store.
//!
//! Three operations are exposed through call dispatch: table initialization,
//! insert-or-merge upsert, and point lookup of the unit-price slot by key.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, StoreConfig};
pub use dispatch::{
    CallContext, CallKind, Command, DispatchError, DispatchResult, Dispatcher, FN_INIT,
    FN_INSERT_ITEM, FN_READ_ITEM,
};
pub use logging::{default_log_level, init_logging, CoreLogger, LoggingHandle};
pub use model::record::{ItemRecord, MergePolicy, ITEM_TABLE};
pub use repo::table_repo::{
    ColumnDefinition, ColumnType, ColumnValue, RepoError, RepoResult, Row, SqliteTableRepository,
    TableRepository, WriteOutcome,
};
pub use service::error::{LookupCause, StoreError, StoreResult, WriteFailure};
pub use service::item_service::{ItemService, UpsertOutcome};
pub use service::schema_service::{item_columns, SchemaService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
