//! Schema manager for the item table.
//!
//! # Invariants
//! - Issues exactly one create-table request per call.
//! - Not idempotent: the backend rejects a second creation and that error is
//!   returned unchanged.

use crate::logging::{emit, sanitize_message, CoreLogger, MAX_ERROR_DETAIL_CHARS};
use crate::model::record::{KEY_COLUMN, QUANTITY_COLUMN, UNIT_PRICE_COLUMN};
use crate::repo::table_repo::{ColumnDefinition, ColumnType, TableRepository};
use crate::service::error::{StoreError, StoreResult};
use log::Level;
use std::time::Instant;

/// Fixed three-column item schema: one string key, two string values.
pub fn item_columns() -> Vec<ColumnDefinition> {
    vec![
        ColumnDefinition::new(KEY_COLUMN, ColumnType::String, true),
        ColumnDefinition::new(UNIT_PRICE_COLUMN, ColumnType::String, false),
        ColumnDefinition::new(QUANTITY_COLUMN, ColumnType::String, false),
    ]
}

pub struct SchemaService<R: TableRepository> {
    repo: R,
    table: String,
    logger: CoreLogger,
}

impl<R: TableRepository> SchemaService<R> {
    pub fn new(repo: R, table: impl Into<String>, logger: CoreLogger) -> Self {
        Self {
            repo,
            table: table.into(),
            logger,
        }
    }

    /// Creates the item table.
    ///
    /// # Errors
    /// - `SchemaCreationFailed` when the backend rejects the definition,
    ///   including when the table already exists.
    pub fn initialize(&self) -> StoreResult<()> {
        let started_at = Instant::now();
        match self.repo.create_table(&self.table, &item_columns()) {
            Ok(()) => {
                emit!(
                    self.logger,
                    Level::Info,
                    "event=schema_init module=service status=ok table={} duration_ms={}",
                    self.table,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(source) => {
                emit!(
                    self.logger,
                    Level::Warn,
                    "event=schema_init module=service status=error table={} duration_ms={} error_code=schema_creation_failed error={}",
                    self.table,
                    started_at.elapsed().as_millis(),
                    sanitize_message(&source.to_string(), MAX_ERROR_DETAIL_CHARS)
                );
                Err(StoreError::SchemaCreationFailed {
                    table: self.table.clone(),
                    source,
                })
            }
        }
    }
}
