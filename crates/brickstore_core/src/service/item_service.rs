//! Item upsert/query engine.
//!
//! # Responsibility
//! - Insert a row for a new key or merge incoming values into the stored row.
//! - Read the unit-price slot of a row by key.
//!
//! # Invariants
//! - Stateless between calls: every operation re-reads the backend.
//! - One lookup and at most one backend write per upsert; no read-back.
//! - A write reported as not applied is a failure even without a backend error.
//! - Reads expose only the unit-price slot.

use crate::logging::{emit, sanitize_message, CoreLogger, MAX_ERROR_DETAIL_CHARS};
use crate::model::record::{ItemRecord, MergePolicy, UNIT_PRICE_POSITION};
use crate::repo::table_repo::{
    ColumnValue, RepoError, RepoResult, Row, TableRepository, WriteOutcome,
};
use crate::service::error::{LookupCause, StoreError, StoreResult, WriteFailure};
use log::Level;
use std::time::Instant;

/// Which write an upsert performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Merged,
}

impl UpsertOutcome {
    fn as_str(self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Merged => "merged",
        }
    }
}

pub struct ItemService<R: TableRepository> {
    repo: R,
    table: String,
    policy: MergePolicy,
    logger: CoreLogger,
}

impl<R: TableRepository> ItemService<R> {
    /// Creates an engine over `table` using the accumulating merge policy.
    pub fn new(repo: R, table: impl Into<String>, logger: CoreLogger) -> Self {
        Self {
            repo,
            table: table.into(),
            policy: MergePolicy::default(),
            logger,
        }
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Inserts `incoming` when its key is new, otherwise merges it into the stored row.
    ///
    /// # Errors
    /// - `LookupFailed` when the lookup hits a backend error.
    /// - `InsertFailed` / `ReplaceFailed` when the write errors or is not applied.
    pub fn upsert(&self, incoming: &ItemRecord) -> StoreResult<UpsertOutcome> {
        let started_at = Instant::now();
        let result = self.upsert_inner(incoming);
        match &result {
            Ok(outcome) => emit!(
                self.logger,
                Level::Info,
                "event=item_upsert module=service status=ok table={} key={} action={} policy={} duration_ms={}",
                self.table,
                incoming.key,
                outcome.as_str(),
                self.policy.as_str(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => self.log_failure("item_upsert", &incoming.key, started_at, err),
        }
        result
    }

    fn upsert_inner(&self, incoming: &ItemRecord) -> StoreResult<UpsertOutcome> {
        let key = key_columns(&incoming.key);
        let stored = self
            .repo
            .get_row(&self.table, &key)
            .map_err(|err| lookup_failed(&incoming.key, LookupCause::Backend(err)))?;

        if stored.is_empty() {
            let outcome = self.repo.insert_row(&self.table, &record_to_row(incoming));
            check_write(outcome).map_err(|cause| StoreError::InsertFailed {
                key: incoming.key.clone(),
                cause,
            })?;
            return Ok(UpsertOutcome::Inserted);
        }

        let stored = record_from_row(&stored)
            .map_err(|err| lookup_failed(&incoming.key, LookupCause::Backend(err)))?;
        let merged = stored.merged_with(incoming, self.policy);
        let outcome = self
            .repo
            .replace_row(&self.table, &key, &record_to_row(&merged));
        check_write(outcome).map_err(|cause| StoreError::ReplaceFailed {
            key: incoming.key.clone(),
            cause,
        })?;
        Ok(UpsertOutcome::Merged)
    }

    /// Returns the raw bytes of the unit-price slot stored under `key`.
    ///
    /// # Errors
    /// - `LookupFailed` on backend error and when no row exists for `key`.
    pub fn read_by_key(&self, key: &str) -> StoreResult<Vec<u8>> {
        let started_at = Instant::now();
        let result = self.fetch_row(key).and_then(|row| {
            row.get(UNIT_PRICE_POSITION)
                .map(ColumnValue::to_bytes)
                .ok_or_else(|| {
                    lookup_failed(
                        key,
                        LookupCause::Backend(RepoError::InvalidData(format!(
                            "row in `{}` has no column at position {UNIT_PRICE_POSITION}",
                            self.table
                        ))),
                    )
                })
        });
        match &result {
            Ok(bytes) => emit!(
                self.logger,
                Level::Debug,
                "event=item_read module=service status=ok table={} key={} bytes={} duration_ms={}",
                self.table,
                key,
                bytes.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => self.log_failure("item_read", key, started_at, err),
        }
        result
    }

    /// Returns the full stored record, if any.
    ///
    /// Not reachable through call dispatch, which only exposes the unit-price slot.
    pub fn get_record(&self, key: &str) -> StoreResult<Option<ItemRecord>> {
        let row = self
            .repo
            .get_row(&self.table, &key_columns(key))
            .map_err(|err| lookup_failed(key, LookupCause::Backend(err)))?;
        if row.is_empty() {
            return Ok(None);
        }
        record_from_row(&row)
            .map(Some)
            .map_err(|err| lookup_failed(key, LookupCause::Backend(err)))
    }

    fn fetch_row(&self, key: &str) -> StoreResult<Row> {
        let row = self
            .repo
            .get_row(&self.table, &key_columns(key))
            .map_err(|err| lookup_failed(key, LookupCause::Backend(err)))?;
        if row.is_empty() {
            return Err(lookup_failed(key, LookupCause::RowNotFound));
        }
        Ok(row)
    }

    fn log_failure(&self, event: &str, key: &str, started_at: Instant, err: &StoreError) {
        emit!(
            self.logger,
            Level::Warn,
            "event={} module=service status=error table={} key={} duration_ms={} error_code={} error={}",
            event,
            self.table,
            key,
            started_at.elapsed().as_millis(),
            err.code(),
            sanitize_message(&err.to_string(), MAX_ERROR_DETAIL_CHARS)
        );
    }
}

fn key_columns(key: &str) -> [ColumnValue; 1] {
    [ColumnValue::from(key)]
}

fn lookup_failed(key: &str, cause: LookupCause) -> StoreError {
    StoreError::LookupFailed {
        key: key.to_string(),
        cause,
    }
}

fn check_write(outcome: RepoResult<WriteOutcome>) -> Result<(), WriteFailure> {
    match outcome {
        Ok(WriteOutcome::Applied) => Ok(()),
        Ok(WriteOutcome::NotApplied) => Err(WriteFailure::NotApplied),
        Err(err) => Err(WriteFailure::Backend(err)),
    }
}

fn record_to_row(record: &ItemRecord) -> Row {
    Row::new(vec![
        ColumnValue::from(record.key.as_str()),
        ColumnValue::from(record.unit_price.as_str()),
        ColumnValue::from(record.quantity.as_str()),
    ])
}

fn record_from_row(row: &Row) -> RepoResult<ItemRecord> {
    let text = |position: usize| {
        row.get(position)
            .and_then(ColumnValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RepoError::InvalidData(format!(
                    "expected string column at position {position} of item row"
                ))
            })
    };
    if row.columns.len() != 3 {
        return Err(RepoError::InvalidData(format!(
            "item row has {} column(s), expected 3",
            row.columns.len()
        )));
    }
    Ok(ItemRecord {
        key: text(0)?,
        unit_price: text(1)?,
        quantity: text(2)?,
    })
}
