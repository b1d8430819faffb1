//! Connection bootstrap utilities for SQLite.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and the configured busy timeout.
//! - Returned connections carry a verified backend catalog.

use super::catalog::ensure_catalog;
use super::DbResult;
use crate::logging::{emit, sanitize_message, CoreLogger, MAX_ERROR_DETAIL_CHARS};
use log::Level;
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DbOptions {
    /// How long a writer waits for the database lock before failing.
    pub busy_timeout: Duration,
}

impl Default for DbOptions {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }
}

/// Opens a SQLite database file and bootstraps the backend catalog.
///
/// # Side effects
/// - Creates the file when missing.
/// - Emits `db_open` events with duration and status.
pub fn open_db(
    path: impl AsRef<Path>,
    options: &DbOptions,
    logger: &CoreLogger,
) -> DbResult<Connection> {
    open_with("file", options, logger, || Connection::open(path))
}

/// Opens an in-memory SQLite database with a fresh catalog.
pub fn open_db_in_memory(logger: &CoreLogger) -> DbResult<Connection> {
    open_with("memory", &DbOptions::default(), logger, Connection::open_in_memory)
}

fn open_with(
    mode: &str,
    options: &DbOptions,
    logger: &CoreLogger,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    emit!(
        logger,
        Level::Info,
        "event=db_open module=db status=start mode={}",
        mode
    );

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            emit!(
                logger,
                Level::Error,
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                sanitize_message(&err.to_string(), MAX_ERROR_DETAIL_CHARS)
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, options) {
        Ok(()) => {
            emit!(
                logger,
                Level::Info,
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            emit!(
                logger,
                Level::Error,
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                sanitize_message(&err.to_string(), MAX_ERROR_DETAIL_CHARS)
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, options: &DbOptions) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(options.busy_timeout)?;
    ensure_catalog(conn)?;
    Ok(())
}
