//! Core logging bootstrap and the injected logger handle.
//!
//! # Responsibility
//! - Build file-based rolling loggers without installing a process-global logger.
//! - Hand every component a cloneable `CoreLogger` at construction time.
//! - Emit stable, metadata-only diagnostic events from core.
//!
//! # Invariants
//! - Logging initialization must not panic.
//! - Event lines carry identifiers (table, key, function), never value payloads.
//! - The lifetime of file logging is the lifetime of its `LoggingHandle`.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{Level, Log, Metadata, Record};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const LOG_FILE_BASENAME: &str = "brickstore";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
pub(crate) const MAX_ERROR_DETAIL_CHARS: usize = 160;

/// Emits one event line through a `CoreLogger`, tagged with the caller's module path.
macro_rules! emit {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.emit($level, module_path!(), format_args!($($arg)+))
    };
}
pub(crate) use emit;

/// Cloneable logging capability passed into core components.
///
/// Wraps any `log::Log` sink. Nothing in core reaches for `log::logger()`;
/// whoever builds a component decides where its events go.
#[derive(Clone)]
pub struct CoreLogger {
    sink: Arc<dyn Log>,
}

impl CoreLogger {
    /// Wraps an arbitrary sink.
    pub fn new(sink: Arc<dyn Log>) -> Self {
        Self { sink }
    }

    /// Logger that drops every event.
    pub fn discard() -> Self {
        Self::new(Arc::new(DiscardLog))
    }

    /// Sends one event to the sink if the sink accepts `level` for `target`.
    pub fn emit(&self, level: Level, target: &str, args: fmt::Arguments<'_>) {
        let metadata = Metadata::builder().level(level).target(target).build();
        if !self.sink.enabled(&metadata) {
            return;
        }
        self.sink.log(
            &Record::builder()
                .metadata(metadata)
                .module_path(Some(target))
                .args(args)
                .build(),
        );
    }

    pub fn flush(&self) {
        self.sink.flush();
    }
}

impl Default for CoreLogger {
    fn default() -> Self {
        Self::discard()
    }
}

impl fmt::Debug for CoreLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreLogger").finish_non_exhaustive()
    }
}

struct DiscardLog;

impl Log for DiscardLog {
    fn enabled(&self, _metadata: &Metadata<'_>) -> bool {
        false
    }

    fn log(&self, _record: &Record<'_>) {}

    fn flush(&self) {}
}

/// Active file logging session.
///
/// Dropping the handle stops the background flusher; call `shutdown` to make
/// sure buffered lines reach disk first.
pub struct LoggingHandle {
    level: &'static str,
    log_dir: PathBuf,
    logger: CoreLogger,
    handle: LoggerHandle,
}

impl LoggingHandle {
    pub fn level(&self) -> &'static str {
        self.level
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Returns the capability to inject into components.
    pub fn logger(&self) -> CoreLogger {
        self.logger.clone()
    }

    /// Flushes buffered lines and ends the logging session.
    pub fn shutdown(self) {
        emit!(
            self.logger,
            Level::Info,
            "event=core_shutdown module=core status=ok"
        );
        self.logger.flush();
        self.handle.shutdown();
    }
}

impl fmt::Debug for LoggingHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoggingHandle")
            .field("level", &self.level)
            .field("log_dir", &self.log_dir)
            .finish_non_exhaustive()
    }
}

/// Starts rolling file logging with level and directory.
///
/// Returns a handle owning the session, or a human-readable error string
/// when initialization fails. Several sessions may coexist in one process.
///
/// # Errors
/// - Returns an error when `level` is unsupported.
/// - Returns an error when `log_dir` is empty, non-absolute, or cannot be created.
/// - Returns an error when logger backend setup fails.
pub fn init_logging(level: &str, log_dir: &str) -> Result<LoggingHandle, String> {
    let level = normalize_level(level)?;
    let log_dir = normalize_log_dir(log_dir)?;

    std::fs::create_dir_all(&log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            log_dir.display()
        )
    })?;

    let (sink, handle) = Logger::try_with_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .build()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    let logger = CoreLogger::new(Arc::from(sink));
    emit!(
        logger,
        Level::Info,
        "event=app_start module=core status=ok platform={} build_mode={} version={}",
        std::env::consts::OS,
        build_mode(),
        env!("CARGO_PKG_VERSION")
    );
    emit!(
        logger,
        Level::Info,
        "event=core_init module=core status=ok level={} log_dir={}",
        level,
        log_dir.display()
    );

    Ok(LoggingHandle {
        level,
        log_dir,
        logger,
        handle,
    })
}

/// Returns the default log level for current build mode.
///
/// - `debug` builds -> `debug`
/// - `release` builds -> `info`
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub(crate) fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be an absolute path, got `{trimmed}`"));
    }
    Ok(path.to_path_buf())
}

fn build_mode() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

/// Flattens backend error text onto one bounded line for `error=` fields.
pub(crate) fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}
