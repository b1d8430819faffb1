//! Call decoding and transactional dispatch.
//!
//! # Responsibility
//! - Decode a `(kind, function, args)` call into a typed `Command` once.
//! - Run each command inside exactly one SQLite transaction.
//!
//! # Invariants
//! - Function names match exactly and case-sensitively.
//! - Write calls take the database write lock (`BEGIN IMMEDIATE`) before
//!   their lookup, so read-modify-write on one key never interleaves.
//! - Query calls never commit.

use crate::config::StoreConfig;
use crate::db::DbError;
use crate::logging::{emit, sanitize_message, CoreLogger, MAX_ERROR_DETAIL_CHARS};
use crate::model::record::{ItemRecord, MergePolicy, ITEM_TABLE};
use crate::repo::table_repo::SqliteTableRepository;
use crate::service::error::{expect_arity, StoreError, StoreResult};
use crate::service::item_service::ItemService;
use crate::service::schema_service::SchemaService;
use log::Level;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

pub const FN_INIT: &str = "init";
pub const FN_INSERT_ITEM: &str = "insertItem";
pub const FN_READ_ITEM: &str = "readItem";

/// Entry point a call arrived through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Deployment-time initialization; the function name is ignored.
    Init,
    /// State-changing call.
    Invoke,
    /// Read-only call.
    Query,
}

impl CallKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Invoke => "invoke",
            Self::Query => "query",
        }
    }
}

/// Function name plus ordered string arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallContext {
    pub kind: CallKind,
    pub function: String,
    pub args: Vec<String>,
}

impl CallContext {
    pub fn init(args: Vec<String>) -> Self {
        Self {
            kind: CallKind::Init,
            function: FN_INIT.to_string(),
            args,
        }
    }

    pub fn invoke(function: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind: CallKind::Invoke,
            function: function.into(),
            args,
        }
    }

    pub fn query(function: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind: CallKind::Query,
            function: function.into(),
            args,
        }
    }
}

/// Typed form of a call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Initialize,
    Upsert(ItemRecord),
    ReadByKey(String),
    Unknown(String),
}

impl Command {
    /// Decodes a call, checking argument arity for known functions.
    ///
    /// Unknown names decode to `Command::Unknown` without an arity check.
    pub fn decode(call: &CallContext) -> StoreResult<Self> {
        match (call.kind, call.function.as_str()) {
            (CallKind::Init, _) | (CallKind::Invoke, FN_INIT) => {
                expect_arity(&call.function, &call.args, 0)?;
                Ok(Self::Initialize)
            }
            (CallKind::Invoke, FN_INSERT_ITEM) => {
                expect_arity(&call.function, &call.args, 3)?;
                Ok(Self::Upsert(ItemRecord::new(
                    call.args[0].as_str(),
                    call.args[1].as_str(),
                    call.args[2].as_str(),
                )))
            }
            (CallKind::Query, FN_READ_ITEM) => {
                expect_arity(&call.function, &call.args, 1)?;
                Ok(Self::ReadByKey(call.args[0].clone()))
            }
            (_, other) => Ok(Self::Unknown(other.to_string())),
        }
    }

    /// Whether the command never writes. Unknown calls write nothing either.
    fn is_read_only(&self) -> bool {
        matches!(self, Self::ReadByKey(_) | Self::Unknown(_))
    }
}

pub type DispatchResult<T> = Result<T, DispatchError>;

#[derive(Debug)]
pub enum DispatchError {
    /// No operation is registered under this name for the call kind.
    UnknownFunction { kind: CallKind, function: String },
    Store(StoreError),
    /// Transaction begin/commit failed.
    Db(DbError),
}

impl Display for DispatchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownFunction { kind, function } => write!(
                f,
                "received unknown function {} `{function}`",
                kind.as_str()
            ),
            Self::Store(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for DispatchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::UnknownFunction { .. } => None,
            Self::Store(err) => Some(err),
            Self::Db(err) => Some(err),
        }
    }
}

impl From<StoreError> for DispatchError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

impl From<DbError> for DispatchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for DispatchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl DispatchError {
    fn code(&self) -> &'static str {
        match self {
            Self::UnknownFunction { .. } => "unknown_function",
            Self::Store(err) => err.code(),
            Self::Db(_) => "transaction_failed",
        }
    }
}

/// Routes decoded calls to the schema manager or the item engine.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: String,
    policy: MergePolicy,
    logger: CoreLogger,
}

impl Dispatcher {
    /// Dispatcher over the default item table with accumulating merges.
    pub fn new(logger: CoreLogger) -> Self {
        Self {
            table: ITEM_TABLE.to_string(),
            policy: MergePolicy::default(),
            logger,
        }
    }

    pub fn from_config(config: &StoreConfig, logger: CoreLogger) -> Self {
        Self {
            table: config.table_name.clone(),
            policy: config.merge_policy,
            logger,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Decodes and runs one call in its own transaction.
    ///
    /// Returns an empty payload for init/upsert and the unit-price bytes for reads.
    /// Any error rolls the transaction back.
    pub fn invoke(&self, conn: &mut Connection, call: &CallContext) -> DispatchResult<Vec<u8>> {
        let started_at = Instant::now();
        let call_id = Uuid::new_v4();
        let result = self.run(conn, call);
        match &result {
            Ok(payload) => emit!(
                self.logger,
                Level::Info,
                "event=dispatch module=dispatch status=ok call_id={} kind={} function={} args={} payload_bytes={} duration_ms={}",
                call_id,
                call.kind.as_str(),
                call.function,
                call.args.len(),
                payload.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => emit!(
                self.logger,
                Level::Warn,
                "event=dispatch module=dispatch status=error call_id={} kind={} function={} args={} duration_ms={} error_code={} error={}",
                call_id,
                call.kind.as_str(),
                call.function,
                call.args.len(),
                started_at.elapsed().as_millis(),
                err.code(),
                sanitize_message(&err.to_string(), MAX_ERROR_DETAIL_CHARS)
            ),
        }
        result
    }

    fn run(&self, conn: &mut Connection, call: &CallContext) -> DispatchResult<Vec<u8>> {
        let command = Command::decode(call)?;
        let read_only = command.is_read_only();
        let behavior = if read_only {
            TransactionBehavior::Deferred
        } else {
            TransactionBehavior::Immediate
        };
        let tx = conn.transaction_with_behavior(behavior)?;
        let payload = self.execute(&tx, call.kind, command)?;
        if !read_only {
            tx.commit()?;
        }
        // Read-only transactions roll back on drop.
        Ok(payload)
    }

    fn execute(
        &self,
        tx: &Transaction<'_>,
        kind: CallKind,
        command: Command,
    ) -> DispatchResult<Vec<u8>> {
        let repo = SqliteTableRepository::new(tx);
        match command {
            Command::Initialize => {
                SchemaService::new(repo, self.table.as_str(), self.logger.clone()).initialize()?;
                Ok(Vec::new())
            }
            Command::Upsert(record) => {
                ItemService::new(repo, self.table.as_str(), self.logger.clone())
                    .with_merge_policy(self.policy)
                    .upsert(&record)?;
                Ok(Vec::new())
            }
            Command::ReadByKey(key) => Ok(ItemService::new(
                repo,
                self.table.as_str(),
                self.logger.clone(),
            )
            .read_by_key(&key)?),
            Command::Unknown(function) => Err(DispatchError::UnknownFunction { kind, function }),
        }
    }
}
