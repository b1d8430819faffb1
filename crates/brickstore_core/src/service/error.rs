//! Error taxonomy shared by the schema manager and the item engine.

use crate::repo::table_repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Terminal failure of one store operation.
#[derive(Debug)]
pub enum StoreError {
    /// Wrong number of call arguments.
    InvalidArgument {
        function: String,
        expected: usize,
        actual: usize,
    },
    /// The backend refused to create the table.
    SchemaCreationFailed { table: String, source: RepoError },
    /// The row could not be read: backend fault or no such row.
    LookupFailed { key: String, cause: LookupCause },
    InsertFailed { key: String, cause: WriteFailure },
    ReplaceFailed { key: String, cause: WriteFailure },
}

/// Why a lookup failed. Both causes surface as `StoreError::LookupFailed`.
#[derive(Debug)]
pub enum LookupCause {
    Backend(RepoError),
    RowNotFound,
}

/// Why a row write failed.
#[derive(Debug)]
pub enum WriteFailure {
    Backend(RepoError),
    /// The backend returned without error but did not apply the write.
    NotApplied,
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument {
                function,
                expected,
                actual,
            } => write!(
                f,
                "incorrect number of arguments for `{function}`: expected {expected}, got {actual}"
            ),
            Self::SchemaCreationFailed { table, source } => {
                write!(f, "failed creating table `{table}`: {source}")
            }
            Self::LookupFailed { key, cause } => {
                write!(f, "failed retrieving row for key `{key}`: {cause}")
            }
            Self::InsertFailed { key, cause } => {
                write!(f, "failed inserting row for key `{key}`: {cause}")
            }
            Self::ReplaceFailed { key, cause } => {
                write!(f, "failed replacing row for key `{key}`: {cause}")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidArgument { .. } => None,
            Self::SchemaCreationFailed { source, .. } => Some(source),
            Self::LookupFailed { cause, .. } => match cause {
                LookupCause::Backend(err) => Some(err),
                LookupCause::RowNotFound => None,
            },
            Self::InsertFailed { cause, .. } | Self::ReplaceFailed { cause, .. } => match cause {
                WriteFailure::Backend(err) => Some(err),
                WriteFailure::NotApplied => None,
            },
        }
    }
}

impl Display for LookupCause {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "{err}"),
            Self::RowNotFound => write!(f, "row not found"),
        }
    }
}

impl Display for WriteFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "{err}"),
            Self::NotApplied => write!(f, "backend did not apply the write"),
        }
    }
}

impl StoreError {
    /// Stable `error_code` value for log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::SchemaCreationFailed { .. } => "schema_creation_failed",
            Self::LookupFailed { .. } => "lookup_failed",
            Self::InsertFailed { .. } => "insert_failed",
            Self::ReplaceFailed { .. } => "replace_failed",
        }
    }
}

/// Checks that a call supplied exactly `expected` arguments.
pub fn expect_arity(function: &str, args: &[String], expected: usize) -> StoreResult<()> {
    if args.len() != expected {
        return Err(StoreError::InvalidArgument {
            function: function.to_string(),
            expected,
            actual: args.len(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{expect_arity, LookupCause, StoreError, WriteFailure};
    use crate::repo::table_repo::RepoError;
    use std::error::Error;

    #[test]
    fn arity_mismatch_reports_expected_and_actual() {
        let args = vec!["a".to_string(), "b".to_string()];
        let err = expect_arity("insertItem", &args, 3).unwrap_err();
        assert!(matches!(
            err,
            StoreError::InvalidArgument {
                expected: 3,
                actual: 2,
                ..
            }
        ));
        assert!(err.to_string().contains("`insertItem`"));
        assert!(expect_arity("readItem", &args[..1], 1).is_ok());
    }

    #[test]
    fn backend_causes_are_exposed_as_error_source() {
        let err = StoreError::LookupFailed {
            key: "A".to_string(),
            cause: LookupCause::Backend(RepoError::TableNotFound("Brick_Item".to_string())),
        };
        assert!(err.source().is_some());
        assert!(err.to_string().contains("does not exist"));

        let not_applied = StoreError::InsertFailed {
            key: "A".to_string(),
            cause: WriteFailure::NotApplied,
        };
        assert!(not_applied.source().is_none());
        assert_eq!(not_applied.code(), "insert_failed");
    }
}
