//! Repository layer: entity mapping, query registry and SQLite façades.
//!
//! # Responsibility
//! - Offer CRUD, derived queries, literal statements and paging for any
//!   [`entity::Entity`].
//! - Translate storage failures into semantic [`RepoError`] variants.
//!
//! # Invariants
//! - Write paths call `Entity::validate()` before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Reads never mutate storage.

use crate::db::DbError;
use crate::model::{EntityId, ValidationError};
use crate::query::QueryError;
use rusqlite::ErrorCode;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod entity;
pub mod person_repo;
pub mod registry;
pub mod sqlite_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors surfaced by repository and service operations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    Query(QueryError),
    Validation(ValidationError),
    NotFound {
        entity: &'static str,
        id: EntityId,
    },
    /// A single-result query matched more than one row.
    NonUniqueResult {
        query: String,
        count: usize,
    },
    /// Constraint breach reported by storage (FK, NOT NULL, unique).
    Integrity(rusqlite::Error),
    /// Statement text rejected by storage.
    QuerySyntax {
        sql: String,
        source: rusqlite::Error,
    },
    /// Storage unreachable, locked or failing at the I/O level.
    Connectivity(rusqlite::Error),
    /// Modifying statement issued outside a read-write transaction.
    TransactionRequired(String),
    /// Write attempted inside a read-only transaction.
    ReadOnlyTransaction,
    /// Persisted data cannot be converted to a valid entity.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Query(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::NonUniqueResult { query, count } => write!(
                f,
                "query `{query}` expected at most one result, found {count}"
            ),
            Self::Integrity(err) => write!(f, "integrity constraint violated: {err}"),
            Self::QuerySyntax { sql, source } => {
                write!(f, "malformed statement `{sql}`: {source}")
            }
            Self::Connectivity(err) => write!(f, "storage unavailable: {err}"),
            Self::TransactionRequired(operation) => {
                write!(f, "`{operation}` requires an active read-write transaction")
            }
            Self::ReadOnlyTransaction => write!(f, "write rejected inside read-only transaction"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Query(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Integrity(err) | Self::Connectivity(err) => Some(err),
            Self::QuerySyntax { source, .. } => Some(source),
            Self::NotFound { .. }
            | Self::NonUniqueResult { .. }
            | Self::TransactionRequired(_)
            | Self::ReadOnlyTransaction
            | Self::InvalidData(_)
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<QueryError> for RepoError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => Self::from(err),
            DbError::ReadOnlyTransaction { .. } => Self::ReadOnlyTransaction,
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match value.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => Self::Integrity(value),
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::SystemIoFailure
                | ErrorCode::DatabaseCorrupt,
            ) => Self::Connectivity(value),
            _ => Self::Db(DbError::Sqlite(value)),
        }
    }
}

impl RepoError {
    /// Classifies a failure from `Connection::prepare`; storage-level causes
    /// keep their class, everything else is a syntax error in `sql`.
    pub(crate) fn from_prepare(sql: &str, err: rusqlite::Error) -> Self {
        match Self::from(err) {
            Self::Db(DbError::Sqlite(source)) => Self::QuerySyntax {
                sql: sql.to_string(),
                source,
            },
            other => other,
        }
    }
}
