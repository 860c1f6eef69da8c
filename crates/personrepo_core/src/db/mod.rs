//! SQLite storage bootstrap, schema migrations and units of work.
//!
//! # Responsibility
//! - Open and configure SQLite connections for the repository layer.
//! - Apply schema migrations in deterministic order.
//! - Carry the active transaction through an explicit [`ExecutionContext`].
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Entity tables are never touched before migrations succeed.
//! - Nested transactional scopes join the outermost transaction.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod context;
pub mod migrations;
mod open;
mod transaction;

pub use context::{ExecutionContext, TxMode};
pub use open::{open_db, open_db_in_memory, open_db_with_config};
pub use transaction::run_in_transaction;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// A joined scope failed, so the outer commit was turned into a rollback.
    RollbackOnly {
        tx_id: uuid::Uuid,
    },
    ReadOnlyTransaction {
        tx_id: uuid::Uuid,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "database schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::RollbackOnly { tx_id } => write!(
                f,
                "transaction {tx_id} was marked rollback-only by a failed inner scope"
            ),
            Self::ReadOnlyTransaction { tx_id } => {
                write!(f, "transaction {tx_id} is read-only")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. }
            | Self::RollbackOnly { .. }
            | Self::ReadOnlyTransaction { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
