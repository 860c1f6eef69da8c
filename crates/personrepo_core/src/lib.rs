//! Typed repository layer over SQLite for persons and their addresses.
//! This crate is the single source of truth for persistence invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig};
pub use db::{
    open_db, open_db_in_memory, open_db_with_config, run_in_transaction, DbError, DbResult,
    ExecutionContext, TxMode,
};
pub use logging::{
    default_log_level, init_logging, init_logging_from_config, logging_status, LoggingError,
};
pub use model::address::Address;
pub use model::person::Person;
pub use model::{EntityId, ValidationError};
pub use query::native::{NativeParams, NativeStatement, StatementKind};
pub use query::page::{Direction, Order, Page, PageRequest, Sort};
pub use query::predicate::{Criteria, Predicate, Root, Specification};
pub use query::value::{ParamType, Value, ValueKind};
pub use query::{QueryError, QueryResult};
pub use repo::entity::{Entity, LoadStrategy};
pub use repo::person_repo::{PersonRepository, SqliteAddressRepository, SqlitePersonRepository};
pub use repo::sqlite_repo::{CrudRepository, RowSet, SqliteRepository};
pub use repo::{RepoError, RepoResult};
pub use service::person_service::PersonService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
