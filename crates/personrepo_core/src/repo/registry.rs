//! Named queries compiled once per repository.
//!
//! # Invariants
//! - A derived query is keyed by its descriptor text.
//! - A registered statement has been prepared against the live schema.
//! - Registering an existing name replaces the previous entry.

use super::entity::Entity;
use super::{RepoError, RepoResult};
use crate::query::descriptor::DerivedQuery;
use crate::query::native::{NativeStatement, StatementKind};
use crate::query::value::ParamType;
use crate::query::{QueryError, QueryResult};
use log::debug;
use rusqlite::Connection;
use std::collections::HashMap;
use std::marker::PhantomData;

pub struct QueryRegistry<E> {
    derived: HashMap<String, DerivedQuery>,
    statements: HashMap<String, NativeStatement>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> QueryRegistry<E> {
    pub fn new() -> Self {
        Self {
            derived: HashMap::new(),
            statements: HashMap::new(),
            _entity: PhantomData,
        }
    }

    /// Compiles `descriptor` against `E`'s schema with declared parameter types.
    ///
    /// # Errors
    /// - Any [`QueryError`] from descriptor compilation.
    pub fn register_derived(&mut self, descriptor: &str, params: &[ParamType]) -> QueryResult<()> {
        let query = DerivedQuery::compile(E::schema(), descriptor, params)?;
        debug!(
            "event=query_register module=repo kind=derived entity={} name={descriptor} params={}",
            E::schema().name,
            params.len()
        );
        self.derived.insert(descriptor.to_string(), query);
        Ok(())
    }

    /// Stores `statement` under `name` after preparing it on `conn`.
    ///
    /// # Errors
    /// - [`RepoError::QuerySyntax`] when storage rejects the statement text.
    /// - `ShapeMismatch` when a read statement writes, or a modifying one does not.
    pub fn register_statement(
        &mut self,
        conn: &Connection,
        name: &str,
        statement: NativeStatement,
    ) -> RepoResult<()> {
        let prepared = conn
            .prepare_cached(statement.sql())
            .map_err(|err| RepoError::from_prepare(statement.sql(), err))?;
        let modifying = statement.kind() == StatementKind::Modifying;
        if prepared.readonly() == modifying {
            return Err(QueryError::ShapeMismatch {
                query: name.to_string(),
                expected: if modifying {
                    "modifying statement"
                } else {
                    "read-only statement"
                },
            }
            .into());
        }
        debug!(
            "event=query_register module=repo kind={} entity={} name={name}",
            statement.kind().label(),
            E::schema().name
        );
        self.statements.insert(name.to_string(), statement);
        Ok(())
    }

    pub fn derived(&self, descriptor: &str) -> QueryResult<&DerivedQuery> {
        self.derived
            .get(descriptor)
            .ok_or_else(|| QueryError::UnknownQuery(descriptor.to_string()))
    }

    pub fn statement(&self, name: &str) -> QueryResult<&NativeStatement> {
        self.statements
            .get(name)
            .ok_or_else(|| QueryError::UnknownQuery(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.derived.len() + self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: Entity> Default for QueryRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::QueryRegistry;
    use crate::db::open_db_in_memory;
    use crate::query::native::NativeStatement;
    use crate::query::value::{ParamType, ValueKind};
    use crate::query::QueryError;
    use crate::repo::RepoError;
    use crate::Person;

    #[test]
    fn derived_queries_are_looked_up_by_descriptor() {
        let mut registry = QueryRegistry::<Person>::new();
        registry
            .register_derived("getByLastName", &[ParamType::Scalar(ValueKind::Text)])
            .unwrap();
        assert!(registry.derived("getByLastName").is_ok());
        assert_eq!(
            registry.derived("getByEmail").unwrap_err(),
            QueryError::UnknownQuery("getByEmail".to_string())
        );
    }

    #[test]
    fn statements_referencing_unknown_columns_fail_at_registration() {
        let conn = open_db_in_memory().unwrap();
        let mut registry = QueryRegistry::<Person>::new();
        let statement = NativeStatement::scalar("SELECT COUNT(nickname) FROM tbl_person").unwrap();
        let err = registry
            .register_statement(&conn, "countNicknames", statement)
            .unwrap_err();
        assert!(matches!(err, RepoError::QuerySyntax { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn read_statements_must_not_write() {
        let conn = open_db_in_memory().unwrap();
        let mut registry = QueryRegistry::<Person>::new();
        let statement = NativeStatement::rows("DELETE FROM tbl_person").unwrap();
        let err = registry
            .register_statement(&conn, "purge", statement)
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::Query(QueryError::ShapeMismatch {
                expected: "read-only statement",
                ..
            })
        ));
    }
}
