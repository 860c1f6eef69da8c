//! Generic SQLite repository over any [`Entity`].
//!
//! # Responsibility
//! - Provide CRUD, paging and specification filtering for one entity type.
//! - Execute registered derived queries and literal statements.
//!
//! # Invariants
//! - Every call runs through the caller's [`ExecutionContext`].
//! - Writes are rejected up front inside read-only transactions.
//! - Modifying statements only run inside a read-write transaction.
//! - A page count and its slice are read inside one read-only scope.

use super::entity::{Entity, LoadStrategy};
use super::registry::QueryRegistry;
use super::{RepoError, RepoResult};
use crate::db::migrations::latest_version;
use crate::db::{run_in_transaction, ExecutionContext, TxMode};
use crate::model::EntityId;
use crate::query::descriptor::{DerivedQuery, QueryAction};
use crate::query::native::{NativeParams, NativeStatement, StatementKind};
use crate::query::page::{Direction, Page, PageRequest, Sort};
use crate::query::predicate::{CompareOp, Criteria, Predicate, Root, Specification};
use crate::query::schema::{EntitySchema, ResolvedPath};
use crate::query::sql::{render_count, render_select, resolve_sort, SelectSpec};
use crate::query::value::{ParamType, Value};
use crate::query::QueryError;
use log::debug;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;

/// CRUD and paging contract shared by every entity repository.
pub trait CrudRepository<E: Entity> {
    fn get_by_id(
        &self,
        ctx: &ExecutionContext<'_>,
        id: EntityId,
        load: LoadStrategy,
    ) -> RepoResult<Option<E>>;

    /// Every row, ordered by `sort` then primary key.
    fn get_all(
        &self,
        ctx: &ExecutionContext<'_>,
        sort: &Sort,
        load: LoadStrategy,
    ) -> RepoResult<Vec<E>>;

    fn exists_by_id(&self, ctx: &ExecutionContext<'_>, id: EntityId) -> RepoResult<bool>;

    fn count(&self, ctx: &ExecutionContext<'_>) -> RepoResult<u64>;

    /// Inserts or updates `entity` and returns it with identity assigned.
    ///
    /// An entity carrying an identity that is not stored yet is inserted
    /// with that identity.
    fn save(&self, ctx: &ExecutionContext<'_>, entity: E) -> RepoResult<E>;

    /// Saves `entity` and returns the state read back through `ctx`.
    fn save_and_flush(&self, ctx: &ExecutionContext<'_>, entity: E) -> RepoResult<E>;

    /// Saves every entity inside one transaction; nothing persists on failure.
    fn save_all(&self, ctx: &ExecutionContext<'_>, entities: Vec<E>) -> RepoResult<Vec<E>>;

    fn delete(&self, ctx: &ExecutionContext<'_>, id: EntityId) -> RepoResult<()>;

    fn find_all_paged(
        &self,
        ctx: &ExecutionContext<'_>,
        request: &PageRequest,
        load: LoadStrategy,
    ) -> RepoResult<Page<E>>;

    /// One page of rows matching `spec`.
    fn find_all(
        &self,
        ctx: &ExecutionContext<'_>,
        spec: &dyn Specification<E>,
        request: &PageRequest,
        load: LoadStrategy,
    ) -> RepoResult<Page<E>>;

    fn find_all_matching(
        &self,
        ctx: &ExecutionContext<'_>,
        predicate: &Predicate,
        sort: &Sort,
        load: LoadStrategy,
    ) -> RepoResult<Vec<E>>;
}

/// Untyped result of a literal statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value at `row`, `column` (by name, case-insensitive).
    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let index = self
            .columns
            .iter()
            .position(|candidate| candidate.eq_ignore_ascii_case(column))?;
        self.rows.get(row).and_then(|values| values.get(index))
    }
}

/// SQLite repository holding the compiled queries for `E`.
pub struct SqliteRepository<E> {
    registry: QueryRegistry<E>,
}

impl<E: Entity> SqliteRepository<E> {
    /// Creates a repository after checking `conn` carries the migrated schema.
    pub fn try_new(conn: &Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, E::schema())?;
        Ok(Self {
            registry: QueryRegistry::new(),
        })
    }

    pub fn registry(&self) -> &QueryRegistry<E> {
        &self.registry
    }

    /// Compiles and stores a method-style descriptor.
    pub fn register_derived(&mut self, descriptor: &str, params: &[ParamType]) -> RepoResult<()> {
        self.registry.register_derived(descriptor, params)?;
        Ok(())
    }

    /// Parses, prepares and stores a literal statement under `name`.
    pub fn register_statement(
        &mut self,
        conn: &Connection,
        name: &str,
        kind: StatementKind,
        source: &str,
    ) -> RepoResult<()> {
        let statement = NativeStatement::parse(kind, source)?;
        self.registry.register_statement(conn, name, statement)
    }

    /// Single result of a derived find; `Ok(None)` on zero rows.
    ///
    /// # Errors
    /// - [`RepoError::NonUniqueResult`] when more than one row matches.
    pub fn find_one_derived(
        &self,
        ctx: &ExecutionContext<'_>,
        descriptor: &str,
        args: &[Value],
        load: LoadStrategy,
    ) -> RepoResult<Option<E>> {
        let query = self.find_query(descriptor)?;
        let predicate = query.bind(args)?;
        let limit = query.limit().map(u64::from);
        run_in_transaction(ctx, TxMode::ReadOnly, |tx| -> RepoResult<Option<E>> {
            let mut rows = self.select(tx, predicate.as_ref(), query.orders(), load, limit, 0)?;
            if rows.len() > 1 {
                let matched = self.count_where(tx, predicate.as_ref())?;
                let matched = limit.map_or(matched, |limit| matched.min(limit));
                return Err(RepoError::NonUniqueResult {
                    query: descriptor.to_string(),
                    count: usize::try_from(matched).unwrap_or(usize::MAX),
                });
            }
            Ok(rows.pop())
        })
    }

    pub fn find_list_derived(
        &self,
        ctx: &ExecutionContext<'_>,
        descriptor: &str,
        args: &[Value],
        load: LoadStrategy,
    ) -> RepoResult<Vec<E>> {
        let query = self.find_query(descriptor)?;
        let predicate = query.bind(args)?;
        self.select(
            ctx,
            predicate.as_ref(),
            query.orders(),
            load,
            query.limit().map(u64::from),
            0,
        )
    }

    /// Derived find paged by `request`; descriptor ordering comes first.
    ///
    /// # Errors
    /// - `ShapeMismatch` for descriptors carrying a `First`/`Top` limit.
    pub fn find_page_derived(
        &self,
        ctx: &ExecutionContext<'_>,
        descriptor: &str,
        args: &[Value],
        request: &PageRequest,
        load: LoadStrategy,
    ) -> RepoResult<Page<E>> {
        request.validate()?;
        let query = self.find_query(descriptor)?;
        if query.limit().is_some() {
            return Err(QueryError::ShapeMismatch {
                query: descriptor.to_string(),
                expected: "unlimited find",
            }
            .into());
        }
        let predicate = query.bind(args)?;
        let mut orders = query.orders().to_vec();
        orders.extend(resolve_sort(E::schema(), &request.sort)?);
        self.page_where(ctx, predicate.as_ref(), &orders, request, load)
    }

    pub fn count_derived(
        &self,
        ctx: &ExecutionContext<'_>,
        descriptor: &str,
        args: &[Value],
    ) -> RepoResult<u64> {
        let query = self.registry.derived(descriptor)?;
        if query.action() != QueryAction::Count {
            return Err(QueryError::ShapeMismatch {
                query: descriptor.to_string(),
                expected: "count",
            }
            .into());
        }
        let predicate = query.bind(args)?;
        self.count_where(ctx, predicate.as_ref())
    }

    /// Rows of a registered entity statement mapped with deferred relations.
    pub fn query_entities(
        &self,
        ctx: &ExecutionContext<'_>,
        name: &str,
        params: &NativeParams,
    ) -> RepoResult<Vec<E>> {
        let statement = self.statement(name, StatementKind::Entities)?;
        let values = statement.bind(params)?;
        map_entities(ctx, statement.sql(), values, LoadStrategy::Deferred)
    }

    /// Single row of a registered entity statement; `Ok(None)` on zero rows.
    pub fn query_one(
        &self,
        ctx: &ExecutionContext<'_>,
        name: &str,
        params: &NativeParams,
    ) -> RepoResult<Option<E>> {
        let mut rows = self.query_entities(ctx, name, params)?;
        if rows.len() > 1 {
            return Err(RepoError::NonUniqueResult {
                query: name.to_string(),
                count: rows.len(),
            });
        }
        Ok(rows.pop())
    }

    /// First column of the first row; `Ok(None)` when no row is returned.
    pub fn query_scalar(
        &self,
        ctx: &ExecutionContext<'_>,
        name: &str,
        params: &NativeParams,
    ) -> RepoResult<Option<Value>> {
        let statement = self.statement(name, StatementKind::Scalar)?;
        let values = statement.bind(params)?;
        let mut stmt = prepare(ctx.conn(), statement.sql())?;
        let mut rows = stmt.query(params_from_iter(values))?;
        match rows.next()? {
            Some(row) => Ok(Some(Value::from_sql(row.get::<_, SqlValue>(0)?))),
            None => Ok(None),
        }
    }

    pub fn query_rows(
        &self,
        ctx: &ExecutionContext<'_>,
        name: &str,
        params: &NativeParams,
    ) -> RepoResult<RowSet> {
        let statement = self.statement(name, StatementKind::Rows)?;
        let values = statement.bind(params)?;
        collect_rows(ctx, statement.sql(), values)
    }

    /// Runs a registered `UPDATE`/`DELETE` and returns the affected row count.
    ///
    /// # Errors
    /// - [`RepoError::TransactionRequired`] outside a transaction.
    /// - [`RepoError::ReadOnlyTransaction`] inside a read-only transaction.
    pub fn execute_modifying(
        &self,
        ctx: &ExecutionContext<'_>,
        name: &str,
        params: &NativeParams,
    ) -> RepoResult<usize> {
        let statement = self.statement(name, StatementKind::Modifying)?;
        require_write_transaction(ctx, name)?;
        let values = statement.bind(params)?;
        let mut stmt = prepare(ctx.conn(), statement.sql())?;
        let changed = stmt.execute(params_from_iter(values))?;
        debug!(
            "event=statement_execute module=repo entity={} name={name} changed={changed}",
            E::schema().name
        );
        Ok(changed)
    }

    /// Runs an unregistered statement.
    ///
    /// Statements that write follow the same transaction rules as
    /// [`Self::execute_modifying`].
    pub fn execute_native(
        &self,
        ctx: &ExecutionContext<'_>,
        sql: &str,
        params: &NativeParams,
    ) -> RepoResult<RowSet> {
        let statement = NativeStatement::rows(sql)?;
        let values = statement.bind(params)?;
        let writes = !prepare(ctx.conn(), statement.sql())?.readonly();
        if writes {
            require_write_transaction(ctx, sql)?;
        }
        collect_rows(ctx, statement.sql(), values)
    }

    fn find_query(&self, descriptor: &str) -> RepoResult<&DerivedQuery> {
        let query = self.registry.derived(descriptor)?;
        if query.action() != QueryAction::Find {
            return Err(QueryError::ShapeMismatch {
                query: descriptor.to_string(),
                expected: "entity",
            }
            .into());
        }
        Ok(query)
    }

    fn statement(&self, name: &str, kind: StatementKind) -> RepoResult<&NativeStatement> {
        let statement = self.registry.statement(name)?;
        if statement.kind() != kind {
            return Err(QueryError::ShapeMismatch {
                query: name.to_string(),
                expected: kind.label(),
            }
            .into());
        }
        Ok(statement)
    }

    fn select(
        &self,
        ctx: &ExecutionContext<'_>,
        predicate: Option<&Predicate>,
        orders: &[(ResolvedPath, Direction)],
        load: LoadStrategy,
        limit: Option<u64>,
        offset: u64,
    ) -> RepoResult<Vec<E>> {
        if let Some(predicate) = predicate {
            predicate.check_types()?;
        }
        let rendered = render_select(&SelectSpec {
            schema: E::schema(),
            predicate,
            orders,
            eager: load == LoadStrategy::Eager,
            limit,
            offset,
        });
        map_entities(ctx, &rendered.sql, rendered.values, load)
    }

    fn count_where(
        &self,
        ctx: &ExecutionContext<'_>,
        predicate: Option<&Predicate>,
    ) -> RepoResult<u64> {
        if let Some(predicate) = predicate {
            predicate.check_types()?;
        }
        let rendered = render_count(E::schema(), predicate);
        let mut stmt = prepare(ctx.conn(), &rendered.sql)?;
        let total: i64 = stmt.query_row(params_from_iter(rendered.values), |row| row.get(0))?;
        u64::try_from(total)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {total}")))
    }

    fn page_where(
        &self,
        ctx: &ExecutionContext<'_>,
        predicate: Option<&Predicate>,
        orders: &[(ResolvedPath, Direction)],
        request: &PageRequest,
        load: LoadStrategy,
    ) -> RepoResult<Page<E>> {
        // Count and slice must observe the same snapshot.
        run_in_transaction(ctx, TxMode::ReadOnly, |tx| -> RepoResult<Page<E>> {
            let total = self.count_where(tx, predicate)?;
            let content = self.select(
                tx,
                predicate,
                orders,
                load,
                Some(u64::from(request.size)),
                request.offset(),
            )?;
            Ok(Page::new(content, request, total))
        })
    }

    fn insert(
        &self,
        ctx: &ExecutionContext<'_>,
        entity: &E,
        id: Option<EntityId>,
    ) -> RepoResult<EntityId> {
        let schema = E::schema();
        let mut columns = Vec::new();
        let mut values = Vec::new();
        if let Some(id) = id {
            columns.push(schema.id_column);
            values.push(SqlValue::Integer(id));
        }
        for (column, value) in entity.column_values() {
            columns.push(column);
            values.push(value.to_sql());
        }
        let placeholders: Vec<String> = (1..=columns.len()).map(|n| format!("?{n}")).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            schema.table,
            columns.join(", "),
            placeholders.join(", ")
        );
        prepare(ctx.conn(), &sql)?.execute(params_from_iter(values))?;
        Ok(id.unwrap_or_else(|| ctx.conn().last_insert_rowid()))
    }

    fn update(&self, ctx: &ExecutionContext<'_>, entity: &E, id: EntityId) -> RepoResult<()> {
        let schema = E::schema();
        let mut assignments = Vec::new();
        let mut values = Vec::new();
        for (index, (column, value)) in entity.column_values().into_iter().enumerate() {
            assignments.push(format!("{column} = ?{}", index + 1));
            values.push(value.to_sql());
        }
        values.push(SqlValue::Integer(id));
        let sql = format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            schema.table,
            assignments.join(", "),
            schema.id_column,
            values.len()
        );
        let changed = prepare(ctx.conn(), &sql)?.execute(params_from_iter(values))?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: schema.name,
                id,
            });
        }
        Ok(())
    }
}

impl<E: Entity> CrudRepository<E> for SqliteRepository<E> {
    fn get_by_id(
        &self,
        ctx: &ExecutionContext<'_>,
        id: EntityId,
        load: LoadStrategy,
    ) -> RepoResult<Option<E>> {
        let predicate = Predicate::Comparison {
            path: id_path(E::schema())?,
            op: CompareOp::Eq,
            value: Value::Integer(id),
        };
        let mut rows = self.select(ctx, Some(&predicate), &[], load, Some(1), 0)?;
        Ok(rows.pop())
    }

    fn get_all(
        &self,
        ctx: &ExecutionContext<'_>,
        sort: &Sort,
        load: LoadStrategy,
    ) -> RepoResult<Vec<E>> {
        let orders = resolve_sort(E::schema(), sort)?;
        self.select(ctx, None, &orders, load, None, 0)
    }

    fn exists_by_id(&self, ctx: &ExecutionContext<'_>, id: EntityId) -> RepoResult<bool> {
        let schema = E::schema();
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1)",
            schema.table, schema.id_column
        );
        let exists: i64 = prepare(ctx.conn(), &sql)?.query_row([id], |row| row.get(0))?;
        Ok(exists == 1)
    }

    fn count(&self, ctx: &ExecutionContext<'_>) -> RepoResult<u64> {
        self.count_where(ctx, None)
    }

    fn save(&self, ctx: &ExecutionContext<'_>, mut entity: E) -> RepoResult<E> {
        ensure_writable(ctx)?;
        entity.validate()?;
        let schema = E::schema();

        run_in_transaction(ctx, TxMode::ReadWrite, |tx| -> RepoResult<()> {
            match entity.id() {
                None => {
                    let id = self.insert(tx, &entity, None)?;
                    entity.assign_id(id)?;
                    debug!(
                        "event=entity_save module=repo entity={} op=insert id={id}",
                        schema.name
                    );
                }
                Some(id) if self.exists_by_id(tx, id)? => {
                    self.update(tx, &entity, id)?;
                    debug!(
                        "event=entity_save module=repo entity={} op=update id={id}",
                        schema.name
                    );
                }
                Some(id) => {
                    self.insert(tx, &entity, Some(id))?;
                    debug!(
                        "event=entity_save module=repo entity={} op=merge_insert id={id}",
                        schema.name
                    );
                }
            }
            Ok(())
        })?;
        Ok(entity)
    }

    fn save_and_flush(&self, ctx: &ExecutionContext<'_>, entity: E) -> RepoResult<E> {
        let saved = self.save(ctx, entity)?;
        let Some(id) = saved.id() else {
            return Err(RepoError::InvalidData(format!(
                "{} saved without identity",
                E::schema().name
            )));
        };
        self.get_by_id(ctx, id, LoadStrategy::Eager)?
            .ok_or(RepoError::NotFound {
                entity: E::schema().name,
                id,
            })
    }

    fn save_all(&self, ctx: &ExecutionContext<'_>, entities: Vec<E>) -> RepoResult<Vec<E>> {
        ensure_writable(ctx)?;
        let batch_size = entities.len();
        let saved = run_in_transaction(ctx, TxMode::ReadWrite, |tx| {
            entities
                .into_iter()
                .map(|entity| self.save(tx, entity))
                .collect::<RepoResult<Vec<E>>>()
        })?;
        debug!(
            "event=entity_save_all module=repo entity={} count={batch_size}",
            E::schema().name
        );
        Ok(saved)
    }

    fn delete(&self, ctx: &ExecutionContext<'_>, id: EntityId) -> RepoResult<()> {
        ensure_writable(ctx)?;
        let schema = E::schema();
        let sql = format!("DELETE FROM {} WHERE {} = ?1", schema.table, schema.id_column);
        let changed = prepare(ctx.conn(), &sql)?.execute([id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: schema.name,
                id,
            });
        }
        Ok(())
    }

    fn find_all_paged(
        &self,
        ctx: &ExecutionContext<'_>,
        request: &PageRequest,
        load: LoadStrategy,
    ) -> RepoResult<Page<E>> {
        request.validate()?;
        let orders = resolve_sort(E::schema(), &request.sort)?;
        self.page_where(ctx, None, &orders, request, load)
    }

    fn find_all(
        &self,
        ctx: &ExecutionContext<'_>,
        spec: &dyn Specification<E>,
        request: &PageRequest,
        load: LoadStrategy,
    ) -> RepoResult<Page<E>> {
        request.validate()?;
        let predicate = spec.to_predicate(&Root::new(), &Criteria)?;
        let orders = resolve_sort(E::schema(), &request.sort)?;
        self.page_where(ctx, Some(&predicate), &orders, request, load)
    }

    fn find_all_matching(
        &self,
        ctx: &ExecutionContext<'_>,
        predicate: &Predicate,
        sort: &Sort,
        load: LoadStrategy,
    ) -> RepoResult<Vec<E>> {
        let orders = resolve_sort(E::schema(), sort)?;
        self.select(ctx, Some(predicate), &orders, load, None, 0)
    }
}

pub(crate) fn ensure_writable(ctx: &ExecutionContext<'_>) -> RepoResult<()> {
    if ctx.is_read_only() {
        return Err(RepoError::ReadOnlyTransaction);
    }
    Ok(())
}

pub(crate) fn require_write_transaction(
    ctx: &ExecutionContext<'_>,
    operation: &str,
) -> RepoResult<()> {
    if !ctx.in_transaction() {
        return Err(RepoError::TransactionRequired(operation.to_string()));
    }
    ensure_writable(ctx)
}

fn prepare<'c>(conn: &'c Connection, sql: &str) -> RepoResult<rusqlite::CachedStatement<'c>> {
    conn.prepare_cached(sql)
        .map_err(|err| RepoError::from_prepare(sql, err))
}

fn id_path(schema: &'static EntitySchema) -> RepoResult<ResolvedPath> {
    let field = schema.id_field().ok_or_else(|| QueryError::UnknownProperty {
        entity: schema.name,
        property: schema.id_column.to_string(),
    })?;
    Ok(ResolvedPath {
        relation: None,
        field,
    })
}

fn map_entities<E: Entity>(
    ctx: &ExecutionContext<'_>,
    sql: &str,
    values: Vec<SqlValue>,
    load: LoadStrategy,
) -> RepoResult<Vec<E>> {
    let mut stmt = prepare(ctx.conn(), sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut entities = Vec::new();
    while let Some(row) = rows.next()? {
        entities.push(E::from_row(row, "", load)?);
    }
    Ok(entities)
}

fn collect_rows(ctx: &ExecutionContext<'_>, sql: &str, values: Vec<SqlValue>) -> RepoResult<RowSet> {
    let mut stmt = prepare(ctx.conn(), sql)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let width = columns.len();
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut collected = Vec::new();
    while let Some(row) = rows.next()? {
        let mut record = Vec::with_capacity(width);
        for index in 0..width {
            record.push(Value::from_sql(row.get::<_, SqlValue>(index)?));
        }
        collected.push(record);
    }
    Ok(RowSet {
        columns,
        rows: collected,
    })
}

fn ensure_connection_ready(conn: &Connection, schema: &'static EntitySchema) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let mut schemas = vec![schema];
    schemas.extend(schema.relations.iter().map(|relation| relation.target));
    for schema in schemas {
        if !table_exists(conn, schema.table)? {
            return Err(RepoError::MissingRequiredTable(schema.table));
        }
        for field in schema.fields {
            if !table_has_column(conn, schema.table, field.column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: schema.table,
                    column: field.column,
                });
            }
        }
    }
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::{ensure_connection_ready, RowSet, SqliteRepository};
    use crate::query::value::Value;
    use crate::repo::entity::Entity;
    use crate::repo::RepoError;
    use crate::Person;
    use rusqlite::Connection;

    #[test]
    fn unmigrated_connection_is_rejected() {
        let conn = Connection::open_in_memory().unwrap();
        let err = SqliteRepository::<Person>::try_new(&conn)
            .err()
            .expect("fresh connection should be rejected");
        assert!(matches!(
            err,
            RepoError::UninitializedConnection {
                actual_version: 0,
                ..
            }
        ));
    }

    #[test]
    fn missing_column_is_reported() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&format!(
            "CREATE TABLE tbl_person (id INTEGER PRIMARY KEY, last_name TEXT);
             CREATE TABLE tbl_address (id INTEGER PRIMARY KEY, province TEXT, city TEXT);
             PRAGMA user_version = {};",
            crate::db::migrations::latest_version()
        ))
        .unwrap();
        let err = ensure_connection_ready(&conn, Person::schema()).unwrap_err();
        assert!(matches!(
            err,
            RepoError::MissingRequiredColumn {
                table: "tbl_person",
                column: "email"
            }
        ));
    }

    #[test]
    fn row_set_lookup_ignores_column_case() {
        let rows = RowSet {
            columns: vec!["CNT".to_string()],
            rows: vec![vec![Value::Integer(3)]],
        };
        assert_eq!(rows.get(0, "cnt"), Some(&Value::Integer(3)));
        assert_eq!(rows.get(1, "cnt"), None);
    }
}
