//! Person repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Expose the person lookups as typed methods over registered queries.
//! - Resolve deferred addresses on demand.
//!
//! # Invariants
//! - Every query is compiled or prepared in `try_new`; method calls never
//!   hit a descriptor or statement error for the first time.

use super::entity::LoadStrategy;
use super::sqlite_repo::{CrudRepository, SqliteRepository};
use super::{RepoError, RepoResult};
use crate::db::ExecutionContext;
use crate::model::address::Address;
use crate::model::person::Person;
use crate::model::EntityId;
use crate::query::native::{NativeParams, StatementKind};
use crate::query::page::{Page, PageRequest, Sort};
use crate::query::predicate::{Predicate, Specification};
use crate::query::value::{ParamType, Value, ValueKind};
use rusqlite::Connection;

pub type SqliteAddressRepository = SqliteRepository<Address>;

const BY_LAST_NAME: &str = "getByLastName";
const BY_LAST_NAME_PREFIX_AND_MIN_ID: &str = "getByLastNameStartingWithAndIdGreaterThanEqual";
const BY_ID_IN: &str = "getAllByIdIn";
const BY_ADDRESS_RELATION_ID_GT: &str = "getByAddress_IdGreaterThan";
const BY_ADDRESS_FK_GT: &str = "getByAddressIdGreaterThan";

const MAX_ID_PERSON: &str = "getMaxIdPerson";
const MAX_ID_PERSON_SQL: &str =
    "SELECT * FROM tbl_person WHERE id = (SELECT MAX(id) FROM tbl_person)";
const QUERY_PARAMETER: &str = "getPersonsQueryParameter";
const QUERY_PARAMETER_SQL: &str =
    "SELECT * FROM tbl_person WHERE last_name = ?1 AND email = ?2 ORDER BY id";
const NAMED_PARAMETER: &str = "getPersonQueryNamedParameter";
const NAMED_PARAMETER_SQL: &str =
    "SELECT * FROM tbl_person WHERE last_name = :lastName AND email = :email ORDER BY id";
const PARAMETER_LIKE: &str = "getPersonQueryParameterLike";
const PARAMETER_LIKE_SQL: &str =
    "SELECT * FROM tbl_person WHERE last_name LIKE %?1% OR email LIKE %?2% ORDER BY id";
const NAMED_PARAMETER_LIKE: &str = "getPersonQueryNamedParameterLike";
const NAMED_PARAMETER_LIKE_SQL: &str =
    "SELECT * FROM tbl_person WHERE last_name LIKE %:lastName% OR email LIKE %:email% ORDER BY id";
const COUNT: &str = "getCount";
const COUNT_SQL: &str = "SELECT COUNT(id) FROM tbl_person";
const UPDATE_EMAIL: &str = "updatePerson";
const UPDATE_EMAIL_SQL: &str = "UPDATE tbl_person SET email = :email WHERE last_name = :lastName";

/// Person lookups on top of the generic CRUD contract.
pub trait PersonRepository: CrudRepository<Person> {
    /// Single person with `last_name`; `Ok(None)` when nobody matches.
    fn get_by_last_name(
        &self,
        ctx: &ExecutionContext<'_>,
        last_name: &str,
        load: LoadStrategy,
    ) -> RepoResult<Option<Person>>;

    fn get_by_last_name_starting_with_and_id_greater_than_equal(
        &self,
        ctx: &ExecutionContext<'_>,
        prefix: &str,
        min_id: EntityId,
        load: LoadStrategy,
    ) -> RepoResult<Option<Person>>;

    fn get_all_by_id_in(
        &self,
        ctx: &ExecutionContext<'_>,
        ids: &[EntityId],
        load: LoadStrategy,
    ) -> RepoResult<Vec<Person>>;

    /// Persons whose joined address has `id > address_id`.
    fn get_by_address_id_greater_than(
        &self,
        ctx: &ExecutionContext<'_>,
        address_id: EntityId,
        load: LoadStrategy,
    ) -> RepoResult<Vec<Person>>;

    /// Same filter on the `address_id` column, without a join.
    fn get_by_address_id_flat(
        &self,
        ctx: &ExecutionContext<'_>,
        address_id: EntityId,
        load: LoadStrategy,
    ) -> RepoResult<Vec<Person>>;

    fn get_max_id_person(&self, ctx: &ExecutionContext<'_>) -> RepoResult<Option<Person>>;

    fn get_persons_query_parameter(
        &self,
        ctx: &ExecutionContext<'_>,
        last_name: &str,
        email: &str,
    ) -> RepoResult<Vec<Person>>;

    fn get_person_query_named_parameter(
        &self,
        ctx: &ExecutionContext<'_>,
        email: &str,
        last_name: &str,
    ) -> RepoResult<Vec<Person>>;

    /// Persons whose last name contains `last_name` or email contains `email`.
    fn get_person_query_parameter_like(
        &self,
        ctx: &ExecutionContext<'_>,
        last_name: &str,
        email: &str,
    ) -> RepoResult<Vec<Person>>;

    fn get_person_query_named_parameter_like(
        &self,
        ctx: &ExecutionContext<'_>,
        email: &str,
        last_name: &str,
    ) -> RepoResult<Vec<Person>>;

    fn get_count(&self, ctx: &ExecutionContext<'_>) -> RepoResult<u64>;

    /// Sets `email` on every person named `last_name`; returns rows changed.
    ///
    /// # Errors
    /// - [`RepoError::TransactionRequired`] outside a read-write transaction.
    fn update_person(
        &self,
        ctx: &ExecutionContext<'_>,
        last_name: &str,
        email: &str,
    ) -> RepoResult<usize>;

    /// Resolves a deferred address in place and returns it.
    fn load_address(
        &self,
        ctx: &ExecutionContext<'_>,
        person: &mut Person,
    ) -> RepoResult<Option<Address>>;

    fn save_address(&self, ctx: &ExecutionContext<'_>, address: Address) -> RepoResult<Address>;
}

pub struct SqlitePersonRepository {
    persons: SqliteRepository<Person>,
    addresses: SqliteAddressRepository,
}

impl SqlitePersonRepository {
    /// Creates the repository and compiles every person query against `conn`.
    pub fn try_new(conn: &Connection) -> RepoResult<Self> {
        let mut persons = SqliteRepository::<Person>::try_new(conn)?;
        let addresses = SqliteAddressRepository::try_new(conn)?;

        let text = ParamType::Scalar(ValueKind::Text);
        let integer = ParamType::Scalar(ValueKind::Integer);
        persons.register_derived(BY_LAST_NAME, &[text])?;
        persons.register_derived(BY_LAST_NAME_PREFIX_AND_MIN_ID, &[text, integer])?;
        persons.register_derived(BY_ID_IN, &[ParamType::List(ValueKind::Integer)])?;
        persons.register_derived(BY_ADDRESS_RELATION_ID_GT, &[integer])?;
        persons.register_derived(BY_ADDRESS_FK_GT, &[integer])?;

        for (name, kind, sql) in [
            (MAX_ID_PERSON, StatementKind::Entities, MAX_ID_PERSON_SQL),
            (QUERY_PARAMETER, StatementKind::Entities, QUERY_PARAMETER_SQL),
            (NAMED_PARAMETER, StatementKind::Entities, NAMED_PARAMETER_SQL),
            (PARAMETER_LIKE, StatementKind::Entities, PARAMETER_LIKE_SQL),
            (NAMED_PARAMETER_LIKE, StatementKind::Entities, NAMED_PARAMETER_LIKE_SQL),
            (COUNT, StatementKind::Scalar, COUNT_SQL),
            (UPDATE_EMAIL, StatementKind::Modifying, UPDATE_EMAIL_SQL),
        ] {
            persons.register_statement(conn, name, kind, sql)?;
        }

        Ok(Self { persons, addresses })
    }

    /// Generic repository backing person CRUD and registered queries.
    pub fn persons(&self) -> &SqliteRepository<Person> {
        &self.persons
    }

    pub fn addresses(&self) -> &SqliteAddressRepository {
        &self.addresses
    }
}

impl CrudRepository<Person> for SqlitePersonRepository {
    fn get_by_id(
        &self,
        ctx: &ExecutionContext<'_>,
        id: EntityId,
        load: LoadStrategy,
    ) -> RepoResult<Option<Person>> {
        self.persons.get_by_id(ctx, id, load)
    }

    fn get_all(
        &self,
        ctx: &ExecutionContext<'_>,
        sort: &Sort,
        load: LoadStrategy,
    ) -> RepoResult<Vec<Person>> {
        self.persons.get_all(ctx, sort, load)
    }

    fn exists_by_id(&self, ctx: &ExecutionContext<'_>, id: EntityId) -> RepoResult<bool> {
        self.persons.exists_by_id(ctx, id)
    }

    fn count(&self, ctx: &ExecutionContext<'_>) -> RepoResult<u64> {
        self.persons.count(ctx)
    }

    fn save(&self, ctx: &ExecutionContext<'_>, entity: Person) -> RepoResult<Person> {
        self.persons.save(ctx, entity)
    }

    fn save_and_flush(&self, ctx: &ExecutionContext<'_>, entity: Person) -> RepoResult<Person> {
        self.persons.save_and_flush(ctx, entity)
    }

    fn save_all(
        &self,
        ctx: &ExecutionContext<'_>,
        entities: Vec<Person>,
    ) -> RepoResult<Vec<Person>> {
        self.persons.save_all(ctx, entities)
    }

    fn delete(&self, ctx: &ExecutionContext<'_>, id: EntityId) -> RepoResult<()> {
        self.persons.delete(ctx, id)
    }

    fn find_all_paged(
        &self,
        ctx: &ExecutionContext<'_>,
        request: &PageRequest,
        load: LoadStrategy,
    ) -> RepoResult<Page<Person>> {
        self.persons.find_all_paged(ctx, request, load)
    }

    fn find_all(
        &self,
        ctx: &ExecutionContext<'_>,
        spec: &dyn Specification<Person>,
        request: &PageRequest,
        load: LoadStrategy,
    ) -> RepoResult<Page<Person>> {
        self.persons.find_all(ctx, spec, request, load)
    }

    fn find_all_matching(
        &self,
        ctx: &ExecutionContext<'_>,
        predicate: &Predicate,
        sort: &Sort,
        load: LoadStrategy,
    ) -> RepoResult<Vec<Person>> {
        self.persons.find_all_matching(ctx, predicate, sort, load)
    }
}

impl PersonRepository for SqlitePersonRepository {
    fn get_by_last_name(
        &self,
        ctx: &ExecutionContext<'_>,
        last_name: &str,
        load: LoadStrategy,
    ) -> RepoResult<Option<Person>> {
        self.persons
            .find_one_derived(ctx, BY_LAST_NAME, &[Value::from(last_name)], load)
    }

    fn get_by_last_name_starting_with_and_id_greater_than_equal(
        &self,
        ctx: &ExecutionContext<'_>,
        prefix: &str,
        min_id: EntityId,
        load: LoadStrategy,
    ) -> RepoResult<Option<Person>> {
        self.persons.find_one_derived(
            ctx,
            BY_LAST_NAME_PREFIX_AND_MIN_ID,
            &[Value::from(prefix), Value::from(min_id)],
            load,
        )
    }

    fn get_all_by_id_in(
        &self,
        ctx: &ExecutionContext<'_>,
        ids: &[EntityId],
        load: LoadStrategy,
    ) -> RepoResult<Vec<Person>> {
        self.persons
            .find_list_derived(ctx, BY_ID_IN, &[Value::from(ids.to_vec())], load)
    }

    fn get_by_address_id_greater_than(
        &self,
        ctx: &ExecutionContext<'_>,
        address_id: EntityId,
        load: LoadStrategy,
    ) -> RepoResult<Vec<Person>> {
        self.persons.find_list_derived(
            ctx,
            BY_ADDRESS_RELATION_ID_GT,
            &[Value::from(address_id)],
            load,
        )
    }

    fn get_by_address_id_flat(
        &self,
        ctx: &ExecutionContext<'_>,
        address_id: EntityId,
        load: LoadStrategy,
    ) -> RepoResult<Vec<Person>> {
        self.persons
            .find_list_derived(ctx, BY_ADDRESS_FK_GT, &[Value::from(address_id)], load)
    }

    fn get_max_id_person(&self, ctx: &ExecutionContext<'_>) -> RepoResult<Option<Person>> {
        self.persons
            .query_one(ctx, MAX_ID_PERSON, &NativeParams::None)
    }

    fn get_persons_query_parameter(
        &self,
        ctx: &ExecutionContext<'_>,
        last_name: &str,
        email: &str,
    ) -> RepoResult<Vec<Person>> {
        self.persons.query_entities(
            ctx,
            QUERY_PARAMETER,
            &NativeParams::positional([last_name, email]),
        )
    }

    fn get_person_query_named_parameter(
        &self,
        ctx: &ExecutionContext<'_>,
        email: &str,
        last_name: &str,
    ) -> RepoResult<Vec<Person>> {
        self.persons.query_entities(
            ctx,
            NAMED_PARAMETER,
            &NativeParams::named([("email", email), ("lastName", last_name)]),
        )
    }

    fn get_person_query_parameter_like(
        &self,
        ctx: &ExecutionContext<'_>,
        last_name: &str,
        email: &str,
    ) -> RepoResult<Vec<Person>> {
        self.persons.query_entities(
            ctx,
            PARAMETER_LIKE,
            &NativeParams::positional([last_name, email]),
        )
    }

    fn get_person_query_named_parameter_like(
        &self,
        ctx: &ExecutionContext<'_>,
        email: &str,
        last_name: &str,
    ) -> RepoResult<Vec<Person>> {
        self.persons.query_entities(
            ctx,
            NAMED_PARAMETER_LIKE,
            &NativeParams::named([("email", email), ("lastName", last_name)]),
        )
    }

    fn get_count(&self, ctx: &ExecutionContext<'_>) -> RepoResult<u64> {
        match self.persons.query_scalar(ctx, COUNT, &NativeParams::None)? {
            Some(Value::Integer(count)) => u64::try_from(count)
                .map_err(|_| RepoError::InvalidData(format!("negative person count {count}"))),
            other => Err(RepoError::InvalidData(format!(
                "person count returned {other:?}"
            ))),
        }
    }

    fn update_person(
        &self,
        ctx: &ExecutionContext<'_>,
        last_name: &str,
        email: &str,
    ) -> RepoResult<usize> {
        self.persons.execute_modifying(
            ctx,
            UPDATE_EMAIL,
            &NativeParams::named([("lastName", last_name), ("email", email)]),
        )
    }

    fn load_address(
        &self,
        ctx: &ExecutionContext<'_>,
        person: &mut Person,
    ) -> RepoResult<Option<Address>> {
        if let Some(address) = person.address() {
            return Ok(Some(address.clone()));
        }
        let Some(address_id) = person.address_id() else {
            return Ok(None);
        };
        let address = self
            .addresses
            .get_by_id(ctx, address_id, LoadStrategy::Deferred)?
            .ok_or_else(|| {
                RepoError::InvalidData(format!("person references missing address {address_id}"))
            })?;
        person.set_address(address.clone());
        Ok(Some(address))
    }

    fn save_address(&self, ctx: &ExecutionContext<'_>, address: Address) -> RepoResult<Address> {
        self.addresses.save(ctx, address)
    }
}
