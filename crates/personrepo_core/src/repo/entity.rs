//! Mapping between entities and their table rows.
//!
//! # Invariants
//! - `column_values` never contains the primary key; identity travels
//!   separately through `id` / `assign_id`.
//! - Eager rows carry relation columns aliased `<relation>__<column>`.

use super::{RepoError, RepoResult};
use crate::model::address::Address;
use crate::model::person::Person;
use crate::model::{EntityId, ValidationError};
use crate::query::schema::{EntitySchema, FieldDef, RelationDef};
use crate::query::value::{Value, ValueKind};
use chrono::NaiveDate;
use rusqlite::Row;

/// How relations of a loaded entity are materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Relation rows are selected in the same statement through a join.
    Eager,
    /// Only the foreign key is loaded; resolve later on demand.
    #[default]
    Deferred,
}

/// A persistable record with static table metadata.
pub trait Entity: Sized {
    fn schema() -> &'static EntitySchema;

    fn id(&self) -> Option<EntityId>;

    fn assign_id(&mut self, id: EntityId) -> Result<(), ValidationError>;

    fn validate(&self) -> Result<(), ValidationError>;

    /// Values for every non-key column, keyed by column name.
    fn column_values(&self) -> Vec<(&'static str, Value)>;

    /// Builds an entity from `row`, reading columns named `<prefix><column>`.
    fn from_row(row: &Row<'_>, prefix: &str, load: LoadStrategy) -> RepoResult<Self>;
}

pub(crate) static ADDRESS_SCHEMA: EntitySchema = EntitySchema {
    name: "Address",
    table: "tbl_address",
    id_column: "id",
    fields: &[
        FieldDef {
            property: "id",
            column: "id",
            kind: ValueKind::Integer,
        },
        FieldDef {
            property: "province",
            column: "province",
            kind: ValueKind::Text,
        },
        FieldDef {
            property: "city",
            column: "city",
            kind: ValueKind::Text,
        },
    ],
    relations: &[],
};

pub(crate) static PERSON_SCHEMA: EntitySchema = EntitySchema {
    name: "Person",
    table: "tbl_person",
    id_column: "id",
    fields: &[
        FieldDef {
            property: "id",
            column: "id",
            kind: ValueKind::Integer,
        },
        FieldDef {
            property: "lastName",
            column: "last_name",
            kind: ValueKind::Text,
        },
        FieldDef {
            property: "email",
            column: "email",
            kind: ValueKind::Text,
        },
        FieldDef {
            property: "birth",
            column: "birth",
            kind: ValueKind::Date,
        },
        FieldDef {
            property: "addressId",
            column: "address_id",
            kind: ValueKind::Integer,
        },
    ],
    relations: &[RelationDef {
        property: "address",
        fk_column: "address_id",
        target: &ADDRESS_SCHEMA,
    }],
};

fn column(prefix: &str, name: &str) -> String {
    format!("{prefix}{name}")
}

impl Entity for Address {
    fn schema() -> &'static EntitySchema {
        &ADDRESS_SCHEMA
    }

    fn id(&self) -> Option<EntityId> {
        Address::id(self)
    }

    fn assign_id(&mut self, id: EntityId) -> Result<(), ValidationError> {
        Address::assign_id(self, id)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Address::validate(self)
    }

    fn column_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("province", Value::from(self.province())),
            ("city", Value::from(self.city())),
        ]
    }

    fn from_row(row: &Row<'_>, prefix: &str, _load: LoadStrategy) -> RepoResult<Self> {
        let id: EntityId = row.get(column(prefix, "id").as_str())?;
        let province: String = row.get(column(prefix, "province").as_str())?;
        let city: String = row.get(column(prefix, "city").as_str())?;
        Ok(Address::new(province, city).with_id(id))
    }
}

impl Entity for Person {
    fn schema() -> &'static EntitySchema {
        &PERSON_SCHEMA
    }

    fn id(&self) -> Option<EntityId> {
        Person::id(self)
    }

    fn assign_id(&mut self, id: EntityId) -> Result<(), ValidationError> {
        Person::assign_id(self, id)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        Person::validate(self)
    }

    fn column_values(&self) -> Vec<(&'static str, Value)> {
        let address_id = match self.address() {
            Some(address) => address.id(),
            None => self.address_id(),
        };
        vec![
            ("last_name", Value::from(self.last_name())),
            ("email", Value::from(self.email())),
            ("birth", Value::from(self.birth())),
            ("address_id", Value::from(address_id)),
        ]
    }

    fn from_row(row: &Row<'_>, prefix: &str, load: LoadStrategy) -> RepoResult<Self> {
        let id: EntityId = row.get(column(prefix, "id").as_str())?;
        let last_name: String = row.get(column(prefix, "last_name").as_str())?;
        let email: String = row.get(column(prefix, "email").as_str())?;
        let birth = parse_birth(row, &column(prefix, "birth"))?;
        let address_id: Option<EntityId> = row.get(column(prefix, "address_id").as_str())?;

        let mut person = Person::new(last_name, email, birth).with_id(id);
        person.set_address_id(address_id);

        if load == LoadStrategy::Eager && address_id.is_some() {
            let relation_prefix = format!("{prefix}address__");
            let joined_id: Option<EntityId> =
                row.get(column(&relation_prefix, "id").as_str())?;
            match joined_id {
                Some(_) => {
                    let address = Address::from_row(row, &relation_prefix, LoadStrategy::Deferred)?;
                    person.set_address(address);
                }
                None => {
                    return Err(RepoError::InvalidData(format!(
                        "tbl_person row {id} references missing address {}",
                        address_id.unwrap_or_default()
                    )));
                }
            }
        }

        Ok(person)
    }
}

fn parse_birth(row: &Row<'_>, column: &str) -> RepoResult<Option<NaiveDate>> {
    let Some(raw) = row.get::<_, Option<String>>(column)? else {
        return Ok(None);
    };
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| RepoError::InvalidData(format!("invalid date `{raw}` in tbl_person.birth")))
}

#[cfg(test)]
mod tests {
    use super::{Entity, LoadStrategy};
    use crate::db::open_db_in_memory;
    use crate::query::value::Value;
    use crate::{Address, Person};
    use chrono::NaiveDate;

    #[test]
    fn person_columns_prefer_resolved_address() {
        let mut person = Person::new("AA", "aa@customer.com", NaiveDate::from_ymd_opt(1990, 1, 2));
        person.set_address_id(Some(9));
        person.set_address(Address::new("Zhejiang", "Hangzhou").with_id(3));

        let columns = person.column_values();
        assert_eq!(columns[3], ("address_id", Value::Integer(3)));
        assert_eq!(
            columns[2],
            ("birth", Value::Date(NaiveDate::from_ymd_opt(1990, 1, 2).unwrap()))
        );
    }

    #[test]
    fn eager_row_builds_nested_address() {
        let conn = open_db_in_memory().unwrap();
        let person = conn
            .query_row(
                "SELECT 4 AS id, 'DD' AS last_name, 'dd@customer.com' AS email,
                        '2001-05-06' AS birth, 2 AS address_id,
                        2 AS address__id, 'Jiangsu' AS address__province,
                        'Nanjing' AS address__city",
                [],
                |row| Ok(Person::from_row(row, "", LoadStrategy::Eager)),
            )
            .unwrap()
            .unwrap();

        assert_eq!(person.id(), Some(4));
        assert_eq!(person.address().map(|address| address.city()), Some("Nanjing"));
        assert_eq!(person.address_id(), Some(2));
    }

    #[test]
    fn deferred_row_keeps_only_foreign_key() {
        let conn = open_db_in_memory().unwrap();
        let person = conn
            .query_row(
                "SELECT 4 AS id, 'DD' AS last_name, 'dd@customer.com' AS email,
                        NULL AS birth, 2 AS address_id",
                [],
                |row| Ok(Person::from_row(row, "", LoadStrategy::Deferred)),
            )
            .unwrap()
            .unwrap();

        assert!(person.address().is_none());
        assert_eq!(person.address_id(), Some(2));
        assert_eq!(person.birth(), None);
    }
}
