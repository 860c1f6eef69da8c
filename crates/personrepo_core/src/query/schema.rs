//! Static entity metadata used by the translator, builder and renderer.
//!
//! # Invariants
//! - Property names are unique within one schema (case-insensitive).
//! - Every relation targets a schema whose primary key is `id_column`.

use super::value::ValueKind;
use super::QueryError;

/// Table-level description of one entity.
#[derive(Debug)]
pub struct EntitySchema {
    /// Entity name used in messages, e.g. `Person`.
    pub name: &'static str,
    pub table: &'static str,
    pub id_column: &'static str,
    pub fields: &'static [FieldDef],
    pub relations: &'static [RelationDef],
}

/// One persisted property.
#[derive(Debug)]
pub struct FieldDef {
    /// Property name in lower camel case, e.g. `lastName`.
    pub property: &'static str,
    pub column: &'static str,
    pub kind: ValueKind,
}

/// Many-to-one relation stored as a foreign key on the owning table.
#[derive(Debug)]
pub struct RelationDef {
    pub property: &'static str,
    pub fk_column: &'static str,
    pub target: &'static EntitySchema,
}

impl EntitySchema {
    /// Finds a flat field by property name, ignoring ASCII case.
    pub fn field(&self, property: &str) -> Option<&'static FieldDef> {
        // `fields` is a `'static` slice, so iterate it through a `'static` borrow.
        let fields: &'static [FieldDef] = self.fields;
        fields
            .iter()
            .find(|field| field.property.eq_ignore_ascii_case(property))
    }

    pub fn relation(&self, property: &str) -> Option<&'static RelationDef> {
        let relations: &'static [RelationDef] = self.relations;
        relations
            .iter()
            .find(|relation| relation.property.eq_ignore_ascii_case(property))
    }

    /// The primary key field.
    pub fn id_field(&self) -> Option<&'static FieldDef> {
        let fields: &'static [FieldDef] = self.fields;
        fields.iter().find(|field| field.column == self.id_column)
    }

    /// Resolves `property` or `relation.property`.
    pub fn resolve(&'static self, path: &str) -> Result<ResolvedPath, QueryError> {
        let unknown = || QueryError::UnknownProperty {
            entity: self.name,
            property: path.to_string(),
        };
        match path.split_once('.') {
            None => self
                .field(path)
                .map(|field| ResolvedPath {
                    relation: None,
                    field,
                })
                .ok_or_else(unknown),
            Some((relation_name, property)) => {
                let relation = self.relation(relation_name).ok_or_else(unknown)?;
                let field = relation.target.field(property).ok_or_else(unknown)?;
                Ok(ResolvedPath {
                    relation: Some(relation),
                    field,
                })
            }
        }
    }
}

/// A property reachable from the root entity, possibly through one relation.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedPath {
    pub relation: Option<&'static RelationDef>,
    pub field: &'static FieldDef,
}

impl ResolvedPath {
    pub fn kind(&self) -> ValueKind {
        self.field.kind
    }

    /// Dotted display form, e.g. `address.id`.
    pub fn display_name(&self) -> String {
        match self.relation {
            Some(relation) => format!("{}.{}", relation.property, self.field.property),
            None => self.field.property.to_string(),
        }
    }
}

impl PartialEq for ResolvedPath {
    fn eq(&self, other: &Self) -> bool {
        let same_relation = match (self.relation, other.relation) {
            (None, None) => true,
            (Some(lhs), Some(rhs)) => std::ptr::eq(lhs, rhs),
            _ => false,
        };
        same_relation && std::ptr::eq(self.field, other.field)
    }
}

impl Eq for ResolvedPath {}

#[cfg(test)]
mod tests {
    use crate::repo::entity::Entity;
    use crate::Person;

    #[test]
    fn resolve_accepts_flat_and_dotted_paths() {
        let schema = Person::schema();
        let flat = schema.resolve("lastName").unwrap();
        assert_eq!(flat.field.column, "last_name");
        assert!(flat.relation.is_none());

        let nested = schema.resolve("address.city").unwrap();
        assert_eq!(nested.display_name(), "address.city");
    }

    #[test]
    fn resolve_rejects_unknown_property() {
        assert!(Person::schema().resolve("address.zip").is_err());
        assert!(Person::schema().resolve("nickname").is_err());
    }
}
