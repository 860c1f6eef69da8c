//! Predicate tree and the programmatic specification builder.
//!
//! # Responsibility
//! - Represent filters as an explicit tagged tree.
//! - Offer a typed root plus a comparison factory for dynamic filters.
//!
//! # Invariants
//! - Composition never mutates its inputs; combinators return new trees.
//! - `And`/`Or` nodes are flattened, so grouping does not change the tree
//!   produced by a chain of the same connector.

use super::schema::{EntitySchema, RelationDef, ResolvedPath};
use super::value::Value;
use super::{QueryError, QueryResult};
use crate::repo::entity::Entity;
use std::marker::PhantomData;

/// Binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub(crate) fn sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }
}

/// Pattern for `LIKE` matching.
///
/// `Prefix`, `Suffix` and `Contains` escape wildcards in the operand;
/// `Raw` is passed through as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LikePattern {
    Prefix(String),
    Suffix(String),
    Contains(String),
    Raw(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Comparison {
        path: ResolvedPath,
        op: CompareOp,
        value: Value,
    },
    In {
        path: ResolvedPath,
        values: Vec<Value>,
    },
    Like {
        path: ResolvedPath,
        pattern: LikePattern,
    },
    IsNull {
        path: ResolvedPath,
        negated: bool,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Conjunction of `self` and `other`.
    pub fn and(self, other: Predicate) -> Predicate {
        and(self, other)
    }

    /// Disjunction of `self` and `other`.
    pub fn or(self, other: Predicate) -> Predicate {
        or(self, other)
    }

    pub fn negate(self) -> Predicate {
        not(self)
    }

    /// Checks that every operand fits the kind of the property it targets.
    pub fn check_types(&self) -> QueryResult<()> {
        match self {
            Self::Comparison { path, value, .. } => check_scalar(path, value),
            Self::In { path, values } => values.iter().try_for_each(|value| check_scalar(path, value)),
            Self::Like { path, .. } => {
                if path.kind() == super::value::ValueKind::Text {
                    Ok(())
                } else {
                    Err(QueryError::TypeMismatch {
                        property: path.display_name(),
                        expected: "text property for pattern match".to_string(),
                        actual: path.kind().to_string(),
                    })
                }
            }
            Self::IsNull { .. } => Ok(()),
            Self::And(items) | Self::Or(items) => items.iter().try_for_each(Predicate::check_types),
            Self::Not(inner) => inner.check_types(),
        }
    }

    /// Relations referenced anywhere in this tree.
    pub(crate) fn collect_relations(&self, out: &mut Vec<&'static RelationDef>) {
        let push = |out: &mut Vec<&'static RelationDef>, path: &ResolvedPath| {
            if let Some(relation) = path.relation {
                if !out.iter().any(|known| std::ptr::eq(*known, relation)) {
                    out.push(relation);
                }
            }
        };
        match self {
            Self::Comparison { path, .. }
            | Self::In { path, .. }
            | Self::Like { path, .. }
            | Self::IsNull { path, .. } => push(out, path),
            Self::And(items) | Self::Or(items) => {
                for item in items {
                    item.collect_relations(out);
                }
            }
            Self::Not(inner) => inner.collect_relations(out),
        }
    }
}

fn check_scalar(path: &ResolvedPath, value: &Value) -> QueryResult<()> {
    match value.kind() {
        Some(kind) if kind == path.kind() => Ok(()),
        None if matches!(value, Value::Null) => Ok(()),
        _ => Err(QueryError::TypeMismatch {
            property: path.display_name(),
            expected: path.kind().to_string(),
            actual: value.type_label(),
        }),
    }
}

/// Conjunction; nested conjunctions are flattened.
pub fn and(lhs: Predicate, rhs: Predicate) -> Predicate {
    let mut items = Vec::new();
    for side in [lhs, rhs] {
        match side {
            Predicate::And(inner) => items.extend(inner),
            other => items.push(other),
        }
    }
    Predicate::And(items)
}

/// Disjunction; nested disjunctions are flattened.
pub fn or(lhs: Predicate, rhs: Predicate) -> Predicate {
    let mut items = Vec::new();
    for side in [lhs, rhs] {
        match side {
            Predicate::Or(inner) => items.extend(inner),
            other => items.push(other),
        }
    }
    Predicate::Or(items)
}

pub fn not(inner: Predicate) -> Predicate {
    match inner {
        Predicate::Not(original) => *original,
        other => Predicate::Not(Box::new(other)),
    }
}

/// Conjunction of any number of predicates. Empty input matches everything.
pub fn all_of(items: impl IntoIterator<Item = Predicate>) -> Predicate {
    items
        .into_iter()
        .fold(Predicate::And(Vec::new()), and)
}

/// Disjunction of any number of predicates. Empty input matches nothing.
pub fn any_of(items: impl IntoIterator<Item = Predicate>) -> Predicate {
    items.into_iter().fold(Predicate::Or(Vec::new()), or)
}

/// Validated reference to an entity property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Path {
    resolved: ResolvedPath,
}

impl Path {
    pub(crate) fn new(resolved: ResolvedPath) -> Self {
        Self { resolved }
    }

    pub fn resolved(&self) -> ResolvedPath {
        self.resolved
    }
}

/// Typed query root for entity `E`.
pub struct Root<E> {
    schema: &'static EntitySchema,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Root<E> {
    pub fn new() -> Self {
        Self {
            schema: E::schema(),
            _entity: PhantomData,
        }
    }

    /// Navigates to a flat property of the root entity.
    pub fn get(&self, property: &str) -> QueryResult<Path> {
        let field = self
            .schema
            .field(property)
            .ok_or_else(|| QueryError::UnknownProperty {
                entity: self.schema.name,
                property: property.to_string(),
            })?;
        Ok(Path::new(ResolvedPath {
            relation: None,
            field,
        }))
    }

    /// Navigates into a many-to-one relation.
    pub fn join(&self, relation: &str) -> QueryResult<Join> {
        let relation = self
            .schema
            .relation(relation)
            .ok_or_else(|| QueryError::UnknownProperty {
                entity: self.schema.name,
                property: relation.to_string(),
            })?;
        Ok(Join { relation })
    }
}

impl<E: Entity> Default for Root<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Relation reached from a [`Root`].
#[derive(Debug, Clone, Copy)]
pub struct Join {
    relation: &'static RelationDef,
}

impl Join {
    pub fn get(&self, property: &str) -> QueryResult<Path> {
        let target = self.relation.target;
        let field = target
            .field(property)
            .ok_or_else(|| QueryError::UnknownProperty {
                entity: target.name,
                property: format!("{}.{property}", self.relation.property),
            })?;
        Ok(Path::new(ResolvedPath {
            relation: Some(self.relation),
            field,
        }))
    }
}

/// Factory for comparison predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct Criteria;

impl Criteria {
    pub fn equal(&self, path: Path, value: impl Into<Value>) -> Predicate {
        compare(path, CompareOp::Eq, value)
    }

    pub fn not_equal(&self, path: Path, value: impl Into<Value>) -> Predicate {
        compare(path, CompareOp::Ne, value)
    }

    pub fn gt(&self, path: Path, value: impl Into<Value>) -> Predicate {
        compare(path, CompareOp::Gt, value)
    }

    pub fn ge(&self, path: Path, value: impl Into<Value>) -> Predicate {
        compare(path, CompareOp::Ge, value)
    }

    pub fn lt(&self, path: Path, value: impl Into<Value>) -> Predicate {
        compare(path, CompareOp::Lt, value)
    }

    pub fn le(&self, path: Path, value: impl Into<Value>) -> Predicate {
        compare(path, CompareOp::Le, value)
    }

    /// Raw SQL `LIKE` pattern, wildcards included.
    pub fn like(&self, path: Path, pattern: impl Into<String>) -> Predicate {
        Predicate::Like {
            path: path.resolved,
            pattern: LikePattern::Raw(pattern.into()),
        }
    }

    pub fn starting_with(&self, path: Path, prefix: impl Into<String>) -> Predicate {
        Predicate::Like {
            path: path.resolved,
            pattern: LikePattern::Prefix(prefix.into()),
        }
    }

    pub fn ending_with(&self, path: Path, suffix: impl Into<String>) -> Predicate {
        Predicate::Like {
            path: path.resolved,
            pattern: LikePattern::Suffix(suffix.into()),
        }
    }

    pub fn containing(&self, path: Path, infix: impl Into<String>) -> Predicate {
        Predicate::Like {
            path: path.resolved,
            pattern: LikePattern::Contains(infix.into()),
        }
    }

    pub fn in_list<V: Into<Value>>(&self, path: Path, values: impl IntoIterator<Item = V>) -> Predicate {
        Predicate::In {
            path: path.resolved,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(&self, path: Path) -> Predicate {
        Predicate::IsNull {
            path: path.resolved,
            negated: false,
        }
    }

    pub fn is_not_null(&self, path: Path) -> Predicate {
        Predicate::IsNull {
            path: path.resolved,
            negated: true,
        }
    }

    pub fn and(&self, lhs: Predicate, rhs: Predicate) -> Predicate {
        and(lhs, rhs)
    }

    pub fn or(&self, lhs: Predicate, rhs: Predicate) -> Predicate {
        or(lhs, rhs)
    }

    pub fn not(&self, inner: Predicate) -> Predicate {
        not(inner)
    }
}

fn compare(path: Path, op: CompareOp, value: impl Into<Value>) -> Predicate {
    Predicate::Comparison {
        path: path.resolved,
        op,
        value: value.into(),
    }
}

/// Dynamic filter over entity `E`.
pub trait Specification<E: Entity> {
    fn to_predicate(&self, root: &Root<E>, cb: &Criteria) -> QueryResult<Predicate>;
}

impl<E, F> Specification<E> for F
where
    E: Entity,
    F: Fn(&Root<E>, &Criteria) -> QueryResult<Predicate>,
{
    fn to_predicate(&self, root: &Root<E>, cb: &Criteria) -> QueryResult<Predicate> {
        self(root, cb)
    }
}
