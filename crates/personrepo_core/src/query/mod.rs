//! Query construction: schemas, predicates, derived descriptors, paging.
//!
//! # Responsibility
//! - Turn method-style descriptors and programmatic specifications into one
//!   predicate tree.
//! - Render predicate trees and sorts into SQLite statements.
//!
//! # Invariants
//! - Everything that can be checked without storage is checked when a query
//!   is registered or a predicate is built, never inside row mapping.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod descriptor;
pub mod native;
pub mod page;
pub mod predicate;
pub mod schema;
pub(crate) mod sql;
pub mod value;

pub type QueryResult<T> = Result<T, QueryError>;

/// Errors raised while compiling, binding or validating queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Descriptor does not follow `<action>[subject]By<conditions>[OrderBy..]`.
    MalformedDescriptor {
        descriptor: String,
        reason: String,
    },
    /// Property (or relation path) does not exist on the entity.
    UnknownProperty {
        entity: &'static str,
        property: String,
    },
    /// Declared or supplied type does not fit the property.
    TypeMismatch {
        property: String,
        expected: String,
        actual: String,
    },
    /// Declared parameters do not match the descriptor's placeholders.
    ParameterCount {
        query: String,
        expected: usize,
        actual: usize,
    },
    /// No query registered under this name.
    UnknownQuery(String),
    /// Query was registered with a different result shape.
    ShapeMismatch {
        query: String,
        expected: &'static str,
    },
    /// Page size must be at least one.
    InvalidPageSize,
    /// A `:name` placeholder has no bound value.
    MissingNamedParameter(String),
    /// A statement mixes `?N` and `:name` placeholders.
    MixedParameterStyles(String),
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MalformedDescriptor { descriptor, reason } => {
                write!(f, "malformed query descriptor `{descriptor}`: {reason}")
            }
            Self::UnknownProperty { entity, property } => {
                write!(f, "unknown property `{property}` on {entity}")
            }
            Self::TypeMismatch {
                property,
                expected,
                actual,
            } => write!(
                f,
                "type mismatch for `{property}`: expected {expected}, got {actual}"
            ),
            Self::ParameterCount {
                query,
                expected,
                actual,
            } => write!(
                f,
                "query `{query}` expects {expected} parameter(s), got {actual}"
            ),
            Self::UnknownQuery(name) => write!(f, "no query registered as `{name}`"),
            Self::ShapeMismatch { query, expected } => {
                write!(f, "query `{query}` is not a {expected} query")
            }
            Self::InvalidPageSize => write!(f, "page size must be at least 1"),
            Self::MissingNamedParameter(name) => {
                write!(f, "named parameter `:{name}` has no value")
            }
            Self::MixedParameterStyles(sql) => write!(
                f,
                "statement mixes positional and named parameters: `{sql}`"
            ),
        }
    }
}

impl Error for QueryError {}
