//! Typed values bound into predicates and statements.

use chrono::NaiveDate;
use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage kind of one entity property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Integer,
    Text,
    Date,
}

impl Display for ValueKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Date => "date",
        };
        f.write_str(name)
    }
}

/// Declared type of one query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamType {
    Scalar(ValueKind),
    List(ValueKind),
}

impl Display for ParamType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::List(kind) => write!(f, "list<{kind}>"),
        }
    }
}

/// Value passed by callers or read back from storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Integer(i64),
    Text(String),
    Date(NaiveDate),
    List(Vec<Value>),
}

impl Value {
    /// Returns the scalar kind, or `None` for `Null` and lists.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Integer(_) => Some(ValueKind::Integer),
            Self::Text(_) => Some(ValueKind::Text),
            Self::Date(_) => Some(ValueKind::Date),
            Self::Null | Self::List(_) => None,
        }
    }

    /// Whether this value can be bound where `expected` is declared.
    pub fn conforms_to(&self, expected: ParamType) -> bool {
        match (self, expected) {
            (Self::Null, ParamType::Scalar(_)) => true,
            (Self::List(items), ParamType::List(kind)) => items
                .iter()
                .all(|item| item.conforms_to(ParamType::Scalar(kind))),
            (value, ParamType::Scalar(kind)) => value.kind() == Some(kind),
            _ => false,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    /// Short type label used in error messages.
    pub fn type_label(&self) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::List(items) => match items.first().and_then(Value::kind) {
                Some(kind) => format!("list<{kind}>"),
                None => "list".to_string(),
            },
            scalar => scalar
                .kind()
                .map(|kind| kind.to_string())
                .unwrap_or_default(),
        }
    }

    /// Converts a scalar value into its SQLite binding.
    ///
    /// Lists are expanded by the renderer and never reach this function;
    /// they bind as `NULL` if they do.
    pub(crate) fn to_sql(&self) -> SqlValue {
        match self {
            Self::Null | Self::List(_) => SqlValue::Null,
            Self::Integer(value) => SqlValue::Integer(*value),
            Self::Text(value) => SqlValue::Text(value.clone()),
            Self::Date(value) => SqlValue::Text(value.format(DATE_FORMAT).to_string()),
        }
    }

    pub(crate) fn from_sql(value: SqlValue) -> Self {
        match value {
            SqlValue::Null => Self::Null,
            SqlValue::Integer(value) => Self::Integer(value),
            SqlValue::Real(value) => Self::Text(value.to_string()),
            SqlValue::Text(value) => Self::Text(value),
            SqlValue::Blob(bytes) => Self::Text(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDate> for Value {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::{ParamType, Value, ValueKind};

    #[test]
    fn null_conforms_to_any_scalar() {
        assert!(Value::Null.conforms_to(ParamType::Scalar(ValueKind::Date)));
        assert!(!Value::Null.conforms_to(ParamType::List(ValueKind::Integer)));
    }

    #[test]
    fn list_conformance_checks_every_item() {
        let ids = Value::from(vec![1_i64, 2, 3]);
        assert!(ids.conforms_to(ParamType::List(ValueKind::Integer)));

        let mixed = Value::List(vec![Value::Integer(1), Value::from("two")]);
        assert!(!mixed.conforms_to(ParamType::List(ValueKind::Integer)));
    }
}
