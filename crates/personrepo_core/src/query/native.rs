//! Literal SQL statements with positional or named parameters.
//!
//! # Responsibility
//! - Accept `?N` positional or `:name` named placeholders, plus wildcard
//!   wrapping (`%?1%`, `%:name%`) for pattern matches.
//! - Normalize every statement to SQLite `?N` placeholders and bind values
//!   in placeholder order.
//!
//! # Invariants
//! - One statement uses one placeholder style.
//! - Placeholders inside quoted literals are left untouched.

use super::value::Value;
use super::{QueryError, QueryResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value as SqlValue;

static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(%?)(?:\?(\d*)|:([A-Za-z_][A-Za-z0-9_]*))(%?)").expect("valid placeholder regex")
});

/// Result shape a statement was registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    /// Rows mapped into the repository's entity type.
    Entities,
    /// First column of the first row.
    Scalar,
    /// Untyped rows.
    Rows,
    /// `UPDATE` / `DELETE` returning an affected-row count.
    Modifying,
}

impl StatementKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::Entities => "entity",
            Self::Scalar => "scalar",
            Self::Rows => "row set",
            Self::Modifying => "modifying",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParamStyle {
    None,
    Positional { count: usize },
    Named { names: Vec<String> },
}

/// Call-time arguments for a statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NativeParams {
    #[default]
    None,
    Positional(Vec<Value>),
    Named(Vec<(String, Value)>),
}

impl NativeParams {
    pub fn positional<V: Into<Value>>(values: impl IntoIterator<Item = V>) -> Self {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Named arguments; a leading `:` on names is optional.
    pub fn named<N: Into<String>, V: Into<Value>>(pairs: impl IntoIterator<Item = (N, V)>) -> Self {
        Self::Named(
            pairs
                .into_iter()
                .map(|(name, value)| {
                    let name: String = name.into();
                    (name.trim_start_matches(':').to_string(), value.into())
                })
                .collect(),
        )
    }
}

/// A parsed statement ready to be prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStatement {
    kind: StatementKind,
    source: String,
    sql: String,
    style: ParamStyle,
}

impl NativeStatement {
    /// Parses `source`, rewriting placeholders to SQLite syntax.
    ///
    /// # Errors
    /// - `MixedParameterStyles` when `?N` and `:name` appear together.
    /// - `MalformedDescriptor` for `?0`.
    pub fn parse(kind: StatementKind, source: &str) -> QueryResult<Self> {
        let (sql, style) = rewrite_placeholders(source)?;
        Ok(Self {
            kind,
            source: source.to_string(),
            sql,
            style,
        })
    }

    pub fn entities(source: &str) -> QueryResult<Self> {
        Self::parse(StatementKind::Entities, source)
    }

    pub fn scalar(source: &str) -> QueryResult<Self> {
        Self::parse(StatementKind::Scalar, source)
    }

    pub fn rows(source: &str) -> QueryResult<Self> {
        Self::parse(StatementKind::Rows, source)
    }

    pub fn modifying(source: &str) -> QueryResult<Self> {
        Self::parse(StatementKind::Modifying, source)
    }

    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// Statement as written by the caller.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Statement as sent to SQLite.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Orders `params` by placeholder index.
    pub fn bind(&self, params: &NativeParams) -> QueryResult<Vec<SqlValue>> {
        let ordered: Vec<Value> = match (&self.style, params) {
            (ParamStyle::None, NativeParams::None) => Vec::new(),
            (ParamStyle::None, NativeParams::Positional(values)) if values.is_empty() => Vec::new(),
            (ParamStyle::None, NativeParams::Named(values)) if values.is_empty() => Vec::new(),
            (ParamStyle::Positional { count }, NativeParams::Positional(values)) => {
                if values.len() != *count {
                    return Err(QueryError::ParameterCount {
                        query: self.source.clone(),
                        expected: *count,
                        actual: values.len(),
                    });
                }
                values.clone()
            }
            (ParamStyle::Named { names }, NativeParams::Named(values)) => names
                .iter()
                .map(|name| {
                    values
                        .iter()
                        .find(|(candidate, _)| candidate == name)
                        .map(|(_, value)| value.clone())
                        .ok_or_else(|| QueryError::MissingNamedParameter(name.clone()))
                })
                .collect::<QueryResult<_>>()?,
            (ParamStyle::Named { names }, NativeParams::None) if !names.is_empty() => {
                return Err(QueryError::MissingNamedParameter(names[0].clone()))
            }
            (style, supplied) => {
                let expected = match style {
                    ParamStyle::None => 0,
                    ParamStyle::Positional { count } => *count,
                    ParamStyle::Named { names } => names.len(),
                };
                let actual = match supplied {
                    NativeParams::None => 0,
                    NativeParams::Positional(values) => values.len(),
                    NativeParams::Named(values) => values.len(),
                };
                if expected == actual {
                    return Err(QueryError::MixedParameterStyles(self.source.clone()));
                }
                return Err(QueryError::ParameterCount {
                    query: self.source.clone(),
                    expected,
                    actual,
                });
            }
        };

        ordered
            .iter()
            .map(|value| match value {
                Value::List(_) => Err(QueryError::TypeMismatch {
                    property: self.source.clone(),
                    expected: "scalar parameter".to_string(),
                    actual: value.type_label(),
                }),
                scalar => Ok(scalar.to_sql()),
            })
            .collect()
    }
}

enum Segment<'s> {
    Code(&'s str),
    Quoted(&'s str),
}

/// Splits SQL into code and quoted-literal segments.
fn split_quoted(source: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut quote: Option<char> = None;
    for (index, ch) in source.char_indices() {
        match quote {
            None if ch == '\'' || ch == '"' => {
                if start < index {
                    segments.push(Segment::Code(&source[start..index]));
                }
                start = index;
                quote = Some(ch);
            }
            Some(open) if ch == open => {
                // Doubled quotes ('') reopen immediately on the next char.
                segments.push(Segment::Quoted(&source[start..=index]));
                start = index + 1;
                quote = None;
            }
            _ => {}
        }
    }
    if start < source.len() {
        let tail = &source[start..];
        segments.push(match quote {
            Some(_) => Segment::Quoted(tail),
            None => Segment::Code(tail),
        });
    }
    segments
}

fn rewrite_placeholders(source: &str) -> QueryResult<(String, ParamStyle)> {
    let mut sql = String::with_capacity(source.len() + 16);
    let mut names: Vec<String> = Vec::new();
    let mut positional_count = 0usize;
    let mut next_bare = 0usize;
    let mut saw_positional = false;

    for segment in split_quoted(source) {
        let code = match segment {
            Segment::Quoted(text) => {
                sql.push_str(text);
                continue;
            }
            Segment::Code(text) => text,
        };

        let mut last = 0;
        for caps in PLACEHOLDER_RE.captures_iter(code) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            sql.push_str(&code[last..whole.start()]);
            last = whole.end();

            let index = if let Some(digits) = caps.get(2) {
                if !names.is_empty() {
                    return Err(QueryError::MixedParameterStyles(source.to_string()));
                }
                saw_positional = true;
                let index = if digits.as_str().is_empty() {
                    next_bare + 1
                } else {
                    digits.as_str().parse::<usize>().unwrap_or(0)
                };
                if index == 0 {
                    return Err(QueryError::MalformedDescriptor {
                        descriptor: source.to_string(),
                        reason: "positional parameters start at ?1".to_string(),
                    });
                }
                next_bare = index;
                positional_count = positional_count.max(index);
                index
            } else if let Some(name) = caps.get(3) {
                if saw_positional {
                    return Err(QueryError::MixedParameterStyles(source.to_string()));
                }
                let name = name.as_str();
                match names.iter().position(|known| known == name) {
                    Some(position) => position + 1,
                    None => {
                        names.push(name.to_string());
                        names.len()
                    }
                }
            } else {
                continue;
            };

            let leading = caps.get(1).is_some_and(|m| !m.as_str().is_empty());
            let trailing = caps.get(4).is_some_and(|m| !m.as_str().is_empty());
            sql.push_str(&match (leading, trailing) {
                (true, true) => format!("('%' || ?{index} || '%')"),
                (true, false) => format!("('%' || ?{index})"),
                (false, true) => format!("(?{index} || '%')"),
                (false, false) => format!("?{index}"),
            });
        }
        sql.push_str(&code[last..]);
    }

    let style = if saw_positional {
        ParamStyle::Positional {
            count: positional_count,
        }
    } else if !names.is_empty() {
        ParamStyle::Named { names }
    } else {
        ParamStyle::None
    };
    Ok((sql, style))
}

#[cfg(test)]
mod tests {
    use super::{NativeParams, NativeStatement};
    use crate::query::value::Value;
    use crate::query::QueryError;
    use rusqlite::types::Value as SqlValue;

    #[test]
    fn wildcard_placeholders_are_wrapped() {
        let statement = NativeStatement::entities(
            "SELECT * FROM tbl_person WHERE last_name LIKE %?1% OR email LIKE ?2%",
        )
        .unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT * FROM tbl_person WHERE last_name LIKE ('%' || ?1 || '%') OR email LIKE (?2 || '%')"
        );
    }

    #[test]
    fn named_parameters_bind_in_first_appearance_order() {
        let statement = NativeStatement::entities(
            "SELECT * FROM tbl_person WHERE last_name = :lastName AND email = :email OR last_name = :lastName",
        )
        .unwrap();
        assert!(statement.sql().contains("last_name = ?1 AND email = ?2 OR last_name = ?1"));

        let bound = statement
            .bind(&NativeParams::named([(":email", "bb@customer.com"), ("lastName", "BB")]))
            .unwrap();
        assert_eq!(
            bound,
            vec![
                SqlValue::Text("BB".to_string()),
                SqlValue::Text("bb@customer.com".to_string())
            ]
        );
    }

    #[test]
    fn placeholders_inside_literals_are_ignored() {
        let statement =
            NativeStatement::rows("SELECT ':not_a_param', '?1' FROM tbl_person WHERE id = ?1").unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT ':not_a_param', '?1' FROM tbl_person WHERE id = ?1"
        );
        assert_eq!(statement.bind(&NativeParams::positional([1_i64])).unwrap().len(), 1);
    }

    #[test]
    fn mixed_styles_are_rejected() {
        let err = NativeStatement::rows("SELECT * FROM tbl_person WHERE id = ?1 AND email = :email")
            .unwrap_err();
        assert!(matches!(err, QueryError::MixedParameterStyles(_)));
    }

    #[test]
    fn bind_reports_missing_and_miscounted_parameters() {
        let named = NativeStatement::rows("SELECT * FROM tbl_person WHERE email = :email").unwrap();
        assert_eq!(
            named.bind(&NativeParams::named([("lastName", "AA")])),
            Err(QueryError::MissingNamedParameter("email".to_string()))
        );

        let positional =
            NativeStatement::rows("SELECT * FROM tbl_person WHERE id = ?1 OR id = ?2").unwrap();
        assert!(matches!(
            positional.bind(&NativeParams::positional([1_i64])),
            Err(QueryError::ParameterCount { expected: 2, actual: 1, .. })
        ));
        assert!(positional
            .bind(&NativeParams::Positional(vec![Value::from(vec![1_i64]), Value::Null]))
            .is_err());
    }
}
