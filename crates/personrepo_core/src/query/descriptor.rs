//! Method-style query descriptors compiled into predicate templates.
//!
//! # Responsibility
//! - Parse `<action>[subject]By<conditions>[OrderBy<orders>]` descriptors
//!   such as `getByLastNameStartingWithAndIdGreaterThanEqual`.
//! - Resolve property words against an [`EntitySchema`] and type-check the
//!   declared parameters once, at registration.
//! - Bind call-time arguments into a [`Predicate`].
//!
//! # Invariants
//! - A flat field wins over a relation path spelled the same way
//!   (`AddressId` is `addressId`, not `address.id`); `Address_Id` always
//!   traverses the relation.
//! - `Or` separates conjunction groups: `A And B Or C` is `(A && B) || C`.
//! - Parameters bind positionally in condition order.

use super::page::Direction;
use super::predicate::{self, CompareOp, LikePattern, Predicate};
use super::schema::{EntitySchema, ResolvedPath};
use super::value::{ParamType, Value, ValueKind};
use super::{QueryError, QueryResult};
use once_cell::sync::Lazy;
use regex::Regex;

static DESCRIPTOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(get|find|read|count)([A-Za-z0-9]*?)By([A-Z_][A-Za-z0-9_]*)?$")
        .expect("valid descriptor regex")
});
static LIMIT_SUBJECT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:Distinct)?(?:First|Top)(\d*)").expect("valid subject regex"));
static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_|[A-Z][a-z0-9]*").expect("valid word regex"));

/// What a derived query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAction {
    /// `get` / `find` / `read`: entity rows.
    Find,
    /// `count`: number of matching rows.
    Count,
}

/// Condition keyword appended to a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Equals,
    Not,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    StartingWith,
    EndingWith,
    Containing,
    Like,
    In,
    NotIn,
    IsNull,
    IsNotNull,
}

// Longest word sequences first so `GreaterThanEqual` beats `GreaterThan`.
const KEYWORDS: &[(&[&str], Keyword)] = &[
    (&["Greater", "Than", "Equal"], Keyword::GreaterThanEqual),
    (&["Less", "Than", "Equal"], Keyword::LessThanEqual),
    (&["Is", "Not", "Null"], Keyword::IsNotNull),
    (&["Greater", "Than"], Keyword::GreaterThan),
    (&["Less", "Than"], Keyword::LessThan),
    (&["Starting", "With"], Keyword::StartingWith),
    (&["Ending", "With"], Keyword::EndingWith),
    (&["Is", "Null"], Keyword::IsNull),
    (&["Not", "In"], Keyword::NotIn),
    (&["Containing"], Keyword::Containing),
    (&["Like"], Keyword::Like),
    (&["In"], Keyword::In),
    (&["Not"], Keyword::Not),
    (&["Equals"], Keyword::Equals),
    (&["Is"], Keyword::Equals),
];

impl Keyword {
    /// Parameter this keyword consumes for a property of `kind`.
    fn expected_param(self, kind: ValueKind) -> Option<ParamType> {
        match self {
            Self::IsNull | Self::IsNotNull => None,
            Self::In | Self::NotIn => Some(ParamType::List(kind)),
            Self::StartingWith | Self::EndingWith | Self::Containing | Self::Like => {
                Some(ParamType::Scalar(ValueKind::Text))
            }
            Self::Equals
            | Self::Not
            | Self::GreaterThan
            | Self::GreaterThanEqual
            | Self::LessThan
            | Self::LessThanEqual => Some(ParamType::Scalar(kind)),
        }
    }

    fn is_pattern(self) -> bool {
        matches!(
            self,
            Self::StartingWith | Self::EndingWith | Self::Containing | Self::Like
        )
    }
}

/// One compiled `property + keyword` clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub path: ResolvedPath,
    pub keyword: Keyword,
    /// Index into the call arguments, `None` for null checks.
    pub param: Option<usize>,
}

/// A descriptor compiled against one entity schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedQuery {
    descriptor: String,
    action: QueryAction,
    limit: Option<u32>,
    groups: Vec<Vec<Condition>>,
    orders: Vec<(ResolvedPath, Direction)>,
    params: Vec<ParamType>,
}

impl DerivedQuery {
    /// Parses `descriptor` and checks `params` against the resolved properties.
    ///
    /// # Errors
    /// - `MalformedDescriptor` for an unknown action, empty clause or bad limit.
    /// - `UnknownProperty` when a clause does not name a property.
    /// - `ParameterCount` / `TypeMismatch` when `params` disagree with the clauses.
    pub fn compile(
        schema: &'static EntitySchema,
        descriptor: &str,
        params: &[ParamType],
    ) -> QueryResult<Self> {
        let malformed = |reason: &str| QueryError::MalformedDescriptor {
            descriptor: descriptor.to_string(),
            reason: reason.to_string(),
        };

        let caps = DESCRIPTOR_RE
            .captures(descriptor)
            .ok_or_else(|| malformed("expected <get|find|read|count>[subject]By<conditions>"))?;
        let action = match &caps[1] {
            "count" => QueryAction::Count,
            _ => QueryAction::Find,
        };
        let limit = parse_limit(caps.get(2).map_or("", |m| m.as_str()))
            .map_err(|reason| malformed(reason))?;
        if action == QueryAction::Count && limit.is_some() {
            return Err(malformed("count queries cannot limit results"));
        }

        let rest = caps.get(3).map_or("", |m| m.as_str());
        let words = tokenize(rest).ok_or_else(|| malformed("unexpected characters"))?;
        let (condition_words, order_words) = split_order_by(&words);

        let mut groups = Vec::new();
        let mut expected = Vec::new();
        if !condition_words.is_empty() {
            for group_words in condition_words.split(|word| *word == "Or") {
                let mut group = Vec::new();
                for clause_words in group_words.split(|word| *word == "And") {
                    if clause_words.is_empty() {
                        return Err(malformed("empty condition between connectors"));
                    }
                    let (path, keyword) = parse_clause(schema, clause_words)?;
                    let param = match keyword.expected_param(path.kind()) {
                        Some(param_type) => {
                            if keyword.is_pattern() && path.kind() != ValueKind::Text {
                                return Err(QueryError::TypeMismatch {
                                    property: path.display_name(),
                                    expected: "text property for pattern match".to_string(),
                                    actual: path.kind().to_string(),
                                });
                            }
                            expected.push((path, param_type));
                            Some(expected.len() - 1)
                        }
                        None => None,
                    };
                    group.push(Condition {
                        path,
                        keyword,
                        param,
                    });
                }
                groups.push(group);
            }
        }

        let orders = match order_words {
            Some(words) => parse_orders(schema, words).map_err(|err| match err {
                OrderParseError::Empty => malformed("OrderBy without properties"),
                OrderParseError::Unknown(property) => QueryError::UnknownProperty {
                    entity: schema.name,
                    property,
                },
            })?,
            None => Vec::new(),
        };

        if expected.len() != params.len() {
            return Err(QueryError::ParameterCount {
                query: descriptor.to_string(),
                expected: expected.len(),
                actual: params.len(),
            });
        }
        for ((path, wanted), declared) in expected.iter().zip(params) {
            if wanted != declared {
                return Err(QueryError::TypeMismatch {
                    property: path.display_name(),
                    expected: wanted.to_string(),
                    actual: declared.to_string(),
                });
            }
        }

        Ok(Self {
            descriptor: descriptor.to_string(),
            action,
            limit,
            groups,
            orders,
            params: params.to_vec(),
        })
    }

    pub fn descriptor(&self) -> &str {
        &self.descriptor
    }

    pub fn action(&self) -> QueryAction {
        self.action
    }

    /// Row limit from a `First`/`TopN` subject.
    pub fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub fn params(&self) -> &[ParamType] {
        &self.params
    }

    pub fn orders(&self) -> &[(ResolvedPath, Direction)] {
        &self.orders
    }

    /// Binds `args` into a predicate; `None` means the descriptor has no
    /// conditions and matches every row.
    pub fn bind(&self, args: &[Value]) -> QueryResult<Option<Predicate>> {
        if args.len() != self.params.len() {
            return Err(QueryError::ParameterCount {
                query: self.descriptor.clone(),
                expected: self.params.len(),
                actual: args.len(),
            });
        }
        for (index, (arg, declared)) in args.iter().zip(&self.params).enumerate() {
            if !arg.conforms_to(*declared) {
                return Err(QueryError::TypeMismatch {
                    property: format!("{}#{}", self.descriptor, index + 1),
                    expected: declared.to_string(),
                    actual: arg.type_label(),
                });
            }
        }

        if self.groups.is_empty() {
            return Ok(None);
        }

        let mut disjuncts = Vec::with_capacity(self.groups.len());
        for group in &self.groups {
            let mut conjuncts = Vec::with_capacity(group.len());
            for condition in group {
                let arg = condition.param.map(|index| &args[index]);
                conjuncts.push(bind_condition(condition, arg)?);
            }
            disjuncts.push(predicate::all_of(conjuncts));
        }

        let predicate = if disjuncts.len() == 1 {
            disjuncts.remove(0)
        } else {
            predicate::any_of(disjuncts)
        };
        Ok(Some(predicate))
    }
}

fn bind_condition(condition: &Condition, arg: Option<&Value>) -> QueryResult<Predicate> {
    let path = condition.path;
    let value = arg.cloned().unwrap_or(Value::Null);
    let compare = |op: CompareOp, value: Value| Predicate::Comparison { path, op, value };

    let predicate = match condition.keyword {
        Keyword::Equals if value == Value::Null => Predicate::IsNull {
            path,
            negated: false,
        },
        Keyword::Not if value == Value::Null => Predicate::IsNull {
            path,
            negated: true,
        },
        Keyword::Equals => compare(CompareOp::Eq, value),
        Keyword::Not => compare(CompareOp::Ne, value),
        Keyword::GreaterThan => compare(CompareOp::Gt, value),
        Keyword::GreaterThanEqual => compare(CompareOp::Ge, value),
        Keyword::LessThan => compare(CompareOp::Lt, value),
        Keyword::LessThanEqual => compare(CompareOp::Le, value),
        Keyword::StartingWith
        | Keyword::EndingWith
        | Keyword::Containing
        | Keyword::Like => {
            let text = match value {
                Value::Text(text) => text,
                other => {
                    return Err(QueryError::TypeMismatch {
                        property: path.display_name(),
                        expected: "text".to_string(),
                        actual: other.type_label(),
                    })
                }
            };
            let pattern = match condition.keyword {
                Keyword::StartingWith => LikePattern::Prefix(text),
                Keyword::EndingWith => LikePattern::Suffix(text),
                Keyword::Containing => LikePattern::Contains(text),
                _ => LikePattern::Raw(text),
            };
            Predicate::Like { path, pattern }
        }
        Keyword::In | Keyword::NotIn => {
            let values = match value {
                Value::List(values) => values,
                other => {
                    return Err(QueryError::TypeMismatch {
                        property: path.display_name(),
                        expected: format!("list<{}>", path.kind()),
                        actual: other.type_label(),
                    })
                }
            };
            let membership = Predicate::In { path, values };
            if condition.keyword == Keyword::NotIn {
                predicate::not(membership)
            } else {
                membership
            }
        }
        Keyword::IsNull => Predicate::IsNull {
            path,
            negated: false,
        },
        Keyword::IsNotNull => Predicate::IsNull {
            path,
            negated: true,
        },
    };
    Ok(predicate)
}

fn parse_limit(subject: &str) -> Result<Option<u32>, &'static str> {
    let Some(caps) = LIMIT_SUBJECT_RE.captures(subject) else {
        return Ok(None);
    };
    let digits = caps.get(1).map_or("", |m| m.as_str());
    if digits.is_empty() {
        return Ok(Some(1));
    }
    match digits.parse::<u32>() {
        Ok(0) | Err(_) => Err("result limit must be a positive integer"),
        Ok(limit) => Ok(Some(limit)),
    }
}

/// Splits camel-case text into words; `_` is kept as its own word.
///
/// Returns `None` if any character is not covered by a word.
fn tokenize(text: &str) -> Option<Vec<&str>> {
    let mut words = Vec::new();
    let mut cursor = 0;
    for found in WORD_RE.find_iter(text) {
        if found.start() != cursor {
            return None;
        }
        cursor = found.end();
        words.push(found.as_str());
    }
    if cursor != text.len() {
        return None;
    }
    Some(words)
}

fn split_order_by<'w>(words: &'w [&'w str]) -> (&'w [&'w str], Option<&'w [&'w str]>) {
    let position = words
        .windows(2)
        .position(|pair| pair[0] == "Order" && pair[1] == "By");
    match position {
        Some(index) => (&words[..index], Some(&words[index + 2..])),
        None => (words, None),
    }
}

fn parse_clause(
    schema: &'static EntitySchema,
    words: &[&str],
) -> QueryResult<(ResolvedPath, Keyword)> {
    for (keyword_words, keyword) in KEYWORDS {
        if words.len() > keyword_words.len() && words.ends_with(keyword_words) {
            let property_words = &words[..words.len() - keyword_words.len()];
            if let Some(path) = resolve_words(schema, property_words) {
                return Ok((path, *keyword));
            }
        }
    }

    resolve_words(schema, words)
        .map(|path| (path, Keyword::Equals))
        .ok_or_else(|| QueryError::UnknownProperty {
            entity: schema.name,
            property: words.concat(),
        })
}

/// Resolves property words to a path, honoring flat-field precedence.
fn resolve_words(schema: &'static EntitySchema, words: &[&str]) -> Option<ResolvedPath> {
    if words.is_empty() {
        return None;
    }

    if words.contains(&"_") {
        let segments: Vec<String> = words
            .split(|word| *word == "_")
            .map(|segment| segment.concat())
            .collect();
        let [relation_name, property] = segments.as_slice() else {
            return None;
        };
        let relation = schema.relation(relation_name)?;
        let field = relation.target.field(property)?;
        return Some(ResolvedPath {
            relation: Some(relation),
            field,
        });
    }

    if let Some(field) = schema.field(&words.concat()) {
        return Some(ResolvedPath {
            relation: None,
            field,
        });
    }

    (1..words.len()).find_map(|split| {
        let relation = schema.relation(&words[..split].concat())?;
        let field = relation.target.field(&words[split..].concat())?;
        Some(ResolvedPath {
            relation: Some(relation),
            field,
        })
    })
}

enum OrderParseError {
    Empty,
    Unknown(String),
}

fn parse_orders(
    schema: &'static EntitySchema,
    words: &[&str],
) -> Result<Vec<(ResolvedPath, Direction)>, OrderParseError> {
    if words.is_empty() {
        return Err(OrderParseError::Empty);
    }

    let mut orders = Vec::new();
    let mut pending: Vec<&str> = Vec::new();
    for word in words {
        let direction = match *word {
            "Asc" => Some(Direction::Asc),
            "Desc" => Some(Direction::Desc),
            _ => None,
        };
        match direction {
            Some(direction) => {
                if pending.is_empty() {
                    return Err(OrderParseError::Empty);
                }
                let path = resolve_words(schema, &pending)
                    .ok_or_else(|| OrderParseError::Unknown(pending.concat()))?;
                orders.push((path, direction));
                pending.clear();
            }
            None => pending.push(*word),
        }
    }
    if !pending.is_empty() {
        let path = resolve_words(schema, &pending)
            .ok_or_else(|| OrderParseError::Unknown(pending.concat()))?;
        orders.push((path, Direction::Asc));
    }
    Ok(orders)
}

#[cfg(test)]
mod tests {
    use super::{tokenize, DerivedQuery, Keyword, QueryAction};
    use crate::query::page::Direction;
    use crate::query::predicate::{LikePattern, Predicate};
    use crate::query::value::{ParamType, Value, ValueKind};
    use crate::query::QueryError;
    use crate::repo::entity::Entity;
    use crate::Person;

    const TEXT: ParamType = ParamType::Scalar(ValueKind::Text);
    const INT: ParamType = ParamType::Scalar(ValueKind::Integer);

    fn compile(descriptor: &str, params: &[ParamType]) -> Result<DerivedQuery, QueryError> {
        DerivedQuery::compile(Person::schema(), descriptor, params)
    }

    #[test]
    fn tokenize_keeps_underscore_as_word() {
        assert_eq!(
            tokenize("Address_IdGreaterThan").unwrap(),
            vec!["Address", "_", "Id", "Greater", "Than"]
        );
        assert!(tokenize("lastName").is_none());
    }

    #[test]
    fn equality_is_the_default_keyword() {
        let query = compile("getByLastName", &[TEXT]).unwrap();
        assert_eq!(query.action(), QueryAction::Find);
        assert_eq!(query.groups[0][0].keyword, Keyword::Equals);
        assert_eq!(query.groups[0][0].path.field.column, "last_name");
    }

    #[test]
    fn longest_keyword_wins() {
        let query = compile("getByLastNameStartingWithAndIdGreaterThanEqual", &[TEXT, INT]).unwrap();
        let group = &query.groups[0];
        assert_eq!(group[0].keyword, Keyword::StartingWith);
        assert_eq!(group[1].keyword, Keyword::GreaterThanEqual);
        assert_eq!(group[1].param, Some(1));
    }

    #[test]
    fn flat_field_takes_precedence_over_relation_path() {
        let flat = compile("getByAddressIdGreaterThan", &[INT]).unwrap();
        assert!(flat.groups[0][0].path.relation.is_none());
        assert_eq!(flat.groups[0][0].path.field.column, "address_id");

        let nested = compile("getByAddress_IdGreaterThan", &[INT]).unwrap();
        let path = nested.groups[0][0].path;
        assert_eq!(path.relation.map(|relation| relation.property), Some("address"));
        assert_eq!(path.field.column, "id");
    }

    #[test]
    fn relation_is_traversed_when_no_flat_field_matches() {
        let query = compile("findByAddressCity", &[TEXT]).unwrap();
        assert_eq!(query.groups[0][0].path.display_name(), "address.city");
    }

    #[test]
    fn in_keyword_requires_list_parameter() {
        compile("getAllByIdIn", &[ParamType::List(ValueKind::Integer)]).unwrap();
        let err = compile("getAllByIdIn", &[INT]).unwrap_err();
        assert!(matches!(err, QueryError::TypeMismatch { .. }));
    }

    #[test]
    fn registration_rejects_bad_descriptors() {
        assert!(matches!(
            compile("fetchByLastName", &[TEXT]),
            Err(QueryError::MalformedDescriptor { .. })
        ));
        assert!(matches!(
            compile("getByLastNameAndAndEmail", &[TEXT, TEXT]),
            Err(QueryError::MalformedDescriptor { .. })
        ));
        assert!(matches!(
            compile("getByNickname", &[TEXT]),
            Err(QueryError::UnknownProperty { .. })
        ));
        assert!(matches!(
            compile("getByLastName", &[]),
            Err(QueryError::ParameterCount { expected: 1, actual: 0, .. })
        ));
        assert!(matches!(
            compile("getByIdStartingWith", &[TEXT]),
            Err(QueryError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn or_separates_conjunction_groups() {
        let query = compile("findByLastNameAndEmailOrId", &[TEXT, TEXT, INT]).unwrap();
        let predicate = query
            .bind(&[Value::from("AA"), Value::from("aa@customer.com"), Value::from(5_i64)])
            .unwrap()
            .unwrap();
        let Predicate::Or(groups) = predicate else {
            panic!("expected disjunction");
        };
        assert_eq!(groups.len(), 2);
        assert!(matches!(&groups[0], Predicate::And(items) if items.len() == 2));
    }

    #[test]
    fn subject_limit_and_order_by_are_parsed() {
        let query = compile("findTop3ByOrderByBirthDescIdAsc", &[]).unwrap();
        assert_eq!(query.limit(), Some(3));
        assert_eq!(query.orders().len(), 2);
        assert_eq!(query.orders()[0].1, Direction::Desc);
        assert!(query.bind(&[]).unwrap().is_none());

        let first = compile("findFirstByOrderByIdDesc", &[]).unwrap();
        assert_eq!(first.limit(), Some(1));
    }

    #[test]
    fn bind_checks_argument_types() {
        let query = compile("getByLastNameStartingWith", &[TEXT]).unwrap();
        let predicate = query.bind(&[Value::from("I")]).unwrap().unwrap();
        assert!(matches!(
            predicate,
            Predicate::And(ref items)
                if matches!(&items[0], Predicate::Like { pattern: LikePattern::Prefix(p), .. } if p == "I")
        ));
        assert!(query.bind(&[Value::from(1_i64)]).is_err());
        assert!(query.bind(&[]).is_err());
    }

    #[test]
    fn null_equality_binds_as_null_check() {
        let query = compile("findByBirth", &[ParamType::Scalar(ValueKind::Date)]).unwrap();
        let predicate = query.bind(&[Value::Null]).unwrap().unwrap();
        assert!(matches!(
            predicate,
            Predicate::And(ref items) if matches!(items[0], Predicate::IsNull { negated: false, .. })
        ));
    }

    #[test]
    fn count_action_is_recognized() {
        let query = compile("countByEmailEndingWith", &[TEXT]).unwrap();
        assert_eq!(query.action(), QueryAction::Count);
        assert!(compile("countTop2ByEmail", &[TEXT]).is_err());
    }
}
