//! Rendering of predicate trees and sorts into SQLite statements.
//!
//! # Invariants
//! - The root table is always aliased `root`; a relation is aliased by its
//!   property name and joined with `LEFT JOIN`.
//! - Bind values are pushed in the same order their `?` appears in the text.
//! - Every ordered select ends with `root.<id> ASC` so ties are stable.

use super::page::{Direction, Sort};
use super::predicate::{CompareOp, LikePattern, Predicate};
use super::schema::{EntitySchema, RelationDef, ResolvedPath};
use super::QueryResult;
use rusqlite::types::Value as SqlValue;

pub(crate) const ROOT_ALIAS: &str = "root";

/// Column alias used for a relation column in eager selects.
pub(crate) fn relation_column_alias(relation: &RelationDef, column: &str) -> String {
    format!("{}__{column}", relation.property)
}

#[derive(Debug)]
pub(crate) struct Rendered {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

pub(crate) struct SelectSpec<'a> {
    pub schema: &'static EntitySchema,
    pub predicate: Option<&'a Predicate>,
    pub orders: &'a [(ResolvedPath, Direction)],
    pub eager: bool,
    pub limit: Option<u64>,
    pub offset: u64,
}

/// Resolves caller sort keys against `schema`.
pub(crate) fn resolve_sort(
    schema: &'static EntitySchema,
    sort: &Sort,
) -> QueryResult<Vec<(ResolvedPath, Direction)>> {
    sort.orders
        .iter()
        .map(|order| Ok((schema.resolve(&order.property)?, order.direction)))
        .collect()
}

pub(crate) fn render_select(spec: &SelectSpec<'_>) -> Rendered {
    let schema = spec.schema;
    let mut relations: Vec<&'static RelationDef> = Vec::new();
    if spec.eager {
        relations.extend(schema.relations.iter());
    }
    if let Some(predicate) = spec.predicate {
        predicate.collect_relations(&mut relations);
    }
    for (path, _) in spec.orders {
        if let Some(relation) = path.relation {
            if !relations.iter().any(|known| std::ptr::eq(*known, relation)) {
                relations.push(relation);
            }
        }
    }

    let mut columns: Vec<String> = schema
        .fields
        .iter()
        .map(|field| format!("{ROOT_ALIAS}.{col} AS {col}", col = field.column))
        .collect();
    if spec.eager {
        for relation in schema.relations {
            for field in relation.target.fields {
                columns.push(format!(
                    "{}.{} AS {}",
                    relation.property,
                    field.column,
                    relation_column_alias(relation, field.column)
                ));
            }
        }
    }

    let mut values = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM {} AS {ROOT_ALIAS}",
        columns.join(", "),
        schema.table
    );
    push_joins(&mut sql, &relations);
    if let Some(predicate) = spec.predicate {
        sql.push_str(" WHERE ");
        sql.push_str(&render_predicate(predicate, &mut values));
    }

    let mut order_terms: Vec<String> = spec
        .orders
        .iter()
        .map(|(path, direction)| format!("{} {}", column_ref(path), direction.sql()))
        .collect();
    let has_id_order = spec
        .orders
        .iter()
        .any(|(path, _)| path.relation.is_none() && path.field.column == schema.id_column);
    if !has_id_order {
        order_terms.push(format!("{ROOT_ALIAS}.{} ASC", schema.id_column));
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&order_terms.join(", "));

    match spec.limit {
        Some(limit) => {
            sql.push_str(" LIMIT ?");
            values.push(SqlValue::Integer(clamp_u64(limit)));
            if spec.offset > 0 {
                sql.push_str(" OFFSET ?");
                values.push(SqlValue::Integer(clamp_u64(spec.offset)));
            }
        }
        None if spec.offset > 0 => {
            sql.push_str(" LIMIT -1 OFFSET ?");
            values.push(SqlValue::Integer(clamp_u64(spec.offset)));
        }
        None => {}
    }

    Rendered { sql, values }
}

pub(crate) fn render_count(
    schema: &'static EntitySchema,
    predicate: Option<&Predicate>,
) -> Rendered {
    let mut relations = Vec::new();
    if let Some(predicate) = predicate {
        predicate.collect_relations(&mut relations);
    }

    let mut values = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {} AS {ROOT_ALIAS}", schema.table);
    push_joins(&mut sql, &relations);
    if let Some(predicate) = predicate {
        sql.push_str(" WHERE ");
        sql.push_str(&render_predicate(predicate, &mut values));
    }
    Rendered { sql, values }
}

fn push_joins(sql: &mut String, relations: &[&'static RelationDef]) {
    for relation in relations {
        sql.push_str(&format!(
            " LEFT JOIN {table} AS {alias} ON {alias}.{target_id} = {ROOT_ALIAS}.{fk}",
            table = relation.target.table,
            alias = relation.property,
            target_id = relation.target.id_column,
            fk = relation.fk_column,
        ));
    }
}

fn column_ref(path: &ResolvedPath) -> String {
    match path.relation {
        Some(relation) => format!("{}.{}", relation.property, path.field.column),
        None => format!("{ROOT_ALIAS}.{}", path.field.column),
    }
}

pub(crate) fn render_predicate(predicate: &Predicate, values: &mut Vec<SqlValue>) -> String {
    match predicate {
        Predicate::Comparison { path, op, value } => {
            if value.kind().is_none() {
                match op {
                    CompareOp::Eq => return format!("{} IS NULL", column_ref(path)),
                    CompareOp::Ne => return format!("{} IS NOT NULL", column_ref(path)),
                    _ => {}
                }
            }
            values.push(value.to_sql());
            format!("{} {} ?", column_ref(path), op.sql())
        }
        Predicate::In { path, values: items } => {
            if items.is_empty() {
                return "0 = 1".to_string();
            }
            let placeholders = vec!["?"; items.len()].join(", ");
            values.extend(items.iter().map(|item| item.to_sql()));
            format!("{} IN ({placeholders})", column_ref(path))
        }
        Predicate::Like { path, pattern } => {
            let (text, escaped) = match pattern {
                LikePattern::Prefix(value) => (format!("{}%", escape_like(value)), true),
                LikePattern::Suffix(value) => (format!("%{}", escape_like(value)), true),
                LikePattern::Contains(value) => (format!("%{}%", escape_like(value)), true),
                LikePattern::Raw(value) => (value.clone(), false),
            };
            values.push(SqlValue::Text(text));
            if escaped {
                format!("{} LIKE ? ESCAPE '\\'", column_ref(path))
            } else {
                format!("{} LIKE ?", column_ref(path))
            }
        }
        Predicate::IsNull { path, negated } => {
            let operator = if *negated { "IS NOT NULL" } else { "IS NULL" };
            format!("{} {operator}", column_ref(path))
        }
        Predicate::And(items) => join_items(items, " AND ", "1 = 1", values),
        Predicate::Or(items) => join_items(items, " OR ", "0 = 1", values),
        Predicate::Not(inner) => format!("NOT ({})", render_predicate(inner, values)),
    }
}

fn join_items(
    items: &[Predicate],
    connector: &str,
    empty: &str,
    values: &mut Vec<SqlValue>,
) -> String {
    if items.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = items
        .iter()
        .map(|item| render_predicate(item, values))
        .collect();
    format!("({})", parts.join(connector))
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn clamp_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::{render_count, render_select, resolve_sort, SelectSpec};
    use crate::query::page::{Order, Sort};
    use crate::query::predicate::{Criteria, Root};
    use crate::repo::entity::Entity;
    use crate::Person;
    use rusqlite::types::Value as SqlValue;

    #[test]
    fn relation_predicate_adds_left_join() {
        let root = Root::<Person>::new();
        let predicate = Criteria.gt(root.join("address").unwrap().get("id").unwrap(), 2_i64);
        let rendered = render_count(Person::schema(), Some(&predicate));
        assert_eq!(
            rendered.sql,
            "SELECT COUNT(*) FROM tbl_person AS root \
             LEFT JOIN tbl_address AS address ON address.id = root.address_id \
             WHERE address.id > ?"
        );
        assert_eq!(rendered.values, vec![SqlValue::Integer(2)]);
    }

    #[test]
    fn select_appends_id_tie_breaker_and_paging() {
        let orders = resolve_sort(Person::schema(), &Sort::by([Order::asc("email")])).unwrap();
        let rendered = render_select(&SelectSpec {
            schema: Person::schema(),
            predicate: None,
            orders: &orders,
            eager: false,
            limit: Some(2),
            offset: 4,
        });
        assert!(rendered
            .sql
            .ends_with("ORDER BY root.email ASC, root.id ASC LIMIT ? OFFSET ?"));
        assert_eq!(rendered.values, vec![SqlValue::Integer(2), SqlValue::Integer(4)]);
    }

    #[test]
    fn prefix_patterns_escape_wildcards() {
        let root = Root::<Person>::new();
        let predicate = Criteria.starting_with(root.get("lastName").unwrap(), "50%_");
        let rendered = render_count(Person::schema(), Some(&predicate));
        assert!(rendered.sql.ends_with("root.last_name LIKE ? ESCAPE '\\'"));
        assert_eq!(rendered.values, vec![SqlValue::Text("50\\%\\_%".to_string())]);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let root = Root::<Person>::new();
        let predicate = Criteria.in_list(root.get("id").unwrap(), Vec::<i64>::new());
        let rendered = render_count(Person::schema(), Some(&predicate));
        assert!(rendered.sql.ends_with("WHERE 0 = 1"));
        assert!(rendered.values.is_empty());
    }
}
