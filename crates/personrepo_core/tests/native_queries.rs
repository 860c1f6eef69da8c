use personrepo_core::{
    run_in_transaction, CrudRepository, ExecutionContext, LoadStrategy, NativeParams, Person,
    PersonRepository, QueryError, RepoError, SqlitePersonRepository, SqliteRepository,
    StatementKind, TxMode, Value,
};
use rusqlite::Connection;

#[test]
fn max_id_person_is_the_last_inserted() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = seed(&conn);

    let person = repo.get_max_id_person(&ctx).unwrap().unwrap();
    assert_eq!(person.id(), Some(26));
    assert_eq!(person.last_name(), "ZZ");
}

#[test]
fn max_id_person_on_empty_table_is_none() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    assert!(repo.get_max_id_person(&ctx).unwrap().is_none());
    assert_eq!(repo.get_count(&ctx).unwrap(), 0);
}

#[test]
fn positional_and_named_parameters_bind_by_slot() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = seed(&conn);

    let positional = repo
        .get_persons_query_parameter(&ctx, "AA", "aa@customer.com")
        .unwrap();
    assert_eq!(ids(&positional), vec![1]);

    let named = repo
        .get_person_query_named_parameter(&ctx, "bb@customer.com", "BB")
        .unwrap();
    assert_eq!(ids(&named), vec![2]);

    let mismatched = repo
        .get_persons_query_parameter(&ctx, "AA", "bb@customer.com")
        .unwrap();
    assert!(mismatched.is_empty());
}

#[test]
fn like_placeholders_wrap_values_in_wildcards() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = seed(&conn);

    let positional = repo
        .get_person_query_parameter_like(&ctx, "A", "bb")
        .unwrap();
    assert_eq!(ids(&positional), vec![1, 2]);

    let named = repo
        .get_person_query_named_parameter_like(&ctx, "cc", "D")
        .unwrap();
    assert_eq!(ids(&named), vec![3, 4]);
}

#[test]
fn count_statement_returns_scalar() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = seed(&conn);

    assert_eq!(repo.get_count(&ctx).unwrap(), 26);
}

#[test]
fn modifying_statement_requires_transaction() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = seed(&conn);

    let err = repo
        .update_person(&ctx, "AA", "changed@customer.com")
        .unwrap_err();
    assert!(matches!(err, RepoError::TransactionRequired(_)));

    let changed = run_in_transaction(&ctx, TxMode::ReadWrite, |tx| {
        repo.update_person(tx, "AA", "changed@customer.com")
    })
    .unwrap();
    assert_eq!(changed, 1);

    let person = repo
        .get_by_last_name(&ctx, "AA", LoadStrategy::Deferred)
        .unwrap()
        .unwrap();
    assert_eq!(person.email(), "changed@customer.com");
}

#[test]
fn execute_native_returns_rows_and_guards_writes() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    seed(&conn);
    let persons = SqliteRepository::<Person>::try_new(&conn).unwrap();

    let rows = persons
        .execute_native(
            &ctx,
            "SELECT id, last_name FROM tbl_person WHERE id > ?1 ORDER BY id",
            &NativeParams::positional([24]),
        )
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.get(0, "LAST_NAME"), Some(&Value::from("YY")));
    assert_eq!(rows.get(1, "id"), Some(&Value::Integer(26)));

    let delete = "DELETE FROM tbl_person WHERE id = :id";
    let err = persons
        .execute_native(&ctx, delete, &NativeParams::named([("id", 1)]))
        .unwrap_err();
    assert!(matches!(err, RepoError::TransactionRequired(_)));

    run_in_transaction(&ctx, TxMode::ReadWrite, |tx| {
        persons.execute_native(tx, delete, &NativeParams::named([("id", 1)]))
    })
    .unwrap();
    assert_eq!(persons.count(&ctx).unwrap(), 25);
}

#[test]
fn missing_named_value_is_reported() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let persons = SqliteRepository::<Person>::try_new(&conn).unwrap();

    let err = persons
        .execute_native(
            &ctx,
            "SELECT * FROM tbl_person WHERE last_name = :lastName",
            &NativeParams::named([("email", "aa@customer.com")]),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Query(QueryError::MissingNamedParameter(_))
    ));
}

#[test]
fn statement_registration_checks_sql_and_shape() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let mut persons = SqliteRepository::<Person>::try_new(&conn).unwrap();

    let mixed = persons
        .register_statement(
            &conn,
            "mixed",
            StatementKind::Entities,
            "SELECT * FROM tbl_person WHERE id = ?1 AND last_name = :lastName",
        )
        .unwrap_err();
    assert!(matches!(
        mixed,
        RepoError::Query(QueryError::MixedParameterStyles(_))
    ));

    let broken = persons
        .register_statement(&conn, "broken", StatementKind::Rows, "SELEC * FROM tbl_person")
        .unwrap_err();
    assert!(matches!(broken, RepoError::QuerySyntax { .. }));

    let misdeclared = persons
        .register_statement(
            &conn,
            "misdeclared",
            StatementKind::Entities,
            "DELETE FROM tbl_person",
        )
        .unwrap_err();
    assert!(matches!(
        misdeclared,
        RepoError::Query(QueryError::ShapeMismatch { .. })
    ));

    assert!(persons.registry().is_empty());
}

fn seed(conn: &Connection) -> SqlitePersonRepository {
    let ctx = ExecutionContext::new(conn);
    let repo = SqlitePersonRepository::try_new(conn).unwrap();
    let persons = (0..26u8)
        .map(|offset| {
            let upper = char::from(b'A' + offset);
            let lower = upper.to_ascii_lowercase();
            Person::new(
                format!("{upper}{upper}"),
                format!("{lower}{lower}@customer.com"),
                None,
            )
        })
        .collect();
    repo.save_all(&ctx, persons).unwrap();
    repo
}

fn ids(persons: &[Person]) -> Vec<i64> {
    persons.iter().filter_map(Person::id).collect()
}
