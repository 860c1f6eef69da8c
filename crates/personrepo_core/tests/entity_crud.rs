use chrono::NaiveDate;
use personrepo_core::{
    run_in_transaction, Address, CrudRepository, ExecutionContext, LoadStrategy, Order, Person,
    PersonRepository, RepoError, Sort, SqlitePersonRepository, TxMode, ValidationError,
};
use rusqlite::Connection;

#[test]
fn save_then_get_roundtrips_every_field() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let address = repo
        .save_address(&ctx, Address::new("Zhejiang", "Hangzhou"))
        .unwrap();

    let mut person = Person::new("AA", "aa@customer.com", date(1990, 3, 4));
    person.set_address(address.clone());
    let saved = repo.save(&ctx, person).unwrap();
    let id = saved.id().expect("insert should assign identity");

    let loaded = repo
        .get_by_id(&ctx, id, LoadStrategy::Eager)
        .unwrap()
        .unwrap();
    assert_eq!(loaded, saved);
    assert_eq!(loaded.birth(), date(1990, 3, 4));
    assert_eq!(loaded.address(), Some(&address));
}

#[test]
fn deferred_load_keeps_only_foreign_key() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let address = repo
        .save_address(&ctx, Address::new("Jiangsu", "Nanjing"))
        .unwrap();

    let mut person = Person::new("BB", "bb@customer.com", None);
    person.set_address_id(address.id());
    let id = repo.save(&ctx, person).unwrap().id().unwrap();

    let mut loaded = repo
        .get_by_id(&ctx, id, LoadStrategy::Deferred)
        .unwrap()
        .unwrap();
    assert!(loaded.address().is_none());
    assert_eq!(loaded.address_id(), address.id());

    let resolved = repo.load_address(&ctx, &mut loaded).unwrap();
    assert_eq!(resolved.as_ref(), Some(&address));
    assert_eq!(loaded.address(), Some(&address));
}

#[test]
fn save_and_flush_without_identity_inserts_with_generated_id() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let stored = repo
        .save_and_flush(&ctx, Person::new("CC", "cc@customer.com", None))
        .unwrap();

    assert_eq!(stored.id(), Some(1));
    assert_eq!(repo.count(&ctx).unwrap(), 1);
}

#[test]
fn save_and_flush_with_unknown_identity_inserts_that_identity() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let stored = repo
        .save_and_flush(&ctx, Person::new("DD", "dd@customer.com", None).with_id(100))
        .unwrap();

    assert_eq!(stored.id(), Some(100));
    assert!(repo.exists_by_id(&ctx, 100).unwrap());
    assert_eq!(repo.count(&ctx).unwrap(), 1);
}

#[test]
fn save_and_flush_with_existing_identity_updates_in_place() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let mut person = repo
        .save(&ctx, Person::new("EE", "ee@customer.com", None))
        .unwrap();

    person.set_email("ee-new@customer.com");
    person.set_birth(date(2000, 1, 1));
    let stored = repo.save_and_flush(&ctx, person.clone()).unwrap();

    assert_eq!(stored, person);
    assert_eq!(repo.count(&ctx).unwrap(), 1);
    assert_eq!(stored.email(), "ee-new@customer.com");
}

#[test]
fn saving_person_with_unsaved_address_is_rejected() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut person = Person::new("FF", "ff@customer.com", None);
    person.set_address(Address::new("Fujian", "Xiamen"));
    let err = repo.save(&ctx, person).unwrap_err();

    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::UnsavedRelation { .. })
    ));
    assert_eq!(repo.count(&ctx).unwrap(), 0);
}

#[test]
fn dangling_foreign_key_is_an_integrity_error() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();

    let mut person = Person::new("GG", "gg@customer.com", None);
    person.set_address_id(Some(77));
    let err = repo.save(&ctx, person).unwrap_err();

    assert!(matches!(err, RepoError::Integrity(_)));
}

#[test]
fn delete_removes_row_and_reports_missing_ids() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let id = repo
        .save(&ctx, Person::new("HH", "hh@customer.com", None))
        .unwrap()
        .id()
        .unwrap();

    repo.delete(&ctx, id).unwrap();
    assert!(repo.get_by_id(&ctx, id, LoadStrategy::Deferred).unwrap().is_none());

    let err = repo.delete(&ctx, id).unwrap_err();
    assert!(matches!(
        err,
        RepoError::NotFound {
            entity: "Person",
            ..
        }
    ));
}

#[test]
fn get_all_applies_sort_then_identity() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    for (last_name, email) in [("BB", "x@customer.com"), ("AA", "y@customer.com"), ("BB", "z@customer.com")] {
        repo.save(&ctx, Person::new(last_name, email, None)).unwrap();
    }

    let sorted = repo
        .get_all(&ctx, &Sort::by([Order::desc("lastName")]), LoadStrategy::Deferred)
        .unwrap();
    let ids: Vec<_> = sorted.iter().filter_map(Person::id).collect();
    assert_eq!(ids, vec![1, 3, 2]);
}

#[test]
fn empty_text_fields_are_stored_and_read_back() {
    let conn = personrepo_core::open_db_in_memory().unwrap();
    let ctx = ExecutionContext::new(&conn);
    let repo = SqlitePersonRepository::try_new(&conn).unwrap();
    let address = repo.save_address(&ctx, Address::new("", "")).unwrap();

    let mut person = Person::new("BB", "", None);
    person.set_address(address.clone());
    let id = repo.save(&ctx, person).unwrap().id().unwrap();
    repo.save(&ctx, Person::new("AA", "aa@customer.com", None))
        .unwrap();

    let loaded = repo
        .get_by_id(&ctx, id, LoadStrategy::Eager)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.email(), "");
    assert_eq!(loaded.address(), Some(&address));

    let changed = run_in_transaction(&ctx, TxMode::ReadWrite, |tx| {
        repo.update_person(tx, "AA", "")
    })
    .unwrap();
    assert_eq!(changed, 1);

    let updated = repo
        .get_by_last_name(&ctx, "AA", LoadStrategy::Deferred)
        .unwrap()
        .unwrap();
    assert_eq!(updated.email(), "");
    let all = repo
        .get_all(&ctx, &Sort::unsorted(), LoadStrategy::Eager)
        .unwrap();
    assert_eq!(all.len(), 2);
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqlitePersonRepository::try_new(&conn).err().unwrap();
    assert!(matches!(err, RepoError::UninitializedConnection { .. }));
}

fn date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}
