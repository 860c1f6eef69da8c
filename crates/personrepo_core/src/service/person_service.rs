//! Person use-case service.
//!
//! # Responsibility
//! - Wrap multi-step person writes in one transaction each.
//! - Run paged reads inside a read-only transaction.
//!
//! # Invariants
//! - Called from inside an existing transaction, every method joins it.
//! - A failed call leaves no partial writes behind in a transaction it owns.

use crate::db::{run_in_transaction, ExecutionContext, TxMode};
use crate::model::address::Address;
use crate::model::person::Person;
use crate::query::page::{Page, PageRequest};
use crate::repo::entity::LoadStrategy;
use crate::repo::person_repo::PersonRepository;
use crate::repo::RepoResult;
use log::{info, warn};

/// Use-case service over a [`PersonRepository`].
pub struct PersonService<R: PersonRepository> {
    repo: R,
}

impl<R: PersonRepository> PersonService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Sets `email` on every person named `last_name`.
    pub fn update_person(
        &self,
        ctx: &ExecutionContext<'_>,
        last_name: &str,
        email: &str,
    ) -> RepoResult<usize> {
        let changed = run_in_transaction(ctx, TxMode::ReadWrite, |tx| {
            self.repo.update_person(tx, last_name, email)
        })?;
        info!("event=person_update module=service status=ok changed={changed}");
        Ok(changed)
    }

    /// Inserts `persons` atomically; on any failure none of them persist.
    pub fn batch_insert(
        &self,
        ctx: &ExecutionContext<'_>,
        persons: Vec<Person>,
    ) -> RepoResult<Vec<Person>> {
        let requested = persons.len();
        let result = run_in_transaction(ctx, TxMode::ReadWrite, |tx| {
            self.repo.save_all(tx, persons)
        });
        match &result {
            Ok(saved) => info!(
                "event=person_batch_insert module=service status=ok count={}",
                saved.len()
            ),
            Err(err) => warn!(
                "event=person_batch_insert module=service status=error count={requested} error={err}"
            ),
        }
        result
    }

    /// Saves `address`, then `person` pointing at it, as one unit.
    pub fn register_with_address(
        &self,
        ctx: &ExecutionContext<'_>,
        address: Address,
        mut person: Person,
    ) -> RepoResult<Person> {
        run_in_transaction(ctx, TxMode::ReadWrite, |tx| -> RepoResult<Person> {
            let address = self.repo.save_address(tx, address)?;
            person.set_address(address);
            self.repo.save_and_flush(tx, person)
        })
    }

    pub fn page_persons(
        &self,
        ctx: &ExecutionContext<'_>,
        request: &PageRequest,
        load: LoadStrategy,
    ) -> RepoResult<Page<Person>> {
        run_in_transaction(ctx, TxMode::ReadOnly, |tx| {
            self.repo.find_all_paged(tx, request, load)
        })
    }
}
