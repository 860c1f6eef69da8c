//! CLI smoke entry point.
//!
//! # Responsibility
//! - Open the configured store, seed it when empty and print one page of
//!   persons as JSON.
//!
//! Usage: `personrepo_cli [config.json] [page] [size]`

use chrono::NaiveDate;
use log::info;
use personrepo_core::{
    init_logging_from_config, open_db_with_config, CoreConfig, CrudRepository, ExecutionContext,
    LoadStrategy, Order, PageRequest, Person, PersonService, Sort, SqlitePersonRepository,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

const SEED_COUNT: u8 = 26;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("personrepo_cli: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let mut args = std::env::args().skip(1);
    let config_path = args.next().map(PathBuf::from);
    let config = CoreConfig::load(config_path.as_deref())?;
    init_logging_from_config(&config)?;

    let page: u32 = args.next().map(|raw| raw.parse()).transpose()?.unwrap_or(0);
    let size: u32 = args
        .next()
        .map(|raw| raw.parse())
        .transpose()?
        .unwrap_or(config.default_page_size);

    let conn = open_db_with_config(&config)?;
    let ctx = ExecutionContext::new(&conn);
    let service = PersonService::new(SqlitePersonRepository::try_new(&conn)?);

    if service.repo().count(&ctx)? == 0 {
        let saved = service.batch_insert(&ctx, seed_persons())?;
        info!("event=cli_seed module=cli status=ok count={}", saved.len());
    }

    let request = PageRequest::sorted(page, size, Sort::by([Order::desc("id")]))?;
    let result = service.page_persons(&ctx, &request, LoadStrategy::Eager)?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

/// `AA`..`ZZ` with matching `aa@customer.com`-style emails.
fn seed_persons() -> Vec<Person> {
    (0..SEED_COUNT)
        .map(|offset| {
            let upper = char::from(b'A' + offset);
            let lower = upper.to_ascii_lowercase();
            let birth = NaiveDate::from_ymd_opt(1990, 1, u32::from(offset) + 1);
            Person::new(
                format!("{upper}{upper}"),
                format!("{lower}{lower}@customer.com"),
                birth,
            )
        })
        .collect()
}
