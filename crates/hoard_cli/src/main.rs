//! `entity-hoard` entry point.
//!
//! # Responsibility
//! - Resolve configuration, start file logging and open the store.
//! - Hand stdin/stdout to the shell and close the store on the way out.

use hoard_cli::config::HoardConfig;
use hoard_cli::interrupt::{self, InterruptFlag};
use hoard_cli::shell::Shell;
use hoard_core::{init_logging, open_db, EntityService, SqliteEntityRepository};
use log::{error, info, warn};
use std::io;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config = match HoardConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: cannot resolve working directory: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&config.log_level, &config.log_dir) {
        eprintln!("warning: file logging disabled: {err}");
    }
    info!(
        "event=cli_start module=cli version={} db_path={}",
        hoard_core::core_version(),
        config.db_path.display()
    );

    let db = match open_db(&config.db_path) {
        Ok(db) => db,
        Err(err) => {
            eprintln!("error: cannot open {}: {err}", config.db_path.display());
            return ExitCode::FAILURE;
        }
    };

    let interrupt = interrupt::install().unwrap_or_else(|err| {
        warn!("event=interrupt_install module=cli status=error error={err}");
        InterruptFlag::default()
    });

    let service = EntityService::with_detected(SqliteEntityRepository::new(&db));
    // Stdout stays unlocked so the interrupt handler can print its prompt.
    let outcome = Shell::new(&service, io::stdin().lock(), io::stdout(), interrupt)
        .run(&config.db_path);
    drop(service);

    if let Err(err) = db.close() {
        warn!("event=app_exit module=cli status=error error={err}");
    }

    match outcome {
        Ok(()) => {
            println!("Goodbye");
            info!("event=app_exit module=cli status=ok");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=app_exit module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
