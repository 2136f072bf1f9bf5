//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `structure_core` linkage and environment configuration.
//! - Open the configured store and print entity row counts.

use std::process::ExitCode;
use structure_core::{Client, ModelContext, ModelStore, StoreConfig, User};

fn main() -> ExitCode {
    println!("structure_core ping={}", structure_core::ping());
    println!("structure_core version={}", structure_core::core_version());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), String> {
    let config = StoreConfig::from_env().map_err(|err| err.to_string())?;
    let logging = config.init_logging()?;
    println!("logging enabled={logging} level={}", config.log_level);

    let mut conn = config.open_connection().map_err(|err| err.to_string())?;
    let ctx = ModelContext::try_new(&mut conn).map_err(|err| err.to_string())?;

    let clients = ctx
        .as_queryable::<Client>(&[])
        .count()
        .map_err(|err| err.to_string())?;
    let users = ctx
        .as_queryable::<User>(&[])
        .count()
        .map_err(|err| err.to_string())?;
    println!("store clients={clients} users={users}");
    Ok(())
}
