//! pg-porter: export a PostgreSQL query result to a CSV file.
//!
//! Resolves connection settings, opens one connection, runs
//! `COPY (query) TO STDOUT` on a background task while a spinner shows
//! progress, then prints the query, output path, row count and elapsed time.
//!
//! # Security Guarantees
//! - Credentials never appear in logs or error output
//! - One connection per run, closed when the export ends

use clap::Parser;
use pgporter::{Cli, error_chain, normalize_args, run};
use pgporter_core::init_logging;
use std::process::ExitCode;
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    if let Err(e) = init_logging(cli.global.verbose, cli.global.quiet) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(&cli).await {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", error_chain(&e));
            ExitCode::FAILURE
        }
    }
}
