//! The dlog command line.
//!
//! - `dlog check <program.json>` - Infer types and report clauses that cannot be typed
//! - `dlog lattice <program.json>` - Print the declared type lattice
//!
//! Logging is controlled through `RUST_LOG` (default `warn`).

use std::io;
use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;
use dlog::{Cli, Status};
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    match dlog::run(&cli, &mut stdout.lock()) {
        Ok(Status::Success) => ExitCode::SUCCESS,
        Ok(Status::TypeErrors) => ExitCode::from(1),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            ExitCode::from(2)
        }
    }
}
