//! The dlog driver
//!
//! Loads a JSON program, runs the scheduled analyses and renders their
//! results. The binary in `main.rs` only parses arguments, sets up logging
//! and maps [`Status`] to an exit code.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use dlog_analysis::{AnalysisConfig, AnalysisKind, AnalysisScheduler, TypeReport};
use dlog_core::ast::Program;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "dlog", version, about = "Type checking for Datalog programs")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Disable colorized output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Infer types for every clause and report the ones that cannot be typed
    Check {
        /// Program in JSON form
        program: PathBuf,

        /// Analysis configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Also print every clause annotated with its inferred types
        #[arg(long = "debug-report")]
        debug_report: bool,
    },
    /// Print the declared type lattice and relation signatures
    Lattice {
        /// Program in JSON form
        program: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Outcome of a command that ran to completion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// Some clauses could not be typed and the configuration treats that as fatal
    TypeErrors,
}

pub fn run(cli: &Cli, out: &mut impl Write) -> Result<Status> {
    if cli.no_color {
        colored::control::set_override(false);
    }
    match &cli.command {
        Commands::Check {
            program,
            config,
            format,
            debug_report,
        } => {
            let mut analysis_config = match config {
                Some(path) => AnalysisConfig::from_file(path)?,
                None => AnalysisConfig::default(),
            };
            if *debug_report {
                analysis_config = analysis_config.with_debug_report(true);
            }
            check(&load_program(program)?, analysis_config, *format, out)
        }
        Commands::Lattice { program } => {
            let mut scheduler = AnalysisScheduler::new(load_program(program)?, AnalysisConfig::default());
            scheduler.ensure(AnalysisKind::TypeEnvironment)?;
            write!(out, "{}", scheduler.type_environment()?)?;
            Ok(Status::Success)
        }
    }
}

pub fn load_program(path: &Path) -> Result<Program> {
    let source = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    Program::from_json(&source).with_context(|| format!("{} is not a valid program", path.display()))
}

pub fn check(program: &Program, config: AnalysisConfig, format: OutputFormat, out: &mut impl Write) -> Result<Status> {
    let fail_on_type_error = config.fail_on_type_error;
    let mut scheduler = AnalysisScheduler::new(program.clone(), config);
    scheduler.ensure(AnalysisKind::Type)?;
    let analysis = scheduler.type_analysis()?;
    let report = TypeReport::from_analysis(analysis);
    info!(
        clauses = report.total_clauses,
        invalid = report.invalid_clauses,
        "check finished"
    );

    match format {
        OutputFormat::Json => writeln!(out, "{}", report.to_json()?)?,
        OutputFormat::Text => {
            analysis.print(out)?;
            if report.invalid_clauses == 0 {
                writeln!(
                    out,
                    "{} {} clauses typed, {:.1}% of terms resolved",
                    "ok:".green().bold(),
                    report.total_clauses,
                    report.type_coverage.coverage_percentage
                )?;
            } else {
                writeln!(
                    out,
                    "{} {} of {} clauses could not be typed",
                    "error:".red().bold(),
                    report.invalid_clauses,
                    report.total_clauses
                )?;
            }
        }
    }

    if report.invalid_clauses > 0 && fail_on_type_error {
        Ok(Status::TypeErrors)
    } else {
        Ok(Status::Success)
    }
}
