//! # dlog Analysis
//!
//! Scheduling, caching and reporting for the dlog analyses.
//!
//! ## Modules
//!
//! - **[`scheduler`]** - Dependency-ordered analysis runs with an explicit cache
//! - **[`config`]** - Strategy values injected into the scheduler
//! - **[`metrics`]** - Type coverage and per-clause summaries
//!
//! ## Quick Start
//!
//! ```rust
//! use dlog_analysis::prelude::*;
//! use dlog_core::ast::Program;
//!
//! let mut scheduler = AnalysisScheduler::new(Program::default(), AnalysisConfig::default());
//! scheduler.ensure(AnalysisKind::Type).unwrap();
//!
//! let report = TypeReport::from_analysis(scheduler.type_analysis().unwrap());
//! assert_eq!(report.invalid_clauses, 0);
//! ```

pub mod config;
pub mod metrics;
pub mod scheduler;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::AnalysisConfig;
    pub use crate::metrics::{ClauseSummary, RoundsDistribution, TypeCoverage, TypeReport};
    pub use crate::scheduler::{AnalysisKind, AnalysisOutput, AnalysisScheduler, SchedulerError};
}

pub use config::AnalysisConfig;
pub use metrics::{TypeCoverage, TypeReport};
pub use scheduler::{AnalysisKind, AnalysisOutput, AnalysisScheduler, SchedulerError};
