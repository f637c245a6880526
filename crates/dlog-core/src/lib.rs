//! # dlog-core
//!
//! Type inference for Datalog programs.
//!
//! ## Modules
//!
//! - **[`ast`]** - Clauses, literals and arguments with stable term ids
//! - **[`environment`]** - Declared types, relation signatures and functor overloads
//! - **[`dataflow`]** - Type lattice, constraint builder, fixpoint solver and [`TypeAnalysis`]
//!
//! ## Quick Start
//!
//! ```rust
//! use dlog_core::prelude::*;
//!
//! let program = ProgramBuilder::new()
//!     .relation("A", &[("x", "number")])
//!     .clause(
//!         Atom::new("B", vec![Argument::var("x")]),
//!         vec![Literal::atom("A", vec![Argument::var("x")])],
//!     )
//!     .build();
//!
//! let env = TypeEnvironment::from_program(&program).unwrap();
//! let mut analysis = TypeAnalysis::new(TypeAnalysisConfig::default());
//! analysis.run(&program, &env);
//!
//! assert!(analysis.is_valid());
//! assert_eq!(analysis.type_name(TermId(0)), Some("number"));
//! ```

pub mod ast;
pub mod dataflow;
pub mod environment;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::ast::{
        AggregateOp, Argument, ArgumentKind, Atom, BinaryOp, Clause, Constant, Literal, Program, ProgramBuilder, TermId,
    };
    pub use crate::dataflow::{
        ClauseReport, ErrorCause, PolymorphicOp, TermError, Type, TypeAnalysis, TypeAnalysisConfig, TypeAttribute, TypeLattice, Verdict,
    };
    pub use crate::environment::{EnvironmentError, TypeEnvironment};
}

pub use dataflow::{TypeAnalysis, TypeAnalysisConfig};
pub use environment::{EnvironmentError, TypeEnvironment};
