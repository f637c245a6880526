//! Lattice-based type inference for Datalog clauses
//!
//! This module implements the type analysis as a constraint propagation
//! problem:
//! - Type lattice with meet/join over declared types
//! - Constraint generation from clause structure
//! - Round-based fixpoint solver that narrows term types via meet
//! - Program-wide orchestration with a diagnostic log

mod constraints;
pub mod lattice;
mod solver;
mod type_analysis;

pub use constraints::{Constraint, ConstraintBuilder, ConstraintSet, TermInfo};
pub use lattice::{LatticeError, OverlapId, PrimitiveKind, Type, TypeAttribute, TypeId, TypeLattice};
pub use solver::{ClausePhase, ErrorCause, FixpointSolver, TermError, TypingResult, Verdict};
pub use type_analysis::{ClauseReport, PolymorphicOp, TypeAnalysis, TypeAnalysisConfig};
