//! Round-based fixpoint solver over a clause's constraint set
//!
//! Every term starts at Top (constants at their intrinsic type) and is only
//! ever replaced by its meet with what a constraint implies, so values move
//! monotonically down the lattice. A clause converges once a full round over
//! its constraints changes nothing.

use super::constraints::{Constraint, ConstraintSet};
use super::lattice::{Type, TypeLattice};
use crate::ast::TermId;
use crate::environment::FunctorSignature;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace, warn};

/// Why a term could not be given a valid type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCause {
    /// Constraints have no common type (Bottom)
    Conflict,
    /// Nothing ever bounded the term (Top)
    Unconstrained,
}

impl fmt::Display for ErrorCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCause::Conflict => f.write_str("conflicting types"),
            ErrorCause::Unconstrained => f.write_str("unconstrained"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermError {
    pub term: TermId,
    pub label: String,
    pub cause: ErrorCause,
}

impl fmt::Display for TermError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (term {}): {}", self.label, self.term, self.cause)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Valid,
    /// Offending terms in visiting order
    Invalid(Vec<TermError>),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }

    pub fn errors(&self) -> &[TermError] {
        match self {
            Verdict::Valid => &[],
            Verdict::Invalid(errors) => errors,
        }
    }
}

/// Lifecycle of one clause's analysis
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClausePhase {
    /// Constraints generated, no round run yet
    Built,
    Propagating,
    Converged(Verdict),
}

/// Outcome of solving one clause
#[derive(Debug, Clone, PartialEq)]
pub struct TypingResult {
    /// Final type of every term of the clause, in visiting order
    pub types: IndexMap<TermId, Type>,
    pub verdict: Verdict,
    /// Rounds run until no value changed
    pub rounds: usize,
    /// Overloads accepting the final types, per functor application term
    pub overloads: IndexMap<TermId, Vec<FunctorSignature>>,
}

/// Solver over one constraint set
///
/// `'env` is the environment the constraints borrow their overloads from;
/// `'a` only needs to cover the solver itself.
pub struct FixpointSolver<'a, 'env> {
    lattice: &'a TypeLattice,
    set: &'a ConstraintSet<'env>,
    types: IndexMap<TermId, Type>,
    /// Pinned terms whose constraints disagree with their intrinsic type
    conflicts: IndexSet<TermId>,
    phase: ClausePhase,
    rounds: usize,
    max_rounds: usize,
}

impl<'a, 'env> FixpointSolver<'a, 'env> {
    pub fn new(lattice: &'a TypeLattice, set: &'a ConstraintSet<'env>) -> Self {
        let types = set
            .terms
            .iter()
            .map(|(id, info)| (*id, info.pinned.unwrap_or(Type::Top)))
            .collect();
        Self {
            lattice,
            set,
            types,
            conflicts: IndexSet::new(),
            phase: ClausePhase::Built,
            rounds: 0,
            max_rounds: lattice.height() * set.terms.len(),
        }
    }

    pub fn phase(&self) -> &ClausePhase {
        &self.phase
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    /// Current working type of a term
    pub fn current(&self, term: TermId) -> Option<Type> {
        self.types.get(&term).copied()
    }

    /// Run one round over all constraints
    ///
    /// Returns `true` while another round is needed.
    pub fn step(&mut self) -> bool {
        if matches!(self.phase, ClausePhase::Converged(_)) {
            return false;
        }
        if self.set.is_empty() {
            self.converge();
            return false;
        }

        self.phase = ClausePhase::Propagating;
        self.rounds += 1;
        let set = self.set;
        let mut changed = false;
        for constraint in &set.constraints {
            changed |= self.apply(constraint);
        }
        trace!(round = self.rounds, changed, "solver round");

        if !changed {
            self.converge();
            return false;
        }
        if self.rounds >= self.max_rounds {
            warn!(
                rounds = self.rounds,
                limit = self.max_rounds,
                "round limit reached before fixpoint"
            );
            self.converge();
            return false;
        }
        true
    }

    /// Run rounds until convergence
    pub fn solve(mut self) -> TypingResult {
        while self.step() {}
        let overloads = self.accepted_overloads();
        let verdict = match self.phase {
            ClausePhase::Converged(verdict) => verdict,
            // step only returns false once converged
            _ => unreachable!("solver stopped before converging"),
        };
        TypingResult {
            types: self.types,
            verdict,
            rounds: self.rounds,
            overloads,
        }
    }

    /// Candidates of each functor application whose declared types admit the
    /// final operand and result types, in declaration order
    fn accepted_overloads(&self) -> IndexMap<TermId, Vec<FunctorSignature>> {
        let accepts = |term: TermId, declared: Type| {
            let ty = self.get(term);
            !ty.is_bottom() && self.lattice.leq(ty, declared)
        };
        self.set
            .constraints
            .iter()
            .filter_map(|constraint| match constraint {
                Constraint::FunctorResult {
                    result,
                    operands,
                    candidates,
                } => {
                    let accepted = candidates
                        .iter()
                        .filter(|sig| {
                            accepts(*result, sig.result)
                                && operands.iter().zip(&sig.params).all(|(term, param)| accepts(*term, *param))
                        })
                        .map(|sig| (**sig).clone())
                        .collect();
                    Some((*result, accepted))
                }
                _ => None,
            })
            .collect()
    }

    fn converge(&mut self) {
        let mut errors = Vec::new();
        for (term, ty) in &self.types {
            let cause = if self.conflicts.contains(term) || ty.is_bottom() {
                ErrorCause::Conflict
            } else if ty.is_top() {
                ErrorCause::Unconstrained
            } else {
                continue;
            };
            errors.push(TermError {
                term: *term,
                label: self.set.label(*term).to_string(),
                cause,
            });
        }
        let verdict = if errors.is_empty() {
            Verdict::Valid
        } else {
            Verdict::Invalid(errors)
        };
        debug!(rounds = self.rounds, valid = verdict.is_valid(), "clause converged");
        self.phase = ClausePhase::Converged(verdict);
    }

    fn get(&self, term: TermId) -> Type {
        self.types.get(&term).copied().unwrap_or(Type::Top)
    }

    /// Replace the term's value with its meet against `implied`
    fn narrow(&mut self, term: TermId, implied: Type) -> bool {
        let current = self.get(term);
        let next = self.lattice.meet(current, implied);
        let pinned = self.set.terms.get(&term).is_some_and(|info| info.pinned.is_some());
        if pinned {
            if next.is_bottom() {
                self.conflicts.insert(term);
            }
            return false;
        }
        if next == current {
            return false;
        }
        self.types.insert(term, next);
        true
    }

    fn apply(&mut self, constraint: &Constraint<'env>) -> bool {
        match constraint {
            Constraint::Equal(a, b) => {
                let shared = self.lattice.meet(self.get(*a), self.get(*b));
                let left = self.narrow(*a, shared);
                let right = self.narrow(*b, shared);
                left | right
            }
            Constraint::Bound(term, ty) => self.narrow(*term, *ty),
            Constraint::FunctorResult {
                result,
                operands,
                candidates,
            } => self.apply_functor(*result, operands, candidates),
            Constraint::RecordFields { record, fields } => self.apply_record(*record, fields),
        }
    }

    fn apply_functor(&mut self, result: TermId, operands: &[TermId], candidates: &[&FunctorSignature]) -> bool {
        let result_ty = self.get(result);
        let operand_tys: Vec<Type> = operands.iter().map(|t| self.get(*t)).collect();
        let compatible = |a: Type, b: Type| !self.lattice.meet(a, b).is_bottom();

        let viable: Vec<&FunctorSignature> = candidates
            .iter()
            .copied()
            .filter(|sig| {
                compatible(result_ty, sig.result)
                    && operand_tys
                        .iter()
                        .zip(&sig.params)
                        .all(|(actual, param)| compatible(*actual, *param))
            })
            .collect();

        // the join of no candidates is Bottom, so without a viable overload the
        // whole application fails, operands included
        let result_bound = self.join_all(viable.iter().map(|sig| sig.result));
        let operand_bounds: Vec<Type> = (0..operands.len())
            .map(|i| self.join_all(viable.iter().map(|sig| sig.params[i])))
            .collect();

        let mut changed = self.narrow(result, result_bound);
        for (term, bound) in operands.iter().zip(operand_bounds) {
            changed |= self.narrow(*term, bound);
        }
        changed
    }

    fn join_all(&self, types: impl Iterator<Item = Type>) -> Type {
        types.fold(Type::Bottom, |acc, ty| self.lattice.join(acc, ty))
    }

    /// Narrow a record and its fields to the record types its value admits
    ///
    /// With no record type of matching arity below it, the record and every
    /// field fall to Bottom.
    fn apply_record(&mut self, record: TermId, fields: &[TermId]) -> bool {
        let record_ty = self.get(record);
        if record_ty.is_top() {
            return false;
        }
        let shapes = self.lattice.record_shapes(record_ty, fields.len());
        let record_bound = self.join_all(shapes.iter().map(|(ty, _)| *ty));
        let mut changed = self.narrow(record, record_bound);
        for (index, term) in fields.iter().enumerate() {
            let bound = self.join_all(shapes.iter().map(|(_, types)| types[index]));
            changed |= self.narrow(*term, bound);
        }
        changed
    }
}
