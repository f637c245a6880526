//! Program-wide type analysis
//!
//! Runs constraint building and solving for every clause in declaration
//! order, merges the per-clause typings into one term → type table and keeps
//! a human-readable log of every clause that could not be typed.

use super::constraints::ConstraintBuilder;
use super::lattice::{Type, TypeAttribute, TypeLattice};
use super::solver::{FixpointSolver, TypingResult, Verdict};
use crate::ast::{AggregateOp, Argument, ArgumentKind, Atom, BinaryOp, Clause, Literal, Program, TermId};
use crate::environment::{FunctorSignature, TypeEnvironment};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::io;
use tracing::{debug, info};

/// Knobs of the type analysis
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeAnalysisConfig {
    /// Also log every clause annotated with its inferred types
    pub debug_report: bool,
}

/// Outcome of one clause, in program order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClauseReport {
    pub index: usize,
    pub clause_text: String,
    pub verdict: Verdict,
    pub rounds: usize,
}

/// A comparison or aggregate bound to the domain of its operands
///
/// Comparisons are keyed by their left operand, aggregates by the aggregate
/// term itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolymorphicOp {
    Comparison { op: BinaryOp, domain: TypeAttribute },
    Aggregate { op: AggregateOp, domain: TypeAttribute },
}

/// Type analysis over a whole program
///
/// State is rebuilt from scratch by every call to [`TypeAnalysis::run`] and is
/// read-only in between.
#[derive(Debug, Default)]
pub struct TypeAnalysis {
    config: TypeAnalysisConfig,
    types: IndexMap<TermId, Type>,
    type_names: IndexMap<TermId, String>,
    attributes: IndexMap<TermId, TypeAttribute>,
    overloads: IndexMap<TermId, Vec<FunctorSignature>>,
    operators: IndexMap<TermId, PolymorphicOp>,
    reports: Vec<ClauseReport>,
    log: String,
}

impl TypeAnalysis {
    pub const NAME: &'static str = "type-analysis";

    pub fn new(config: TypeAnalysisConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn config(&self) -> &TypeAnalysisConfig {
        &self.config
    }

    /// Build and solve the constraints of a single clause
    pub fn analyse_types(env: &TypeEnvironment, clause: &Clause) -> TypingResult {
        let set = ConstraintBuilder::build(env, clause);
        FixpointSolver::new(env.lattice(), &set).solve()
    }

    pub fn run(&mut self, program: &Program, env: &TypeEnvironment) {
        self.types.clear();
        self.type_names.clear();
        self.attributes.clear();
        self.overloads.clear();
        self.operators.clear();
        self.reports.clear();
        self.log.clear();

        let lattice = env.lattice();
        for (index, clause) in program.clauses.iter().enumerate() {
            let result = Self::analyse_types(env, clause);
            let clause_text = clause.to_string();

            if self.config.debug_report {
                self.log.push_str(&annotate(clause, &result, lattice));
                self.log.push('\n');
            }
            if let Verdict::Invalid(errors) = &result.verdict {
                debug!(clause = %clause_text, errors = errors.len(), "clause is not well typed");
                let _ = writeln!(self.log, "Unable to deduce valid type for clause {clause_text}");
                for error in errors {
                    let _ = writeln!(self.log, "  {error}");
                }
            }

            for (term, ty) in &result.types {
                self.types.insert(*term, *ty);
                self.type_names.insert(*term, lattice.name_of(*ty).to_string());
                if let Some(attribute) = lattice.attribute(*ty) {
                    self.attributes.insert(*term, attribute);
                }
            }
            self.operators.extend(resolve_operators(clause, &result, lattice));
            self.overloads.extend(result.overloads);
            self.reports.push(ClauseReport {
                index,
                clause_text,
                verdict: result.verdict,
                rounds: result.rounds,
            });
        }

        info!(
            clauses = self.reports.len(),
            invalid = self.invalid_clauses(),
            terms = self.types.len(),
            "type analysis finished"
        );
    }

    /// Write the accumulated diagnostic log verbatim
    pub fn print(&self, out: &mut impl io::Write) -> io::Result<()> {
        out.write_all(self.log.as_bytes())
    }

    pub fn log(&self) -> &str {
        &self.log
    }

    /// Type of a term of the analysed program
    ///
    /// # Panics
    ///
    /// Panics if `term` was not part of the program given to the last `run`.
    pub fn get_type(&self, term: TermId) -> Type {
        match self.types.get(&term) {
            Some(ty) => *ty,
            None => panic!("type analysis has no entry for term {term}; it was not part of the analysed program"),
        }
    }

    pub fn try_type(&self, term: TermId) -> Option<Type> {
        self.types.get(&term).copied()
    }

    /// Name of the term's type, `⊤` and `⊥` included
    pub fn type_name(&self, term: TermId) -> Option<&str> {
        self.type_names.get(&term).map(String::as_str)
    }

    /// Whether the term ended strictly between the bounds
    pub fn has_valid_type_info(&self, term: TermId) -> bool {
        self.try_type(term).is_some_and(|ty| !ty.is_top() && !ty.is_bottom())
    }

    pub fn type_attribute(&self, term: TermId) -> Option<TypeAttribute> {
        self.attributes.get(&term).copied()
    }

    /// Overloads of the functor application `term` that accept its final types
    pub fn functor_overloads(&self, term: TermId) -> &[FunctorSignature] {
        self.overloads.get(&term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The overload a functor application resolves to
    ///
    /// An accepted overload returning exactly the inferred type wins, then the
    /// first accepted one in declaration order.
    pub fn functor_overload(&self, term: TermId) -> Option<&FunctorSignature> {
        let accepted = self.functor_overloads(term);
        let ty = self.try_type(term)?;
        accepted.iter().find(|sig| sig.result == ty).or_else(|| accepted.first())
    }

    pub fn functor_return_type(&self, term: TermId) -> Option<Type> {
        self.functor_overload(term).map(|sig| sig.result)
    }

    pub fn functor_arg_type(&self, term: TermId, index: usize) -> Option<Type> {
        self.functor_overload(term)?.params.get(index).copied()
    }

    /// Domain a comparison (by left operand) or aggregate term operates on
    pub fn polymorphic_op(&self, term: TermId) -> Option<PolymorphicOp> {
        self.operators.get(&term).copied()
    }

    pub fn reports(&self) -> &[ClauseReport] {
        &self.reports
    }

    pub fn invalid_clauses(&self) -> usize {
        self.reports.iter().filter(|r| !r.verdict.is_valid()).count()
    }

    pub fn is_valid(&self) -> bool {
        self.invalid_clauses() == 0
    }

    /// Every typed term, in program order
    pub fn types(&self) -> impl Iterator<Item = (TermId, Type)> + '_ {
        self.types.iter().map(|(term, ty)| (*term, *ty))
    }
}

/// Bind every comparison and aggregate of a clause to its operand domain
///
/// Operators whose operands have no single physical domain are left out.
fn resolve_operators(clause: &Clause, result: &TypingResult, lattice: &TypeLattice) -> Vec<(TermId, PolymorphicOp)> {
    let domain_of = |term: TermId| result.types.get(&term).and_then(|ty| lattice.attribute(*ty));

    let mut literals: Vec<&Literal> = clause.body.iter().collect();
    let mut aggregates = Vec::new();
    clause.visit(&mut |arg| {
        if let ArgumentKind::Aggregate { op, target, body } = &arg.kind {
            literals.extend(body);
            aggregates.push((arg.id, *op, target.as_ref().map(|t| t.id)));
        }
    });

    let mut resolved = Vec::new();
    for literal in literals {
        if let Literal::Constraint { op, lhs, rhs } = literal {
            if let Some(domain) = domain_of(lhs.id).or_else(|| domain_of(rhs.id)) {
                resolved.push((lhs.id, PolymorphicOp::Comparison { op: *op, domain }));
            }
        }
    }
    for (term, op, target) in aggregates {
        let domain = match (op, target) {
            (AggregateOp::Count, _) => Some(TypeAttribute::Signed),
            (_, Some(target)) => domain_of(target),
            (_, None) => None,
        };
        if let Some(domain) = domain {
            resolved.push((term, PolymorphicOp::Aggregate { op, domain }));
        }
    }
    resolved
}

/// Render a clause with the inferred type after each top-level argument
fn annotate(clause: &Clause, result: &TypingResult, lattice: &TypeLattice) -> String {
    let typed = |arg: &Argument| {
        let ty = result.types.get(&arg.id).copied().unwrap_or(Type::Top);
        format!("{arg}: {}", lattice.name_of(ty))
    };
    let render_atom = |atom: &Atom| {
        let args: Vec<String> = atom.args.iter().map(typed).collect();
        format!("{}({})", atom.relation, args.join(", "))
    };

    let mut out = render_atom(&clause.head);
    let body: Vec<String> = clause
        .body
        .iter()
        .map(|literal| match literal {
            Literal::Atom(a) => render_atom(a),
            Literal::Negation(a) => format!("!{}", render_atom(a)),
            Literal::Constraint { op, lhs, rhs } if op.is_symbolic() => {
                format!("{}({}, {})", op.symbol(), typed(lhs), typed(rhs))
            }
            Literal::Constraint { op, lhs, rhs } => format!("{} {} {}", typed(lhs), op.symbol(), typed(rhs)),
        })
        .collect();
    if !body.is_empty() {
        out.push_str(" :- ");
        out.push_str(&body.join(", "));
    }
    out.push('.');
    out
}
