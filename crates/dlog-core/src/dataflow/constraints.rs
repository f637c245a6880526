//! Translation of one clause into typing constraints
//!
//! Constraints are transient: they are built for a single clause, consumed by
//! the [`FixpointSolver`](super::solver::FixpointSolver) and dropped. They refer
//! to terms by [`TermId`] and borrow functor signatures from the environment.

use super::lattice::{PrimitiveKind, Type};
use crate::ast::{AggregateOp, Argument, ArgumentKind, Atom, Clause, Constant, Literal, TermId};
use crate::environment::{FunctorSignature, TypeEnvironment};
use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

/// A single typing constraint
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint<'env> {
    /// Both terms must end with the same type
    Equal(TermId, TermId),
    /// The term's type is at most the given type
    Bound(TermId, Type),
    /// The result type is determined by the operands and the viable overloads
    FunctorResult {
        result: TermId,
        operands: SmallVec<[TermId; 2]>,
        candidates: SmallVec<[&'env FunctorSignature; 4]>,
    },
    /// Field terms take the field types of the record term's record type
    RecordFields {
        record: TermId,
        fields: SmallVec<[TermId; 4]>,
    },
}

impl Constraint<'_> {
    /// Terms mentioned by this constraint
    pub fn terms(&self) -> SmallVec<[TermId; 4]> {
        match self {
            Constraint::Equal(a, b) => SmallVec::from_slice(&[*a, *b]),
            Constraint::Bound(t, _) => SmallVec::from_slice(&[*t]),
            Constraint::FunctorResult { result, operands, .. } => {
                std::iter::once(*result).chain(operands.iter().copied()).collect()
            }
            Constraint::RecordFields { record, fields } => std::iter::once(*record).chain(fields.iter().copied()).collect(),
        }
    }
}

/// What the solver needs to know about a term besides its constraints
#[derive(Debug, Clone, PartialEq)]
pub struct TermInfo {
    /// Printable form of the occurrence, used in diagnostics
    pub label: String,
    /// Intrinsic type of constants; pinned terms never change
    pub pinned: Option<Type>,
}

/// The constraints of one clause plus the terms they range over
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet<'env> {
    pub constraints: Vec<Constraint<'env>>,
    /// Every term of the clause, in visiting order
    pub terms: IndexMap<TermId, TermInfo>,
}

impl<'env> ConstraintSet<'env> {
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn label(&self, term: TermId) -> &str {
        self.terms.get(&term).map(|info| info.label.as_str()).unwrap_or("?")
    }
}

/// Walks a clause and emits its constraints
pub struct ConstraintBuilder<'env> {
    env: &'env TypeEnvironment,
    set: ConstraintSet<'env>,
    /// First occurrence of each named variable
    variables: IndexMap<String, TermId>,
}

impl<'env> ConstraintBuilder<'env> {
    pub fn new(env: &'env TypeEnvironment) -> Self {
        Self {
            env,
            set: ConstraintSet::default(),
            variables: IndexMap::new(),
        }
    }

    /// Build the constraint set of a clause
    pub fn build(env: &'env TypeEnvironment, clause: &Clause) -> ConstraintSet<'env> {
        let mut builder = Self::new(env);
        builder.visit_atom(&clause.head);
        for literal in &clause.body {
            builder.visit_literal(literal);
        }
        trace!(
            clause = %clause,
            constraints = builder.set.len(),
            terms = builder.set.terms.len(),
            "constraints built"
        );
        builder.set
    }

    fn primitive(&self, prim: PrimitiveKind) -> Type {
        self.env.lattice().primitive(prim)
    }

    fn emit(&mut self, constraint: Constraint<'env>) {
        self.set.constraints.push(constraint);
    }

    fn visit_literal(&mut self, literal: &Literal) {
        match literal {
            Literal::Atom(atom) | Literal::Negation(atom) => self.visit_atom(atom),
            Literal::Constraint { op, lhs, rhs } => {
                self.visit_argument(lhs);
                self.visit_argument(rhs);
                if op.is_symbolic() {
                    let symbol = self.primitive(PrimitiveKind::Symbol);
                    self.emit(Constraint::Bound(lhs.id, symbol));
                    self.emit(Constraint::Bound(rhs.id, symbol));
                } else {
                    self.emit(Constraint::Equal(lhs.id, rhs.id));
                }
            }
        }
    }

    fn visit_atom(&mut self, atom: &Atom) {
        for arg in &atom.args {
            self.visit_argument(arg);
        }

        let env = self.env;
        let Some(attributes) = env.relation(&atom.relation) else {
            debug!(relation = %atom.relation, "relation has no declared signature");
            return;
        };
        if attributes.len() != atom.args.len() {
            debug!(
                relation = %atom.relation,
                declared = attributes.len(),
                used = atom.args.len(),
                "arity mismatch, binding common positions only"
            );
        }
        for (arg, ty) in atom.args.iter().zip(attributes) {
            self.emit(Constraint::Bound(arg.id, *ty));
        }
    }

    fn register(&mut self, arg: &Argument, pinned: Option<Type>) {
        self.set.terms.insert(
            arg.id,
            TermInfo {
                label: arg.to_string(),
                pinned,
            },
        );
    }

    fn visit_argument(&mut self, arg: &Argument) {
        match &arg.kind {
            ArgumentKind::Variable(name) => {
                self.register(arg, None);
                match self.variables.get(name) {
                    Some(&first) => self.emit(Constraint::Equal(first, arg.id)),
                    None => {
                        self.variables.insert(name.clone(), arg.id);
                    }
                }
            }
            ArgumentKind::Unnamed => self.register(arg, None),
            ArgumentKind::Counter => {
                let number = self.primitive(PrimitiveKind::Number);
                self.register(arg, Some(number));
                self.emit(Constraint::Bound(arg.id, number));
            }
            ArgumentKind::Constant(constant) => {
                let intrinsic = self.primitive(match constant {
                    Constant::Number(_) => PrimitiveKind::Number,
                    Constant::Unsigned(_) => PrimitiveKind::Unsigned,
                    Constant::Float(_) => PrimitiveKind::Float,
                    Constant::Symbol(_) => PrimitiveKind::Symbol,
                });
                self.register(arg, Some(intrinsic));
                self.emit(Constraint::Bound(arg.id, intrinsic));
            }
            ArgumentKind::Functor { name, args } => {
                self.register(arg, None);
                for operand in args {
                    self.visit_argument(operand);
                }
                let env = self.env;
                let candidates = env.functor_candidates(name, args.len());
                if candidates.is_empty() {
                    debug!(functor = %name, arity = args.len(), "no overload with matching arity");
                }
                self.emit(Constraint::FunctorResult {
                    result: arg.id,
                    operands: args.iter().map(|a| a.id).collect(),
                    candidates,
                });
            }
            ArgumentKind::Record(args) => {
                self.register(arg, None);
                for field in args {
                    self.visit_argument(field);
                }
                self.emit(Constraint::RecordFields {
                    record: arg.id,
                    fields: args.iter().map(|a| a.id).collect(),
                });
            }
            ArgumentKind::Aggregate { op, target, body } => {
                self.register(arg, None);
                if let Some(target) = target {
                    self.visit_argument(target);
                }
                for literal in body {
                    self.visit_literal(literal);
                }
                match (op, target) {
                    (AggregateOp::Count, _) => {
                        let number = self.primitive(PrimitiveKind::Number);
                        self.emit(Constraint::Bound(arg.id, number));
                    }
                    (AggregateOp::Mean, _) => {
                        let float = self.primitive(PrimitiveKind::Float);
                        self.emit(Constraint::Bound(arg.id, float));
                    }
                    (AggregateOp::Sum | AggregateOp::Min | AggregateOp::Max, Some(target)) => {
                        self.emit(Constraint::Equal(arg.id, target.id));
                    }
                    (_, None) => debug!(aggregate = %arg, "aggregate without target expression"),
                }
            }
        }
    }
}
