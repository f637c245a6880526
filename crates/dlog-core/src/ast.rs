//! Program representation consumed by the type analysis
//!
//! Every argument occurrence carries a [`TermId`] assigned when the program is
//! built. Analyses key their side tables by id and never own AST nodes, so two
//! occurrences of the same source variable are two distinct terms.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a single argument occurrence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TermId(pub u32);

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Literal constant with an intrinsic type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constant {
    Number(i64),
    Unsigned(u64),
    Float(f64),
    Symbol(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Number(n) => write!(f, "{n}"),
            Constant::Unsigned(n) => write!(f, "{n}u"),
            Constant::Float(x) => write!(f, "{x:?}"),
            Constant::Symbol(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateOp {
    Count,
    Sum,
    Min,
    Max,
    Mean,
}

impl fmt::Display for AggregateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AggregateOp::Count => "count",
            AggregateOp::Sum => "sum",
            AggregateOp::Min => "min",
            AggregateOp::Max => "max",
            AggregateOp::Mean => "mean",
        };
        f.write_str(name)
    }
}

/// The shape of an argument occurrence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgumentKind {
    Variable(String),
    /// `_`
    Unnamed,
    /// `$`
    Counter,
    Constant(Constant),
    Functor {
        name: String,
        args: Vec<Argument>,
    },
    /// Record constructor `[a, b, ...]`
    Record(Vec<Argument>),
    Aggregate {
        op: AggregateOp,
        #[serde(default)]
        target: Option<Box<Argument>>,
        body: Vec<Literal>,
    },
}

/// A single argument occurrence (a term)
///
/// Serialised as its bare [`ArgumentKind`]; ids are reassigned by
/// [`Program::assign_term_ids`] after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ArgumentKind", into = "ArgumentKind")]
pub struct Argument {
    pub id: TermId,
    pub kind: ArgumentKind,
}

impl From<ArgumentKind> for Argument {
    fn from(kind: ArgumentKind) -> Self {
        Self {
            id: TermId::default(),
            kind,
        }
    }
}

impl From<Argument> for ArgumentKind {
    fn from(arg: Argument) -> Self {
        arg.kind
    }
}

impl Argument {
    pub fn var(name: &str) -> Self {
        ArgumentKind::Variable(name.to_string()).into()
    }

    pub fn unnamed() -> Self {
        ArgumentKind::Unnamed.into()
    }

    pub fn counter() -> Self {
        ArgumentKind::Counter.into()
    }

    pub fn number(n: i64) -> Self {
        ArgumentKind::Constant(Constant::Number(n)).into()
    }

    pub fn unsigned(n: u64) -> Self {
        ArgumentKind::Constant(Constant::Unsigned(n)).into()
    }

    pub fn float(x: f64) -> Self {
        ArgumentKind::Constant(Constant::Float(x)).into()
    }

    pub fn symbol(s: &str) -> Self {
        ArgumentKind::Constant(Constant::Symbol(s.to_string())).into()
    }

    pub fn functor(name: &str, args: Vec<Argument>) -> Self {
        ArgumentKind::Functor {
            name: name.to_string(),
            args,
        }
        .into()
    }

    pub fn record(args: Vec<Argument>) -> Self {
        ArgumentKind::Record(args).into()
    }

    pub fn aggregate(op: AggregateOp, target: Option<Argument>, body: Vec<Literal>) -> Self {
        ArgumentKind::Aggregate {
            op,
            target: target.map(Box::new),
            body,
        }
        .into()
    }

    /// Name of the variable, if this occurrence is a named variable
    pub fn variable_name(&self) -> Option<&str> {
        match &self.kind {
            ArgumentKind::Variable(name) => Some(name),
            _ => None,
        }
    }

    /// Visit this argument and all nested arguments in pre-order
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Argument)) {
        f(self);
        match &self.kind {
            ArgumentKind::Functor { args, .. } | ArgumentKind::Record(args) => {
                for arg in args {
                    arg.visit(f);
                }
            }
            ArgumentKind::Aggregate { target, body, .. } => {
                if let Some(target) = target {
                    target.visit(f);
                }
                for lit in body {
                    lit.visit(f);
                }
            }
            _ => {}
        }
    }

    fn visit_mut(&mut self, f: &mut impl FnMut(&mut Argument)) {
        f(self);
        match &mut self.kind {
            ArgumentKind::Functor { args, .. } | ArgumentKind::Record(args) => {
                for arg in args {
                    arg.visit_mut(f);
                }
            }
            ArgumentKind::Aggregate { target, body, .. } => {
                if let Some(target) = target {
                    target.visit_mut(f);
                }
                for lit in body {
                    lit.visit_mut(f);
                }
            }
            _ => {}
        }
    }
}

fn is_infix_operator(name: &str) -> bool {
    matches!(name, "+" | "-" | "*" | "/" | "%")
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ArgumentKind::Variable(name) => f.write_str(name),
            ArgumentKind::Unnamed => f.write_str("_"),
            ArgumentKind::Counter => f.write_str("$"),
            ArgumentKind::Constant(c) => write!(f, "{c}"),
            ArgumentKind::Functor { name, args } if is_infix_operator(name) && args.len() == 2 => {
                write!(f, "({} {} {})", args[0], name, args[1])
            }
            ArgumentKind::Functor { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            ArgumentKind::Record(args) => {
                f.write_str("[")?;
                write_list(f, args)?;
                f.write_str("]")
            }
            ArgumentKind::Aggregate { op, target, body } => {
                write!(f, "{op}")?;
                if let Some(target) = target {
                    write!(f, " {target}")?;
                }
                f.write_str(" : { ")?;
                write_list(f, body)?;
                f.write_str(" }")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub relation: String,
    pub args: Vec<Argument>,
}

impl Atom {
    pub fn new(relation: &str, args: Vec<Argument>) -> Self {
        Self {
            relation: relation.to_string(),
            args,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.relation)?;
        write_list(f, &self.args)?;
        f.write_str(")")
    }
}

/// Binary constraint operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Match,
    Contains,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Eq => "=",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Match => "match",
            BinaryOp::Contains => "contains",
        }
    }

    /// Whether both operands are required to be symbols
    pub fn is_symbolic(self) -> bool {
        matches!(self, BinaryOp::Match | BinaryOp::Contains)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Atom(Atom),
    Negation(Atom),
    Constraint {
        op: BinaryOp,
        lhs: Argument,
        rhs: Argument,
    },
}

impl Literal {
    pub fn atom(relation: &str, args: Vec<Argument>) -> Self {
        Literal::Atom(Atom::new(relation, args))
    }

    pub fn negation(relation: &str, args: Vec<Argument>) -> Self {
        Literal::Negation(Atom::new(relation, args))
    }

    pub fn constraint(op: BinaryOp, lhs: Argument, rhs: Argument) -> Self {
        Literal::Constraint { op, lhs, rhs }
    }

    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Argument)) {
        match self {
            Literal::Atom(atom) | Literal::Negation(atom) => {
                for arg in &atom.args {
                    arg.visit(f);
                }
            }
            Literal::Constraint { lhs, rhs, .. } => {
                lhs.visit(f);
                rhs.visit(f);
            }
        }
    }

    fn visit_mut(&mut self, f: &mut impl FnMut(&mut Argument)) {
        match self {
            Literal::Atom(atom) | Literal::Negation(atom) => {
                for arg in &mut atom.args {
                    arg.visit_mut(f);
                }
            }
            Literal::Constraint { lhs, rhs, .. } => {
                lhs.visit_mut(f);
                rhs.visit_mut(f);
            }
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Atom(atom) => write!(f, "{atom}"),
            Literal::Negation(atom) => write!(f, "!{atom}"),
            Literal::Constraint { op, lhs, rhs } if op.is_symbolic() => write!(f, "{}({lhs}, {rhs})", op.symbol()),
            Literal::Constraint { op, lhs, rhs } => write!(f, "{lhs} {} {rhs}", op.symbol()),
        }
    }
}

/// A rule: a head implied by a conjunction of body literals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clause {
    pub head: Atom,
    #[serde(default)]
    pub body: Vec<Literal>,
}

impl Clause {
    pub fn new(head: Atom, body: Vec<Literal>) -> Self {
        Self { head, body }
    }

    /// Visit every argument of the clause, head first, in pre-order
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Argument)) {
        for arg in &self.head.args {
            arg.visit(f);
        }
        for lit in &self.body {
            lit.visit(f);
        }
    }

    /// All arguments of the clause in visiting order
    pub fn arguments(&self) -> Vec<&Argument> {
        let mut out = Vec::new();
        self.visit(&mut |arg| out.push(arg));
        out
    }

    /// Ids of every occurrence of the named variable
    pub fn occurrences(&self, variable: &str) -> Vec<TermId> {
        self.arguments()
            .into_iter()
            .filter(|arg| arg.variable_name() == Some(variable))
            .map(|arg| arg.id)
            .collect()
    }

    fn visit_mut(&mut self, f: &mut impl FnMut(&mut Argument)) {
        for arg in &mut self.head.args {
            arg.visit_mut(f);
        }
        for lit in &mut self.body {
            lit.visit_mut(f);
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.head)?;
        if !self.body.is_empty() {
            f.write_str(" :- ")?;
            write_list(f, &self.body)?;
        }
        f.write_str(".")
    }
}

/// Named, typed attribute position (relation column or record field)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
}

impl Attribute {
    pub fn new(name: &str, type_name: &str) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDeclKind {
    /// `.type Name <: base`
    Subset { base: String },
    /// `.type Name = A | B`
    Union { variants: Vec<String> },
    /// `.type Name = [field: type, ...]`
    Record { fields: Vec<Attribute> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub kind: TypeDeclKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDecl {
    pub name: String,
    pub attributes: Vec<Attribute>,
}

/// One functor signature; repeated names declare overloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctorDecl {
    pub name: String,
    pub params: Vec<String>,
    pub result: String,
}

/// A translation unit: declarations plus clauses in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub types: Vec<TypeDecl>,
    #[serde(default)]
    pub relations: Vec<RelationDecl>,
    #[serde(default)]
    pub functors: Vec<FunctorDecl>,
    #[serde(default)]
    pub clauses: Vec<Clause>,
}

impl Program {
    /// Load a program from its JSON form and number its terms
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        let mut program: Program = serde_json::from_str(source)?;
        program.assign_term_ids();
        Ok(program)
    }

    /// Give every argument in the program a unique id, clause by clause in pre-order
    pub fn assign_term_ids(&mut self) {
        let mut next = 0u32;
        for clause in &mut self.clauses {
            clause.visit_mut(&mut |arg| {
                arg.id = TermId(next);
                next += 1;
            });
        }
    }

    /// Total number of terms across all clauses
    pub fn term_count(&self) -> usize {
        self.clauses.iter().map(|c| c.arguments().len()).sum()
    }
}

/// Incremental construction of a [`Program`] with term ids assigned on `build`
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    program: Program,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subset_type(mut self, name: &str, base: &str) -> Self {
        self.program.types.push(TypeDecl {
            name: name.to_string(),
            kind: TypeDeclKind::Subset { base: base.to_string() },
        });
        self
    }

    pub fn union_type(mut self, name: &str, variants: &[&str]) -> Self {
        self.program.types.push(TypeDecl {
            name: name.to_string(),
            kind: TypeDeclKind::Union {
                variants: variants.iter().map(|v| v.to_string()).collect(),
            },
        });
        self
    }

    pub fn record_type(mut self, name: &str, fields: &[(&str, &str)]) -> Self {
        self.program.types.push(TypeDecl {
            name: name.to_string(),
            kind: TypeDeclKind::Record {
                fields: fields.iter().map(|(n, t)| Attribute::new(n, t)).collect(),
            },
        });
        self
    }

    pub fn relation(mut self, name: &str, attributes: &[(&str, &str)]) -> Self {
        self.program.relations.push(RelationDecl {
            name: name.to_string(),
            attributes: attributes.iter().map(|(n, t)| Attribute::new(n, t)).collect(),
        });
        self
    }

    pub fn functor(mut self, name: &str, params: &[&str], result: &str) -> Self {
        self.program.functors.push(FunctorDecl {
            name: name.to_string(),
            params: params.iter().map(|p| p.to_string()).collect(),
            result: result.to_string(),
        });
        self
    }

    pub fn clause(mut self, head: Atom, body: Vec<Literal>) -> Self {
        self.program.clauses.push(Clause::new(head, body));
        self
    }

    pub fn build(mut self) -> Program {
        self.program.assign_term_ids();
        self.program
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Program {
        ProgramBuilder::new()
            .relation("A", &[("x", "number")])
            .clause(
                Atom::new("D", vec![Argument::var("y")]),
                vec![
                    Literal::atom("A", vec![Argument::var("x")]),
                    Literal::constraint(
                        BinaryOp::Eq,
                        Argument::var("y"),
                        Argument::functor("+", vec![Argument::var("x"), Argument::number(1)]),
                    ),
                ],
            )
            .build()
    }

    #[test]
    fn test_clause_display() {
        let program = sample();
        assert_eq!(program.clauses[0].to_string(), "D(y) :- A(x), y = (x + 1).");
    }

    #[test]
    fn test_fact_display() {
        let clause = Clause::new(Atom::new("F", vec![Argument::symbol("a"), Argument::float(1.0)]), vec![]);
        assert_eq!(clause.to_string(), "F(\"a\", 1.0).");
    }

    #[test]
    fn test_aggregate_and_record_display() {
        let agg = Argument::aggregate(
            AggregateOp::Sum,
            Some(Argument::var("v")),
            vec![Literal::atom("A", vec![Argument::var("v")])],
        );
        assert_eq!(agg.to_string(), "sum v : { A(v) }");
        let rec = Argument::record(vec![Argument::number(1), Argument::unnamed()]);
        assert_eq!(rec.to_string(), "[1, _]");
        let lit = Literal::constraint(BinaryOp::Match, Argument::symbol("a.*"), Argument::var("s"));
        assert_eq!(lit.to_string(), "match(\"a.*\", s)");
    }

    #[test]
    fn test_term_ids_are_unique_and_preorder() {
        let program = sample();
        let ids: Vec<u32> = program.clauses[0].arguments().iter().map(|a| a.id.0).collect();
        // y, x, y, (x + 1), x, 1
        assert_eq!(ids, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(program.term_count(), 6);
    }

    #[test]
    fn test_occurrences() {
        let program = sample();
        let clause = &program.clauses[0];
        assert_eq!(clause.occurrences("x"), vec![TermId(1), TermId(4)]);
        assert_eq!(clause.occurrences("y"), vec![TermId(0), TermId(2)]);
        assert!(clause.occurrences("z").is_empty());
    }

    #[test]
    fn test_from_json_assigns_ids() {
        let json = r#"{
            "relations": [{"name": "A", "attributes": [{"name": "x", "type": "number"}]}],
            "clauses": [
                {"head": {"relation": "B", "args": [{"variable": "x"}]},
                 "body": [{"atom": {"relation": "A", "args": [{"variable": "x"}]}}]},
                {"head": {"relation": "A", "args": [{"constant": {"number": 3}}]}}
            ]
        }"#;
        let program = Program::from_json(json).expect("valid program");
        assert_eq!(program.clauses.len(), 2);
        assert_eq!(program.clauses[1].head.args[0].id, TermId(2));
        assert_eq!(program.clauses[1].to_string(), "A(3).");
    }
}
