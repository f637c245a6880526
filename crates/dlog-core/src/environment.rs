//! Declared type environment
//!
//! Collects the type lattice, relation attribute types and functor signatures
//! from a program's declarations. Intrinsic functors are always present; user
//! declarations add overloads on top of them.

use crate::ast::{FunctorDecl, Program, RelationDecl, TypeDecl};
use crate::dataflow::lattice::{LatticeError, PrimitiveKind, Type, TypeLattice};
use indexmap::IndexMap;
use smallvec::SmallVec;
use std::fmt;
use thiserror::Error;
use tracing::debug;

/// Operand types → result type of one functor overload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctorSignature {
    pub params: SmallVec<[Type; 2]>,
    pub result: Type,
}

impl FunctorSignature {
    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error(transparent)]
    Lattice(#[from] LatticeError),
    #[error("relation `{0}` is declared more than once")]
    DuplicateRelation(String),
    #[error("attribute `{attribute}` of relation `{relation}` has undeclared type `{type_name}`")]
    UnknownAttributeType {
        relation: String,
        attribute: String,
        type_name: String,
    },
    #[error("functor `{functor}` refers to undeclared type `{type_name}`")]
    UnknownFunctorType { functor: String, type_name: String },
}

/// Arithmetic functors available over every numeric primitive
const ARITHMETIC: [&str; 5] = ["+", "-", "*", "/", "%"];

#[derive(Debug, Clone)]
pub struct TypeEnvironment {
    lattice: TypeLattice,
    relations: IndexMap<String, Vec<Type>>,
    functors: IndexMap<String, Vec<FunctorSignature>>,
}

impl TypeEnvironment {
    pub fn from_program(program: &Program) -> Result<Self, EnvironmentError> {
        Self::from_declarations(&program.types, &program.relations, &program.functors)
    }

    pub fn from_declarations(
        types: &[TypeDecl],
        relations: &[RelationDecl],
        functors: &[FunctorDecl],
    ) -> Result<Self, EnvironmentError> {
        let lattice = TypeLattice::from_declarations(types)?;
        let mut env = Self {
            lattice,
            relations: IndexMap::new(),
            functors: IndexMap::new(),
        };
        env.register_intrinsics();

        for relation in relations {
            if env.relations.contains_key(&relation.name) {
                return Err(EnvironmentError::DuplicateRelation(relation.name.clone()));
            }
            let mut attributes = Vec::with_capacity(relation.attributes.len());
            for attribute in &relation.attributes {
                let ty = env.lattice.lookup(&attribute.type_name).ok_or_else(|| {
                    EnvironmentError::UnknownAttributeType {
                        relation: relation.name.clone(),
                        attribute: attribute.name.clone(),
                        type_name: attribute.type_name.clone(),
                    }
                })?;
                attributes.push(ty);
            }
            env.relations.insert(relation.name.clone(), attributes);
        }

        for functor in functors {
            let resolve = |name: &str| {
                env.lattice.lookup(name).ok_or_else(|| EnvironmentError::UnknownFunctorType {
                    functor: functor.name.clone(),
                    type_name: name.to_string(),
                })
            };
            let params = functor
                .params
                .iter()
                .map(|p| resolve(p.as_str()))
                .collect::<Result<SmallVec<[Type; 2]>, _>>()?;
            let result = resolve(functor.result.as_str())?;
            env.add_overload(&functor.name, FunctorSignature { params, result });
        }

        debug!(
            types = env.lattice.type_count(),
            relations = env.relations.len(),
            functors = env.functors.len(),
            "type environment built"
        );
        Ok(env)
    }

    fn register_intrinsics(&mut self) {
        let number = self.lattice.primitive(PrimitiveKind::Number);
        let unsigned = self.lattice.primitive(PrimitiveKind::Unsigned);
        let float = self.lattice.primitive(PrimitiveKind::Float);
        let symbol = self.lattice.primitive(PrimitiveKind::Symbol);

        for op in ARITHMETIC {
            for ty in [number, unsigned, float] {
                if op == "%" && ty == float {
                    continue;
                }
                self.add_overload(op, FunctorSignature { params: SmallVec::from_slice(&[ty, ty]), result: ty });
            }
        }
        self.add_overload("cat", FunctorSignature { params: SmallVec::from_slice(&[symbol, symbol]), result: symbol });
        self.add_overload("strlen", FunctorSignature { params: SmallVec::from_slice(&[symbol]), result: number });
        self.add_overload("to_number", FunctorSignature { params: SmallVec::from_slice(&[symbol]), result: number });
        self.add_overload("to_string", FunctorSignature { params: SmallVec::from_slice(&[number]), result: symbol });
    }

    fn add_overload(&mut self, name: &str, signature: FunctorSignature) {
        let overloads = self.functors.entry(name.to_string()).or_default();
        if !overloads.contains(&signature) {
            overloads.push(signature);
        }
    }

    pub fn lattice(&self) -> &TypeLattice {
        &self.lattice
    }

    /// Declared attribute types of a relation
    pub fn relation(&self, name: &str) -> Option<&[Type]> {
        self.relations.get(name).map(Vec::as_slice)
    }

    /// All declared overloads of a functor
    pub fn functor_overloads(&self, name: &str) -> &[FunctorSignature] {
        self.functors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Overloads of a functor accepting `arity` operands
    pub fn functor_candidates(&self, name: &str, arity: usize) -> SmallVec<[&FunctorSignature; 4]> {
        self.functor_overloads(name)
            .iter()
            .filter(|sig| sig.arity() == arity)
            .collect()
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &[Type])> {
        self.relations.iter().map(|(name, attrs)| (name.as_str(), attrs.as_slice()))
    }
}

impl fmt::Display for TypeEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.lattice)?;
        for (name, attrs) in &self.relations {
            let rendered: Vec<&str> = attrs.iter().map(|ty| self.lattice.name_of(*ty)).collect();
            writeln!(f, "{name}({})", rendered.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ProgramBuilder;

    #[test]
    fn test_relation_attribute_types() {
        let program = ProgramBuilder::new()
            .subset_type("Even", "number")
            .relation("A", &[("x", "Even"), ("s", "symbol")])
            .build();
        let env = TypeEnvironment::from_program(&program).expect("valid environment");
        let attrs = env.relation("A").expect("declared");
        assert_eq!(attrs[0], env.lattice().lookup("Even").unwrap());
        assert_eq!(attrs[1], env.lattice().lookup("symbol").unwrap());
        assert!(env.relation("B").is_none());
    }

    #[test]
    fn test_intrinsic_overloads() {
        let env = TypeEnvironment::from_program(&Program::default()).expect("valid environment");
        assert_eq!(env.functor_overloads("+").len(), 3);
        assert_eq!(env.functor_overloads("%").len(), 2);
        assert_eq!(env.functor_candidates("strlen", 1).len(), 1);
        assert!(env.functor_candidates("strlen", 2).is_empty());
        assert!(env.functor_overloads("nope").is_empty());
    }

    #[test]
    fn test_user_functor_extends_overloads() {
        let program = ProgramBuilder::new()
            .functor("+", &["number", "number"], "number")
            .functor("+", &["symbol", "symbol"], "symbol")
            .build();
        let env = TypeEnvironment::from_program(&program).expect("valid environment");
        // the number overload duplicates an intrinsic and is ignored
        assert_eq!(env.functor_overloads("+").len(), 4);
    }

    #[test]
    fn test_unknown_attribute_type() {
        let program = ProgramBuilder::new().relation("A", &[("x", "Nope")]).build();
        let err = TypeEnvironment::from_program(&program).unwrap_err();
        assert!(matches!(err, EnvironmentError::UnknownAttributeType { ref type_name, .. } if type_name == "Nope"));
    }

    #[test]
    fn test_duplicate_relation() {
        let program = ProgramBuilder::new()
            .relation("A", &[("x", "number")])
            .relation("A", &[("y", "symbol")])
            .build();
        assert_eq!(
            TypeEnvironment::from_program(&program).unwrap_err(),
            EnvironmentError::DuplicateRelation("A".to_string())
        );
    }

    #[test]
    fn test_lattice_errors_propagate() {
        let program = ProgramBuilder::new().subset_type("A", "B").build();
        assert!(matches!(
            TypeEnvironment::from_program(&program),
            Err(EnvironmentError::Lattice(LatticeError::UnknownType { .. }))
        ));
    }
}
