//! Type lattice over declared Datalog types
//!
//! Implements a bounded lattice where:
//! - Bottom (⊥) = inconsistent, no valid type
//! - Top (⊤) = unconstrained / unknown
//! - Declared types form the middle, ordered by subtype edges
//!
//! Overlapping unions can give two declared types several maximal common
//! subtypes. The middle is therefore completed: every element is the down-set
//! of declared types it admits, and the down-sets are closed under
//! intersection. Intersections that no declared type describes become
//! [`Type::Overlap`] elements, so meet and join are unique for every pair.
//!
//! The lattice is built once from type declarations and is read-only afterwards.

use crate::ast::{TypeDecl, TypeDeclKind};
use indexmap::{IndexMap, IndexSet};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

/// Index of a declared type inside its [`TypeLattice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of an overlap element inside its [`TypeLattice`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OverlapId(u32);

impl OverlapId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// An element of the lattice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Bottom element - conflicting constraints
    Bottom,
    /// A declared type
    Declared(TypeId),
    /// Values admitted by several declared types at once when no single
    /// declared type describes them, e.g. `Even | Odd` inside two unions
    Overlap(OverlapId),
    /// Top element - no constraint seen yet
    Top,
}

impl Type {
    pub fn is_top(self) -> bool {
        matches!(self, Type::Top)
    }

    pub fn is_bottom(self) -> bool {
        matches!(self, Type::Bottom)
    }

    pub fn declared(self) -> Option<TypeId> {
        match self {
            Type::Declared(id) => Some(id),
            _ => None,
        }
    }
}

/// Built-in primitive roots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    Number,
    Unsigned,
    Float,
    Symbol,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 4] = [
        PrimitiveKind::Number,
        PrimitiveKind::Unsigned,
        PrimitiveKind::Float,
        PrimitiveKind::Symbol,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::Number => "number",
            PrimitiveKind::Unsigned => "unsigned",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Symbol => "symbol",
        }
    }

    pub fn attribute(self) -> TypeAttribute {
        match self {
            PrimitiveKind::Number => TypeAttribute::Signed,
            PrimitiveKind::Unsigned => TypeAttribute::Unsigned,
            PrimitiveKind::Float => TypeAttribute::Float,
            PrimitiveKind::Symbol => TypeAttribute::Symbol,
        }
    }

    fn type_id(self) -> TypeId {
        // primitives are registered first, in ALL order
        TypeId(self as u32)
    }
}

/// Physical domain of a declared type, as consumed by storage and codegen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeAttribute {
    Signed,
    Unsigned,
    Float,
    Symbol,
    Record,
}

impl fmt::Display for TypeAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TypeAttribute::Signed => "signed",
            TypeAttribute::Unsigned => "unsigned",
            TypeAttribute::Float => "float",
            TypeAttribute::Symbol => "symbol",
            TypeAttribute::Record => "record",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Primitive(PrimitiveKind),
    Subset(TypeId),
    Union(Vec<TypeId>),
    Record(Vec<(String, TypeId)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredType {
    pub name: String,
    pub kind: TypeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LatticeError {
    #[error("type `{0}` is declared more than once")]
    DuplicateType(String),
    #[error("type `{name}` refers to undeclared type `{referenced}`")]
    UnknownType { name: String, referenced: String },
    #[error("subtype declarations form a cycle through `{0}`")]
    SubtypeCycle(String),
}

/// The completed poset of declared types plus the universal bounds
#[derive(Debug, Clone)]
pub struct TypeLattice {
    types: Vec<DeclaredType>,
    by_name: IndexMap<String, TypeId>,
    /// Reflexive-transitive supertypes of each declared type
    ancestors: Vec<IndexSet<TypeId>>,
    /// Display names of overlap elements
    overlaps: Vec<String>,
    /// Physical domain of every element, declared types first
    attributes: Vec<Option<TypeAttribute>>,
    /// Dense tables over all elements except the bounds
    meets: Vec<Type>,
    joins: Vec<Type>,
    height: usize,
}

impl TypeLattice {
    /// Lattice holding only the primitive types
    pub fn primitives() -> Self {
        let mut graph = DiGraph::new();
        for prim in PrimitiveKind::ALL {
            graph.add_node(prim.type_id());
        }
        Self::complete(Self::primitive_types(), &graph)
    }

    fn primitive_types() -> Vec<DeclaredType> {
        PrimitiveKind::ALL
            .iter()
            .map(|prim| DeclaredType {
                name: prim.name().to_string(),
                kind: TypeKind::Primitive(*prim),
            })
            .collect()
    }

    /// Build the lattice from declarations, on top of the primitive types
    pub fn from_declarations(decls: &[TypeDecl]) -> Result<Self, LatticeError> {
        let mut by_name: IndexMap<String, TypeId> = IndexMap::new();
        for prim in PrimitiveKind::ALL {
            by_name.insert(prim.name().to_string(), prim.type_id());
        }
        for decl in decls {
            if by_name.contains_key(&decl.name) {
                return Err(LatticeError::DuplicateType(decl.name.clone()));
            }
            let id = TypeId(by_name.len() as u32);
            by_name.insert(decl.name.clone(), id);
        }

        let resolve = |name: &str, referenced: &str| -> Result<TypeId, LatticeError> {
            by_name.get(referenced).copied().ok_or_else(|| LatticeError::UnknownType {
                name: name.to_string(),
                referenced: referenced.to_string(),
            })
        };

        // Edges point from subtype to supertype
        let mut graph: DiGraph<TypeId, ()> = DiGraph::new();
        for &id in by_name.values() {
            graph.add_node(id);
        }
        let node = |id: TypeId| NodeIndex::new(id.index());

        let mut types = Self::primitive_types();
        for decl in decls {
            let id = by_name[&decl.name];
            let kind = match &decl.kind {
                TypeDeclKind::Subset { base } => {
                    let base = resolve(&decl.name, base)?;
                    graph.add_edge(node(id), node(base), ());
                    TypeKind::Subset(base)
                }
                TypeDeclKind::Union { variants } => {
                    let mut members = Vec::with_capacity(variants.len());
                    for variant in variants {
                        let member = resolve(&decl.name, variant)?;
                        graph.add_edge(node(member), node(id), ());
                        members.push(member);
                    }
                    TypeKind::Union(members)
                }
                TypeDeclKind::Record { fields } => {
                    let mut resolved = Vec::with_capacity(fields.len());
                    for field in fields {
                        resolved.push((field.name.clone(), resolve(&decl.name, &field.type_name)?));
                    }
                    TypeKind::Record(resolved)
                }
            };
            types.push(DeclaredType {
                name: decl.name.clone(),
                kind,
            });
        }

        toposort(&graph, None)
            .map_err(|cycle| LatticeError::SubtypeCycle(types[cycle.node_id().index()].name.clone()))?;

        Ok(Self::complete(types, &graph))
    }

    /// Close the declared poset into a lattice
    ///
    /// `graph` must be acyclic with one node per declared type, edges pointing
    /// from subtype to supertype.
    fn complete(types: Vec<DeclaredType>, graph: &DiGraph<TypeId, ()>) -> Self {
        let declared = types.len();
        let by_name = types
            .iter()
            .enumerate()
            .map(|(index, ty)| (ty.name.clone(), TypeId(index as u32)))
            .collect();

        let mut ancestors = Vec::with_capacity(declared);
        let mut cuts: IndexSet<BTreeSet<TypeId>> = IndexSet::with_capacity(declared);
        for index in 0..declared {
            let mut up = IndexSet::new();
            let mut dfs = Dfs::new(graph, NodeIndex::new(index));
            while let Some(n) = dfs.next(graph) {
                up.insert(graph[n]);
            }
            ancestors.push(up);

            let reversed = Reversed(graph);
            let mut down = BTreeSet::new();
            let mut dfs = Dfs::new(reversed, NodeIndex::new(index));
            while let Some(n) = dfs.next(reversed) {
                down.insert(graph[n]);
            }
            // distinct types have distinct down-sets in an acyclic graph
            cuts.insert(down);
        }

        // Every new element is intersected with all earlier ones, so the loop
        // ends with the set closed under intersection and every meet recorded.
        let mut pair_meets = Vec::new();
        let mut next = 0;
        while next < cuts.len() {
            for other in 0..next {
                let common: BTreeSet<TypeId> = cuts[next].intersection(&cuts[other]).copied().collect();
                let meet = if common.is_empty() {
                    None
                } else {
                    Some(cuts.insert_full(common).0)
                };
                pair_meets.push((other, next, meet));
            }
            next += 1;
        }

        let size = cuts.len();
        let mut meet_index: Vec<Option<usize>> = vec![None; size * size];
        for index in 0..size {
            meet_index[index * size + index] = Some(index);
        }
        for (a, b, meet) in pair_meets {
            meet_index[a * size + b] = meet;
            meet_index[b * size + a] = meet;
        }

        // join = intersection of every common declared supertype
        let upper: Vec<Vec<usize>> = cuts
            .iter()
            .map(|cut| (0..declared).filter(|&p| cut.is_subset(&cuts[p])).collect())
            .collect();
        let mut joins = vec![Type::Top; size * size];
        for a in 0..size {
            for b in 0..size {
                let common: Vec<usize> = upper[a].iter().copied().filter(|p| upper[b].contains(p)).collect();
                let join = match common.split_first() {
                    Some((&first, rest)) => rest.iter().try_fold(first, |acc, &p| meet_index[acc * size + p]),
                    None => None,
                };
                joins[a * size + b] = join.map_or(Type::Top, |index| Self::element_type(declared, index));
            }
        }
        let meets = meet_index
            .into_iter()
            .map(|meet| meet.map_or(Type::Bottom, |index| Self::element_type(declared, index)))
            .collect();

        let mut memo = vec![None; declared];
        let mut attributes: Vec<Option<TypeAttribute>> = (0..declared)
            .map(|index| Self::resolve_attribute(&types, TypeId(index as u32), &mut memo))
            .collect();
        let mut overlaps = Vec::with_capacity(size - declared);
        for cut in cuts.iter().skip(declared) {
            let maximal: Vec<TypeId> = cut
                .iter()
                .copied()
                .filter(|m| !cut.iter().any(|other| other != m && ancestors[m.index()].contains(other)))
                .collect();
            let names: Vec<&str> = maximal.iter().map(|m| types[m.index()].name.as_str()).collect();
            overlaps.push(names.join(" | "));
            let attribute = Self::common_attribute(maximal.iter().map(|m| attributes[m.index()]));
            attributes.push(attribute);
        }

        // Longest chain of strictly nested elements, smallest first
        let mut order: Vec<usize> = (0..size).collect();
        order.sort_by_key(|&index| cuts[index].len());
        let mut chain = vec![1usize; size];
        for (pos, &index) in order.iter().enumerate() {
            for &below in &order[..pos] {
                if cuts[below].len() < cuts[index].len() && cuts[below].is_subset(&cuts[index]) {
                    chain[index] = chain[index].max(chain[below] + 1);
                }
            }
        }
        let height = chain.iter().copied().max().unwrap_or(0) + 2;

        Self {
            types,
            by_name,
            ancestors,
            overlaps,
            attributes,
            meets,
            joins,
            height,
        }
    }

    fn element_type(declared: usize, index: usize) -> Type {
        if index < declared {
            Type::Declared(TypeId(index as u32))
        } else {
            Type::Overlap(OverlapId((index - declared) as u32))
        }
    }

    /// Position of a non-bound element in the dense tables
    fn index_of(&self, ty: Type) -> Option<usize> {
        match ty {
            Type::Declared(id) => Some(id.index()),
            Type::Overlap(id) => Some(self.types.len() + id.index()),
            Type::Top | Type::Bottom => None,
        }
    }

    fn size(&self) -> usize {
        self.types.len() + self.overlaps.len()
    }

    fn resolve_attribute(
        types: &[DeclaredType],
        id: TypeId,
        memo: &mut Vec<Option<Option<TypeAttribute>>>,
    ) -> Option<TypeAttribute> {
        if let Some(known) = memo[id.index()] {
            return known;
        }
        let attribute = match &types[id.index()].kind {
            TypeKind::Primitive(prim) => Some(prim.attribute()),
            TypeKind::Record(_) => Some(TypeAttribute::Record),
            TypeKind::Subset(base) => Self::resolve_attribute(types, *base, memo),
            TypeKind::Union(members) => {
                let mut resolved = Vec::with_capacity(members.len());
                for member in members {
                    resolved.push(Self::resolve_attribute(types, *member, memo));
                }
                Self::common_attribute(resolved)
            }
        };
        memo[id.index()] = Some(attribute);
        attribute
    }

    /// The attribute shared by all of `attributes`; `None` when mixed or empty
    fn common_attribute(attributes: impl IntoIterator<Item = Option<TypeAttribute>>) -> Option<TypeAttribute> {
        let mut common = None;
        for attribute in attributes {
            match (attribute, common) {
                (Some(a), None) => common = Some(a),
                (Some(a), Some(c)) if a == c => {}
                _ => return None,
            }
        }
        common
    }

    pub fn top(&self) -> Type {
        Type::Top
    }

    pub fn bottom(&self) -> Type {
        Type::Bottom
    }

    pub fn primitive(&self, prim: PrimitiveKind) -> Type {
        Type::Declared(prim.type_id())
    }

    /// Look up a declared type by name
    pub fn lookup(&self, name: &str) -> Option<Type> {
        self.by_name.get(name).map(|id| Type::Declared(*id))
    }

    /// Human-readable name of a lattice element
    pub fn name_of(&self, ty: Type) -> &str {
        match ty {
            Type::Top => "⊤",
            Type::Bottom => "⊥",
            Type::Declared(id) => &self.types[id.index()].name,
            Type::Overlap(id) => &self.overlaps[id.index()],
        }
    }

    /// Number of declared types, primitives included
    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    /// Every element of the lattice, bounds and overlaps included
    pub fn elements(&self) -> impl Iterator<Item = Type> + '_ {
        let declared = self.types.len();
        std::iter::once(Type::Bottom)
            .chain((0..self.size()).map(move |index| Self::element_type(declared, index)))
            .chain(std::iter::once(Type::Top))
    }

    /// Number of elements on the longest chain from Bottom to Top
    pub fn height(&self) -> usize {
        self.height
    }

    /// Check if `a` is a subtype of (lower than or equal to) `b`
    pub fn leq(&self, a: Type, b: Type) -> bool {
        match (a, b) {
            (Type::Bottom, _) | (_, Type::Top) => true,
            (Type::Top, _) | (_, Type::Bottom) => false,
            _ => self.meet(a, b) == a,
        }
    }

    /// Meet operation (greatest lower bound)
    ///
    /// Incompatible declared types have no common subtype and meet at Bottom.
    pub fn meet(&self, a: Type, b: Type) -> Type {
        match (self.index_of(a), self.index_of(b)) {
            (Some(x), Some(y)) => self.meets[x * self.size() + y],
            _ => match (a, b) {
                (Type::Top, t) | (t, Type::Top) => t,
                _ => Type::Bottom,
            },
        }
    }

    /// Join operation (least upper bound)
    ///
    /// Types without a common declared supertype join at Top.
    pub fn join(&self, a: Type, b: Type) -> Type {
        match (self.index_of(a), self.index_of(b)) {
            (Some(x), Some(y)) => self.joins[x * self.size() + y],
            _ => match (a, b) {
                (Type::Bottom, t) | (t, Type::Bottom) => t,
                _ => Type::Top,
            },
        }
    }

    /// Physical domain of a type; `None` for the bounds and mixed unions
    pub fn attribute(&self, ty: Type) -> Option<TypeAttribute> {
        self.index_of(ty).and_then(|index| self.attributes[index])
    }

    /// Fields of the record type `ty` is (a subset of), if any
    pub fn record_fields(&self, ty: Type) -> Option<&[(String, TypeId)]> {
        let mut current = ty.declared()?;
        loop {
            match &self.types[current.index()].kind {
                TypeKind::Record(fields) => return Some(fields),
                TypeKind::Subset(base) => current = *base,
                _ => return None,
            }
        }
    }

    /// Record types at or below `ty` with `arity` fields, with their field types
    pub fn record_shapes(&self, ty: Type, arity: usize) -> Vec<(Type, Vec<Type>)> {
        (0..self.types.len())
            .map(|index| Type::Declared(TypeId(index as u32)))
            .filter(|candidate| self.leq(*candidate, ty))
            .filter_map(|candidate| {
                let fields = self.record_fields(candidate)?;
                (fields.len() == arity).then(|| (candidate, fields.iter().map(|(_, id)| Type::Declared(*id)).collect()))
            })
            .collect()
    }

    /// Direct supertypes of a declared type, in declaration order
    pub fn supertypes(&self, id: TypeId) -> Vec<TypeId> {
        let above = &self.ancestors[id.index()];
        let mut direct: Vec<TypeId> = above
            .iter()
            .copied()
            .filter(|&a| a != id)
            .filter(|&a| !above.iter().any(|&b| b != id && b != a && self.ancestors[b.index()].contains(&a)))
            .collect();
        direct.sort();
        direct
    }
}

impl fmt::Display for TypeLattice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, ty) in self.types.iter().enumerate() {
            let id = TypeId(index as u32);
            write!(f, "{}", ty.name)?;
            let supers: Vec<&str> = self
                .supertypes(id)
                .into_iter()
                .map(|s| self.types[s.index()].name.as_str())
                .collect();
            if !supers.is_empty() {
                write!(f, " <: {}", supers.join(", "))?;
            }
            if let TypeKind::Record(fields) = &ty.kind {
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|(name, field)| format!("{name}: {}", self.types[field.index()].name))
                    .collect();
                write!(f, " = [{}]", rendered.join(", "))?;
            }
            writeln!(f)?;
        }
        write!(f, "height: {}", self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Attribute;

    fn subset(name: &str, base: &str) -> TypeDecl {
        TypeDecl {
            name: name.to_string(),
            kind: TypeDeclKind::Subset { base: base.to_string() },
        }
    }

    fn lattice() -> TypeLattice {
        TypeLattice::from_declarations(&[
            subset("Even", "number"),
            subset("Odd", "number"),
            subset("Small", "Even"),
            TypeDecl {
                name: "Key".to_string(),
                kind: TypeDeclKind::Union {
                    variants: vec!["Even".to_string(), "symbol".to_string()],
                },
            },
            TypeDecl {
                name: "Pair".to_string(),
                kind: TypeDeclKind::Record {
                    fields: vec![Attribute::new("a", "number"), Attribute::new("b", "symbol")],
                },
            },
            subset("SmallPair", "Pair"),
        ])
        .expect("valid declarations")
    }

    fn ty(lat: &TypeLattice, name: &str) -> Type {
        lat.lookup(name).expect("declared")
    }

    #[test]
    fn test_lattice_meet_top() {
        let lat = lattice();
        let number = ty(&lat, "number");
        assert_eq!(lat.meet(Type::Top, number), number);
        assert_eq!(lat.meet(number, Type::Top), number);
    }

    #[test]
    fn test_lattice_meet_bottom_absorbs() {
        let lat = lattice();
        assert_eq!(lat.meet(Type::Bottom, ty(&lat, "Even")), Type::Bottom);
    }

    #[test]
    fn test_lattice_meet_subtype() {
        let lat = lattice();
        assert_eq!(lat.meet(ty(&lat, "Even"), ty(&lat, "number")), ty(&lat, "Even"));
        assert_eq!(lat.meet(ty(&lat, "number"), ty(&lat, "Small")), ty(&lat, "Small"));
    }

    #[test]
    fn test_lattice_meet_incompatible() {
        let lat = lattice();
        assert_eq!(lat.meet(ty(&lat, "number"), ty(&lat, "symbol")), Type::Bottom);
        assert_eq!(lat.meet(ty(&lat, "Even"), ty(&lat, "Odd")), Type::Bottom);
    }

    #[test]
    fn test_lattice_meet_through_union() {
        let lat = lattice();
        // Key = Even | symbol, so Key ⊓ number = Even
        assert_eq!(lat.meet(ty(&lat, "Key"), ty(&lat, "number")), ty(&lat, "Even"));
        assert_eq!(lat.meet(ty(&lat, "Key"), ty(&lat, "symbol")), ty(&lat, "symbol"));
    }

    #[test]
    fn test_lattice_join() {
        let lat = lattice();
        assert_eq!(lat.join(ty(&lat, "Even"), ty(&lat, "Odd")), ty(&lat, "number"));
        assert_eq!(lat.join(ty(&lat, "Small"), ty(&lat, "Odd")), ty(&lat, "number"));
        assert_eq!(lat.join(ty(&lat, "Even"), ty(&lat, "symbol")), ty(&lat, "Key"));
        assert_eq!(lat.join(ty(&lat, "number"), ty(&lat, "float")), Type::Top);
        assert_eq!(lat.join(Type::Bottom, ty(&lat, "float")), ty(&lat, "float"));
    }

    #[test]
    fn test_leq() {
        let lat = lattice();
        assert!(lat.leq(ty(&lat, "Small"), ty(&lat, "number")));
        assert!(lat.leq(ty(&lat, "Small"), ty(&lat, "Key")));
        assert!(!lat.leq(ty(&lat, "number"), ty(&lat, "Small")));
        assert!(lat.leq(Type::Bottom, Type::Top));
        assert!(!lat.leq(Type::Top, ty(&lat, "number")));
    }

    #[test]
    fn test_height() {
        let lat = lattice();
        // ⊥ < Small < Even < number < ⊤ is the longest chain (Small < Even < Key is as long)
        assert_eq!(lat.height(), 5);
        assert_eq!(TypeLattice::primitives().height(), 3);
    }

    #[test]
    fn test_attributes() {
        let lat = lattice();
        assert_eq!(lat.attribute(ty(&lat, "Small")), Some(TypeAttribute::Signed));
        assert_eq!(lat.attribute(ty(&lat, "symbol")), Some(TypeAttribute::Symbol));
        assert_eq!(lat.attribute(ty(&lat, "Pair")), Some(TypeAttribute::Record));
        assert_eq!(lat.attribute(ty(&lat, "Key")), None);
        assert_eq!(lat.attribute(Type::Top), None);
    }

    #[test]
    fn test_record_fields_through_subset() {
        let lat = lattice();
        let fields = lat.record_fields(ty(&lat, "SmallPair")).expect("record");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].0, "a");
        assert!(lat.record_fields(ty(&lat, "number")).is_none());
    }

    #[test]
    fn test_record_shapes_below() {
        let lat = lattice();
        let shapes = lat.record_shapes(ty(&lat, "Pair"), 2);
        let found: Vec<Type> = shapes.iter().map(|(ty, _)| *ty).collect();
        assert_eq!(found, vec![ty(&lat, "Pair"), ty(&lat, "SmallPair")]);
        assert_eq!(shapes[1].1, vec![ty(&lat, "number"), ty(&lat, "symbol")]);
        assert!(lat.record_shapes(ty(&lat, "Pair"), 3).is_empty());
        assert!(lat.record_shapes(ty(&lat, "number"), 2).is_empty());
        assert!(lat.record_shapes(Type::Bottom, 2).is_empty());
    }

    fn union(name: &str, variants: &[&str]) -> TypeDecl {
        TypeDecl {
            name: name.to_string(),
            kind: TypeDeclKind::Union {
                variants: variants.iter().map(|v| v.to_string()).collect(),
            },
        }
    }

    /// Two unions sharing `Even` and `Odd`, which no declared type groups alone
    fn overlapping() -> TypeLattice {
        TypeLattice::from_declarations(&[
            subset("Even", "number"),
            subset("Odd", "number"),
            union("U1", &["Even", "Odd"]),
            union("U2", &["Even", "Odd", "symbol"]),
        ])
        .expect("valid declarations")
    }

    #[test]
    fn test_overlapping_unions_meet_in_an_overlap() {
        let lat = overlapping();
        let shared = lat.meet(ty(&lat, "U1"), ty(&lat, "U2"));
        assert!(matches!(shared, Type::Overlap(_)));
        assert_eq!(lat.name_of(shared), "Even | Odd");
        assert_eq!(lat.attribute(shared), Some(TypeAttribute::Signed));
        assert_eq!(lat.meet(ty(&lat, "number"), ty(&lat, "U2")), shared);
        assert_eq!(lat.join(ty(&lat, "Even"), ty(&lat, "Odd")), shared);
        assert!(lat.leq(shared, ty(&lat, "number")));
        assert!(lat.leq(ty(&lat, "Odd"), shared));
        assert!(!lat.leq(shared, ty(&lat, "Even")));
        assert!(lat.record_fields(shared).is_none());
        assert_eq!(lat.elements().count(), lat.type_count() + 3);
    }

    #[test]
    fn test_meet_is_associative_across_overlapping_unions() {
        let lat = overlapping();
        let (even, u1, u2) = (ty(&lat, "Even"), ty(&lat, "U1"), ty(&lat, "U2"));
        assert_eq!(lat.meet(lat.meet(even, u1), u2), even);
        assert_eq!(lat.meet(even, lat.meet(u1, u2)), even);
        assert_eq!(lat.meet(lat.meet(u1, u2), even), even);
        // ⊥ < Even < Even | Odd < number < ⊤
        assert_eq!(lat.height(), 5);
    }

    #[test]
    fn test_primitives_only() {
        let lat = TypeLattice::primitives();
        assert_eq!(lat.type_count(), PrimitiveKind::ALL.len());
        assert_eq!(lat.elements().count(), PrimitiveKind::ALL.len() + 2);
        let number = lat.primitive(PrimitiveKind::Number);
        assert_eq!(lat.meet(number, lat.primitive(PrimitiveKind::Float)), Type::Bottom);
        assert_eq!(lat.join(number, number), number);
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let err = TypeLattice::from_declarations(&[subset("number", "symbol")]).unwrap_err();
        assert_eq!(err, LatticeError::DuplicateType("number".to_string()));
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = TypeLattice::from_declarations(&[subset("A", "Nope")]).unwrap_err();
        assert!(matches!(err, LatticeError::UnknownType { .. }));
    }

    #[test]
    fn test_cycle_rejected() {
        let err = TypeLattice::from_declarations(&[subset("A", "B"), subset("B", "A")]).unwrap_err();
        assert!(matches!(err, LatticeError::SubtypeCycle(_)));
    }

    #[test]
    fn test_display_lists_supertypes() {
        let lat = lattice();
        let text = lat.to_string();
        assert!(text.contains("Small <: Even\n"));
        assert!(text.contains("Even <: number, Key\n"));
        assert!(text.contains("Pair = [a: number, b: symbol]\n"));
        assert!(text.ends_with("height: 5"));
    }
}
