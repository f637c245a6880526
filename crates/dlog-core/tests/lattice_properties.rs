//! Algebraic laws of the type lattice
//!
//! Every law is checked on three hierarchies: a forest, one where a type has
//! two direct supertypes, and two unions whose common part is not a declared
//! type. Laws guarded by an order premise are checked exhaustively.

use dlog_core::ast::{Attribute, TypeDecl, TypeDeclKind};
use dlog_core::dataflow::{Type, TypeLattice};
use proptest::prelude::*;

fn subset(name: &str, base: &str) -> TypeDecl {
    TypeDecl {
        name: name.to_string(),
        kind: TypeDeclKind::Subset { base: base.to_string() },
    }
}

fn union(name: &str, variants: &[&str]) -> TypeDecl {
    TypeDecl {
        name: name.to_string(),
        kind: TypeDeclKind::Union {
            variants: variants.iter().map(|v| v.to_string()).collect(),
        },
    }
}

/// number, unsigned, float, symbol, Even, Odd, Small, Numeric, Pair
fn forest() -> TypeLattice {
    TypeLattice::from_declarations(&[
        subset("Even", "number"),
        subset("Odd", "number"),
        subset("Small", "Even"),
        union("Numeric", &["number", "float"]),
        TypeDecl {
            name: "Pair".to_string(),
            kind: TypeDeclKind::Record {
                fields: vec![Attribute::new("a", "number"), Attribute::new("b", "symbol")],
            },
        },
    ])
    .expect("valid declarations")
}

/// Even has two direct supertypes here
fn diamond() -> TypeLattice {
    TypeLattice::from_declarations(&[
        subset("Even", "number"),
        subset("Small", "Even"),
        union("Key", &["Even", "symbol"]),
    ])
    .expect("valid declarations")
}

/// U1 and U2 share Even and Odd; their meet is not a declared type
fn overlapping() -> TypeLattice {
    TypeLattice::from_declarations(&[
        subset("Even", "number"),
        subset("Odd", "number"),
        union("U1", &["Even", "Odd"]),
        union("U2", &["Even", "Odd", "symbol"]),
    ])
    .expect("valid declarations")
}

fn hierarchy(index: usize) -> TypeLattice {
    match index % 3 {
        0 => forest(),
        1 => diamond(),
        _ => overlapping(),
    }
}

fn pick(lattice: &TypeLattice, index: usize) -> Type {
    let all: Vec<Type> = lattice.elements().collect();
    all[index % all.len()]
}

proptest! {
    #[test]
    fn meet_is_commutative_associative_idempotent(h in 0usize..3, a in 0usize..64, b in 0usize..64, c in 0usize..64) {
        let lat = hierarchy(h);
        let (a, b, c) = (pick(&lat, a), pick(&lat, b), pick(&lat, c));
        prop_assert_eq!(lat.meet(a, b), lat.meet(b, a));
        prop_assert_eq!(lat.meet(a, lat.meet(b, c)), lat.meet(lat.meet(a, b), c));
        prop_assert_eq!(lat.meet(a, a), a);
    }

    #[test]
    fn meet_bounds(h in 0usize..3, a in 0usize..64) {
        let lat = hierarchy(h);
        let a = pick(&lat, a);
        prop_assert_eq!(lat.meet(a, lat.top()), a);
        prop_assert_eq!(lat.meet(a, lat.bottom()), lat.bottom());
    }

    #[test]
    fn join_is_commutative_associative_idempotent(h in 0usize..3, a in 0usize..64, b in 0usize..64, c in 0usize..64) {
        let lat = hierarchy(h);
        let (a, b, c) = (pick(&lat, a), pick(&lat, b), pick(&lat, c));
        prop_assert_eq!(lat.join(a, b), lat.join(b, a));
        prop_assert_eq!(lat.join(a, lat.join(b, c)), lat.join(lat.join(a, b), c));
        prop_assert_eq!(lat.join(a, a), a);
        prop_assert_eq!(lat.join(a, lat.bottom()), a);
        prop_assert_eq!(lat.join(a, lat.top()), lat.top());
    }

    #[test]
    fn order_agrees_with_meet_and_join(h in 0usize..3, a in 0usize..64, b in 0usize..64) {
        let lat = hierarchy(h);
        let (a, b) = (pick(&lat, a), pick(&lat, b));
        prop_assert_eq!(lat.leq(a, b), lat.meet(a, b) == a);
        prop_assert_eq!(lat.leq(a, b), lat.join(a, b) == b);
        prop_assert!(lat.leq(lat.meet(a, b), a));
        prop_assert!(lat.leq(a, lat.join(a, b)));
    }

    #[test]
    fn absorption(h in 0usize..3, a in 0usize..64, b in 0usize..64) {
        let lat = hierarchy(h);
        let (a, b) = (pick(&lat, a), pick(&lat, b));
        prop_assert_eq!(lat.meet(a, lat.join(a, b)), a);
        prop_assert_eq!(lat.join(a, lat.meet(a, b)), a);
    }
}

#[test]
fn leq_is_transitive() {
    for h in 0..3 {
        let lat = hierarchy(h);
        let all: Vec<Type> = lat.elements().collect();
        for &a in &all {
            for &b in &all {
                for &c in &all {
                    if lat.leq(a, b) && lat.leq(b, c) {
                        assert!(lat.leq(a, c), "{a:?} <= {b:?} <= {c:?}");
                    }
                }
            }
        }
    }
}

#[test]
fn meet_and_join_are_monotone() {
    for h in 0..3 {
        let lat = hierarchy(h);
        let all: Vec<Type> = lat.elements().collect();
        for &a in &all {
            for &b in all.iter().filter(|b| lat.leq(a, **b)) {
                for &c in &all {
                    assert!(lat.leq(lat.meet(a, c), lat.meet(b, c)));
                    assert!(lat.leq(lat.join(a, c), lat.join(b, c)));
                }
            }
        }
    }
}

#[test]
fn leq_is_antisymmetric() {
    for h in 0..3 {
        let lat = hierarchy(h);
        let all: Vec<Type> = lat.elements().collect();
        for &a in &all {
            for &b in &all {
                if lat.leq(a, b) && lat.leq(b, a) {
                    assert_eq!(a, b);
                }
            }
        }
    }
}

#[test]
fn every_chain_fits_the_height() {
    // ⊥ < Small < Even < number < Numeric < ⊤
    // ⊥ < Small < Even < number < ⊤
    // ⊥ < Even < Even | Odd < number < ⊤
    for (h, height) in [(0, 6), (1, 5), (2, 5)] {
        let lat = hierarchy(h);
        assert_eq!(lat.height(), height);
        for ty in lat.elements() {
            let mut steps = 0;
            let mut current = ty;
            while !current.is_top() {
                let above = lat
                    .elements()
                    .filter(|t| *t != current && lat.leq(current, *t))
                    .find(|t| !lat.elements().any(|m| m != current && m != *t && lat.leq(current, m) && lat.leq(m, *t)))
                    .expect("Top is above everything");
                current = above;
                steps += 1;
            }
            assert!(steps < lat.height());
        }
    }
}
