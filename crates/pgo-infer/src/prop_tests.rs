//! Property tests for the unifier using proptest.
//!
//! These check invariants that must hold for any input types:
//!
//! 1. Substitution idempotence: apply(apply(t)) == apply(t)
//! 2. Unification reflexivity: unify(t, t) always succeeds
//! 3. Soundness: after a successful unify(a, b), apply(a) == apply(b)
//! 4. Occurs check: Var(x) never unifies with a structure containing Var(x)
//! 5. Alternatives honour candidate order when nothing forces a choice

use proptest::prelude::*;
use pgo_ast::NodeId;
use pgo_diag::Category;
use pgo_types::*;

use crate::{Constraint, EqualityConstraint, Provenance, Reason, Unifier};

// ---------------------------------------------------------------------------
// Strategies for generating types
// ---------------------------------------------------------------------------

fn arb_type_var_id() -> impl Strategy<Value = TypeVarId> {
    (0u32..8).prop_map(TypeVarId)
}

fn arb_ground_type() -> impl Strategy<Value = Type> {
    prop_oneof![
        Just(Type::int(Origins::none())),
        Just(Type::real(Origins::none())),
        Just(Type::bool(Origins::none())),
        Just(Type::string(Origins::none())),
    ]
}

/// Types of bounded depth without the error marker. Depth 0 = leaves only.
fn arb_type(depth: u32) -> BoxedStrategy<Type> {
    let leaf = prop_oneof![
        3 => arb_ground_type(),
        1 => arb_type_var_id().prop_map(Type::Var),
    ];
    if depth == 0 {
        return leaf.boxed();
    }
    let inner = arb_type(depth - 1);
    prop_oneof![
        4 => leaf,
        1 => inner.clone().prop_map(|t| Type::set(t, Origins::none())),
        1 => (inner.clone(), inner.clone())
            .prop_map(|(k, v)| Type::map(k, v, Origins::none())),
        1 => prop::collection::vec(inner.clone(), 2..=3)
            .prop_map(|elems| Type::tuple(elems, Origins::none())),
        1 => (prop::collection::vec(inner.clone(), 0..=2), inner)
            .prop_map(|(params, ret)| {
                Type::Function(FunctionType::operator(params, ret, Origins::none()))
            }),
    ]
    .boxed()
}

fn prov() -> Provenance {
    Provenance::new(NodeId(0), Reason::ExprType)
}

fn eq(expected: Type, actual: Type) -> Constraint {
    Constraint::Equal {
        expected,
        actual,
        provenance: prov(),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    /// Applying a substitution twice produces the same result as applying
    /// it once.
    #[test]
    fn substitution_idempotent(ty in arb_type(2)) {
        let mut subst = Substitution::new();
        subst.bind_type(TypeVarId(0), Type::int(Origins::none()));
        subst.bind_type(TypeVarId(1), Type::set(Type::Var(TypeVarId(2)), Origins::none()));
        subst.bind_type(TypeVarId(2), Type::string(Origins::none()));
        subst.bind_type(TypeVarId(3), Type::Var(TypeVarId(4)));

        let once = subst.apply(&ty);
        let twice = subst.apply(&once);
        prop_assert_eq!(once, twice);
    }

    /// Every type unifies with itself.
    #[test]
    fn unify_reflexive(ty in arb_type(3)) {
        let mut u = Unifier::new();
        prop_assert!(u.solve(vec![eq(ty.clone(), ty)]).is_ok());
    }

    /// A successful unification makes both sides equal under the final
    /// substitution.
    #[test]
    fn unify_sound(a in arb_type(2), b in arb_type(2)) {
        let mut u = Unifier::new();
        if u.solve(vec![eq(a.clone(), b.clone())]).is_ok() {
            prop_assert_eq!(u.substitution.apply(&a), u.substitution.apply(&b));
        }
    }

    /// Unifying in either order gives the same verdict.
    #[test]
    fn unify_symmetric_verdict(a in arb_type(2), b in arb_type(2)) {
        let forward = Unifier::new().solve(vec![eq(a.clone(), b.clone())]).is_ok();
        let backward = Unifier::new().solve(vec![eq(b, a)]).is_ok();
        prop_assert_eq!(forward, backward);
    }

    /// No substitution ever maps a variable to a type containing itself.
    #[test]
    fn occurs_check_rejects_cycles(inner in arb_type(1)) {
        let x = TypeVarId(9);
        let cyclic = Type::set(
            Type::tuple(vec![Type::Var(x), inner], Origins::none()),
            Origins::none(),
        );
        let mut u = Unifier::new();
        let err = u.solve(vec![eq(Type::Var(x), cyclic)]).unwrap_err();
        prop_assert!(err.diagnostics().iter().any(|d| d.category == Category::InfiniteType));
        prop_assert!(!u.substitution.is_bound(x));
    }

    /// Resolved types never contain variables once grounded.
    #[test]
    fn ground_removes_variables(ty in arb_type(3)) {
        let grounded = ty.ground();
        prop_assert!(!grounded.contains_vars());
        prop_assert_eq!(grounded.contains_unresolved(), ty.contains_vars() || ty.contains_unresolved());
    }

    /// With nothing else known, an alternative commits its first candidate.
    #[test]
    fn unforced_alternative_takes_first_candidate(
        first in arb_ground_type(),
        second in arb_ground_type(),
    ) {
        let v = Type::Var(TypeVarId(0));
        let alternative = Constraint::Alternatives {
            candidates: vec![
                vec![EqualityConstraint::new(v.clone(), first.clone(), prov())],
                vec![EqualityConstraint::new(v.clone(), second, prov())],
            ],
            provenance: Provenance::new(NodeId(0), Reason::Identity),
        };
        let mut u = Unifier::new();
        prop_assert!(u.solve(vec![alternative]).is_ok());
        prop_assert_eq!(u.substitution.apply(&v), first);
    }

    /// Solving is deterministic.
    #[test]
    fn solve_deterministic(a in arb_type(2), b in arb_type(2), c in arb_type(1)) {
        let constraints = vec![
            eq(a, b),
            eq(Type::Var(TypeVarId(0)), c),
        ];
        let mut first = Unifier::new();
        let mut second = Unifier::new();
        let messages = |e: pgo_diag::DiagnosticError| {
            e.diagnostics().iter().map(ToString::to_string).collect::<Vec<_>>()
        };
        let r1 = first.solve(constraints.clone()).map_err(messages);
        let r2 = second.solve(constraints).map_err(messages);
        prop_assert_eq!(r1, r2);
        prop_assert_eq!(
            first.substitution.type_bindings(),
            second.substitution.type_bindings()
        );
    }
}
