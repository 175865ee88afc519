//! Type representations for PGo.
//!
//! This crate defines the semantic types used by constraint generation and
//! the solver, the fresh-variable generator, the substitution the solver
//! builds, and the conversion of resolved types into the Go back end's
//! vocabulary ([`target`]).

pub mod target;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use pgo_ast::NodeId;
use serde::Serialize;

pub use target::{GoField, GoType, TargetTypeError, to_go_type};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Unique identifier for a type variable during inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TypeVarId(pub u32);

impl fmt::Display for TypeVarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Origins
// ---------------------------------------------------------------------------

/// Syntax nodes that caused a type to be inferred.
///
/// Origins only feed error reporting: two types with different origins are
/// still equal.
#[derive(Debug, Clone, Default, Eq)]
pub struct Origins(BTreeSet<NodeId>);

impl PartialEq for Origins {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Origins {
    pub const fn none() -> Self {
        Self(BTreeSet::new())
    }

    pub fn single(id: NodeId) -> Self {
        Self(BTreeSet::from([id]))
    }

    pub fn insert(&mut self, id: NodeId) {
        self.0.insert(id);
    }

    pub fn extend(&mut self, other: &Origins) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<NodeId> for Origins {
    fn from(id: NodeId) -> Self {
        Self::single(id)
    }
}

impl FromIterator<NodeId> for Origins {
    fn from_iter<I: IntoIterator<Item = NodeId>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A semantic type in PGo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    // -- Primitives --
    Int(Origins),
    Real(Origins),
    Bool(Origins),
    String(Origins),

    /// Inference variable, bound by the solver.
    Var(TypeVarId),

    // -- Compound types --
    Set(Box<Type>, Origins),
    /// Fixed-arity tuple / sequence literal.
    Tuple(Vec<Type>, Origins),
    /// TLA+ function from key to value.
    Map(Box<Type>, Box<Type>, Origins),
    /// Procedure, archetype or operator signature.
    Function(FunctionType),

    /// Error marker for nodes whose type could not be determined.
    Unresolved(Origins),
}

/// Signature of a procedure, archetype or operator definition.
///
/// `ret` is `None` for procedures and archetypes, which produce no value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionType {
    pub params: Vec<Type>,
    pub ret: Option<Box<Type>>,
    pub origins: Origins,
}

impl FunctionType {
    pub fn procedure(params: Vec<Type>, origins: impl Into<Origins>) -> Self {
        Self {
            params,
            ret: None,
            origins: origins.into(),
        }
    }

    pub fn operator(params: Vec<Type>, ret: Type, origins: impl Into<Origins>) -> Self {
        Self {
            params,
            ret: Some(Box::new(ret)),
            origins: origins.into(),
        }
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }
}

impl Type {
    pub fn int(origins: impl Into<Origins>) -> Self {
        Type::Int(origins.into())
    }

    pub fn real(origins: impl Into<Origins>) -> Self {
        Type::Real(origins.into())
    }

    pub fn bool(origins: impl Into<Origins>) -> Self {
        Type::Bool(origins.into())
    }

    pub fn string(origins: impl Into<Origins>) -> Self {
        Type::String(origins.into())
    }

    pub fn set(elem: Type, origins: impl Into<Origins>) -> Self {
        Type::Set(Box::new(elem), origins.into())
    }

    pub fn tuple(elems: Vec<Type>, origins: impl Into<Origins>) -> Self {
        Type::Tuple(elems, origins.into())
    }

    pub fn map(key: Type, value: Type, origins: impl Into<Origins>) -> Self {
        Type::Map(Box::new(key), Box::new(value), origins.into())
    }

    /// Origins of this type. Variables have none.
    pub fn origins(&self) -> Option<&Origins> {
        match self {
            Type::Int(o)
            | Type::Real(o)
            | Type::Bool(o)
            | Type::String(o)
            | Type::Set(_, o)
            | Type::Tuple(_, o)
            | Type::Map(_, _, o)
            | Type::Unresolved(o) => Some(o),
            Type::Function(ft) => Some(&ft.origins),
            Type::Var(_) => None,
        }
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    /// Whether any type variable occurs in this type.
    pub fn contains_vars(&self) -> bool {
        match self {
            Type::Var(_) => true,
            Type::Int(_)
            | Type::Real(_)
            | Type::Bool(_)
            | Type::String(_)
            | Type::Unresolved(_) => false,
            Type::Set(inner, _) => inner.contains_vars(),
            Type::Tuple(elems, _) => elems.iter().any(Type::contains_vars),
            Type::Map(k, v, _) => k.contains_vars() || v.contains_vars(),
            Type::Function(ft) => {
                ft.params.iter().any(Type::contains_vars)
                    || ft.ret.as_deref().is_some_and(Type::contains_vars)
            }
        }
    }

    /// Whether the error marker occurs anywhere in this type.
    pub fn contains_unresolved(&self) -> bool {
        match self {
            Type::Unresolved(_) => true,
            Type::Int(_) | Type::Real(_) | Type::Bool(_) | Type::String(_) | Type::Var(_) => {
                false
            }
            Type::Set(inner, _) => inner.contains_unresolved(),
            Type::Tuple(elems, _) => elems.iter().any(Type::contains_unresolved),
            Type::Map(k, v, _) => k.contains_unresolved() || v.contains_unresolved(),
            Type::Function(ft) => {
                ft.params.iter().any(Type::contains_unresolved)
                    || ft.ret.as_deref().is_some_and(Type::contains_unresolved)
            }
        }
    }

    /// Replace every remaining type variable with the error marker.
    pub fn ground(&self) -> Type {
        match self {
            Type::Var(_) => Type::Unresolved(Origins::none()),
            Type::Int(_)
            | Type::Real(_)
            | Type::Bool(_)
            | Type::String(_)
            | Type::Unresolved(_) => self.clone(),
            Type::Set(inner, o) => Type::Set(Box::new(inner.ground()), o.clone()),
            Type::Tuple(elems, o) => Type::Tuple(elems.iter().map(Type::ground).collect(), o.clone()),
            Type::Map(k, v, o) => Type::Map(Box::new(k.ground()), Box::new(v.ground()), o.clone()),
            Type::Function(ft) => Type::Function(FunctionType {
                params: ft.params.iter().map(Type::ground).collect(),
                ret: ft.ret.as_ref().map(|r| Box::new(r.ground())),
                origins: ft.origins.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self, &|var, f| write!(f, "{var}"))
    }
}

fn write_type(
    f: &mut fmt::Formatter<'_>,
    ty: &Type,
    var_name: &dyn Fn(TypeVarId, &mut fmt::Formatter<'_>) -> fmt::Result,
) -> fmt::Result {
    let list = |f: &mut fmt::Formatter<'_>, elems: &[Type]| -> fmt::Result {
        for (i, elem) in elems.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write_type(f, elem, var_name)?;
        }
        Ok(())
    };
    match ty {
        Type::Int(_) => write!(f, "Int"),
        Type::Real(_) => write!(f, "Real"),
        Type::Bool(_) => write!(f, "Bool"),
        Type::String(_) => write!(f, "String"),
        Type::Var(v) => var_name(*v, f),
        Type::Set(inner, _) => {
            write!(f, "Set(")?;
            write_type(f, inner, var_name)?;
            write!(f, ")")
        }
        Type::Tuple(elems, _) => {
            write!(f, "Tuple(")?;
            list(f, elems)?;
            write!(f, ")")
        }
        Type::Map(k, v, _) => {
            write!(f, "Map(")?;
            write_type(f, k, var_name)?;
            write!(f, ", ")?;
            write_type(f, v, var_name)?;
            write!(f, ")")
        }
        Type::Function(ft) => {
            write!(f, "Func(")?;
            list(f, &ft.params)?;
            write!(f, ")")?;
            if let Some(ret) = &ft.ret {
                write!(f, " -> ")?;
                write_type(f, ret, var_name)?;
            }
            Ok(())
        }
        Type::Unresolved(_) => write!(f, "?"),
    }
}

/// Collect type variables in order of first appearance.
fn vars_in_order(ty: &Type, out: &mut Vec<TypeVarId>) {
    match ty {
        Type::Var(v) => {
            if !out.contains(v) {
                out.push(*v);
            }
        }
        Type::Int(_) | Type::Real(_) | Type::Bool(_) | Type::String(_) | Type::Unresolved(_) => {}
        Type::Set(inner, _) => vars_in_order(inner, out),
        Type::Tuple(elems, _) => elems.iter().for_each(|e| vars_in_order(e, out)),
        Type::Map(k, v, _) => {
            vars_in_order(k, out);
            vars_in_order(v, out);
        }
        Type::Function(ft) => {
            ft.params.iter().for_each(|p| vars_in_order(p, out));
            if let Some(ret) = &ft.ret {
                vars_in_order(ret, out);
            }
        }
    }
}

fn letter_name(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    if index < 26 {
        letter.to_string()
    } else {
        format!("{letter}{}", index / 26)
    }
}

struct Sanitized<'a> {
    ty: &'a Type,
    order: &'a [TypeVarId],
}

impl fmt::Display for Sanitized<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self.ty, &|var, f| {
            let index = self.order.iter().position(|v| *v == var).unwrap_or(0);
            write!(f, "{}", letter_name(index))
        })
    }
}

/// Render a type for users: inference variables become `a`, `b`, ... in
/// order of appearance.
pub fn sanitize_type_display(ty: &Type) -> String {
    let mut order = Vec::new();
    vars_in_order(ty, &mut order);
    Sanitized { ty, order: &order }.to_string()
}

struct Prefixed<'a> {
    ty: &'a Type,
    prefix: &'a str,
}

impl fmt::Display for Prefixed<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_type(f, self.ty, &|var, f| write!(f, "{}{}", self.prefix, var.0))
    }
}

/// Render a type for traces, naming variables `{prefix}{n}` the way the
/// [`TypeGenerator`] that produced them does.
pub fn prefixed_type_display(ty: &Type, prefix: &str) -> String {
    Prefixed { ty, prefix }.to_string()
}

/// Render two types with a shared variable naming, so that a variable
/// appearing on both sides gets the same letter.
pub fn sanitize_type_pair_display(left: &Type, right: &Type) -> (String, String) {
    let mut order = Vec::new();
    vars_in_order(left, &mut order);
    vars_in_order(right, &mut order);
    (
        Sanitized {
            ty: left,
            order: &order,
        }
        .to_string(),
        Sanitized {
            ty: right,
            order: &order,
        }
        .to_string(),
    )
}

// ---------------------------------------------------------------------------
// Free variables
// ---------------------------------------------------------------------------

/// Collect the free type variables of a type.
pub fn free_type_vars(ty: &Type) -> BTreeSet<TypeVarId> {
    let mut order = Vec::new();
    vars_in_order(ty, &mut order);
    order.into_iter().collect()
}

// ---------------------------------------------------------------------------
// Type variable generation
// ---------------------------------------------------------------------------

/// Strictly monotonic source of fresh type variables for one compilation.
///
/// The prefix names variables in traces (`type0`, `type1`, ...).
#[derive(Debug, Clone)]
pub struct TypeGenerator {
    prefix: String,
    next: u32,
}

impl TypeGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
        }
    }

    pub fn fresh(&mut self) -> TypeVarId {
        let id = TypeVarId(self.next);
        self.next += 1;
        id
    }

    pub fn fresh_type(&mut self) -> Type {
        Type::Var(self.fresh())
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for TypeGenerator {
    fn default() -> Self {
        Self::new("type")
    }
}

// ---------------------------------------------------------------------------
// Substitution
// ---------------------------------------------------------------------------

/// Maps type variables to the types they were unified with.
///
/// Bindings may point at other variables; [`Substitution::apply`] follows
/// them transitively. The solver never installs a cyclic binding.
#[derive(Debug, Clone, Default)]
pub struct Substitution {
    type_map: BTreeMap<TypeVarId, Type>,
}

impl Substitution {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind_type(&mut self, var: TypeVarId, ty: Type) {
        self.type_map.insert(var, ty);
    }

    pub fn lookup_type(&self, var: TypeVarId) -> Option<&Type> {
        self.type_map.get(&var)
    }

    pub fn is_bound(&self, var: TypeVarId) -> bool {
        self.type_map.contains_key(&var)
    }

    pub fn type_bindings(&self) -> &BTreeMap<TypeVarId, Type> {
        &self.type_map
    }

    /// Apply this substitution to a type, replacing all bound variables.
    pub fn apply(&self, ty: &Type) -> Type {
        match ty {
            Type::Var(v) => match self.lookup_type(*v) {
                Some(resolved) => self.apply(resolved),
                None => ty.clone(),
            },
            Type::Set(inner, o) => Type::Set(Box::new(self.apply(inner)), o.clone()),
            Type::Tuple(elems, o) => {
                Type::Tuple(elems.iter().map(|t| self.apply(t)).collect(), o.clone())
            }
            Type::Map(k, v, o) => {
                Type::Map(Box::new(self.apply(k)), Box::new(self.apply(v)), o.clone())
            }
            Type::Function(ft) => Type::Function(FunctionType {
                params: ft.params.iter().map(|t| self.apply(t)).collect(),
                ret: ft.ret.as_ref().map(|r| Box::new(self.apply(r))),
                origins: ft.origins.clone(),
            }),
            // Leaves: no substitution needed.
            Type::Int(_)
            | Type::Real(_)
            | Type::Bool(_)
            | Type::String(_)
            | Type::Unresolved(_) => ty.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int() -> Type {
        Type::int(Origins::none())
    }

    fn string() -> Type {
        Type::string(Origins::none())
    }

    #[test]
    fn origins_do_not_affect_equality() {
        assert_eq!(Type::int(NodeId(1)), Type::int(NodeId(2)));
        assert_ne!(Type::int(NodeId(1)), Type::string(NodeId(1)));
        assert_eq!(
            Type::set(Type::bool(NodeId(1)), NodeId(3)),
            Type::set(Type::bool(Origins::none()), Origins::none())
        );
    }

    #[test]
    fn display_compound_types() {
        let ty = Type::map(
            Type::tuple(vec![int(), string()], Origins::none()),
            Type::set(Type::Var(TypeVarId(4)), Origins::none()),
            Origins::none(),
        );
        insta::assert_snapshot!(ty.to_string(), @"Map(Tuple(Int, String), Set(t4))");
    }

    #[test]
    fn display_function_types() {
        let proc_ty = Type::Function(FunctionType::procedure(vec![int(), string()], NodeId(0)));
        let op_ty = Type::Function(FunctionType::operator(
            vec![int()],
            Type::bool(Origins::none()),
            NodeId(0),
        ));
        assert_eq!(proc_ty.to_string(), "Func(Int, String)");
        assert_eq!(op_ty.to_string(), "Func(Int) -> Bool");
    }

    #[test]
    fn sanitize_renames_in_order_of_appearance() {
        let ty = Type::map(
            Type::Var(TypeVarId(9)),
            Type::tuple(
                vec![Type::Var(TypeVarId(2)), Type::Var(TypeVarId(9))],
                Origins::none(),
            ),
            Origins::none(),
        );
        insta::assert_snapshot!(sanitize_type_display(&ty), @"Map(a, Tuple(b, a))");
    }

    #[test]
    fn sanitize_pair_shares_names() {
        let left = Type::set(Type::Var(TypeVarId(5)), Origins::none());
        let right = Type::tuple(vec![Type::Var(TypeVarId(7)), Type::Var(TypeVarId(5))], Origins::none());
        let (l, r) = sanitize_type_pair_display(&left, &right);
        assert_eq!(l, "Set(a)");
        assert_eq!(r, "Tuple(b, a)");
    }

    #[test]
    fn prefixed_display_uses_generator_names() {
        let ty = Type::set(Type::Var(TypeVarId(3)), Origins::none());
        assert_eq!(prefixed_type_display(&ty, "type"), "Set(type3)");
    }

    #[test]
    fn generator_is_strictly_monotonic() {
        let mut generator = TypeGenerator::new("type");
        let a = generator.fresh();
        let b = generator.fresh();
        assert!(a < b);
        assert_eq!(prefixed_type_display(&Type::Var(b), generator.prefix()), "type1");
    }

    #[test]
    fn substitution_applies_transitively() {
        let mut subst = Substitution::new();
        subst.bind_type(TypeVarId(0), Type::Var(TypeVarId(1)));
        subst.bind_type(TypeVarId(1), Type::set(int(), Origins::none()));
        let applied = subst.apply(&Type::tuple(vec![Type::Var(TypeVarId(0))], Origins::none()));
        assert_eq!(
            applied,
            Type::tuple(vec![Type::set(int(), Origins::none())], Origins::none())
        );
        assert_eq!(
            subst.lookup_type(TypeVarId(0)),
            Some(&Type::Var(TypeVarId(1)))
        );
    }

    #[test]
    fn contains_vars_and_ground() {
        let ty = Type::set(Type::Var(TypeVarId(3)), Origins::none());
        assert!(ty.contains_vars());
        let grounded = ty.ground();
        assert!(!grounded.contains_vars());
        assert!(grounded.contains_unresolved());
        assert_eq!(grounded.to_string(), "Set(?)");
    }

    #[test]
    fn free_vars_collects_all() {
        let ty = Type::Function(FunctionType::operator(
            vec![Type::Var(TypeVarId(1))],
            Type::Var(TypeVarId(0)),
            Origins::none(),
        ));
        assert_eq!(
            free_type_vars(&ty),
            BTreeSet::from([TypeVarId(0), TypeVarId(1)])
        );
    }
}
