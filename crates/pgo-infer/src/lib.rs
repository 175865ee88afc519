//! Constraint-based type inference for Modular PlusCal.
//!
//! This crate implements:
//! - a definition registry that resolves every name use to its declaration
//! - syntax-directed constraint generation over the whole algorithm
//! - a unification solver with occurs check
//! - restricted ad-hoc polymorphism: ordered alternative constraint sets
//!   resolved by trial unification against substitution snapshots
//!
//! Generation never fails. The solver accumulates diagnostics, and every
//! constraint carries provenance so errors point at the node that caused
//! them.

pub mod registry;
pub mod trace;
pub mod typeck;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use pgo_ast::NodeId;
use pgo_diag::{Category, Diagnostic, DiagnosticError, NodeLocation};
use pgo_types::{
    Origins, Substitution, Type, TypeGenerator, TypeVarId, prefixed_type_display,
    sanitize_type_display, sanitize_type_pair_display,
};
use serde::Deserialize;

pub use registry::DefinitionRegistry;
pub use typeck::generate_constraints;

/// Type variable assigned to each node that needs a type. Created once per
/// compilation by the generator.
pub type NodeTypeVars = BTreeMap<NodeId, TypeVarId>;

// ---------------------------------------------------------------------------
// Provenance
// ---------------------------------------------------------------------------

/// Where a constraint came from and why.
#[derive(Debug, Clone)]
pub struct Provenance {
    pub node: NodeId,
    pub reason: Reason,
}

impl Provenance {
    pub fn new(node: NodeId, reason: Reason) -> Self {
        Self { node, reason }
    }
}

/// Why a constraint was generated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reason {
    /// `x = e` or `x \in S`.
    Declaration,
    /// A constant and its user-supplied value.
    ConstantValue,
    /// An expression node and the type synthesized for it.
    ExprType,
    /// Elements of a set literal share one type.
    SetElements,
    /// Bounds of `a .. b`.
    Range,
    BinaryOp(&'static str),
    UnaryOp(&'static str),
    /// `\in` / `\notin`.
    Membership,
    /// `f[a]`.
    FunctionApply,
    /// Bounds of a function constructor.
    FunctionLiteral,
    /// Bounds and predicates of set refinements and comprehensions.
    SetFormer,
    /// Conditions, predicates and assertions must be `Bool`.
    Condition,
    IfBranches,
    CaseArms,
    OperatorCall { name: String },
    /// An operator definition and its signature.
    OperatorDefinition,
    ProcedureCall { name: String },
    /// `self` inside a procedure and the identity of a process calling it.
    CallerIdentity { name: String },
    ProcedureSignature,
    Assignment,
    Yield,
    /// Read/written value slots of an archetype parameter.
    ArchetypeParam { index: usize },
    ArchetypeSignature,
    InstanceArgs { archetype: String },
    MappingRead { macro_name: String },
    MappingWrite { macro_name: String },
    /// Process and instance identities: `Int` or `String`.
    Identity,
}

impl Reason {
    /// Short label used in constraint traces.
    pub fn label(&self) -> String {
        match self {
            Reason::Declaration => "declaration".into(),
            Reason::ConstantValue => "constant value".into(),
            Reason::ExprType => "expression".into(),
            Reason::SetElements => "set elements".into(),
            Reason::Range => "range".into(),
            Reason::BinaryOp(op) | Reason::UnaryOp(op) => format!("operator `{op}`"),
            Reason::Membership => "membership".into(),
            Reason::FunctionApply => "function application".into(),
            Reason::FunctionLiteral => "function constructor".into(),
            Reason::SetFormer => "set former".into(),
            Reason::Condition => "condition".into(),
            Reason::IfBranches => "if branches".into(),
            Reason::CaseArms => "case arms".into(),
            Reason::OperatorCall { name } => format!("call of `{name}`"),
            Reason::OperatorDefinition => "operator definition".into(),
            Reason::ProcedureCall { name } => format!("call of procedure `{name}`"),
            Reason::CallerIdentity { name } => format!("caller of `{name}`"),
            Reason::ProcedureSignature => "procedure signature".into(),
            Reason::Assignment => "assignment".into(),
            Reason::Yield => "yield".into(),
            Reason::ArchetypeParam { index } => format!("archetype parameter {index}"),
            Reason::ArchetypeSignature => "archetype signature".into(),
            Reason::InstanceArgs { archetype } => format!("instance of `{archetype}`"),
            Reason::MappingRead { macro_name } => format!("read through `{macro_name}`"),
            Reason::MappingWrite { macro_name } => format!("write through `{macro_name}`"),
            Reason::Identity => "process identity".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// `expected ~ actual`, as found inside an alternative's candidates.
#[derive(Debug, Clone)]
pub struct EqualityConstraint {
    pub expected: Type,
    pub actual: Type,
    pub provenance: Provenance,
}

impl EqualityConstraint {
    pub fn new(expected: Type, actual: Type, provenance: Provenance) -> Self {
        Self {
            expected,
            actual,
            provenance,
        }
    }
}

/// A constraint generated during inference.
#[derive(Debug, Clone)]
pub enum Constraint {
    /// Two types must be equal.
    Equal {
        expected: Type,
        actual: Type,
        provenance: Provenance,
    },
    /// Exactly one candidate conjunction must hold. Candidate order is the
    /// preference order used when several remain viable.
    Alternatives {
        candidates: Vec<Vec<EqualityConstraint>>,
        provenance: Provenance,
    },
}

impl Constraint {
    pub fn provenance(&self) -> &Provenance {
        match self {
            Constraint::Equal { provenance, .. } | Constraint::Alternatives { provenance, .. } => {
                provenance
            }
        }
    }

    fn collect_type_vars(&self, out: &mut BTreeSet<TypeVarId>) {
        match self {
            Constraint::Equal {
                expected, actual, ..
            } => {
                out.extend(pgo_types::free_type_vars(expected));
                out.extend(pgo_types::free_type_vars(actual));
            }
            Constraint::Alternatives { candidates, .. } => {
                for eq in candidates.iter().flatten() {
                    out.extend(pgo_types::free_type_vars(&eq.expected));
                    out.extend(pgo_types::free_type_vars(&eq.actual));
                }
            }
        }
    }
}

impl From<EqualityConstraint> for Constraint {
    fn from(eq: EqualityConstraint) -> Self {
        Constraint::Equal {
            expected: eq.expected,
            actual: eq.actual,
            provenance: eq.provenance,
        }
    }
}

/// Constraints in emission order.
#[derive(Debug, Clone, Default)]
pub struct ConstraintSet {
    constraints: Vec<Constraint>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn drain(&mut self) -> Vec<Constraint> {
        std::mem::take(&mut self.constraints)
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Tuning knobs for one inference run. Every field has a default, so a
/// driver may deserialize a partial table from its own configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferOptions {
    /// Upper bound on unification steps, including trial unification of
    /// alternative candidates.
    pub max_iterations: usize,
    /// How many recent constraints the budget diagnostic lists.
    pub trace_limit: usize,
    /// Record generation and unification traces.
    pub tracing: bool,
    /// Prefix for type variable names in traces.
    pub type_var_prefix: String,
}

impl Default for InferOptions {
    fn default() -> Self {
        Self {
            // High default guard: well-formed algorithms never approach it.
            max_iterations: 1_000_000,
            trace_limit: 8,
            tracing: false,
            type_var_prefix: "type".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inference context: fresh variable generation and constraint collection
// ---------------------------------------------------------------------------

/// Generates fresh type variables and collects constraints during
/// generation.
#[derive(Debug, Clone)]
pub struct InferenceContext {
    generator: TypeGenerator,
    constraints: ConstraintSet,
    tracing: bool,
    gen_trace: Vec<trace::GenStep>,
}

impl InferenceContext {
    pub fn new() -> Self {
        Self::with_options(&InferOptions::default())
    }

    pub fn with_options(options: &InferOptions) -> Self {
        Self {
            generator: TypeGenerator::new(options.type_var_prefix.clone()),
            constraints: ConstraintSet::new(),
            tracing: options.tracing,
            gen_trace: Vec::new(),
        }
    }

    pub fn fresh_type_var(&mut self) -> TypeVarId {
        self.generator.fresh()
    }

    pub fn fresh_type(&mut self) -> Type {
        self.generator.fresh_type()
    }

    pub fn generator_mut(&mut self) -> &mut TypeGenerator {
        &mut self.generator
    }

    pub fn constrain_equal(&mut self, expected: Type, actual: Type, provenance: Provenance) {
        self.constraints.push(Constraint::Equal {
            expected,
            actual,
            provenance,
        });
    }

    pub fn constrain_alternatives(
        &mut self,
        candidates: Vec<Vec<EqualityConstraint>>,
        provenance: Provenance,
    ) {
        self.constraints.push(Constraint::Alternatives {
            candidates,
            provenance,
        });
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn take_constraints(&mut self) -> Vec<Constraint> {
        self.constraints.drain()
    }

    /// Generation trace (empty if tracing was not enabled).
    pub fn gen_trace(&self) -> &[trace::GenStep] {
        &self.gen_trace
    }

    pub(crate) fn push_gen_step(
        &mut self,
        node: NodeId,
        rule: trace::GenRule,
        ty: &Type,
        detail: impl FnOnce() -> String,
    ) {
        if self.tracing {
            let step = self.gen_trace.len() + 1;
            self.gen_trace.push(trace::GenStep {
                step,
                node: node.0,
                rule,
                ty: prefixed_type_display(ty, self.generator.prefix()),
                detail: detail(),
            });
        }
    }
}

impl Default for InferenceContext {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Unifier
// ---------------------------------------------------------------------------

/// Solves constraints into a substitution, accumulating diagnostics.
#[derive(Debug, Clone)]
pub struct Unifier {
    pub substitution: Substitution,
    /// Every variable mentioned by a constraint handed to `solve`.
    constrained: BTreeSet<TypeVarId>,
    errors: Vec<Diagnostic>,
    var_prefix: String,
    /// When true, unification steps are recorded for observability tools.
    tracing: bool,
    unify_trace: Vec<trace::UnifyStep>,
}

#[derive(Debug, Clone)]
struct PendingAlternative {
    candidates: Vec<Vec<EqualityConstraint>>,
    provenance: Provenance,
}

/// Iteration accounting for one `solve` call.
struct SolveBudget {
    used: usize,
    max_iterations: usize,
    trace_limit: usize,
    recent: VecDeque<String>,
}

impl SolveBudget {
    fn new(options: &InferOptions) -> Self {
        Self {
            used: 0,
            max_iterations: options.max_iterations,
            trace_limit: options.trace_limit,
            recent: VecDeque::with_capacity(options.trace_limit.max(1)),
        }
    }

    fn charge(&mut self, expected: &Type, actual: &Type, provenance: &Provenance) -> Result<(), Diagnostic> {
        if self.trace_limit > 0 {
            if self.recent.len() == self.trace_limit {
                self.recent.pop_front();
            }
            let (expected, actual) = sanitize_type_pair_display(expected, actual);
            self.recent.push_back(format!(
                "{expected} ~ {actual} ({} at {})",
                provenance.reason.label(),
                provenance.node
            ));
        }
        if self.used >= self.max_iterations {
            return Err(self.exceeded(provenance.node));
        }
        self.used += 1;
        Ok(())
    }

    fn exceeded(&self, node: NodeId) -> Diagnostic {
        let trace_help = if self.recent.is_empty() {
            "no recent constraints captured".to_string()
        } else {
            format!(
                "recent constraints:\n- {}",
                self.recent.iter().cloned().collect::<Vec<_>>().join("\n- ")
            )
        };
        Diagnostic::error(
            Category::SolverBudget,
            format!(
                "type inference exceeded its budget of {} unification steps",
                self.max_iterations
            ),
        )
        .at(node_to_location(node))
        .with_help(format!("{trace_help}\nraise `max_iterations` to allow more steps"))
    }
}

impl Unifier {
    pub fn new() -> Self {
        Self::with_options(&InferOptions::default())
    }

    pub fn with_options(options: &InferOptions) -> Self {
        Self {
            substitution: Substitution::new(),
            constrained: BTreeSet::new(),
            errors: Vec::new(),
            var_prefix: options.type_var_prefix.clone(),
            tracing: options.tracing,
            unify_trace: Vec::new(),
        }
    }

    /// A throwaway copy of the current substitution for trial unification.
    fn probe(&self) -> Unifier {
        Unifier {
            substitution: self.substitution.clone(),
            constrained: BTreeSet::new(),
            errors: Vec::new(),
            var_prefix: String::new(),
            tracing: false,
            unify_trace: Vec::new(),
        }
    }

    pub fn solve(&mut self, constraints: Vec<Constraint>) -> Result<(), DiagnosticError> {
        self.solve_with_options(constraints, &InferOptions::default())
    }

    /// Solve equalities to a fixed point, then resolve alternatives round
    /// by round.
    pub fn solve_with_options(
        &mut self,
        constraints: Vec<Constraint>,
        options: &InferOptions,
    ) -> Result<(), DiagnosticError> {
        for constraint in &constraints {
            constraint.collect_type_vars(&mut self.constrained);
        }
        let mut budget = SolveBudget::new(options);
        if let Err(diag) = self.run(constraints, &mut budget) {
            self.errors.push(diag);
        }
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(DiagnosticError::multiple(std::mem::take(&mut self.errors)))
        }
    }

    fn run(&mut self, constraints: Vec<Constraint>, budget: &mut SolveBudget) -> Result<(), Diagnostic> {
        let mut pending = Vec::new();
        for constraint in constraints {
            match constraint {
                Constraint::Equal {
                    expected,
                    actual,
                    provenance,
                } => {
                    budget.charge(&expected, &actual, &provenance)?;
                    self.unify_immediate(&expected, &actual, &provenance);
                }
                Constraint::Alternatives {
                    candidates,
                    provenance,
                } => pending.push(PendingAlternative {
                    candidates,
                    provenance,
                }),
            }
        }
        self.solve_alternatives(pending, budget)
    }

    fn solve_alternatives(
        &mut self,
        mut pending: Vec<PendingAlternative>,
        budget: &mut SolveBudget,
    ) -> Result<(), Diagnostic> {
        while !pending.is_empty() {
            let mut progressed = false;
            let mut ambiguous = Vec::with_capacity(pending.len());
            for alternative in pending {
                let viable = self.viable_candidates(&alternative, budget)?;
                match viable.as_slice() {
                    [] => {
                        self.report_exhausted(&alternative);
                        progressed = true;
                    }
                    [only] => {
                        self.commit_candidate(
                            &alternative,
                            *only,
                            trace::UnifyAction::CommitAlternative,
                            budget,
                        )?;
                        progressed = true;
                    }
                    _ => ambiguous.push(alternative),
                }
            }
            if !progressed && !ambiguous.is_empty() {
                // Nothing is forced: the first pending alternative takes its
                // first viable candidate and the others are retried.
                let alternative = ambiguous.remove(0);
                let viable = self.viable_candidates(&alternative, budget)?;
                match viable.first() {
                    Some(&first) => self.commit_candidate(
                        &alternative,
                        first,
                        trace::UnifyAction::DefaultAlternative,
                        budget,
                    )?,
                    None => self.report_exhausted(&alternative),
                }
            }
            pending = ambiguous;
        }
        Ok(())
    }

    /// Indices of candidates that unify against the current substitution.
    fn viable_candidates(
        &self,
        alternative: &PendingAlternative,
        budget: &mut SolveBudget,
    ) -> Result<Vec<usize>, Diagnostic> {
        let mut viable = Vec::new();
        'candidates: for (index, candidate) in alternative.candidates.iter().enumerate() {
            let mut probe = self.probe();
            for eq in candidate {
                budget.charge(&eq.expected, &eq.actual, &eq.provenance)?;
                probe.unify_immediate(&eq.expected, &eq.actual, &eq.provenance);
                if !probe.errors.is_empty() {
                    continue 'candidates;
                }
            }
            viable.push(index);
        }
        Ok(viable)
    }

    fn commit_candidate(
        &mut self,
        alternative: &PendingAlternative,
        index: usize,
        action: trace::UnifyAction,
        budget: &mut SolveBudget,
    ) -> Result<(), Diagnostic> {
        let Some(candidate) = alternative.candidates.get(index) else {
            return Ok(());
        };
        if self.tracing {
            let chosen = describe_candidate(candidate);
            self.push_unify_step(
                action,
                &Type::Unresolved(Origins::none()),
                &Type::Unresolved(Origins::none()),
                format!(
                    "{} at {}: candidate {} of {} ({chosen})",
                    alternative.provenance.reason.label(),
                    alternative.provenance.node,
                    index + 1,
                    alternative.candidates.len()
                ),
            );
        }
        for eq in candidate {
            budget.charge(&eq.expected, &eq.actual, &eq.provenance)?;
            self.unify_immediate(&eq.expected, &eq.actual, &eq.provenance);
        }
        Ok(())
    }

    /// An alternative whose node already failed an equality is not reported
    /// a second time.
    fn report_exhausted(&mut self, alternative: &PendingAlternative) {
        let location = node_to_location(alternative.provenance.node);
        if self.errors.iter().any(|d| d.location == Some(location)) {
            return;
        }
        let diag = self.alternative_exhausted(alternative);
        self.errors.push(diag);
    }

    fn alternative_exhausted(&self, alternative: &PendingAlternative) -> Diagnostic {
        let tried = alternative
            .candidates
            .iter()
            .map(|candidate| describe_candidate(candidate))
            .collect::<Vec<_>>()
            .join(", ");
        let mut diag = Diagnostic::error(
            Category::AlternativeExhausted,
            format!(
                "no candidate type fits {}: tried {tried}",
                alternative_subject(&alternative.provenance.reason)
            ),
        )
        .at(node_to_location(alternative.provenance.node));

        let mut seen = BTreeSet::from([alternative.provenance.node]);
        for eq in alternative.candidates.iter().flatten() {
            let current = self.substitution.apply(&eq.expected);
            if !current.is_var() {
                let mut nodes = BTreeSet::new();
                collect_origins(&current, &mut nodes);
                let shown = sanitize_type_display(&current);
                for node in nodes {
                    if seen.insert(node) {
                        diag = diag.with_label(
                            node_to_location(node),
                            format!("conflicting type `{shown}` inferred here"),
                        );
                    }
                }
            }
            let mut nodes = BTreeSet::from([eq.provenance.node]);
            collect_origins(&eq.actual, &mut nodes);
            for node in nodes {
                if seen.insert(node) {
                    diag = diag.with_label(node_to_location(node), "candidate generated here");
                }
            }
        }
        diag
    }

    fn unify_immediate(&mut self, expected: &Type, actual: &Type, provenance: &Provenance) {
        let expected = self.substitution.apply(expected);
        let actual = self.substitution.apply(actual);

        match (&expected, &actual) {
            // Identical types: nothing to do.
            _ if expected == actual => {
                self.push_unify_step(
                    trace::UnifyAction::Identity,
                    &expected,
                    &actual,
                    "types already equal".into(),
                );
            }

            // Type variable on either side: bind it.
            (Type::Var(v), _) => {
                if self.tracing {
                    let detail = format!(
                        "{}{} := {}",
                        self.var_prefix,
                        v.0,
                        prefixed_type_display(&actual, &self.var_prefix)
                    );
                    self.push_unify_step(trace::UnifyAction::Bind, &expected, &actual, detail);
                }
                self.bind_type_var(*v, &actual, provenance);
            }
            (_, Type::Var(v)) => {
                if self.tracing {
                    let detail = format!(
                        "{}{} := {}",
                        self.var_prefix,
                        v.0,
                        prefixed_type_display(&expected, &self.var_prefix)
                    );
                    self.push_unify_step(trace::UnifyAction::Bind, &expected, &actual, detail);
                }
                self.bind_type_var(*v, &expected, provenance);
            }

            // The error marker absorbs anything so one failure is reported once.
            (Type::Unresolved(_), _) | (_, Type::Unresolved(_)) => {
                self.push_unify_step(
                    trace::UnifyAction::Identity,
                    &expected,
                    &actual,
                    "unresolved type unifies with any type".into(),
                );
            }

            (Type::Set(a, _), Type::Set(b, _)) => {
                self.push_unify_step(
                    trace::UnifyAction::Decompose,
                    &expected,
                    &actual,
                    "Set(A) ~ Set(B) → A ~ B".into(),
                );
                self.unify_immediate(a, b, provenance);
            }

            (Type::Tuple(a, _), Type::Tuple(b, _)) => {
                if a.len() != b.len() {
                    self.push_mismatch_step(&expected, &actual, "tuple arity differs");
                    let (e, g) = sanitize_type_pair_display(&expected, &actual);
                    self.errors.push(
                        Diagnostic::error(
                            Category::ArityMismatch,
                            format!(
                                "tuple has {} elements where {} are expected: `{e}` vs `{g}`",
                                b.len(),
                                a.len()
                            ),
                        )
                        .at(node_to_location(provenance.node)),
                    );
                    return;
                }
                self.push_unify_step(
                    trace::UnifyAction::Decompose,
                    &expected,
                    &actual,
                    "Tuple(A..) ~ Tuple(B..) → pairwise".into(),
                );
                for (x, y) in a.iter().zip(b.iter()) {
                    self.unify_immediate(x, y, provenance);
                }
            }

            (Type::Map(k1, v1, _), Type::Map(k2, v2, _)) => {
                self.push_unify_step(
                    trace::UnifyAction::Decompose,
                    &expected,
                    &actual,
                    "Map(K1, V1) ~ Map(K2, V2) → K1 ~ K2, V1 ~ V2".into(),
                );
                self.unify_immediate(k1, k2, provenance);
                self.unify_immediate(v1, v2, provenance);
            }

            (Type::Function(f1), Type::Function(f2)) => {
                if f1.arity() != f2.arity() {
                    self.push_mismatch_step(&expected, &actual, "parameter count differs");
                    self.errors.push(
                        Diagnostic::error(
                            Category::ArityMismatch,
                            arity_message(&provenance.reason, f1.arity(), f2.arity()),
                        )
                        .at(node_to_location(provenance.node)),
                    );
                    return;
                }
                match (&f1.ret, &f2.ret) {
                    (Some(_), None) | (None, Some(_)) => {
                        self.type_mismatch(&expected, &actual, provenance);
                        return;
                    }
                    _ => {}
                }
                self.push_unify_step(
                    trace::UnifyAction::Decompose,
                    &expected,
                    &actual,
                    "Func(A..) ~ Func(B..) → pairwise".into(),
                );
                for (x, y) in f1.params.iter().zip(f2.params.iter()) {
                    self.unify_immediate(x, y, provenance);
                }
                if let (Some(r1), Some(r2)) = (&f1.ret, &f2.ret) {
                    self.unify_immediate(r1, r2, provenance);
                }
            }

            _ => self.type_mismatch(&expected, &actual, provenance),
        }
    }

    fn type_mismatch(&mut self, expected: &Type, actual: &Type, provenance: &Provenance) {
        self.push_mismatch_step(expected, actual, "incompatible types");
        let (message, help) = type_mismatch_message(expected, actual, &provenance.reason);
        let mut diag =
            Diagnostic::error(Category::TypeMismatch, message).at(node_to_location(provenance.node));
        for (ty, side) in [(expected, "expected"), (actual, "found")] {
            let Some(origins) = ty.origins() else {
                continue;
            };
            let shown = sanitize_type_display(ty);
            for node in origins.iter().filter(|node| *node != provenance.node) {
                diag = diag.with_label(
                    node_to_location(node),
                    format!("{side} `{shown}` inferred here"),
                );
            }
        }
        if let Some(help) = help {
            diag = diag.with_help(help);
        }
        self.errors.push(diag);
    }

    /// Check whether a type variable occurs in a type (occurs check).
    /// Prevents infinite types like `t = Set(t)`.
    fn occurs_in(&self, var: TypeVarId, ty: &Type) -> bool {
        let ty = self.substitution.apply(ty);
        match &ty {
            Type::Var(v) => *v == var,
            Type::Set(inner, _) => self.occurs_in(var, inner),
            Type::Tuple(elems, _) => elems.iter().any(|t| self.occurs_in(var, t)),
            Type::Map(k, v, _) => self.occurs_in(var, k) || self.occurs_in(var, v),
            Type::Function(ft) => {
                ft.params.iter().any(|t| self.occurs_in(var, t))
                    || ft.ret.as_deref().is_some_and(|r| self.occurs_in(var, r))
            }
            Type::Int(_)
            | Type::Real(_)
            | Type::Bool(_)
            | Type::String(_)
            | Type::Unresolved(_) => false,
        }
    }

    /// Bind a type variable to a type, with occurs check.
    fn bind_type_var(&mut self, var: TypeVarId, ty: &Type, provenance: &Provenance) {
        if let Type::Var(v) = ty
            && *v == var
        {
            return; // Binding a var to itself is a no-op.
        }

        if self.occurs_in(var, ty) {
            let (shown_var, shown_ty) = sanitize_type_pair_display(&Type::Var(var), ty);
            self.push_unify_step(
                trace::UnifyAction::OccursCheck,
                &Type::Var(var),
                ty,
                format!("{shown_var} occurs in {shown_ty}, infinite type prevented"),
            );
            self.errors.push(
                Diagnostic::error(
                    Category::InfiniteType,
                    format!("infinite type: `{shown_var}` would have to contain itself as `{shown_ty}`"),
                )
                .at(node_to_location(provenance.node)),
            );
            return;
        }

        self.substitution.bind_type(var, ty.clone());
    }

    /// Resolve every mapped node variable against the substitution.
    ///
    /// Fully concrete types are emitted. A variable that no constraint ever
    /// mentioned and that has no binding is dropped silently. Anything else
    /// still containing variables is reported, and its partial type is
    /// emitted with the variables replaced by the error marker.
    pub fn resolve(&self, vars: &NodeTypeVars) -> Resolution {
        let mut types = BTreeMap::new();
        let mut diagnostics = Vec::new();
        for (&node, &var) in vars {
            let ty = self.substitution.apply(&Type::Var(var));
            if !ty.contains_vars() {
                types.insert(node, ty);
                continue;
            }
            if !self.substitution.is_bound(var) && !self.constrained.contains(&var) {
                continue;
            }
            diagnostics.push(
                Diagnostic::error(
                    Category::UnresolvedType,
                    format!(
                        "could not infer a concrete type, only `{}`",
                        sanitize_type_display(&ty)
                    ),
                )
                .at(node_to_location(node))
                .with_help("use the value where its type is fixed, or initialize it"),
            );
            types.insert(node, ty.ground());
        }
        Resolution { types, diagnostics }
    }

    /// Check if unification has produced any errors.
    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(Diagnostic::is_error)
    }

    // -----------------------------------------------------------------------
    // Tracing API (zero overhead when disabled)
    // -----------------------------------------------------------------------

    /// Get the unification trace (empty if tracing was not enabled).
    pub fn unify_trace(&self) -> &[trace::UnifyStep] {
        &self.unify_trace
    }

    fn push_mismatch_step(&mut self, expected: &Type, actual: &Type, detail: &str) {
        self.push_unify_step(trace::UnifyAction::Error, expected, actual, detail.to_string());
    }

    fn push_unify_step(
        &mut self,
        action: trace::UnifyAction,
        left: &Type,
        right: &Type,
        detail: String,
    ) {
        if self.tracing {
            let step = self.unify_trace.len() + 1;
            self.unify_trace.push(trace::UnifyStep {
                step,
                action,
                left: prefixed_type_display(left, &self.var_prefix),
                right: prefixed_type_display(right, &self.var_prefix),
                detail,
            });
        }
    }
}

impl Default for Unifier {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Solutions
// ---------------------------------------------------------------------------

/// Result of resolving the node mapping.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub types: BTreeMap<NodeId, Type>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Outcome of one solve: the final unifier state and everything it reported.
#[derive(Debug, Clone)]
pub struct Solution {
    unifier: Unifier,
    pub diagnostics: Vec<Diagnostic>,
}

impl Solution {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    pub fn unify_trace(&self) -> &[trace::UnifyStep] {
        self.unifier.unify_trace()
    }

    pub fn resolve(&self, vars: &NodeTypeVars) -> Resolution {
        self.unifier.resolve(vars)
    }
}

/// Solve a constraint list from scratch.
pub fn solve(constraints: Vec<Constraint>, options: &InferOptions) -> Solution {
    let mut unifier = Unifier::with_options(options);
    let diagnostics = match unifier.solve_with_options(constraints, options) {
        Ok(()) => Vec::new(),
        Err(err) => err.into_diagnostics(),
    };
    Solution {
        unifier,
        diagnostics,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Every node id mentioned in the origins of a type, at any depth.
fn collect_origins(ty: &Type, out: &mut BTreeSet<NodeId>) {
    if let Some(origins) = ty.origins() {
        out.extend(origins.iter());
    }
    match ty {
        Type::Set(inner, _) => collect_origins(inner, out),
        Type::Tuple(elems, _) => elems.iter().for_each(|e| collect_origins(e, out)),
        Type::Map(k, v, _) => {
            collect_origins(k, out);
            collect_origins(v, out);
        }
        Type::Function(ft) => {
            ft.params.iter().for_each(|p| collect_origins(p, out));
            if let Some(ret) = &ft.ret {
                collect_origins(ret, out);
            }
        }
        Type::Int(_)
        | Type::Real(_)
        | Type::Bool(_)
        | Type::String(_)
        | Type::Var(_)
        | Type::Unresolved(_) => {}
    }
}

fn describe_candidate(candidate: &[EqualityConstraint]) -> String {
    let mut shown: Vec<String> = Vec::new();
    for eq in candidate {
        let ty = sanitize_type_display(&eq.actual);
        if !shown.contains(&ty) {
            shown.push(ty);
        }
    }
    let shown = shown
        .iter()
        .map(|ty| format!("`{ty}`"))
        .collect::<Vec<_>>();
    shown.join(" with ")
}

fn alternative_subject(reason: &Reason) -> String {
    match reason {
        Reason::Identity => "this process identity".into(),
        Reason::BinaryOp(op) => format!("the operands of `{op}`"),
        Reason::UnaryOp(op) => format!("the operand of `{op}`"),
        _ => "this expression".into(),
    }
}

fn arity_message(reason: &Reason, expected: usize, actual: usize) -> String {
    match reason {
        Reason::ProcedureCall { name } => {
            format!("procedure `{name}` takes {expected} arguments, but {actual} were supplied")
        }
        Reason::OperatorCall { name } => {
            format!("operator `{name}` takes {expected} arguments, but {actual} were supplied")
        }
        Reason::InstanceArgs { archetype } => {
            format!("archetype `{archetype}` takes {expected} arguments, but {actual} were supplied")
        }
        _ => format!("expected {expected} parameters, found {actual}"),
    }
}

fn type_mismatch_message(
    expected: &Type,
    actual: &Type,
    reason: &Reason,
) -> (String, Option<String>) {
    let (expected, actual) = sanitize_type_pair_display(expected, actual);
    match reason {
        Reason::BinaryOp(op) => (
            format!("operands of `{op}` have incompatible types: `{expected}` and `{actual}`"),
            None,
        ),
        Reason::UnaryOp(op) => (
            format!("operand of `{op}` must have type `{expected}`, but has type `{actual}`"),
            None,
        ),
        Reason::Declaration => (
            format!("variable has type `{expected}`, but is initialized with `{actual}`"),
            None,
        ),
        Reason::ConstantValue => (
            format!("constant has type `{expected}`, but its value has type `{actual}`"),
            None,
        ),
        Reason::SetElements => (
            format!("set elements have different types: `{expected}` vs `{actual}`"),
            Some("all elements of a set must share one type".into()),
        ),
        Reason::Condition => (
            format!("condition must have type `{expected}`, but has type `{actual}`"),
            None,
        ),
        Reason::IfBranches => (
            format!("if/else branches have different types: `{expected}` vs `{actual}`"),
            Some("both branches must have the same type".into()),
        ),
        Reason::CaseArms => (
            format!("case arms have different types: `{expected}` vs `{actual}`"),
            Some("all arms must produce the same type".into()),
        ),
        Reason::OperatorCall { name } => (
            format!("call of `{name}` does not match its definition: expected `{expected}`, got `{actual}`"),
            None,
        ),
        Reason::ProcedureCall { name } => (
            format!(
                "call of procedure `{name}` does not match its other uses: expected `{expected}`, got `{actual}`"
            ),
            Some("every call of a procedure must pass arguments of the same types".into()),
        ),
        Reason::CallerIdentity { name } => (
            format!(
                "procedure `{name}` uses `self`, but is called by processes with identities of type `{expected}` and `{actual}`"
            ),
            Some("every process calling a procedure that uses `self` needs the same identity type".into()),
        ),
        Reason::Assignment => (
            format!("cannot assign a value of type `{actual}` to a variable of type `{expected}`"),
            None,
        ),
        Reason::Yield => (
            format!("yielded value has type `{actual}`, expected `{expected}`"),
            None,
        ),
        Reason::InstanceArgs { archetype } => (
            format!(
                "instance arguments do not match archetype `{archetype}`: expected `{expected}`, got `{actual}`"
            ),
            None,
        ),
        Reason::MappingRead { macro_name } => (
            format!(
                "mapping macro `{macro_name}` reads values of type `{actual}`, but the mapped variable has type `{expected}`"
            ),
            None,
        ),
        Reason::MappingWrite { macro_name } => (
            format!(
                "mapping macro `{macro_name}` writes values of type `{actual}`, but the mapped variable has type `{expected}`"
            ),
            None,
        ),
        _ => (
            format!("type mismatch: expected `{expected}`, got `{actual}`"),
            None,
        ),
    }
}

pub(crate) fn node_to_location(node: NodeId) -> NodeLocation {
    NodeLocation(node.0)
}

#[cfg(test)]
mod prop_tests;


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pgo_types::FunctionType;

    fn prov(node: u32) -> Provenance {
        Provenance::new(NodeId(node), Reason::ExprType)
    }

    fn int() -> Type {
        Type::int(Origins::none())
    }

    fn string() -> Type {
        Type::string(Origins::none())
    }

    fn var(n: u32) -> Type {
        Type::Var(TypeVarId(n))
    }

    fn eq(expected: Type, actual: Type) -> Constraint {
        Constraint::Equal {
            expected,
            actual,
            provenance: prov(0),
        }
    }

    fn identity_alternative(v: u32, node: u32) -> Constraint {
        Constraint::Alternatives {
            candidates: vec![
                vec![EqualityConstraint::new(var(v), Type::int(NodeId(node)), prov(node))],
                vec![EqualityConstraint::new(var(v), Type::string(NodeId(node)), prov(node))],
            ],
            provenance: Provenance::new(NodeId(node), Reason::Identity),
        }
    }

    #[test]
    fn unify_var_with_concrete() {
        let mut u = Unifier::new();
        u.solve(vec![eq(var(0), int())]).unwrap();
        assert_eq!(u.substitution.apply(&var(0)), int());
    }

    #[test]
    fn unify_transitive_through_sets() {
        let mut u = Unifier::new();
        u.solve(vec![
            eq(var(0), Type::set(var(1), Origins::none())),
            eq(var(0), Type::set(string(), Origins::none())),
        ])
        .unwrap();
        assert_eq!(u.substitution.apply(&var(1)), string());
    }

    #[test]
    fn mismatch_reports_type_mismatch() {
        let mut u = Unifier::new();
        let err = u
            .solve(vec![eq(Type::int(NodeId(1)), Type::bool(NodeId(2)))])
            .unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.category, Category::TypeMismatch);
        assert_eq!(diag.message, "type mismatch: expected `Int`, got `Bool`");
        assert_eq!(
            diag.nodes(),
            vec![NodeLocation(0), NodeLocation(1), NodeLocation(2)]
        );
    }

    #[test]
    fn occurs_check_prevents_cycles() {
        let mut u = Unifier::new();
        let err = u
            .solve(vec![eq(var(0), Type::set(var(0), Origins::none()))])
            .unwrap_err();
        assert_eq!(err.diagnostics()[0].category, Category::InfiniteType);
        assert!(u.substitution.lookup_type(TypeVarId(0)).is_none());
    }

    #[test]
    fn tuple_arity_mismatch() {
        let mut u = Unifier::new();
        let err = u
            .solve(vec![eq(
                Type::tuple(vec![int()], Origins::none()),
                Type::tuple(vec![int(), int()], Origins::none()),
            )])
            .unwrap_err();
        assert_eq!(err.diagnostics()[0].category, Category::ArityMismatch);
    }

    #[test]
    fn procedure_call_arity_mismatch() {
        let mut u = Unifier::new();
        let err = u
            .solve(vec![Constraint::Equal {
                expected: Type::Function(FunctionType::procedure(vec![int()], NodeId(1))),
                actual: Type::Function(FunctionType::procedure(vec![int(), int()], NodeId(2))),
                provenance: Provenance::new(
                    NodeId(2),
                    Reason::ProcedureCall {
                        name: "Foo".into(),
                    },
                ),
            }])
            .unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.category, Category::ArityMismatch);
        assert_eq!(
            diag.message,
            "procedure `Foo` takes 1 arguments, but 2 were supplied"
        );
    }

    #[test]
    fn operator_and_procedure_signatures_do_not_unify() {
        let mut u = Unifier::new();
        let err = u
            .solve(vec![eq(
                Type::Function(FunctionType::procedure(vec![int()], Origins::none())),
                Type::Function(FunctionType::operator(vec![int()], int(), Origins::none())),
            )])
            .unwrap_err();
        assert_eq!(err.diagnostics()[0].category, Category::TypeMismatch);
    }

    #[test]
    fn ambiguous_alternative_defaults_to_first_candidate() {
        let mut u = Unifier::new();
        u.solve(vec![identity_alternative(0, 5)]).unwrap();
        assert_eq!(u.substitution.apply(&var(0)), int());
    }

    #[test]
    fn forced_alternative_commits_only_viable_candidate() {
        let mut u = Unifier::new();
        u.solve(vec![identity_alternative(0, 5), eq(var(0), string())])
            .unwrap();
        assert_eq!(u.substitution.apply(&var(0)), string());
    }

    #[test]
    fn equalities_are_solved_before_alternatives() {
        // The equality arrives after the alternative but still decides it.
        let mut u = Unifier::new();
        u.solve(vec![
            identity_alternative(0, 5),
            eq(var(0), var(1)),
            eq(var(1), string()),
        ])
        .unwrap();
        assert_eq!(u.substitution.apply(&var(0)), string());
    }

    #[test]
    fn exhausted_alternative_points_at_candidates_and_conflict() {
        let mut u = Unifier::new();
        let err = u
            .solve(vec![
                identity_alternative(0, 5),
                Constraint::Equal {
                    expected: var(0),
                    actual: Type::bool(NodeId(9)),
                    provenance: prov(9),
                },
            ])
            .unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.category, Category::AlternativeExhausted);
        insta::assert_snapshot!(
            diag.message,
            @"no candidate type fits this process identity: tried `Int`, `String`"
        );
        assert_eq!(diag.location, Some(NodeLocation(5)));
        assert!(diag.nodes().contains(&NodeLocation(9)));
    }

    #[test]
    fn one_commit_unblocks_the_next_round() {
        // t1 stays ambiguous until the forced pair alternative fixes it, so
        // it must not fall back to its `Int` default.
        let pair = Constraint::Alternatives {
            candidates: vec![
                vec![
                    EqualityConstraint::new(var(0), int(), prov(6)),
                    EqualityConstraint::new(var(1), int(), prov(6)),
                ],
                vec![
                    EqualityConstraint::new(var(0), string(), prov(6)),
                    EqualityConstraint::new(var(1), string(), prov(6)),
                ],
            ],
            provenance: Provenance::new(NodeId(6), Reason::BinaryOp("+")),
        };
        let mut u = Unifier::new();
        u.solve(vec![identity_alternative(1, 5), pair, eq(var(0), string())])
            .unwrap();
        assert_eq!(u.substitution.apply(&var(1)), string());
    }

    #[test]
    fn set_shaped_identity_exhausts_alternative() {
        let mut u = Unifier::new();
        let err = u
            .solve(vec![
                identity_alternative(0, 5),
                eq(var(0), Type::set(var(2), Origins::none())),
            ])
            .unwrap_err();
        assert_eq!(err.diagnostics()[0].category, Category::AlternativeExhausted);
    }

    #[test]
    fn budget_is_enforced() {
        let options = InferOptions {
            max_iterations: 2,
            ..InferOptions::default()
        };
        let mut u = Unifier::with_options(&options);
        let err = u
            .solve_with_options(
                vec![eq(var(0), int()), eq(var(1), int()), eq(var(2), int())],
                &options,
            )
            .unwrap_err();
        let diag = &err.diagnostics()[0];
        assert_eq!(diag.category, Category::SolverBudget);
        assert!(diag.help.as_deref().unwrap().contains("recent constraints"));
    }

    #[test]
    fn resolve_drops_unused_and_reports_unpinned() {
        let mut u = Unifier::new();
        u.solve(vec![eq(var(0), int()), eq(var(1), var(2))]).unwrap();
        let vars = NodeTypeVars::from([
            (NodeId(10), TypeVarId(0)),
            (NodeId(11), TypeVarId(1)),
            (NodeId(12), TypeVarId(7)),
        ]);
        let resolution = u.resolve(&vars);
        assert_eq!(resolution.types.get(&NodeId(10)), Some(&int()));
        assert!(!resolution.types.contains_key(&NodeId(12)));
        assert_eq!(resolution.diagnostics.len(), 1);
        assert_eq!(
            resolution.diagnostics[0].category,
            Category::UnresolvedType
        );
        assert_eq!(resolution.diagnostics[0].location, Some(NodeLocation(11)));
    }

    #[test]
    fn tracing_records_bind_steps() {
        let options = InferOptions {
            tracing: true,
            ..InferOptions::default()
        };
        let solution = solve(vec![eq(var(3), int())], &options);
        assert!(!solution.has_errors());
        let trace = solution.unify_trace();
        assert_eq!(trace[0].action, trace::UnifyAction::Bind);
        assert_eq!(trace[0].detail, "type3 := Int");
        let json = serde_json::to_value(trace).unwrap();
        assert_eq!(json[0]["action"], "bind");
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let options: InferOptions =
            serde_json::from_str(r#"{ "max_iterations": 64, "tracing": true }"#).unwrap();
        assert_eq!(options.max_iterations, 64);
        assert!(options.tracing);
        assert_eq!(options.trace_limit, 8);
        assert_eq!(options.type_var_prefix, "type");
    }
}
