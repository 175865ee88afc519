//! Syntax-directed constraint generation.
//!
//! This module walks a whole Modular PlusCal algorithm once, giving every
//! declaration, signature and expression node a type variable and emitting
//! the constraints its semantics impose. Nothing is solved here:
//!
//! - identifier uses share the variable of the declaration they resolve to
//! - procedures, archetypes and operators are monomorphic, so every use
//!   site unifies with the same signature variable
//! - process identities and overloaded operators emit ordered alternatives
//!
//! Generation never fails. Unresolvable names were already reported by the
//! registry and simply get a fresh variable.

use std::collections::BTreeSet;

use pgo_ast::{
    Archetype, BinOp, Expr, ExprKind, Init, Lit, MappingMacro, ModularBlock, NodeId,
    OperatorDefinition, Procedure, Processes, QuantifierBound, Stmt, StmtKind, UnaryOp,
    VariableDecl,
};
use pgo_types::{FunctionType, Type, TypeVarId};

use crate::registry::DefinitionRegistry;
use crate::trace::GenRule;
use crate::{EqualityConstraint, InferenceContext, NodeTypeVars, Provenance, Reason};

/// Generate constraints for `block` into `ctx` and return the type variable
/// of every node that needs a type.
///
/// Archetype parameter slots are registered in `registry` as a side effect.
pub fn generate_constraints(
    block: &ModularBlock,
    registry: &mut DefinitionRegistry,
    ctx: &mut InferenceContext,
) -> NodeTypeVars {
    let mut cx = ConstraintGen {
        registry,
        ctx,
        vars: NodeTypeVars::new(),
        body: BodyContext::General,
        current_self: None,
    };
    cx.preallocate_signatures(block);
    cx.constants();
    for var in &block.variables {
        cx.declare(var);
    }
    for unit in &block.units {
        cx.definition(unit);
    }
    for procedure in &block.procedures {
        cx.procedure(procedure);
    }
    for archetype in &block.archetypes {
        cx.archetype(archetype);
    }
    for mapping_macro in &block.mapping_macros {
        cx.mapping_macro(mapping_macro);
    }
    for instance in &block.instances {
        cx.instance(instance);
    }
    match &block.processes {
        Processes::Single(body) => cx.check_stmts(body),
        Processes::Multi(processes) => {
            for process in processes {
                cx.declare(&process.name);
                cx.constrain_identity(process.name.id);
                for local in &process.locals {
                    cx.declare(local);
                }
                cx.current_self = Some(process.name.id);
                cx.check_stmts(&process.body);
                cx.current_self = None;
            }
        }
    }
    cx.vars
}

/// What kind of body the statement visitor is in.
#[derive(Debug, Clone, Default)]
enum BodyContext {
    #[default]
    General,
    /// Parameter reads go through read slots, writes through written slots.
    Archetype { params: BTreeSet<NodeId> },
    /// `yield e` produces the value of a read.
    MacroRead { result: Type },
    /// `yield e` produces the value stored into `$variable`.
    MacroWrite { variable: Type },
}

struct ConstraintGen<'a> {
    registry: &'a mut DefinitionRegistry,
    ctx: &'a mut InferenceContext,
    vars: NodeTypeVars,
    body: BodyContext,
    /// Declaration `self` resolves to in the body being visited.
    current_self: Option<NodeId>,
}

impl ConstraintGen<'_> {
    /// Variable of `node`, allocated on first request.
    fn var_for(&mut self, node: NodeId) -> TypeVarId {
        let ctx = &mut *self.ctx;
        *self
            .vars
            .entry(node)
            .or_insert_with(|| ctx.fresh_type_var())
    }

    fn var_type(&mut self, node: NodeId) -> Type {
        Type::Var(self.var_for(node))
    }

    fn constrain(&mut self, expected: Type, actual: Type, node: NodeId, reason: Reason) {
        self.ctx
            .constrain_equal(expected, actual, Provenance::new(node, reason));
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn preallocate_signatures(&mut self, block: &ModularBlock) {
        for unit in &block.units {
            self.var_for(unit.id);
        }
        for procedure in &block.procedures {
            self.var_for(procedure.id);
        }
        for archetype in &block.archetypes {
            self.var_for(archetype.id);
        }
    }

    fn constants(&mut self) {
        let constants: Vec<(NodeId, Option<Expr>)> = self
            .registry
            .constants()
            .iter()
            .map(|c| (c.id, self.registry.constant_value(c.id).cloned()))
            .collect();
        for (id, value) in constants {
            let var = self.var_type(id);
            if let Some(value) = value {
                let value_ty = self.infer_expr(&value);
                self.constrain(var, value_ty, value.id, Reason::ConstantValue);
            }
        }
    }

    /// `x = e` makes `x` the type of `e`; `x \in S` makes `S` a set of `x`.
    fn declare(&mut self, decl: &VariableDecl) -> Type {
        let var = self.var_type(decl.id);
        match &decl.init {
            None => {}
            Some(Init::Value(value)) => {
                let value_ty = self.infer_expr(value);
                self.constrain(var.clone(), value_ty, decl.id, Reason::Declaration);
            }
            Some(Init::Member(set)) => {
                let set_ty = self.infer_expr(set);
                let member = self.ctx.fresh_type();
                self.constrain(
                    Type::set(member.clone(), decl.id),
                    set_ty,
                    decl.id,
                    Reason::Declaration,
                );
                self.constrain(var.clone(), member, decl.id, Reason::Declaration);
            }
        }
        self.ctx
            .push_gen_step(decl.id, GenRule::Declaration, &var, || decl.name.clone());
        var
    }

    /// The identity of a process or instance is an `Int` or, failing that,
    /// a `String`.
    fn constrain_identity(&mut self, node: NodeId) {
        let var = self.var_type(node);
        let candidates = vec![
            vec![EqualityConstraint::new(
                var.clone(),
                Type::int(node),
                Provenance::new(node, Reason::Identity),
            )],
            vec![EqualityConstraint::new(
                var.clone(),
                Type::string(node),
                Provenance::new(node, Reason::Identity),
            )],
        ];
        self.ctx
            .constrain_alternatives(candidates, Provenance::new(node, Reason::Identity));
        self.ctx
            .push_gen_step(node, GenRule::Alternative, &var, || "Int | String".into());
    }

    fn definition(&mut self, def: &OperatorDefinition) {
        let signature = self.var_type(def.id);
        let params = def.args.iter().map(|arg| self.var_type(arg.id)).collect();
        let body = self.infer_expr(&def.body);
        let actual = Type::Function(FunctionType::operator(params, body, def.id));
        self.ctx
            .push_gen_step(def.id, GenRule::Signature, &actual, || def.name.clone());
        self.constrain(signature, actual, def.id, Reason::OperatorDefinition);
    }

    fn procedure(&mut self, procedure: &Procedure) {
        if self.registry.is_referenced(procedure.self_id) {
            self.constrain_identity(procedure.self_id);
        }
        let params: Vec<Type> = procedure.params.iter().map(|p| self.declare(p)).collect();
        for local in &procedure.locals {
            self.declare(local);
        }
        self.current_self = Some(procedure.self_id);
        self.check_stmts(&procedure.body);
        self.current_self = None;
        let signature = self.var_type(procedure.id);
        let actual = Type::Function(FunctionType::procedure(params, procedure.id));
        self.ctx
            .push_gen_step(procedure.id, GenRule::Signature, &actual, || {
                procedure.name.clone()
            });
        self.constrain(signature, actual, procedure.id, Reason::ProcedureSignature);
    }

    fn archetype(&mut self, archetype: &Archetype) {
        self.registry
            .add_read_and_written_value_types(archetype, self.ctx.generator_mut());

        self.var_for(archetype.self_id);
        self.constrain_identity(archetype.self_id);

        let mut params = Vec::with_capacity(archetype.params.len());
        for (index, param) in archetype.params.iter().enumerate() {
            let param_ty = self.declare(&param.decl);
            let slots = [
                self.registry.read_value_type(param.decl.id),
                self.registry.written_value_type(param.decl.id),
            ];
            for slot in slots.into_iter().flatten() {
                self.constrain(
                    param_ty.clone(),
                    Type::Var(slot),
                    param.decl.id,
                    Reason::ArchetypeParam { index },
                );
            }
            params.push(param_ty);
        }

        self.body = BodyContext::Archetype {
            params: archetype.params.iter().map(|p| p.decl.id).collect(),
        };
        for local in &archetype.locals {
            self.declare(local);
        }
        self.current_self = Some(archetype.self_id);
        self.check_stmts(&archetype.body);
        self.current_self = None;
        self.body = BodyContext::General;

        let signature = self.var_type(archetype.id);
        let actual = Type::Function(FunctionType::procedure(params, archetype.id));
        self.ctx
            .push_gen_step(archetype.id, GenRule::Signature, &actual, || {
                archetype.name.clone()
            });
        self.constrain(signature, actual, archetype.id, Reason::ArchetypeSignature);
    }

    fn mapping_macro(&mut self, mapping_macro: &MappingMacro) {
        let variable = self.var_type(mapping_macro.variable_id);
        self.var_for(mapping_macro.value_id);
        let result = self.var_type(mapping_macro.read_value_id);

        self.body = BodyContext::MacroRead { result };
        self.check_stmts(&mapping_macro.read_body);
        self.body = BodyContext::MacroWrite { variable };
        self.check_stmts(&mapping_macro.write_body);
        self.body = BodyContext::General;
    }

    fn instance(&mut self, instance: &pgo_ast::Instance) {
        self.declare(&instance.name);
        self.constrain_identity(instance.name.id);

        let args: Vec<Type> = instance.params.iter().map(|p| self.infer_expr(p)).collect();
        let Some(archetype) = self.registry.find_archetype(&instance.target).cloned() else {
            return;
        };
        let signature = self.var_type(archetype.id);
        self.constrain(
            signature,
            Type::Function(FunctionType::procedure(args, instance.id)),
            instance.id,
            Reason::InstanceArgs {
                archetype: archetype.name.clone(),
            },
        );

        for mapping in &instance.mappings {
            self.infer_expr(&mapping.variable);
            let Some(global) = self.registry.follow_reference(mapping.variable.id) else {
                continue;
            };
            // The by-reference archetype parameter the mapped global is
            // passed to. Values passed by copy never go through the macro.
            let Some(param) = instance
                .params
                .iter()
                .position(|arg| self.registry.follow_reference(arg.id) == Some(global))
                .and_then(|index| archetype.params.get(index))
                .filter(|param| param.by_ref)
            else {
                continue;
            };
            let Some(mapping_macro) = self
                .registry
                .find_mapping_macro(&mapping.macro_name)
                .cloned()
            else {
                continue;
            };
            if let Some(read) = self.registry.read_value_type(param.id) {
                let macro_read = self.var_type(mapping_macro.read_value_id);
                self.constrain(
                    Type::Var(read),
                    macro_read,
                    mapping.id,
                    Reason::MappingRead {
                        macro_name: mapping_macro.name.clone(),
                    },
                );
            }
            if let Some(written) = self.registry.written_value_type(param.id) {
                let macro_value = self.var_type(mapping_macro.value_id);
                self.constrain(
                    Type::Var(written),
                    macro_value,
                    mapping.id,
                    Reason::MappingWrite {
                        macro_name: mapping_macro.name.clone(),
                    },
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn check_stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.check_stmt(stmt);
        }
    }

    fn check_stmt(&mut self, stmt: &Stmt) {
        match &stmt.node {
            StmtKind::Labeled { body, .. } => self.check_stmts(body),
            StmtKind::Assign(pairs) => {
                for pair in pairs {
                    let target = self.assign_target(&pair.lhs);
                    let value = self.infer_expr(&pair.rhs);
                    self.constrain(target, value, pair.rhs.id, Reason::Assignment);
                }
            }
            StmtKind::Return | StmtKind::Skip | StmtKind::Goto(_) => {}
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition);
                self.check_stmts(then_branch);
                self.check_stmts(else_branch);
            }
            StmtKind::Either(branches) => {
                for branch in branches {
                    self.check_stmts(branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.check_condition(condition);
                self.check_stmts(body);
            }
            StmtKind::With { variables, body } => {
                for var in variables {
                    self.declare(var);
                }
                self.check_stmts(body);
            }
            StmtKind::Print(e) => {
                self.infer_expr(e);
            }
            StmtKind::Assert(e) | StmtKind::Await(e) => self.check_condition(e),
            StmtKind::Call { procedure, args } => {
                let args: Vec<Type> = args.iter().map(|a| self.infer_expr(a)).collect();
                let Some(decl) = self.registry.follow_reference(stmt.id) else {
                    return;
                };
                let signature = self.var_type(decl);
                self.constrain(
                    signature,
                    Type::Function(FunctionType::procedure(args, stmt.id)),
                    stmt.id,
                    Reason::ProcedureCall {
                        name: procedure.clone(),
                    },
                );
                self.caller_identity(procedure, stmt.id);
            }
            StmtKind::Yield(e) => {
                let value = self.infer_expr(e);
                let target = match &self.body {
                    BodyContext::MacroRead { result } => Some(result.clone()),
                    BodyContext::MacroWrite { variable } => Some(variable.clone()),
                    BodyContext::General | BodyContext::Archetype { .. } => None,
                };
                if let Some(target) = target {
                    self.constrain(target, value, e.id, Reason::Yield);
                }
            }
        }
    }

    /// A procedure that uses `self` sees the identity of every caller, so
    /// all callers must agree on its type.
    fn caller_identity(&mut self, procedure: &str, call: NodeId) {
        let Some(caller) = self.current_self else {
            return;
        };
        let Some(callee) = self.registry.find_procedure(procedure).map(|p| p.self_id) else {
            return;
        };
        if !self.registry.is_referenced(callee) {
            return;
        }
        let callee_ty = self.var_type(callee);
        let caller_ty = self.var_type(caller);
        self.constrain(
            callee_ty,
            caller_ty,
            call,
            Reason::CallerIdentity {
                name: procedure.to_string(),
            },
        );
    }

    fn check_condition(&mut self, condition: &Expr) {
        let ty = self.infer_expr(condition);
        self.constrain(Type::bool(condition.id), ty, condition.id, Reason::Condition);
    }

    /// Type of the location an assignment writes to.
    fn assign_target(&mut self, lhs: &Expr) -> Type {
        let target = match &lhs.node {
            ExprKind::Ident(_) => match self.registry.follow_reference(lhs.id) {
                Some(decl) => match self.param_slot(decl, false) {
                    Some(slot) => Type::Var(slot),
                    None => self.var_type(decl),
                },
                None => self.ctx.fresh_type(),
            },
            // `f[i] := e` writes a value of `f`.
            ExprKind::FunctionApply { func, args } => {
                let base = self.assign_target(func);
                let key = self.key_type(args, lhs.id);
                let value = self.ctx.fresh_type();
                self.constrain(
                    base,
                    Type::map(key, value.clone(), lhs.id),
                    lhs.id,
                    Reason::FunctionApply,
                );
                value
            }
            _ => return self.infer_expr(lhs),
        };
        let var = self.var_type(lhs.id);
        self.constrain(var.clone(), target, lhs.id, Reason::ExprType);
        var
    }

    /// Read or written slot of `decl` if it is a parameter of the archetype
    /// being visited.
    fn param_slot(&self, decl: NodeId, read: bool) -> Option<TypeVarId> {
        match &self.body {
            BodyContext::Archetype { params } if params.contains(&decl) => {
                if read {
                    self.registry.read_value_type(decl)
                } else {
                    self.registry.written_value_type(decl)
                }
            }
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Give `expr` its own variable, equate it with the synthesized type and
    /// return the variable.
    fn infer_expr(&mut self, expr: &Expr) -> Type {
        let (ty, rule) = self.synth_expr(expr);
        self.ctx.push_gen_step(expr.id, rule, &ty, String::new);
        let var = self.var_type(expr.id);
        self.constrain(var.clone(), ty, expr.id, Reason::ExprType);
        var
    }

    fn synth_expr(&mut self, expr: &Expr) -> (Type, GenRule) {
        let id = expr.id;
        match &expr.node {
            ExprKind::Lit(lit) => {
                let ty = match lit {
                    Lit::Int(_) => Type::int(id),
                    Lit::Real(_) => Type::real(id),
                    Lit::Bool(_) => Type::bool(id),
                    Lit::String(_) => Type::string(id),
                };
                (ty, GenRule::Literal)
            }

            ExprKind::Ident(_) | ExprKind::Ref(_) => {
                let ty = match self.registry.follow_reference(id) {
                    Some(decl) => match self.param_slot(decl, true) {
                        Some(slot) => Type::Var(slot),
                        None => self.var_type(decl),
                    },
                    None => self.ctx.fresh_type(),
                };
                (ty, GenRule::Identifier)
            }

            ExprKind::Tuple(elems) => {
                let elems = elems.iter().map(|e| self.infer_expr(e)).collect();
                (Type::tuple(elems, id), GenRule::Tuple)
            }

            ExprKind::Set(elems) => {
                let elem = match elems.split_first() {
                    None => self.ctx.fresh_type(),
                    Some((first, rest)) => {
                        let first_ty = self.infer_expr(first);
                        for e in rest {
                            let ty = self.infer_expr(e);
                            self.constrain(first_ty.clone(), ty, e.id, Reason::SetElements);
                        }
                        first_ty
                    }
                };
                (Type::set(elem, id), GenRule::Set)
            }

            ExprKind::Unary { op, operand } => {
                (self.infer_unary(*op, operand, id), GenRule::Operator)
            }

            ExprKind::Binary { op, lhs, rhs } => {
                (self.infer_binary(*op, lhs, rhs, id), GenRule::Operator)
            }

            ExprKind::FunctionApply { func, args } => {
                let func_ty = self.infer_expr(func);
                let key = self.key_type(args, id);
                let value = self.ctx.fresh_type();
                self.constrain(
                    func_ty,
                    Type::map(key, value.clone(), id),
                    id,
                    Reason::FunctionApply,
                );
                (value, GenRule::FunctionApply)
            }

            ExprKind::FunctionLiteral { bounds, body } => {
                let mut keys: Vec<Type> = bounds.iter().map(|b| self.infer_bound(b)).collect();
                let key = if keys.len() == 1 {
                    keys.remove(0)
                } else {
                    Type::tuple(keys, id)
                };
                let body = self.infer_expr(body);
                (Type::map(key, body, id), GenRule::FunctionLiteral)
            }

            ExprKind::SetRefinement { bound, predicate } => {
                let member = self.infer_bound(bound);
                self.check_condition(predicate);
                (Type::set(member, id), GenRule::SetFormer)
            }

            ExprKind::SetComprehension { body, bounds } => {
                for bound in bounds {
                    self.infer_bound(bound);
                }
                let body = self.infer_expr(body);
                (Type::set(body, id), GenRule::SetFormer)
            }

            ExprKind::Quantified { bounds, body, .. } => {
                for bound in bounds {
                    self.infer_bound(bound);
                }
                self.check_condition(body);
                (Type::bool(id), GenRule::Quantifier)
            }

            ExprKind::Choose { bound, predicate } => {
                let chosen = self.infer_bound(bound);
                self.check_condition(predicate);
                (chosen, GenRule::Choose)
            }

            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition);
                let then_ty = self.infer_expr(then_branch);
                let else_ty = self.infer_expr(else_branch);
                self.constrain(then_ty.clone(), else_ty, else_branch.id, Reason::IfBranches);
                (then_ty, GenRule::If)
            }

            ExprKind::Case { arms, other } => {
                let mut result: Option<Type> = None;
                let results = arms
                    .iter()
                    .map(|arm| {
                        self.check_condition(&arm.condition);
                        &arm.result
                    })
                    .collect::<Vec<_>>();
                for e in results.into_iter().chain(other.as_deref()) {
                    let ty = self.infer_expr(e);
                    match &result {
                        None => result = Some(ty),
                        Some(first) => {
                            self.constrain(first.clone(), ty, e.id, Reason::CaseArms);
                        }
                    }
                }
                let ty = match result {
                    Some(ty) => ty,
                    None => self.ctx.fresh_type(),
                };
                (ty, GenRule::Case)
            }

            ExprKind::Let { definitions, body } => {
                for def in definitions {
                    self.definition(def);
                }
                (self.infer_expr(body), GenRule::Let)
            }

            ExprKind::OperatorCall { name, args } => {
                let args: Vec<Type> = args.iter().map(|a| self.infer_expr(a)).collect();
                let ret = self.ctx.fresh_type();
                if let Some(def) = self.registry.follow_reference(id) {
                    let signature = self.var_type(def);
                    self.constrain(
                        signature,
                        Type::Function(FunctionType::operator(args, ret.clone(), id)),
                        id,
                        Reason::OperatorCall { name: name.clone() },
                    );
                }
                (ret, GenRule::OperatorCall)
            }
        }
    }

    /// `x \in S`: the bound variable is a member of `S`.
    fn infer_bound(&mut self, bound: &QuantifierBound) -> Type {
        let set = self.infer_expr(&bound.set);
        let member = self.var_type(bound.id);
        self.constrain(
            Type::set(member.clone(), bound.id),
            set,
            bound.id,
            Reason::Membership,
        );
        member
    }

    /// `f[a]` is keyed by `a`, `f[a, b]` by `<<a, b>>`.
    fn key_type(&mut self, args: &[Expr], node: NodeId) -> Type {
        let mut keys: Vec<Type> = args.iter().map(|a| self.infer_expr(a)).collect();
        if keys.len() == 1 {
            keys.remove(0)
        } else {
            Type::tuple(keys, node)
        }
    }

    fn infer_unary(&mut self, op: UnaryOp, operand: &Expr, id: NodeId) -> Type {
        let operand_ty = self.infer_expr(operand);
        let reason = Reason::UnaryOp(op.as_str());
        match op {
            UnaryOp::Not => {
                self.constrain(Type::bool(id), operand_ty, id, reason);
                Type::bool(id)
            }
            UnaryOp::Neg => {
                let result = self.ctx.fresh_type();
                self.numeric(result.clone(), &[operand_ty], id, reason);
                result
            }
            UnaryOp::Domain => {
                let key = self.ctx.fresh_type();
                let value = self.ctx.fresh_type();
                self.constrain(Type::map(key.clone(), value, id), operand_ty, id, reason);
                Type::set(key, id)
            }
            UnaryOp::PowerSet => {
                let elem = self.ctx.fresh_type();
                let set = Type::set(elem, id);
                self.constrain(set.clone(), operand_ty, id, reason);
                Type::set(set, id)
            }
            UnaryOp::BigUnion => {
                let elem = self.ctx.fresh_type();
                let set = Type::set(elem, id);
                self.constrain(Type::set(set.clone(), id), operand_ty, id, reason);
                set
            }
            UnaryOp::Cardinality => {
                let elem = self.ctx.fresh_type();
                self.constrain(Type::set(elem, id), operand_ty, id, reason);
                Type::int(id)
            }
        }
    }

    fn infer_binary(&mut self, op: BinOp, lhs: &Expr, rhs: &Expr, id: NodeId) -> Type {
        let lhs_ty = self.infer_expr(lhs);
        let rhs_ty = self.infer_expr(rhs);
        let reason = Reason::BinaryOp(op.as_str());
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul => {
                let result = self.ctx.fresh_type();
                self.numeric(result.clone(), &[lhs_ty, rhs_ty], id, reason);
                result
            }
            BinOp::IntDiv | BinOp::Mod => {
                self.constrain(Type::int(id), lhs_ty, lhs.id, reason.clone());
                self.constrain(Type::int(id), rhs_ty, rhs.id, reason);
                Type::int(id)
            }
            BinOp::RealDiv => {
                self.constrain(Type::real(id), lhs_ty, lhs.id, reason.clone());
                self.constrain(Type::real(id), rhs_ty, rhs.id, reason);
                Type::real(id)
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let operand = self.ctx.fresh_type();
                self.numeric(operand, &[lhs_ty, rhs_ty], id, reason);
                Type::bool(id)
            }
            BinOp::Eq | BinOp::Neq => {
                self.constrain(lhs_ty, rhs_ty, id, reason);
                Type::bool(id)
            }
            BinOp::And | BinOp::Or | BinOp::Implies | BinOp::Equiv => {
                self.constrain(Type::bool(id), lhs_ty, lhs.id, reason.clone());
                self.constrain(Type::bool(id), rhs_ty, rhs.id, reason);
                Type::bool(id)
            }
            BinOp::In | BinOp::NotIn => {
                self.constrain(Type::set(lhs_ty, id), rhs_ty, id, Reason::Membership);
                Type::bool(id)
            }
            BinOp::Union | BinOp::Intersect | BinOp::SetMinus => {
                let set = Type::set(self.ctx.fresh_type(), id);
                self.constrain(set.clone(), lhs_ty, lhs.id, reason.clone());
                self.constrain(set.clone(), rhs_ty, rhs.id, reason);
                set
            }
            BinOp::Subseteq => {
                let set = Type::set(self.ctx.fresh_type(), id);
                self.constrain(set.clone(), lhs_ty, lhs.id, reason.clone());
                self.constrain(set, rhs_ty, rhs.id, reason);
                Type::bool(id)
            }
            BinOp::Range => {
                self.constrain(Type::int(id), lhs_ty, lhs.id, Reason::Range);
                self.constrain(Type::int(id), rhs_ty, rhs.id, Reason::Range);
                Type::set(Type::int(id), id)
            }
            BinOp::Concat => {
                self.constrain(Type::string(id), lhs_ty, lhs.id, reason.clone());
                self.constrain(Type::string(id), rhs_ty, rhs.id, reason);
                Type::string(id)
            }
        }
    }

    /// Every operand has type `shared`, which is `Int` or else `Real`. Only
    /// `shared` itself is left to the alternative.
    fn numeric(&mut self, shared: Type, operands: &[Type], id: NodeId, reason: Reason) {
        for operand in operands {
            self.constrain(shared.clone(), operand.clone(), id, reason.clone());
        }
        let candidate = |ty: Type| {
            vec![EqualityConstraint::new(
                shared.clone(),
                ty,
                Provenance::new(id, reason.clone()),
            )]
        };
        let candidates = vec![candidate(Type::int(id)), candidate(Type::real(id))];
        self.ctx
            .constrain_alternatives(candidates, Provenance::new(id, reason));
    }
}
