//! Programmatic construction of syntax trees.
//!
//! The front end hands the core a parsed tree; compiler-internal rewrites,
//! tests and benchmarks build trees directly with [`AstBuilder`], which
//! allocates a fresh [`NodeId`] for every node it creates.

use crate::{
    Archetype, ArchetypeParam, AssignPair, BinOp, CaseArm, ConstantDecl, Expr, ExprKind, Init,
    Instance, InstanceMapping, Lit, MappingMacro, Node, NodeId, NodeIdGen, OperatorArg,
    OperatorDefinition, Procedure, Process, Quantifier, QuantifierBound, Stmt, StmtKind, UnaryOp,
    VariableDecl,
};

#[derive(Debug, Clone, Default)]
pub struct AstBuilder {
    ids: NodeIdGen,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&mut self) -> NodeId {
        self.ids.fresh()
    }

    pub fn expr(&mut self, kind: ExprKind) -> Expr {
        Node::new(self.id(), kind)
    }

    pub fn stmt(&mut self, kind: StmtKind) -> Stmt {
        Node::new(self.id(), kind)
    }

    // -- Expressions --

    pub fn int(&mut self, value: i64) -> Expr {
        self.expr(ExprKind::Lit(Lit::Int(value)))
    }

    pub fn real(&mut self, value: f64) -> Expr {
        self.expr(ExprKind::Lit(Lit::Real(value)))
    }

    pub fn boolean(&mut self, value: bool) -> Expr {
        self.expr(ExprKind::Lit(Lit::Bool(value)))
    }

    pub fn string(&mut self, value: &str) -> Expr {
        self.expr(ExprKind::Lit(Lit::String(value.to_string())))
    }

    pub fn ident(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Ident(name.to_string()))
    }

    pub fn reference(&mut self, name: &str) -> Expr {
        self.expr(ExprKind::Ref(name.to_string()))
    }

    pub fn tuple(&mut self, elems: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Tuple(elems))
    }

    pub fn set(&mut self, elems: Vec<Expr>) -> Expr {
        self.expr(ExprKind::Set(elems))
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Expr) -> Expr {
        self.expr(ExprKind::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    pub fn binary(&mut self, op: BinOp, lhs: Expr, rhs: Expr) -> Expr {
        self.expr(ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    /// `lo .. hi` over integer literals.
    pub fn range(&mut self, lo: i64, hi: i64) -> Expr {
        let lo = self.int(lo);
        let hi = self.int(hi);
        self.binary(BinOp::Range, lo, hi)
    }

    pub fn apply(&mut self, func: Expr, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::FunctionApply {
            func: Box::new(func),
            args,
        })
    }

    pub fn bound(&mut self, name: &str, set: Expr) -> QuantifierBound {
        QuantifierBound {
            id: self.id(),
            name: name.to_string(),
            set,
        }
    }

    pub fn function_literal(&mut self, bounds: Vec<QuantifierBound>, body: Expr) -> Expr {
        self.expr(ExprKind::FunctionLiteral {
            bounds,
            body: Box::new(body),
        })
    }

    pub fn set_refinement(&mut self, bound: QuantifierBound, predicate: Expr) -> Expr {
        self.expr(ExprKind::SetRefinement {
            bound: Box::new(bound),
            predicate: Box::new(predicate),
        })
    }

    pub fn set_comprehension(&mut self, body: Expr, bounds: Vec<QuantifierBound>) -> Expr {
        self.expr(ExprKind::SetComprehension {
            body: Box::new(body),
            bounds,
        })
    }

    pub fn quantified(
        &mut self,
        quantifier: Quantifier,
        bounds: Vec<QuantifierBound>,
        body: Expr,
    ) -> Expr {
        self.expr(ExprKind::Quantified {
            quantifier,
            bounds,
            body: Box::new(body),
        })
    }

    pub fn choose(&mut self, bound: QuantifierBound, predicate: Expr) -> Expr {
        self.expr(ExprKind::Choose {
            bound: Box::new(bound),
            predicate: Box::new(predicate),
        })
    }

    pub fn if_expr(&mut self, condition: Expr, then_branch: Expr, else_branch: Expr) -> Expr {
        self.expr(ExprKind::If {
            condition: Box::new(condition),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    pub fn case(&mut self, arms: Vec<(Expr, Expr)>, other: Option<Expr>) -> Expr {
        let arms = arms
            .into_iter()
            .map(|(condition, result)| CaseArm { condition, result })
            .collect();
        self.expr(ExprKind::Case {
            arms,
            other: other.map(Box::new),
        })
    }

    pub fn let_in(&mut self, definitions: Vec<OperatorDefinition>, body: Expr) -> Expr {
        self.expr(ExprKind::Let {
            definitions,
            body: Box::new(body),
        })
    }

    pub fn op_call(&mut self, name: &str, args: Vec<Expr>) -> Expr {
        self.expr(ExprKind::OperatorCall {
            name: name.to_string(),
            args,
        })
    }

    // -- Statements --

    pub fn assign(&mut self, lhs: Expr, rhs: Expr) -> Stmt {
        self.stmt(StmtKind::Assign(vec![AssignPair { lhs, rhs }]))
    }

    /// `name := rhs`
    pub fn assign_var(&mut self, name: &str, rhs: Expr) -> Stmt {
        let lhs = self.ident(name);
        self.assign(lhs, rhs)
    }

    pub fn labeled(&mut self, label: &str, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::Labeled {
            label: label.to_string(),
            body,
        })
    }

    pub fn if_stmt(&mut self, condition: Expr, then_branch: Vec<Stmt>, else_branch: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    pub fn while_stmt(&mut self, condition: Expr, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::While { condition, body })
    }

    pub fn with_stmt(&mut self, variables: Vec<VariableDecl>, body: Vec<Stmt>) -> Stmt {
        self.stmt(StmtKind::With { variables, body })
    }

    pub fn either(&mut self, branches: Vec<Vec<Stmt>>) -> Stmt {
        self.stmt(StmtKind::Either(branches))
    }

    pub fn call(&mut self, procedure: &str, args: Vec<Expr>) -> Stmt {
        self.stmt(StmtKind::Call {
            procedure: procedure.to_string(),
            args,
        })
    }

    pub fn print(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Print(expr))
    }

    pub fn assert(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Assert(expr))
    }

    pub fn await_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Await(expr))
    }

    pub fn yield_stmt(&mut self, expr: Expr) -> Stmt {
        self.stmt(StmtKind::Yield(expr))
    }

    pub fn skip(&mut self) -> Stmt {
        self.stmt(StmtKind::Skip)
    }

    pub fn ret(&mut self) -> Stmt {
        self.stmt(StmtKind::Return)
    }

    // -- Declarations --

    /// `name` with no initializer.
    pub fn var(&mut self, name: &str) -> VariableDecl {
        VariableDecl {
            id: self.id(),
            name: name.to_string(),
            init: None,
        }
    }

    /// `name = value`
    pub fn var_eq(&mut self, name: &str, value: Expr) -> VariableDecl {
        VariableDecl {
            id: self.id(),
            name: name.to_string(),
            init: Some(Init::Value(value)),
        }
    }

    /// `name \in set`
    pub fn var_in(&mut self, name: &str, set: Expr) -> VariableDecl {
        VariableDecl {
            id: self.id(),
            name: name.to_string(),
            init: Some(Init::Member(set)),
        }
    }

    pub fn constant(&mut self, name: &str) -> ConstantDecl {
        ConstantDecl {
            id: self.id(),
            name: name.to_string(),
        }
    }

    pub fn definition(&mut self, name: &str, args: &[&str], body: Expr) -> OperatorDefinition {
        let args = args
            .iter()
            .map(|name| OperatorArg {
                id: self.id(),
                name: name.to_string(),
            })
            .collect();
        OperatorDefinition {
            id: self.id(),
            name: name.to_string(),
            args,
            body,
        }
    }

    pub fn procedure(
        &mut self,
        name: &str,
        params: Vec<VariableDecl>,
        locals: Vec<VariableDecl>,
        body: Vec<Stmt>,
    ) -> Procedure {
        Procedure {
            id: self.id(),
            name: name.to_string(),
            self_id: self.id(),
            params,
            locals,
            body,
        }
    }

    pub fn param(&mut self, name: &str, by_ref: bool) -> ArchetypeParam {
        ArchetypeParam {
            decl: self.var(name),
            by_ref,
        }
    }

    pub fn archetype(
        &mut self,
        name: &str,
        params: Vec<ArchetypeParam>,
        locals: Vec<VariableDecl>,
        body: Vec<Stmt>,
    ) -> Archetype {
        Archetype {
            id: self.id(),
            name: name.to_string(),
            self_id: self.id(),
            params,
            locals,
            body,
        }
    }

    pub fn mapping_macro(
        &mut self,
        name: &str,
        read_body: Vec<Stmt>,
        write_body: Vec<Stmt>,
    ) -> MappingMacro {
        MappingMacro {
            id: self.id(),
            name: name.to_string(),
            variable_id: self.id(),
            value_id: self.id(),
            read_value_id: self.id(),
            read_body,
            write_body,
        }
    }

    /// `mapping variable via macro_name`
    pub fn mapping(&mut self, variable: &str, macro_name: &str) -> InstanceMapping {
        InstanceMapping {
            id: self.id(),
            variable: self.ident(variable),
            macro_name: macro_name.to_string(),
        }
    }

    pub fn instance(
        &mut self,
        name: VariableDecl,
        target: &str,
        params: Vec<Expr>,
        mappings: Vec<InstanceMapping>,
    ) -> Instance {
        Instance {
            id: self.id(),
            name,
            target: target.to_string(),
            params,
            mappings,
        }
    }

    pub fn process(
        &mut self,
        name: VariableDecl,
        locals: Vec<VariableDecl>,
        body: Vec<Stmt>,
    ) -> Process {
        Process {
            id: self.id(),
            name,
            locals,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_assigns_distinct_ids() {
        let mut b = AstBuilder::new();
        let one = b.int(1);
        let two = b.int(2);
        let sum = b.binary(BinOp::Add, one, two);
        let ExprKind::Binary { lhs, rhs, .. } = &sum.node else {
            panic!("expected binary expression");
        };
        assert_ne!(lhs.id, rhs.id);
        assert_ne!(sum.id, lhs.id);
        assert_ne!(sum.id, rhs.id);
    }

    #[test]
    fn archetype_self_id_differs_from_archetype_id() {
        let mut b = AstBuilder::new();
        let archetype = b.archetype("A", vec![], vec![], vec![]);
        assert_ne!(archetype.id, archetype.self_id);
    }
}
