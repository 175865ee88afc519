//! Definition registry.
//!
//! Built once per compilation by a scoping pass over the algorithm. It
//! resolves every name use to the id of its declaration, records the
//! top-level definitions the generator looks up by name, holds the
//! read/written value slots of archetype parameters, and receives the Go
//! types of global variables once inference succeeds.

use std::collections::BTreeMap;

use pgo_ast::{
    Archetype, Expr, ExprKind, Init, ModularBlock, NodeId, OperatorDefinition, Processes,
    QuantifierBound, Stmt, StmtKind, VariableDecl,
};
use pgo_diag::{Category, Diagnostic, DiagnosticError};
use pgo_types::{GoType, TypeGenerator, TypeVarId};

use crate::node_to_location;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstantInfo {
    pub id: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureInfo {
    pub id: NodeId,
    pub name: String,
    pub self_id: NodeId,
    pub params: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchetypeParamInfo {
    pub id: NodeId,
    pub name: String,
    pub by_ref: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchetypeInfo {
    pub id: NodeId,
    pub name: String,
    pub self_id: NodeId,
    pub params: Vec<ArchetypeParamInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingMacroInfo {
    pub id: NodeId,
    pub name: String,
    pub variable_id: NodeId,
    pub value_id: NodeId,
    pub read_value_id: NodeId,
}

#[derive(Debug, Clone, Default)]
pub struct DefinitionRegistry {
    /// Use site -> declaration.
    references: BTreeMap<NodeId, NodeId>,
    global_scope: BTreeMap<String, NodeId>,
    constants: Vec<ConstantInfo>,
    constant_values: BTreeMap<NodeId, Expr>,
    global_variables: Vec<NodeId>,
    procedures: BTreeMap<String, ProcedureInfo>,
    archetypes: BTreeMap<String, ArchetypeInfo>,
    mapping_macros: BTreeMap<String, MappingMacroInfo>,
    read_value_types: BTreeMap<NodeId, TypeVarId>,
    written_value_types: BTreeMap<NodeId, TypeVarId>,
    global_variable_types: BTreeMap<NodeId, GoType>,
    diagnostics: Vec<Diagnostic>,
}

impl DefinitionRegistry {
    /// Record the declarations of `block` and resolve every name it uses.
    /// Names that cannot be resolved are reported in [`Self::diagnostics`].
    pub fn from_block(block: &ModularBlock) -> Self {
        let mut registry = DefinitionRegistry::default();

        for constant in &block.constants {
            registry.constants.push(ConstantInfo {
                id: constant.id,
                name: constant.name.clone(),
            });
            registry
                .global_scope
                .insert(constant.name.clone(), constant.id);
        }
        for var in &block.variables {
            registry.global_variables.push(var.id);
            registry.global_scope.insert(var.name.clone(), var.id);
        }
        for unit in &block.units {
            registry.global_scope.insert(unit.name.clone(), unit.id);
        }
        for procedure in &block.procedures {
            registry.procedures.insert(
                procedure.name.clone(),
                ProcedureInfo {
                    id: procedure.id,
                    name: procedure.name.clone(),
                    self_id: procedure.self_id,
                    params: procedure.params.iter().map(|p| p.id).collect(),
                },
            );
        }
        for archetype in &block.archetypes {
            registry.archetypes.insert(
                archetype.name.clone(),
                ArchetypeInfo {
                    id: archetype.id,
                    name: archetype.name.clone(),
                    self_id: archetype.self_id,
                    params: archetype
                        .params
                        .iter()
                        .map(|p| ArchetypeParamInfo {
                            id: p.decl.id,
                            name: p.decl.name.clone(),
                            by_ref: p.by_ref,
                        })
                        .collect(),
                },
            );
        }
        for mapping_macro in &block.mapping_macros {
            registry.mapping_macros.insert(
                mapping_macro.name.clone(),
                MappingMacroInfo {
                    id: mapping_macro.id,
                    name: mapping_macro.name.clone(),
                    variable_id: mapping_macro.variable_id,
                    value_id: mapping_macro.value_id,
                    read_value_id: mapping_macro.read_value_id,
                },
            );
        }

        let mut resolver = Resolver::new(&registry);
        resolver.block(block);
        let Resolver {
            references,
            diagnostics,
            ..
        } = resolver;
        registry.references = references;
        registry.diagnostics = diagnostics;
        registry
    }

    /// Diagnostics produced by the scoping pass.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // -- Constants --

    pub fn constants(&self) -> &[ConstantInfo] {
        &self.constants
    }

    pub fn constant_value(&self, id: NodeId) -> Option<&Expr> {
        self.constant_values.get(&id)
    }

    /// Supply the value of a constant (e.g. from the command line). The
    /// value is resolved in the global scope.
    pub fn set_constant_value(&mut self, name: &str, value: Expr) -> Result<(), DiagnosticError> {
        let Some(id) = self.constants.iter().find(|c| c.name == name).map(|c| c.id) else {
            return Err(DiagnosticError::single(
                Diagnostic::error(
                    Category::UndefinedName,
                    format!("cannot set value of undeclared constant `{name}`"),
                )
                .at(node_to_location(value.id)),
            ));
        };
        let mut resolver = Resolver::new(self);
        resolver.expr(&value);
        let Resolver {
            references,
            diagnostics,
            ..
        } = resolver;
        if !diagnostics.is_empty() {
            return Err(DiagnosticError::multiple(diagnostics));
        }
        self.references.extend(references);
        self.constant_values.insert(id, value);
        Ok(())
    }

    // -- Lookups --

    /// Declaration a use site refers to.
    pub fn follow_reference(&self, use_site: NodeId) -> Option<NodeId> {
        self.references.get(&use_site).copied()
    }

    /// Whether any use site resolves to `decl`.
    pub fn is_referenced(&self, decl: NodeId) -> bool {
        self.references.values().any(|d| *d == decl)
    }

    pub fn find_archetype(&self, name: &str) -> Option<&ArchetypeInfo> {
        self.archetypes.get(name)
    }

    pub fn find_mapping_macro(&self, name: &str) -> Option<&MappingMacroInfo> {
        self.mapping_macros.get(name)
    }

    pub fn find_procedure(&self, name: &str) -> Option<&ProcedureInfo> {
        self.procedures.get(name)
    }

    /// Global variables in declaration order.
    pub fn global_variables(&self) -> &[NodeId] {
        &self.global_variables
    }

    // -- Archetype parameter slots --

    /// Allocate a read-value and a written-value variable for every
    /// parameter of `archetype`.
    pub fn add_read_and_written_value_types(
        &mut self,
        archetype: &Archetype,
        generator: &mut TypeGenerator,
    ) {
        for param in &archetype.params {
            self.read_value_types.insert(param.decl.id, generator.fresh());
            self.written_value_types
                .insert(param.decl.id, generator.fresh());
        }
    }

    pub fn read_value_type(&self, param: NodeId) -> Option<TypeVarId> {
        self.read_value_types.get(&param).copied()
    }

    pub fn written_value_type(&self, param: NodeId) -> Option<TypeVarId> {
        self.written_value_types.get(&param).copied()
    }

    // -- Resolved global types --

    pub fn update_global_variable_type(&mut self, id: NodeId, ty: GoType) {
        self.global_variable_types.insert(id, ty);
    }

    pub fn global_variable_type(&self, id: NodeId) -> Option<&GoType> {
        self.global_variable_types.get(&id)
    }
}

// ---------------------------------------------------------------------------
// Scoping pass
// ---------------------------------------------------------------------------

struct Resolver<'r> {
    registry: &'r DefinitionRegistry,
    scopes: Vec<BTreeMap<String, NodeId>>,
    references: BTreeMap<NodeId, NodeId>,
    diagnostics: Vec<Diagnostic>,
}

impl<'r> Resolver<'r> {
    fn new(registry: &'r DefinitionRegistry) -> Self {
        Self {
            registry,
            scopes: vec![registry.global_scope.clone()],
            references: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    fn lookup(&self, name: &str) -> Option<NodeId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    fn bind(&mut self, name: &str, id: NodeId) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), id);
        }
    }

    fn scoped(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push(BTreeMap::new());
        f(self);
        self.scopes.pop();
    }

    fn undefined(&mut self, use_site: NodeId, what: &str, name: &str) {
        self.diagnostics.push(
            Diagnostic::error(
                Category::UndefinedName,
                format!("cannot find {what} `{name}` in this scope"),
            )
            .at(node_to_location(use_site)),
        );
    }

    fn use_name(&mut self, use_site: NodeId, name: &str, what: &str) {
        match self.lookup(name) {
            Some(decl) => {
                self.references.insert(use_site, decl);
            }
            None => self.undefined(use_site, what, name),
        }
    }

    fn block(&mut self, block: &ModularBlock) {
        for var in &block.variables {
            self.init(var);
        }
        for unit in &block.units {
            self.definition(unit);
        }
        for procedure in &block.procedures {
            self.scoped(|r| {
                r.bind("self", procedure.self_id);
                for param in &procedure.params {
                    r.decl(param);
                }
                for local in &procedure.locals {
                    r.decl(local);
                }
                r.stmts(&procedure.body);
            });
        }
        for archetype in &block.archetypes {
            self.scoped(|r| {
                r.bind("self", archetype.self_id);
                for param in &archetype.params {
                    r.decl(&param.decl);
                }
                for local in &archetype.locals {
                    r.decl(local);
                }
                r.stmts(&archetype.body);
            });
        }
        for mapping_macro in &block.mapping_macros {
            self.scoped(|r| {
                r.bind("$variable", mapping_macro.variable_id);
                r.stmts(&mapping_macro.read_body);
            });
            self.scoped(|r| {
                r.bind("$variable", mapping_macro.variable_id);
                r.bind("$value", mapping_macro.value_id);
                r.stmts(&mapping_macro.write_body);
            });
        }
        for instance in &block.instances {
            self.init(&instance.name);
            if self.registry.find_archetype(&instance.target).is_none() {
                self.undefined(instance.id, "archetype", &instance.target);
            }
            self.scoped(|r| {
                r.bind("self", instance.name.id);
                for param in &instance.params {
                    r.expr(param);
                }
            });
            for mapping in &instance.mappings {
                self.expr(&mapping.variable);
                if self.registry.find_mapping_macro(&mapping.macro_name).is_none() {
                    self.undefined(mapping.id, "mapping macro", &mapping.macro_name);
                }
            }
        }
        match &block.processes {
            Processes::Single(body) => self.stmts(body),
            Processes::Multi(processes) => {
                for process in processes {
                    self.init(&process.name);
                    self.scoped(|r| {
                        r.bind("self", process.name.id);
                        for local in &process.locals {
                            r.decl(local);
                        }
                        r.stmts(&process.body);
                    });
                }
            }
        }
    }

    /// Resolve an initializer without binding the declared name.
    fn init(&mut self, decl: &VariableDecl) {
        match &decl.init {
            Some(Init::Value(e)) | Some(Init::Member(e)) => self.expr(e),
            None => {}
        }
    }

    /// The initializer sees the enclosing scope, later code sees the name.
    fn decl(&mut self, decl: &VariableDecl) {
        self.init(decl);
        self.bind(&decl.name, decl.id);
    }

    fn definition(&mut self, def: &OperatorDefinition) {
        self.scoped(|r| {
            for arg in &def.args {
                r.bind(&arg.name, arg.id);
            }
            r.expr(&def.body);
        });
    }

    /// Bound sets see the enclosing scope; the caller opens the scope the
    /// bound names are visible in.
    fn bounds<'b>(&mut self, bounds: impl IntoIterator<Item = &'b QuantifierBound>) {
        let bounds: Vec<&QuantifierBound> = bounds.into_iter().collect();
        for bound in &bounds {
            self.expr(&bound.set);
        }
        for bound in bounds {
            self.bind(&bound.name, bound.id);
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match &expr.node {
            ExprKind::Lit(_) => {}
            ExprKind::Ident(name) | ExprKind::Ref(name) => self.use_name(expr.id, name, "variable"),
            ExprKind::Tuple(elems) | ExprKind::Set(elems) => {
                for elem in elems {
                    self.expr(elem);
                }
            }
            ExprKind::Unary { operand, .. } => self.expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.expr(lhs);
                self.expr(rhs);
            }
            ExprKind::FunctionApply { func, args } => {
                self.expr(func);
                for arg in args {
                    self.expr(arg);
                }
            }
            ExprKind::FunctionLiteral { bounds, body } => self.scoped(|r| {
                r.bounds(bounds);
                r.expr(body);
            }),
            ExprKind::SetRefinement { bound, predicate }
            | ExprKind::Choose { bound, predicate } => self.scoped(|r| {
                r.bounds([bound.as_ref()]);
                r.expr(predicate);
            }),
            ExprKind::SetComprehension { body, bounds }
            | ExprKind::Quantified { bounds, body, .. } => self.scoped(|r| {
                r.bounds(bounds);
                r.expr(body);
            }),
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(condition);
                self.expr(then_branch);
                self.expr(else_branch);
            }
            ExprKind::Case { arms, other } => {
                for arm in arms {
                    self.expr(&arm.condition);
                    self.expr(&arm.result);
                }
                if let Some(other) = other {
                    self.expr(other);
                }
            }
            ExprKind::Let { definitions, body } => self.scoped(|r| {
                for def in definitions {
                    r.definition(def);
                    r.bind(&def.name, def.id);
                }
                r.expr(body);
            }),
            ExprKind::OperatorCall { name, args } => {
                self.use_name(expr.id, name, "operator");
                for arg in args {
                    self.expr(arg);
                }
            }
        }
    }

    fn stmts(&mut self, stmts: &[Stmt]) {
        for stmt in stmts {
            self.stmt(stmt);
        }
    }

    fn stmt(&mut self, stmt: &Stmt) {
        match &stmt.node {
            StmtKind::Labeled { body, .. } => self.stmts(body),
            StmtKind::Assign(pairs) => {
                for pair in pairs {
                    self.expr(&pair.lhs);
                    self.expr(&pair.rhs);
                }
            }
            StmtKind::Return | StmtKind::Skip | StmtKind::Goto(_) => {}
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.expr(condition);
                self.stmts(then_branch);
                self.stmts(else_branch);
            }
            StmtKind::Either(branches) => {
                for branch in branches {
                    self.stmts(branch);
                }
            }
            StmtKind::While { condition, body } => {
                self.expr(condition);
                self.stmts(body);
            }
            StmtKind::With { variables, body } => self.scoped(|r| {
                for var in variables {
                    r.decl(var);
                }
                r.stmts(body);
            }),
            StmtKind::Print(e) | StmtKind::Assert(e) | StmtKind::Await(e) | StmtKind::Yield(e) => {
                self.expr(e)
            }
            StmtKind::Call { procedure, args } => {
                match self.registry.find_procedure(procedure) {
                    Some(info) => {
                        self.references.insert(stmt.id, info.id);
                    }
                    None => self.undefined(stmt.id, "procedure", procedure),
                }
                for arg in args {
                    self.expr(arg);
                }
            }
        }
    }
}
