//! AST node definitions for Modular PlusCal and the TLA+ expressions it embeds.
//!
//! This crate defines the tree handed to the type inference core by the
//! front end. Every node carries a [`NodeId`] that is unique within one
//! compilation and stable across passes; all type and constraint
//! bookkeeping is keyed by it.

pub mod build;

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Node identity
// ---------------------------------------------------------------------------

/// Globally unique, stable identifier of a syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocates node ids in increasing order.
#[derive(Debug, Clone, Default)]
pub struct NodeIdGen {
    next: u32,
}

impl NodeIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start allocating at `first`.
    pub fn starting_at(first: u32) -> Self {
        Self { next: first }
    }

    pub fn fresh(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// A value paired with the id of the node it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    pub id: NodeId,
    pub node: T,
}

impl<T> Node<T> {
    pub fn new(id: NodeId, node: T) -> Self {
        Self { id, node }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Node<U> {
        Node {
            id: self.id,
            node: f(self.node),
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Lit {
    Int(i64),
    Real(f64),
    Bool(bool),
    String(String),
}

pub type Expr = Node<ExprKind>;

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Literal value.
    Lit(Lit),

    /// General identifier. Resolved to its declaration by the definition
    /// registry; `self`, `$variable` and `$value` are ordinary identifiers
    /// at this level.
    Ident(String),

    /// `ref x`: a variable passed by reference to an archetype.
    Ref(String),

    /// Tuple / sequence literal: `<<a, b, c>>`.
    Tuple(Vec<Expr>),

    /// Set literal: `{a, b, c}`.
    Set(Vec<Expr>),

    /// Prefix operator or built-in unary operator.
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Infix operator.
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },

    /// Function application: `f[a]` or `f[a, b]`.
    FunctionApply { func: Box<Expr>, args: Vec<Expr> },

    /// Function constructor: `[x \in S, y \in T |-> body]`.
    FunctionLiteral {
        bounds: Vec<QuantifierBound>,
        body: Box<Expr>,
    },

    /// Set refinement: `{x \in S : predicate}`.
    SetRefinement {
        bound: Box<QuantifierBound>,
        predicate: Box<Expr>,
    },

    /// Set comprehension: `{body : x \in S}`.
    SetComprehension {
        body: Box<Expr>,
        bounds: Vec<QuantifierBound>,
    },

    /// Bounded quantifier: `\E x \in S : body` / `\A x \in S : body`.
    Quantified {
        quantifier: Quantifier,
        bounds: Vec<QuantifierBound>,
        body: Box<Expr>,
    },

    /// `CHOOSE x \in S : predicate`.
    Choose {
        bound: Box<QuantifierBound>,
        predicate: Box<Expr>,
    },

    /// `IF condition THEN a ELSE b`.
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    /// `CASE c1 -> e1 [] c2 -> e2 [] OTHER -> e`.
    Case {
        arms: Vec<CaseArm>,
        other: Option<Box<Expr>>,
    },

    /// `LET d1 == e1 ... IN body`.
    Let {
        definitions: Vec<OperatorDefinition>,
        body: Box<Expr>,
    },

    /// Call of a user-defined operator: `Op(a, b)`.
    OperatorCall { name: String, args: Vec<Expr> },
}

/// A bound variable introduced by a quantifier, set former or function
/// constructor. The bound's id is the declaration id of the variable.
#[derive(Debug, Clone, PartialEq)]
pub struct QuantifierBound {
    pub id: NodeId,
    pub name: String,
    pub set: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Exists,
    Forall,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseArm {
    pub condition: Expr,
    pub result: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `~`
    Not,
    /// `-`
    Neg,
    /// `DOMAIN f`
    Domain,
    /// `SUBSET S`
    PowerSet,
    /// `UNION S`
    BigUnion,
    /// `Cardinality(S)`
    Cardinality,
}

impl UnaryOp {
    pub fn as_str(self) -> &'static str {
        match self {
            UnaryOp::Not => "~",
            UnaryOp::Neg => "-",
            UnaryOp::Domain => "DOMAIN",
            UnaryOp::PowerSet => "SUBSET",
            UnaryOp::BigUnion => "UNION",
            UnaryOp::Cardinality => "Cardinality",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    /// `\div`
    IntDiv,
    /// `%`
    Mod,
    /// `/`
    RealDiv,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Neq,
    And,
    Or,
    Implies,
    Equiv,
    In,
    NotIn,
    Union,
    Intersect,
    SetMinus,
    Subseteq,
    /// `a .. b`
    Range,
    /// `\o` on strings
    Concat,
}

impl BinOp {
    pub fn as_str(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::IntDiv => "\\div",
            BinOp::Mod => "%",
            BinOp::RealDiv => "/",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Eq => "=",
            BinOp::Neq => "/=",
            BinOp::And => "/\\",
            BinOp::Or => "\\/",
            BinOp::Implies => "=>",
            BinOp::Equiv => "<=>",
            BinOp::In => "\\in",
            BinOp::NotIn => "\\notin",
            BinOp::Union => "\\union",
            BinOp::Intersect => "\\intersect",
            BinOp::SetMinus => "\\",
            BinOp::Subseteq => "\\subseteq",
            BinOp::Range => "..",
            BinOp::Concat => "\\o",
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

pub type Stmt = Node<StmtKind>;

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    /// `label: body`
    Labeled { label: String, body: Vec<Stmt> },
    /// `a := e1 || b[i] := e2`
    Assign(Vec<AssignPair>),
    Return,
    Skip,
    Goto(String),
    If {
        condition: Expr,
        then_branch: Vec<Stmt>,
        else_branch: Vec<Stmt>,
    },
    Either(Vec<Vec<Stmt>>),
    While {
        condition: Expr,
        body: Vec<Stmt>,
    },
    With {
        variables: Vec<VariableDecl>,
        body: Vec<Stmt>,
    },
    Print(Expr),
    Assert(Expr),
    Await(Expr),
    /// `call Proc(args)`. The statement id is the use site resolved to the
    /// procedure declaration.
    Call { procedure: String, args: Vec<Expr> },
    /// `yield e`, only meaningful inside mapping macro bodies.
    Yield(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssignPair {
    pub lhs: Expr,
    pub rhs: Expr,
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// How a declared variable is initialized.
#[derive(Debug, Clone, PartialEq)]
pub enum Init {
    /// `x = e`
    Value(Expr),
    /// `x \in S`: the variable ranges over the members of `S`.
    Member(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDecl {
    pub id: NodeId,
    pub name: String,
    pub init: Option<Init>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantDecl {
    pub id: NodeId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperatorArg {
    pub id: NodeId,
    pub name: String,
}

/// A TLA+ operator definition: `Op(a, b) == body`.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorDefinition {
    pub id: NodeId,
    pub name: String,
    pub args: Vec<OperatorArg>,
    pub body: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Procedure {
    pub id: NodeId,
    pub name: String,
    /// Declaration id of `self` inside the body: the identity of the
    /// calling process.
    pub self_id: NodeId,
    pub params: Vec<VariableDecl>,
    pub locals: Vec<VariableDecl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArchetypeParam {
    pub decl: VariableDecl,
    /// Declared as `ref x`.
    pub by_ref: bool,
}

/// A parameterized process template.
#[derive(Debug, Clone, PartialEq)]
pub struct Archetype {
    pub id: NodeId,
    pub name: String,
    /// Declaration id of the implicit `self` identifier.
    pub self_id: NodeId,
    pub params: Vec<ArchetypeParam>,
    pub locals: Vec<VariableDecl>,
    pub body: Vec<Stmt>,
}

/// Read/write interposition on a state reference.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingMacro {
    pub id: NodeId,
    pub name: String,
    /// Declaration id of `$variable`.
    pub variable_id: NodeId,
    /// Declaration id of `$value` (the pending write).
    pub value_id: NodeId,
    /// Id standing for the value produced by the read body.
    pub read_value_id: NodeId,
    pub read_body: Vec<Stmt>,
    pub write_body: Vec<Stmt>,
}

/// `mapping x via M` inside an instance.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceMapping {
    pub id: NodeId,
    /// The mapped variable: an identifier use naming a global.
    pub variable: Expr,
    pub macro_name: String,
}

/// `process (Name \in S) == instance A(args) mapping ...`
#[derive(Debug, Clone, PartialEq)]
pub struct Instance {
    pub id: NodeId,
    pub name: VariableDecl,
    pub target: String,
    pub params: Vec<Expr>,
    pub mappings: Vec<InstanceMapping>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Process {
    pub id: NodeId,
    /// `P \in 1..3` or `P = "a"`: the declaration of the process identity.
    pub name: VariableDecl,
    pub locals: Vec<VariableDecl>,
    pub body: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Processes {
    /// Uniprocess algorithm: a single body.
    Single(Vec<Stmt>),
    Multi(Vec<Process>),
}

impl Default for Processes {
    fn default() -> Self {
        Processes::Multi(Vec::new())
    }
}

/// A complete Modular PlusCal algorithm.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModularBlock {
    pub name: String,
    pub constants: Vec<ConstantDecl>,
    pub units: Vec<OperatorDefinition>,
    pub variables: Vec<VariableDecl>,
    pub procedures: Vec<Procedure>,
    pub archetypes: Vec<Archetype>,
    pub mapping_macros: Vec<MappingMacro>,
    pub instances: Vec<Instance>,
    pub processes: Processes,
}

impl ModularBlock {
    pub fn find_archetype(&self, name: &str) -> Option<&Archetype> {
        self.archetypes.iter().find(|a| a.name == name)
    }

    pub fn find_mapping_macro(&self, name: &str) -> Option<&MappingMacro> {
        self.mapping_macros.iter().find(|m| m.name == name)
    }

    pub fn find_procedure(&self, name: &str) -> Option<&Procedure> {
        self.procedures.iter().find(|p| p.name == name)
    }
}
