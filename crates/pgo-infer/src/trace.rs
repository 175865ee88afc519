//! Tracing types for inference observability.
//!
//! These capture step-by-step traces of constraint generation and
//! unification so tools can show why a node received its type. All tracing
//! is opt-in via `InferOptions::tracing`, with zero overhead when disabled.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Unification trace
// ---------------------------------------------------------------------------

/// A single step in a unification trace.
#[derive(Debug, Clone, Serialize)]
pub struct UnifyStep {
    pub step: usize,
    pub action: UnifyAction,
    pub left: String,
    pub right: String,
    pub detail: String,
}

/// What action was taken during a unification step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnifyAction {
    /// Types are already identical.
    Identity,
    /// Structural recursion, e.g. `Set(A) ~ Set(B)` becomes `A ~ B`.
    Decompose,
    /// Type variable bound, e.g. `type0 := Int`.
    Bind,
    /// Occurs check fired and an infinite type was prevented.
    OccursCheck,
    /// A candidate of an alternative was committed.
    CommitAlternative,
    /// No candidate was forced, so the first viable one was taken.
    DefaultAlternative,
    /// Unification failed.
    Error,
}

// ---------------------------------------------------------------------------
// Generation trace
// ---------------------------------------------------------------------------

/// A single constraint-generation rule firing on a node.
#[derive(Debug, Clone, Serialize)]
pub struct GenStep {
    pub step: usize,
    pub node: u32,
    pub rule: GenRule,
    /// Synthesized type, variables named with the generator prefix.
    #[serde(rename = "type")]
    pub ty: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub detail: String,
}

/// Which generation rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenRule {
    Literal,
    Identifier,
    Tuple,
    Set,
    Operator,
    FunctionApply,
    FunctionLiteral,
    SetFormer,
    Quantifier,
    Choose,
    If,
    Case,
    Let,
    OperatorCall,
    Declaration,
    Signature,
    Alternative,
}
