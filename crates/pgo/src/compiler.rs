use std::collections::BTreeMap;

use pgo_ast::{ModularBlock, NodeId};
use pgo_diag::{Diagnostic, NodeLocation, Severity};
use pgo_infer::trace::{GenStep, UnifyStep};
use pgo_infer::{DefinitionRegistry, InferOptions, InferenceContext, generate_constraints, solve};
use pgo_types::{GoType, TargetTypeError, Type, sanitize_type_display, to_go_type};
use serde::Serialize;

/// Failure of the type inference pass as seen by the code generator.
#[derive(Debug, thiserror::Error)]
pub enum InferError {
    #[error("{}", format_diagnostics("type inference failed", .0))]
    Diagnostics(Vec<Diagnostic>),
    #[error("global variable at {location} has no Go type: {source}")]
    TargetType {
        location: NodeLocation,
        #[source]
        source: TargetTypeError,
    },
}

impl InferError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            InferError::Diagnostics(diags) => diags,
            InferError::TargetType { .. } => &[],
        }
    }
}

/// Everything one inference pass produced.
#[derive(Debug, Clone, Default)]
pub struct InferenceResult {
    /// Resolved type of every node that needs one. Best effort when
    /// `diagnostics` holds errors.
    pub types: BTreeMap<NodeId, Type>,
    pub diagnostics: Vec<Diagnostic>,
    pub gen_trace: Vec<GenStep>,
    pub unify_trace: Vec<UnifyStep>,
}

impl InferenceResult {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }

    pub fn type_of(&self, node: NodeId) -> Option<&Type> {
        self.types.get(&node)
    }

    /// Serializable view with types rendered for display.
    pub fn report(&self) -> TypeReport<'_> {
        TypeReport {
            types: self
                .types
                .iter()
                .map(|(node, ty)| (node.0, sanitize_type_display(ty)))
                .collect(),
            diagnostics: &self.diagnostics,
            gen_trace: &self.gen_trace,
            unify_trace: &self.unify_trace,
        }
    }
}

/// JSON-friendly dump of an inference run for tooling.
#[derive(Debug, Serialize)]
pub struct TypeReport<'a> {
    pub types: BTreeMap<u32, String>,
    pub diagnostics: &'a [Diagnostic],
    #[serde(skip_serializing_if = "is_empty")]
    pub gen_trace: &'a [GenStep],
    #[serde(skip_serializing_if = "is_empty")]
    pub unify_trace: &'a [UnifyStep],
}

/// Run one generation pass and one solve pass over `block`.
///
/// Scoping errors already recorded in `registry` stop the pass before any
/// constraint is generated. Unresolved nodes are only reported when solving
/// itself succeeded, so one conflict does not cascade into a report for
/// every node that depended on it.
pub fn infer_types(
    block: &ModularBlock,
    registry: &mut DefinitionRegistry,
    options: &InferOptions,
) -> InferenceResult {
    let diagnostics = registry.diagnostics().to_vec();
    if has_errors(&diagnostics) {
        return InferenceResult {
            diagnostics,
            ..InferenceResult::default()
        };
    }

    let mut ctx = InferenceContext::with_options(options);
    let vars = generate_constraints(block, registry, &mut ctx);
    let gen_trace = ctx.gen_trace().to_vec();
    let solution = solve(ctx.take_constraints(), options);
    let resolution = solution.resolve(&vars);

    let mut diagnostics = diagnostics;
    let solved = !solution.has_errors();
    diagnostics.extend(solution.diagnostics.iter().cloned());
    if solved {
        diagnostics.extend(resolution.diagnostics);
    }

    InferenceResult {
        types: resolution.types,
        diagnostics,
        gen_trace,
        unify_trace: solution.unify_trace().to_vec(),
    }
}

/// Infer types and, if no error was found, record the Go type of every
/// global variable in `registry` for code generation.
pub fn check_types(
    block: &ModularBlock,
    registry: &mut DefinitionRegistry,
    options: &InferOptions,
) -> Result<InferenceResult, InferError> {
    let result = infer_types(block, registry, options);
    if result.has_errors() {
        return Err(InferError::Diagnostics(result.diagnostics));
    }
    write_global_types(registry, &result.types)?;
    Ok(result)
}

/// Convert the resolved type of each global variable to its Go type and
/// store it in `registry`. Globals without a resolved type were never used
/// and are skipped.
pub fn write_global_types(
    registry: &mut DefinitionRegistry,
    types: &BTreeMap<NodeId, Type>,
) -> Result<(), InferError> {
    let converted = registry
        .global_variables()
        .iter()
        .filter_map(|id| types.get(id).map(|ty| (*id, ty)))
        .map(|(id, ty)| {
            to_go_type(ty)
                .map(|go| (id, go))
                .map_err(|source| InferError::TargetType {
                    location: NodeLocation(id.0),
                    source,
                })
        })
        .collect::<Result<Vec<(NodeId, GoType)>, _>>()?;
    for (id, go) in converted {
        registry.update_global_variable_type(id, go);
    }
    Ok(())
}

fn is_empty<T>(items: &&[T]) -> bool {
    items.is_empty()
}

fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(|d| matches!(d.severity, Severity::Error))
}

fn format_diagnostics(prefix: &str, diagnostics: &[Diagnostic]) -> String {
    if diagnostics.is_empty() {
        return prefix.to_string();
    }

    let rendered = diagnostics
        .iter()
        .map(|d| format!("  - {d}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{prefix}:\n{rendered}")
}
