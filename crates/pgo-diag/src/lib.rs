//! Error reporting and diagnostics for PGo.
//!
//! Diagnostics are produced by the definition registry and the type
//! inference core and presented by the driver. The key invariant: no
//! unification variables in user-facing output; every type shown to the
//! user is rendered through the sanitized display in `pgo-types`.

use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Diagnostic severity and categories
// ---------------------------------------------------------------------------

/// How severe a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Info,
}

/// Broad category for diagnostics. Used for filtering and grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Two incompatible concrete shapes were forced equal.
    TypeMismatch,
    /// Tuple or function arity differs.
    ArityMismatch,
    /// A type would have to contain itself.
    InfiniteType,
    /// No candidate of a polymorphic constraint unifies.
    AlternativeExhausted,
    /// A type variable used by the program was never pinned down.
    UnresolvedType,
    /// A name could not be resolved to a declaration.
    UndefinedName,
    /// The solver ran out of its iteration budget.
    SolverBudget,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::TypeMismatch,
        Category::ArityMismatch,
        Category::InfiniteType,
        Category::AlternativeExhausted,
        Category::UnresolvedType,
        Category::UndefinedName,
        Category::SolverBudget,
    ];

    pub fn all() -> &'static [Category] {
        &Self::ALL
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::TypeMismatch => "type_mismatch",
            Category::ArityMismatch => "arity_mismatch",
            Category::InfiniteType => "infinite_type",
            Category::AlternativeExhausted => "alternative_exhausted",
            Category::UnresolvedType => "unresolved_type",
            Category::UndefinedName => "undefined_name",
            Category::SolverBudget => "solver_budget",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Category::TypeMismatch => "E0001",
            Category::ArityMismatch => "E0002",
            Category::InfiniteType => "E0003",
            Category::AlternativeExhausted => "E0004",
            Category::UnresolvedType => "E0005",
            Category::UndefinedName => "E0006",
            Category::SolverBudget => "E0007",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Category::TypeMismatch => "Two values that must share a type have incompatible types.",
            Category::ArityMismatch => "A tuple or call has the wrong number of components.",
            Category::InfiniteType => "A type would have to contain itself.",
            Category::AlternativeExhausted => {
                "A value that may take one of several types fits none of them."
            }
            Category::UnresolvedType => "The type of a value could not be determined.",
            Category::UndefinedName => "A referenced variable, operator, or macro is undefined.",
            Category::SolverBudget => "Type inference did not finish within its iteration budget.",
        }
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

/// Location of a diagnostic: the id of the offending syntax node.
///
/// Kept independent of `pgo-ast`; callers convert node ids into this type.
/// Drivers map node ids back to source positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeLocation(pub u32);

impl fmt::Display for NodeLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node #{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic message.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. E0001).
    pub code: Option<String>,
    pub severity: Severity,
    pub category: Category,
    /// Primary message: what went wrong.
    pub message: String,
    /// Where it went wrong.
    pub location: Option<NodeLocation>,
    /// Additional labeled nodes (e.g., "`Int` inferred here").
    pub labels: Vec<DiagLabel>,
    /// Suggested fix, if any.
    pub help: Option<String>,
}

/// A labeled node within a diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct DiagLabel {
    pub location: NodeLocation,
    pub message: String,
}

impl Diagnostic {
    pub fn error(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Error,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn warning(category: Category, message: impl Into<String>) -> Self {
        Self {
            code: Some(category.code().to_string()),
            severity: Severity::Warning,
            category,
            message: message.into(),
            location: None,
            labels: Vec::new(),
            help: None,
        }
    }

    pub fn at(mut self, location: NodeLocation) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_label(mut self, location: NodeLocation, message: impl Into<String>) -> Self {
        self.labels.push(DiagLabel {
            location,
            message: message.into(),
        });
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Every node this diagnostic points at: the primary location first,
    /// then labels, without duplicates.
    pub fn nodes(&self) -> Vec<NodeLocation> {
        let mut nodes = Vec::with_capacity(1 + self.labels.len());
        for location in self
            .location
            .iter()
            .copied()
            .chain(self.labels.iter().map(|label| label.location))
        {
            if !nodes.contains(&location) {
                nodes.push(location);
            }
        }
        nodes
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        if let Some(code) = &self.code {
            write!(f, "{prefix}[{code}]: {}", self.message)?;
        } else {
            write!(f, "{prefix}: {}", self.message)?;
        }
        if let Some(location) = self.location {
            write!(f, "\n  --> {location}")?;
        }
        for label in &self.labels {
            write!(f, "\n  note: {}: {}", label.location, label.message)?;
        }
        if let Some(help) = &self.help {
            write!(f, "\n  help: {help}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Error type for crates that produce diagnostics
// ---------------------------------------------------------------------------

/// Error type wrapping one or more diagnostics.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", .0.first().map(|d| d.to_string()).unwrap_or_default())]
pub struct DiagnosticError(pub Vec<Diagnostic>);

impl DiagnosticError {
    pub fn single(diag: Diagnostic) -> Self {
        Self(vec![diag])
    }

    pub fn multiple(diags: Vec<Diagnostic>) -> Self {
        Self(diags)
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.0
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_builder() {
        let diag = Diagnostic::error(Category::TypeMismatch, "expected `Int`, got `String`")
            .at(NodeLocation(10))
            .with_label(NodeLocation(4), "`String` inferred here")
            .with_help("compare values of the same type");

        assert_eq!(diag.severity, Severity::Error);
        assert_eq!(diag.code.as_deref(), Some("E0001"));
        assert_eq!(diag.category, Category::TypeMismatch);
        assert!(diag.message.contains("expected `Int`"));
        assert_eq!(diag.nodes(), vec![NodeLocation(10), NodeLocation(4)]);
        assert!(diag.help.unwrap().contains("same type"));
    }

    #[test]
    fn diagnostic_display() {
        let diag = Diagnostic::error(Category::UnresolvedType, "could not determine a type")
            .at(NodeLocation(3));
        let s = format!("{diag}");
        assert_eq!(s, "error[E0005]: could not determine a type\n  --> node #3");
    }

    #[test]
    fn nodes_are_deduplicated() {
        let diag = Diagnostic::error(Category::AlternativeExhausted, "no candidate fits")
            .at(NodeLocation(1))
            .with_label(NodeLocation(1), "candidate `Int`")
            .with_label(NodeLocation(2), "candidate `String`");
        assert_eq!(diag.nodes(), vec![NodeLocation(1), NodeLocation(2)]);
    }

    #[test]
    fn diagnostic_error_displays_first() {
        let err = DiagnosticError::multiple(vec![
            Diagnostic::error(Category::TypeMismatch, "first"),
            Diagnostic::error(Category::InfiniteType, "second"),
        ]);
        assert_eq!(err.to_string(), "error[E0001]: first");
        assert_eq!(err.diagnostics().len(), 2);
    }

    #[test]
    fn category_metadata_is_stable_and_unique() {
        let mut codes = std::collections::BTreeSet::new();
        for cat in Category::all() {
            assert!(!cat.as_str().is_empty());
            assert!(!cat.description().is_empty());
            assert!(
                codes.insert(cat.code()),
                "duplicate diagnostic code detected: {}",
                cat.code()
            );
        }
    }
}
