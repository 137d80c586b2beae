//! # Diagnostic System
//!
//! This module provides the diagnostic infrastructure for reporting errors
//! from every pipeline phase. Each user-visible failure maps to exactly one
//! `DiagnosticKind`; the pipeline stops at the first fatal diagnostic.

use std::fmt;

use ariadne::ReportKind;
use chumsky::span::SimpleSpan;

/// A diagnostic message from the compiler
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub kind: DiagnosticKind,
    pub message: String,
    /// Source span where this diagnostic applies
    pub span: SimpleSpan<usize>,
    /// Path of the file the span refers to
    pub file_path: String,
    /// Optional related spans for additional context
    pub related_spans: Vec<(SimpleSpan<usize>, String)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl From<DiagnosticSeverity> for ReportKind<'static> {
    fn from(severity: DiagnosticSeverity) -> Self {
        match severity {
            DiagnosticSeverity::Error => Self::Error,
            DiagnosticSeverity::Warning => Self::Warning,
        }
    }
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// The fixed diagnostic taxonomy.
///
/// Every failure the compiler can report carries exactly one of these labels;
/// the label is part of the stderr output format and therefore stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Lexer or parser failure
    SyntaxError,
    /// Symbol not found in any visible scope
    UndefinedName,
    /// Duplicate struct field, impl item, or scope item
    MultipleDefinition,
    /// Operand, argument, branch join, `let` init, or return value disagreement
    TypeMismatch,
    /// Non-bool condition, bad `main` signature, non-array indexed, illegal
    /// const construct, `Self` outside impl, and similar shape errors
    InvalidType,
    /// Write through a non-mutable place, or `&mut` of an immutable place
    ImmutableVariableMutated,
    /// Impl missing a required trait item, or item signature mismatch
    TraitItemUnimplemented,
    /// `break`/`continue` outside a loop, `return` outside a function,
    /// misplaced `exit`
    InvalidControlFlow,
    /// Function body can fall through but the return type is not unit
    MissingReturn,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::SyntaxError => "SyntaxError",
            Self::UndefinedName => "UndefinedName",
            Self::MultipleDefinition => "MultipleDefinition",
            Self::TypeMismatch => "TypeMismatch",
            Self::InvalidType => "InvalidType",
            Self::ImmutableVariableMutated => "ImmutableVariableMutated",
            Self::TraitItemUnimplemented => "TraitItemUnimplemented",
            Self::InvalidControlFlow => "InvalidControlFlow",
            Self::MissingReturn => "MissingReturn",
        };
        write!(f, "{label}")
    }
}

impl Diagnostic {
    /// Create an error diagnostic
    pub fn error(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            kind,
            message: message.into(),
            span: SimpleSpan::from(0..0),
            file_path: String::new(),
            related_spans: Vec::new(),
        }
    }

    /// Create a warning diagnostic
    pub fn warning(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            kind,
            message: message.into(),
            span: SimpleSpan::from(0..0),
            file_path: String::new(),
            related_spans: Vec::new(),
        }
    }

    /// Add location information to this diagnostic
    pub const fn with_location(mut self, span: SimpleSpan<usize>) -> Self {
        self.span = span;
        self
    }

    /// Attach the path of the file the span refers to
    pub fn in_file(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    /// Add a related span with context message
    pub fn with_related_span(mut self, span: SimpleSpan<usize>, message: String) -> Self {
        self.related_spans.push((span, message));
        self
    }

    /// Convenience constructor for unresolved identifiers
    pub fn undefined_name(name: &str, span: SimpleSpan<usize>) -> Self {
        Self::error(
            DiagnosticKind::UndefinedName,
            format!("cannot find `{name}` in this scope"),
        )
        .with_location(span)
    }

    /// Convenience constructor for duplicate definitions
    pub fn multiple_definition(name: &str, span: SimpleSpan<usize>) -> Self {
        Self::error(
            DiagnosticKind::MultipleDefinition,
            format!("the name `{name}` is defined multiple times"),
        )
        .with_location(span)
    }

    /// Convenience constructor for type disagreements
    pub fn type_mismatch(expected: &str, found: &str, span: SimpleSpan<usize>) -> Self {
        Self::error(
            DiagnosticKind::TypeMismatch,
            format!("expected `{expected}`, found `{found}`"),
        )
        .with_location(span)
    }

    /// Convenience constructor for syntax errors
    pub fn syntax_error(message: String, span: SimpleSpan<usize>) -> Self {
        Self::error(DiagnosticKind::SyntaxError, message).with_location(span)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.kind, self.message)?;
        write!(f, " (at {}:{})", self.span.start, self.span.end)?;
        Ok(())
    }
}

/// Collection of diagnostics gathered across phases
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DiagnosticCollection {
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a diagnostic to the collection
    pub fn add(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Add multiple diagnostics
    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Get all diagnostics in insertion order
    pub fn all(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == DiagnosticSeverity::Error)
    }

    pub const fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Diagnostic> {
        self.diagnostics.iter()
    }
}

impl From<Vec<Diagnostic>> for DiagnosticCollection {
    fn from(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }
}

impl IntoIterator for DiagnosticCollection {
    type Item = Diagnostic;
    type IntoIter = std::vec::IntoIter<Diagnostic>;

    fn into_iter(self) -> Self::IntoIter {
        self.diagnostics.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_creation() {
        let span = SimpleSpan::from(10..20);
        let diag = Diagnostic::undefined_name("test_var", span);
        assert_eq!(diag.severity, DiagnosticSeverity::Error);
        assert_eq!(diag.kind, DiagnosticKind::UndefinedName);
        assert!(diag.message.contains("test_var"));
        assert_eq!(diag.span, span);
    }

    #[test]
    fn test_kind_labels_are_stable() {
        assert_eq!(DiagnosticKind::TypeMismatch.to_string(), "TypeMismatch");
        assert_eq!(
            DiagnosticKind::ImmutableVariableMutated.to_string(),
            "ImmutableVariableMutated"
        );
        assert_eq!(DiagnosticKind::MissingReturn.to_string(), "MissingReturn");
    }

    #[test]
    fn test_diagnostic_collection() {
        let mut collection = DiagnosticCollection::new();
        collection.add(Diagnostic::undefined_name("a", SimpleSpan::from(0..1)));
        collection.add(Diagnostic::warning(
            DiagnosticKind::InvalidType,
            "suspicious cast",
        ));

        assert_eq!(collection.len(), 2);
        assert!(collection.has_errors());
    }
}
