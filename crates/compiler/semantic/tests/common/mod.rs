//! Common test utilities for semantic analysis tests: a single-file
//! pipeline runner and kind-checking assertions.

use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};
use rx_compiler_parser::parse_program;
use rx_compiler_semantic::{analyze, Analysis};

/// Run passes 0–8 on a source snippet.
pub fn run_semantic(source: &str) -> Result<Analysis, Diagnostic> {
    let parsed = parse_program(source, "test.rx");
    if let Some(diagnostic) = parsed.diagnostics.into_iter().next() {
        return Err(diagnostic);
    }
    analyze(&parsed.program, "test.rx")
}

/// Assert that a program passes semantic validation.
#[track_caller]
pub fn assert_semantic_ok(source: &str) -> Analysis {
    match run_semantic(source) {
        Ok(analysis) => analysis,
        Err(diagnostic) => panic!(
            "expected successful validation, got {}: {}\nsource:\n{source}",
            diagnostic.kind, diagnostic.message
        ),
    }
}

/// Assert that a program fails with the given diagnostic kind.
#[track_caller]
pub fn assert_semantic_err(source: &str, expected: DiagnosticKind) {
    match run_semantic(source) {
        Ok(_) => panic!("expected {expected} diagnostic, but validation succeeded\nsource:\n{source}"),
        Err(diagnostic) => assert_eq!(
            diagnostic.kind, expected,
            "wrong diagnostic kind ({}: {})\nsource:\n{source}",
            diagnostic.kind, diagnostic.message
        ),
    }
}
