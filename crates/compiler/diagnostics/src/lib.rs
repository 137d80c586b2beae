//! # Diagnostics for the Rx compiler
//!
//! This crate defines the diagnostic data model shared by every phase of the
//! compiler, together with the two renderers: the plain one-line-per-error
//! format used on stderr by the pipeline binaries, and an `ariadne`-based
//! colored report used by tests and the `--pretty` CLI flag.

mod diagnostics;
mod reporting;

pub use diagnostics::{Diagnostic, DiagnosticCollection, DiagnosticKind, DiagnosticSeverity};
pub use reporting::{build_diagnostic_message, render_plain};
