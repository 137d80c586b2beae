//! # Rx Compiler Driver
//!
//! Orchestrates the front end, the semantic pipeline (passes 0–8) and MIR
//! lowering (pass 9). The two binaries are thin wrappers over
//! [`run_semantic`] and [`run_ir`]; the machine-IR emitter sits behind the
//! textual MIR boundary and is not part of this crate.

use anyhow::Context;
use rx_compiler_diagnostics::Diagnostic;
use rx_compiler_mir::MirModule;
use rx_compiler_parser::parse_program;
use rx_compiler_semantic::{analyze, Analysis};
use tracing::debug;

/// Pipeline failure: a user-facing diagnostic, or an internal invariant
/// breach during lowering.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{0}")]
    Diagnostic(Diagnostic),
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<Diagnostic> for PipelineError {
    fn from(diagnostic: Diagnostic) -> Self {
        Self::Diagnostic(diagnostic)
    }
}

/// Run passes 0–8 on a source text.
pub fn run_semantic(source: &str, file_path: &str) -> Result<Analysis, Diagnostic> {
    let parsed = parse_program(source, file_path);
    if let Some(diagnostic) = parsed.diagnostics.into_iter().next() {
        // First fatal diagnostic terminates the pipeline.
        return Err(diagnostic);
    }
    let analysis = analyze(&parsed.program, file_path)?;
    debug!(
        functions = analysis.program.functions.len(),
        "semantic pipeline complete"
    );
    Ok(analysis)
}

/// Run the full pipeline including MIR lowering.
pub fn run_ir(
    source: &str,
    file_path: &str,
) -> Result<(Analysis, MirModule), PipelineError> {
    let mut analysis = run_semantic(source, file_path)?;
    let module = rx_compiler_mir::lower_program(&analysis.program, &mut analysis.ctx)
        .map_err(PipelineError::Internal)?;
    debug!(
        functions = module.functions.len(),
        externals = module.external_functions.len(),
        "mir lowering complete"
    );
    Ok((analysis, module))
}

/// Install the stderr tracing subscriber the binaries share.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

/// Read the compilation unit from a path, or stdin for `-`.
pub fn read_input(path: &str) -> anyhow::Result<(String, String)> {
    if path == "-" {
        let mut source = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut source)
            .context("failed to read from stdin")?;
        Ok((source, "<stdin>".to_string()))
    } else {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read `{path}`"))?;
        Ok((source, path.to_string()))
    }
}

/// Report a diagnostic on stderr in the pipeline's plain format (or the
/// colored report with `pretty`).
pub fn report(source: &str, diagnostic: &Diagnostic, pretty: bool) {
    if pretty {
        eprint!(
            "{}",
            rx_compiler_diagnostics::build_diagnostic_message(source, diagnostic, true)
        );
    } else {
        eprint!(
            "{}",
            rx_compiler_diagnostics::render_plain(source, diagnostic)
        );
    }
}
