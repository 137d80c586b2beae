//! # Rx Semantic Analysis
//!
//! The multi-pass HIR refinement pipeline: a shared, mutable HIR is built
//! from the AST and refined in place by a chain of passes, each of which
//! establishes the invariant the next one relies on. On success, every type
//! annotation is a canonical `TypeId`, every expression carries an
//! `ExprInfo`, and every jump knows its target — exactly what MIR lowering
//! needs.
//!
//! The `TypeContext` is created here and threaded explicitly through the
//! passes; after finalization it is read-only by convention.

pub mod builtins;
pub mod const_eval;
pub mod hir;
pub mod impl_table;
pub mod passes;
pub mod scope;
pub mod types;
pub mod visit;

use rx_compiler_diagnostics::Diagnostic;
use rx_compiler_parser::parser::ParsedProgram;
use tracing::debug_span;

pub use crate::hir::Program;
pub use crate::impl_table::ImplTable;
pub use crate::types::TypeContext;

/// The fully refined output of passes 0–8.
#[derive(Debug)]
pub struct Analysis {
    pub program: Program,
    pub ctx: TypeContext,
    pub impls: ImplTable,
}

/// Run the semantic pipeline on a parsed compilation unit.
///
/// Stops at the first fatal diagnostic; the returned diagnostic carries the
/// given file path for rendering.
pub fn analyze(ast: &ParsedProgram, file_path: &str) -> Result<Analysis, Diagnostic> {
    analyze_inner(ast).map_err(|diagnostic| {
        if diagnostic.file_path.is_empty() {
            diagnostic.in_file(file_path)
        } else {
            diagnostic
        }
    })
}

fn analyze_inner(ast: &ParsedProgram) -> Result<Analysis, Diagnostic> {
    let mut ctx = TypeContext::new();

    let mut program = {
        let _span = debug_span!("hir_build").entered();
        passes::build::run(ast)?
    };
    {
        let _span = debug_span!("register").entered();
        passes::register::run(&mut program, &mut ctx)?;
    }
    let impls = {
        let _span = debug_span!("resolve").entered();
        passes::resolve::run(&mut program, &ctx)?
    };
    {
        let _span = debug_span!("finalize_types").entered();
        passes::finalize_types::run(&mut program, &mut ctx)?;
    }
    {
        let _span = debug_span!("resolve_annotations").entered();
        passes::resolve_annotations::run(&mut program, &mut ctx)?;
    }
    {
        let _span = debug_span!("trait_check").entered();
        passes::trait_check::run(&program, &ctx)?;
    }
    {
        let _span = debug_span!("check").entered();
        passes::check::run(&mut program, &mut ctx, &impls)?;
    }
    {
        let _span = debug_span!("link_control_flow").entered();
        passes::link_control_flow::run(&mut program)?;
    }
    {
        let _span = debug_span!("exit_check").entered();
        passes::exit_check::run(&mut program)?;
    }

    Ok(Analysis {
        program,
        ctx,
        impls,
    })
}
