//! # Pass 8: Exit Check
//!
//! `exit` is only legal as the final statement (or trailing expression) of
//! `main`'s body. The rule is syntactic: the one call occupying that
//! position is marked valid, and a scan flags every other `exit` call in
//! the program as `InvalidControlFlow`.

use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};

use crate::builtins::BuiltinFn;
use crate::hir::{CallTarget, Expr, ExprKind, Program, Res, Stmt};
use crate::visit::HirVisitor;

pub fn run(program: &mut Program) -> Result<(), Diagnostic> {
    let allowed = allowed_exit_call(program);

    for function in program.functions.iter_mut() {
        if let Some(body) = &mut function.body {
            let mut scan = ExitScan { allowed };
            scan.visit_block(body)?;
        }
    }
    Ok(())
}

/// Address of the exit call sitting in `main`'s final-statement position,
/// if any. Identity is positional, so an address is exactly the right key.
fn allowed_exit_call(program: &Program) -> Option<*const Expr> {
    let main = program.main_function()?;
    let body = program.functions[main].body.as_ref()?;
    if let Some(tail) = &body.tail {
        if is_exit_call(tail) {
            let ptr: *const Expr = &**tail;
            return Some(ptr);
        }
        return None;
    }
    match body.stmts.last()? {
        Stmt::Expr { expr, .. } if is_exit_call(expr) => {
            let ptr: *const Expr = expr;
            Some(ptr)
        }
        _ => None,
    }
}

fn is_exit_call(expr: &Expr) -> bool {
    matches!(
        &expr.kind,
        ExprKind::Call {
            target: CallTarget::Path(path),
            ..
        } if path.res == Res::Builtin(BuiltinFn::Exit)
    )
}

struct ExitScan {
    allowed: Option<*const Expr>,
}

impl HirVisitor for ExitScan {
    fn visit_expr(&mut self, expr: &mut Expr) -> Result<(), Diagnostic> {
        let ptr: *const Expr = &*expr;
        if is_exit_call(expr) && self.allowed != Some(ptr) {
            return Err(Diagnostic::error(
                DiagnosticKind::InvalidControlFlow,
                "`exit` may only appear as the final statement of `main`",
            )
            .with_location(expr.span));
        }
        self.walk_expr(expr)
    }
}
