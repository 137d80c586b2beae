//! # Pass 7: Control-Flow Linking
//!
//! Binds every `break` and `continue` to its enclosing loop, so lowering
//! never re-derives jump targets. `return` needs no link: a body belongs to
//! exactly one function. A jump with no enclosing loop is
//! `InvalidControlFlow` (the checker normally catches this first; the pass
//! guards the invariant regardless).

use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};

use crate::hir::{Expr, ExprKind, LoopId, Program};
use crate::visit::HirVisitor;

pub fn run(program: &mut Program) -> Result<(), Diagnostic> {
    for function in program.functions.iter_mut() {
        if let Some(body) = &mut function.body {
            let mut linker = Linker { loops: Vec::new() };
            linker.visit_block(body)?;
            debug_assert!(linker.loops.is_empty());
        }
    }
    Ok(())
}

struct Linker {
    loops: Vec<LoopId>,
}

impl HirVisitor for Linker {
    fn visit_expr(&mut self, expr: &mut Expr) -> Result<(), Diagnostic> {
        match &mut expr.kind {
            ExprKind::While {
                loop_id,
                condition,
                body,
            } => {
                // The condition is part of the loop: a `break` inside it
                // targets this `while`.
                self.loops.push(*loop_id);
                let result = self
                    .visit_expr(condition)
                    .and_then(|()| self.visit_expr(body));
                self.loops.pop();
                result
            }
            ExprKind::Loop { loop_id, body } => {
                self.loops.push(*loop_id);
                let result = self.visit_expr(body);
                self.loops.pop();
                result
            }
            ExprKind::Break { value, target } => {
                let Some(&enclosing) = self.loops.last() else {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidControlFlow,
                        "`break` outside of a loop",
                    )
                    .with_location(expr.span));
                };
                *target = Some(enclosing);
                if let Some(value) = value {
                    self.visit_expr(value)?;
                }
                Ok(())
            }
            ExprKind::Continue { target } => {
                let Some(&enclosing) = self.loops.last() else {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidControlFlow,
                        "`continue` outside of a loop",
                    )
                    .with_location(expr.span));
                };
                *target = Some(enclosing);
                Ok(())
            }
            _ => self.walk_expr(expr),
        }
    }
}
