//! # HIR Traversal
//!
//! A mutable visitor with default walks. Passes that only care about a few
//! node kinds (item registration, control-flow linking, the exit scan)
//! override the hooks they need and inherit the traversal for the rest.
//!
//! Items are arena-resident; the walk surfaces them through
//! [`HirVisitor::visit_item_ref`] rather than following the reference, so
//! each pass decides how to recurse into the arenas it borrows.

use rx_compiler_diagnostics::Diagnostic;

use crate::hir::{Block, CallTarget, Expr, ExprKind, ItemRef, Stmt, TypeAnnotation, TypeNode};

pub trait HirVisitor {
    fn visit_expr(&mut self, expr: &mut Expr) -> Result<(), Diagnostic> {
        self.walk_expr(expr)
    }

    fn visit_block(&mut self, block: &mut Block) -> Result<(), Diagnostic> {
        self.walk_block(block)
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt) -> Result<(), Diagnostic> {
        self.walk_stmt(stmt)
    }

    /// Hook for item references encountered in statement position.
    fn visit_item_ref(&mut self, _item: ItemRef) -> Result<(), Diagnostic> {
        Ok(())
    }

    fn walk_block(&mut self, block: &mut Block) -> Result<(), Diagnostic> {
        for stmt in &mut block.stmts {
            self.visit_stmt(stmt)?;
        }
        if let Some(tail) = &mut block.tail {
            self.visit_expr(tail)?;
        }
        Ok(())
    }

    fn walk_stmt(&mut self, stmt: &mut Stmt) -> Result<(), Diagnostic> {
        match stmt {
            Stmt::Let(let_stmt) => {
                if let Some(init) = &mut let_stmt.init {
                    self.visit_expr(init)?;
                }
                Ok(())
            }
            Stmt::Expr { expr, .. } => self.visit_expr(expr),
            Stmt::Item(item) => self.visit_item_ref(*item),
            Stmt::Empty => Ok(()),
        }
    }

    #[allow(clippy::too_many_lines)]
    fn walk_expr(&mut self, expr: &mut Expr) -> Result<(), Diagnostic> {
        match &mut expr.kind {
            ExprKind::IntLiteral { .. }
            | ExprKind::BoolLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StrLiteral(_)
            | ExprKind::Unit
            | ExprKind::Path(_)
            | ExprKind::Continue { .. } => Ok(()),
            ExprKind::Unary { operand, .. }
            | ExprKind::Ref { operand, .. }
            | ExprKind::Deref { operand, .. } => self.visit_expr(operand),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.visit_expr(lhs)?;
                self.visit_expr(rhs)
            }
            ExprKind::Assign { lhs, rhs } => {
                self.visit_expr(lhs)?;
                self.visit_expr(rhs)
            }
            ExprKind::Cast { operand, target } => {
                self.visit_expr(operand)?;
                walk_annotation_lengths(self, target)
            }
            ExprKind::Call { target, args } => {
                if let CallTarget::Expr(callee) = target {
                    self.visit_expr(callee)?;
                }
                for arg in args {
                    self.visit_expr(arg)?;
                }
                Ok(())
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.visit_expr(receiver)?;
                for arg in args {
                    self.visit_expr(arg)?;
                }
                Ok(())
            }
            ExprKind::Field { base, .. } => self.visit_expr(base),
            ExprKind::Index { base, index } => {
                self.visit_expr(base)?;
                self.visit_expr(index)
            }
            ExprKind::StructLiteral { fields, .. } => {
                for field in fields {
                    self.visit_expr(&mut field.value)?;
                }
                Ok(())
            }
            ExprKind::ArrayLiteral { elements } => {
                for element in elements {
                    self.visit_expr(element)?;
                }
                Ok(())
            }
            ExprKind::ArrayRepeat { element, count } => {
                self.visit_expr(element)?;
                self.visit_expr(count)
            }
            ExprKind::Block(block) => self.visit_block(block),
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.visit_expr(condition)?;
                self.visit_expr(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.visit_expr(else_branch)?;
                }
                Ok(())
            }
            ExprKind::While {
                condition, body, ..
            } => {
                self.visit_expr(condition)?;
                self.visit_expr(body)
            }
            ExprKind::Loop { body, .. } => self.visit_expr(body),
            ExprKind::Break { value, .. } | ExprKind::Return { value } => {
                if let Some(value) = value {
                    self.visit_expr(value)?;
                }
                Ok(())
            }
        }
    }
}

/// Visit the const length expressions buried in an unresolved annotation.
fn walk_annotation_lengths<V: HirVisitor + ?Sized>(
    visitor: &mut V,
    annotation: &mut TypeAnnotation,
) -> Result<(), Diagnostic> {
    if let TypeAnnotation::Unresolved(node) = annotation {
        walk_type_node_lengths(visitor, node)?;
    }
    Ok(())
}

fn walk_type_node_lengths<V: HirVisitor + ?Sized>(
    visitor: &mut V,
    node: &mut TypeNode,
) -> Result<(), Diagnostic> {
    match node {
        TypeNode::Ref { target, .. } => walk_type_node_lengths(visitor, target),
        TypeNode::Array { element, length } => {
            walk_type_node_lengths(visitor, element)?;
            visitor.visit_expr(length)
        }
        _ => Ok(()),
    }
}
