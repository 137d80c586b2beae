//! # Constant Evaluation
//!
//! A restricted evaluator over the whitelisted const sub-language: literals,
//! paths to other constants (evaluated on demand, with cycle detection),
//! unary `-`/`!`, binary arithmetic and bitwise operators. Everything else
//! is rejected as an invalid const construct. Integer overflow, division by
//! zero and out-of-range shift counts are fatal.
//!
//! Arithmetic is performed in 64-bit two's complement; the caller range
//! checks the result against the constant's declared type.

use index_vec::IndexVec;
use rustc_hash::FxHashSet;
use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};

use crate::hir::{BinaryOp, ConstId, ConstItem, ConstValue, Expr, ExprKind, Res, UnaryOp};
use crate::types::{Primitive, Type, TypeContext, TypeId};

/// On-demand evaluator used while constants are being finalized.
///
/// `visiting` holds the constants currently on the evaluation stack; seeing
/// one again is a definition cycle.
pub struct ConstEvaluator<'a> {
    pub consts: &'a mut IndexVec<ConstId, ConstItem>,
    visiting: FxHashSet<ConstId>,
}

impl<'a> ConstEvaluator<'a> {
    pub fn new(consts: &'a mut IndexVec<ConstId, ConstItem>) -> Self {
        Self {
            consts,
            visiting: FxHashSet::default(),
        }
    }

    /// Evaluate a constant item, caching the result on the item.
    pub fn eval_item(&mut self, id: ConstId) -> Result<ConstValue, Diagnostic> {
        if let Some(value) = &self.consts[id].computed {
            return Ok(value.clone());
        }
        if !self.visiting.insert(id) {
            let item = &self.consts[id];
            return Err(Diagnostic::error(
                DiagnosticKind::InvalidType,
                format!("cycle detected while evaluating constant `{}`", item.name),
            )
            .with_location(item.span));
        }

        // Detach the value so the arena stays free for on-demand evaluation
        // of referenced constants; reattached below.
        let Some(expr) = self.consts[id].value.take() else {
            let item = &self.consts[id];
            let err = Diagnostic::error(
                DiagnosticKind::InvalidType,
                format!("constant `{}` has no value", item.name),
            )
            .with_location(item.span);
            self.visiting.remove(&id);
            return Err(err);
        };

        let result = self.eval_expr(&expr);
        self.consts[id].value = Some(expr);
        self.visiting.remove(&id);
        let value = result?;
        self.consts[id].computed = Some(value.clone());
        Ok(value)
    }

    /// Evaluate an expression in const context.
    pub fn eval_expr(&mut self, expr: &Expr) -> Result<ConstValue, Diagnostic> {
        match &expr.kind {
            ExprKind::IntLiteral { value, .. } => Ok(ConstValue::Int(i64::from(*value))),
            ExprKind::BoolLiteral(value) => Ok(ConstValue::Bool(*value)),
            ExprKind::CharLiteral(value) => Ok(ConstValue::Char(*value)),
            ExprKind::StrLiteral(value) => Ok(ConstValue::Str(value.clone())),
            ExprKind::Path(path) => match path.res {
                Res::Const(id) => self.eval_item(id),
                Res::Variant(_, index) => Ok(ConstValue::Int(index as i64)),
                _ => Err(not_const(expr, "this name is not a constant")),
            },
            ExprKind::Unary { op, operand } => {
                let value = self.eval_expr(operand)?;
                eval_unary(*op, &value, expr)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let left = self.eval_expr(lhs)?;
                let right = self.eval_expr(rhs)?;
                eval_binary(*op, &left, &right, expr)
            }
            _ => Err(not_const(
                expr,
                "this expression is not allowed in a constant context",
            )),
        }
    }
}

/// Evaluate an expression against already-finalized constants. Used by the
/// semantic checker for array repeat counts, after pass 4 has computed every
/// constant item.
pub fn eval_finalized(
    expr: &Expr,
    consts: &IndexVec<ConstId, ConstItem>,
) -> Result<ConstValue, Diagnostic> {
    match &expr.kind {
        ExprKind::IntLiteral { value, .. } => Ok(ConstValue::Int(i64::from(*value))),
        ExprKind::BoolLiteral(value) => Ok(ConstValue::Bool(*value)),
        ExprKind::CharLiteral(value) => Ok(ConstValue::Char(*value)),
        ExprKind::StrLiteral(value) => Ok(ConstValue::Str(value.clone())),
        ExprKind::Path(path) => match path.res {
            Res::Const(id) => consts[id].computed.clone().ok_or_else(|| {
                not_const(expr, "constant is not evaluated at this point")
            }),
            Res::Variant(_, index) => Ok(ConstValue::Int(index as i64)),
            _ => Err(not_const(expr, "this name is not a constant")),
        },
        ExprKind::Unary { op, operand } => {
            let value = eval_finalized(operand, consts)?;
            eval_unary(*op, &value, expr)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let left = eval_finalized(lhs, consts)?;
            let right = eval_finalized(rhs, consts)?;
            eval_binary(*op, &left, &right, expr)
        }
        _ => Err(not_const(
            expr,
            "this expression is not allowed in a constant context",
        )),
    }
}

/// Check that an integer constant fits the given primitive type.
pub fn int_fits(value: i64, ty: TypeId, ctx: &TypeContext) -> bool {
    match ctx.type_of(ty) {
        Type::Primitive(Primitive::I32) => i32::try_from(value).is_ok(),
        Type::Primitive(Primitive::U32) => u32::try_from(value).is_ok(),
        Type::Primitive(Primitive::Isize) => true,
        Type::Primitive(Primitive::Usize) => value >= 0,
        _ => false,
    }
}

fn not_const(expr: &Expr, message: &str) -> Diagnostic {
    Diagnostic::error(DiagnosticKind::InvalidType, message).with_location(expr.span)
}

fn eval_unary(op: UnaryOp, value: &ConstValue, expr: &Expr) -> Result<ConstValue, Diagnostic> {
    match (op, value) {
        (UnaryOp::Neg, ConstValue::Int(v)) => v
            .checked_neg()
            .map(ConstValue::Int)
            .ok_or_else(|| overflow(expr)),
        (UnaryOp::Not, ConstValue::Bool(v)) => Ok(ConstValue::Bool(!v)),
        (UnaryOp::Not, ConstValue::Int(v)) => Ok(ConstValue::Int(!v)),
        _ => Err(not_const(expr, "invalid operand in constant expression")),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &ConstValue,
    right: &ConstValue,
    expr: &Expr,
) -> Result<ConstValue, Diagnostic> {
    let (ConstValue::Int(l), ConstValue::Int(r)) = (left, right) else {
        return Err(not_const(
            expr,
            "constant operators apply to integers only",
        ));
    };
    let (l, r) = (*l, *r);
    let result = match op {
        BinaryOp::Add => l.checked_add(r).ok_or_else(|| overflow(expr))?,
        BinaryOp::Sub => l.checked_sub(r).ok_or_else(|| overflow(expr))?,
        BinaryOp::Mul => l.checked_mul(r).ok_or_else(|| overflow(expr))?,
        BinaryOp::Div => {
            if r == 0 {
                return Err(div_by_zero(expr));
            }
            l.checked_div(r).ok_or_else(|| overflow(expr))?
        }
        BinaryOp::Rem => {
            if r == 0 {
                return Err(div_by_zero(expr));
            }
            l.checked_rem(r).ok_or_else(|| overflow(expr))?
        }
        BinaryOp::BitAnd => l & r,
        BinaryOp::BitOr => l | r,
        BinaryOp::BitXor => l ^ r,
        BinaryOp::Shl | BinaryOp::Shr => {
            if !(0..64).contains(&r) {
                return Err(Diagnostic::error(
                    DiagnosticKind::InvalidType,
                    "shift amount out of range in constant expression",
                )
                .with_location(expr.span));
            }
            let amount = u32::try_from(r).expect("range checked");
            match op {
                BinaryOp::Shl => l.checked_shl(amount).ok_or_else(|| overflow(expr))?,
                _ => l >> amount,
            }
        }
        // Comparisons and short-circuits are outside the const sub-language.
        _ => {
            return Err(not_const(
                expr,
                "this operator is not allowed in a constant context",
            ))
        }
    };
    Ok(ConstValue::Int(result))
}

fn overflow(expr: &Expr) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::InvalidType,
        "integer overflow in constant expression",
    )
    .with_location(expr.span)
}

fn div_by_zero(expr: &Expr) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::InvalidType,
        "division by zero in constant expression",
    )
    .with_location(expr.span)
}

#[cfg(test)]
mod tests {
    use chumsky::span::SimpleSpan;

    use super::*;
    use crate::hir::PathExpr;

    fn span() -> crate::hir::Span {
        SimpleSpan::from(0..0)
    }

    fn int(value: u32) -> Expr {
        Expr::new(
            ExprKind::IntLiteral {
                value,
                suffix: None,
            },
            span(),
        )
    }

    fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(
            ExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span(),
        )
    }

    #[test]
    fn test_arithmetic() {
        let mut consts = IndexVec::new();
        let mut eval = ConstEvaluator::new(&mut consts);
        let expr = binary(BinaryOp::Add, int(2), binary(BinaryOp::Mul, int(3), int(4)));
        assert_eq!(eval.eval_expr(&expr).unwrap(), ConstValue::Int(14));
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        let mut consts = IndexVec::new();
        let mut eval = ConstEvaluator::new(&mut consts);
        let expr = binary(BinaryOp::Div, int(1), int(0));
        let err = eval.eval_expr(&expr).unwrap_err();
        assert_eq!(err.kind, DiagnosticKind::InvalidType);
        assert!(err.message.contains("division by zero"));
    }

    #[test]
    fn test_comparison_rejected() {
        let mut consts = IndexVec::new();
        let mut eval = ConstEvaluator::new(&mut consts);
        let expr = binary(BinaryOp::Less, int(1), int(2));
        assert!(eval.eval_expr(&expr).is_err());
    }

    #[test]
    fn test_const_cycle_detected() {
        let mut consts: IndexVec<ConstId, ConstItem> = IndexVec::new();
        // A: isize = B; B: isize = A;
        let a = consts.push(ConstItem {
            name: "A".to_string(),
            span: span(),
            owner: crate::hir::FuncOwner::Free,
            ty: crate::hir::TypeAnnotation::Resolved(TypeId::INVALID),
            value: None,
            computed: None,
        });
        let b = consts.push(ConstItem {
            name: "B".to_string(),
            span: span(),
            owner: crate::hir::FuncOwner::Free,
            ty: crate::hir::TypeAnnotation::Resolved(TypeId::INVALID),
            value: None,
            computed: None,
        });
        consts[a].value = Some(Expr::new(
            ExprKind::Path(PathExpr {
                segments: vec![("B".to_string(), span())],
                res: Res::Const(b),
            }),
            span(),
        ));
        consts[b].value = Some(Expr::new(
            ExprKind::Path(PathExpr {
                segments: vec![("A".to_string(), span())],
                res: Res::Const(a),
            }),
            span(),
        ));
        let mut eval = ConstEvaluator::new(&mut consts);
        let err = eval.eval_item(a).unwrap_err();
        assert!(err.message.contains("cycle"));
    }

    #[test]
    fn test_int_fits_ranges() {
        let mut ctx = TypeContext::new();
        let i32_ty = ctx.i32();
        let u32_ty = ctx.u32();
        let usize_ty = ctx.usize();
        assert!(int_fits(i64::from(i32::MAX), i32_ty, &ctx));
        assert!(!int_fits(i64::from(i32::MAX) + 1, i32_ty, &ctx));
        assert!(int_fits(i64::from(u32::MAX), u32_ty, &ctx));
        assert!(!int_fits(-1, u32_ty, &ctx));
        assert!(!int_fits(-1, usize_ty, &ctx));
    }
}
