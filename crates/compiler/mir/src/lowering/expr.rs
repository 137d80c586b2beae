//! # Expression Lowering
//!
//! The single visitor turning checked HIR expressions into MIR. Every
//! method takes an optional destination place; aggregate producers write
//! through it, scalar producers return operands, and the caller reconciles
//! through the `finish_*` helpers.

use rx_compiler_semantic::builtins::{builtin_fn_sig, BuiltinFn, BuiltinMethod};
use rx_compiler_parser::parser::{BinaryOp, UnaryOp};
use rx_compiler_semantic::hir::{
    CallTarget, Expr, ExprKind, FieldTarget, MethodTarget, Res, Stmt,
};
use rx_compiler_semantic::hir::Block as HirBlock;
use rx_compiler_semantic::types::{Type, TypeId};

use crate::function::{plan_signature, ReturnDesc};
use crate::{AbiParamKind, AggregateKind, BinOp, CallDest, Callee, Operand, Place, RValue,
    Statement, UnOp};

use super::{LowerResult, MirBuilder};

impl MirBuilder<'_> {
    /// Lower one expression. `None` means the path diverged and the cursor
    /// is gone; callers stop emitting.
    pub(super) fn lower_expr(
        &mut self,
        expr: &Expr,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        if self.current_block.is_none() {
            return Ok(None);
        }
        let ty = expr.ty();

        // Constants short-circuit: the checker only attaches a value to
        // side-effect-free expressions.
        if let Some(value) = &expr.info().const_value {
            if !self.ctx.is_aggregate(ty) && !self.ctx.is_unit(ty) {
                let operand = Self::const_operand(value, ty);
                return Ok(Some(self.finish_operand(operand, ty, dest)));
            }
        }

        match &expr.kind {
            ExprKind::IntLiteral { .. }
            | ExprKind::BoolLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StrLiteral(_) => {
                unreachable!("literals carry constant values")
            }
            ExprKind::Unit => Ok(Some(self.finish_unit(dest))),
            ExprKind::Path(path) => match path.res {
                Res::Local(local) => {
                    let place = Place::local(self.mir_local(local));
                    Ok(Some(self.finish_place(place, ty, dest)))
                }
                // Constants and variants went through the shortcut above.
                _ => Err(format!("path `{}` survived checking unresolved", path.display())),
            },
            ExprKind::Ref {
                mutable, operand, ..
            } => {
                let place = if operand.info().is_place {
                    match self.lower_to_place(operand)? {
                        Some(place) => place,
                        None => return Ok(None),
                    }
                } else {
                    // Reference to an rvalue: materialize a temporary place.
                    match self.materialize(operand)? {
                        Some(place) => place,
                        None => return Ok(None),
                    }
                };
                let temp = self.define(
                    RValue::Ref {
                        place,
                        mutable: *mutable,
                    },
                    ty,
                );
                Ok(Some(self.finish_operand(Operand::Temp(temp), ty, dest)))
            }
            ExprKind::Deref { operand, .. } => {
                let Some(reference) = self.lower_to_operand(operand)? else {
                    return Ok(None);
                };
                let temp = self.operand_to_temp(reference, operand.ty());
                let place = Place::deref_temp(temp);
                Ok(Some(self.finish_place(place, ty, dest)))
            }
            ExprKind::Unary { op, operand } => {
                let Some(source) = self.lower_to_operand(operand)? else {
                    return Ok(None);
                };
                let mir_op = match op {
                    UnaryOp::Neg => UnOp::Neg,
                    UnaryOp::Not => UnOp::Not,
                };
                let temp = self.define(
                    RValue::UnaryOp {
                        op: mir_op,
                        operand: source,
                    },
                    ty,
                );
                Ok(Some(self.finish_operand(Operand::Temp(temp), ty, dest)))
            }
            ExprKind::Binary { op, lhs, rhs } => match op {
                BinaryOp::And | BinaryOp::Or => {
                    self.lower_short_circuit(*op, lhs, rhs, dest)
                }
                _ => {
                    let Some(left) = self.lower_to_operand(lhs)? else {
                        return Ok(None);
                    };
                    let Some(right) = self.lower_to_operand(rhs)? else {
                        return Ok(None);
                    };
                    let temp = self.define(
                        RValue::BinaryOp {
                            op: scalar_bin_op(*op),
                            lhs: left,
                            rhs: right,
                        },
                        ty,
                    );
                    Ok(Some(self.finish_operand(Operand::Temp(temp), ty, dest)))
                }
            },
            ExprKind::Assign { lhs, rhs } => {
                let Some(place) = self.lower_to_place(lhs)? else {
                    return Ok(None);
                };
                if self.lower_into(rhs, &place)?.is_none() {
                    return Ok(None);
                }
                Ok(Some(self.finish_unit(dest)))
            }
            ExprKind::Cast { operand, target } => {
                let Some(source) = self.lower_to_operand(operand)? else {
                    return Ok(None);
                };
                let temp = self.define(
                    RValue::Cast {
                        operand: source,
                        from: operand.ty(),
                        to: target.resolved(),
                    },
                    ty,
                );
                Ok(Some(self.finish_operand(Operand::Temp(temp), ty, dest)))
            }
            ExprKind::Call { target, args } => self.lower_call(target, args, ty, dest),
            ExprKind::MethodCall {
                receiver,
                args,
                target,
                ..
            } => self.lower_method_call(receiver, args, *target, ty, dest),
            ExprKind::Field { base, target } => {
                let Some(base_place) = self.lower_place_or_spill(base)? else {
                    return Ok(None);
                };
                let FieldTarget::Index(index) = target else {
                    return Err("field access survived checking unresolved".to_string());
                };
                let place = base_place.field(*index);
                Ok(Some(self.finish_place(place, ty, dest)))
            }
            ExprKind::Index { base, index } => {
                let Some(base_place) = self.lower_place_or_spill(base)? else {
                    return Ok(None);
                };
                let Some(index_op) = self.lower_to_operand(index)? else {
                    return Ok(None);
                };
                let place = base_place.index(index_op);
                Ok(Some(self.finish_place(place, ty, dest)))
            }
            ExprKind::StructLiteral { .. }
            | ExprKind::ArrayLiteral { .. }
            | ExprKind::ArrayRepeat { .. } => self.lower_aggregate_literal(expr, ty, dest),
            ExprKind::Block(block) => self.lower_block(block, dest),
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.lower_if(expr, condition, then_branch, else_branch.as_deref(), dest),
            ExprKind::While {
                loop_id,
                condition,
                body,
            } => self.lower_while(expr, *loop_id, condition, body, dest),
            ExprKind::Loop { loop_id, body } => {
                self.lower_loop(expr, *loop_id, body, dest)
            }
            ExprKind::Break { value, target } => {
                let target = target.expect("control-flow linking binds breaks");
                self.lower_break(value.as_deref(), target)
            }
            ExprKind::Continue { target } => {
                let target = target.expect("control-flow linking binds continues");
                self.lower_continue(target)
            }
            ExprKind::Return { value } => self.lower_return(value.as_deref()),
        }
    }

    // --- Value-category adapters -----------------------------------------

    pub(super) fn lower_to_operand(&mut self, expr: &Expr) -> Result<Option<Operand>, String> {
        let ty = expr.ty();
        match self.lower_expr(expr, None)? {
            Some(result) => Ok(Some(self.result_to_operand(result, ty)?)),
            None => Ok(None),
        }
    }

    /// Lower an expression the checker guarantees to be a place.
    pub(super) fn lower_to_place(&mut self, expr: &Expr) -> Result<Option<Place>, String> {
        match self.lower_expr(expr, None)? {
            Some(LowerResult::Place(place)) => Ok(Some(place)),
            Some(_) => Err("place expression lowered to a value".to_string()),
            None => Ok(None),
        }
    }

    /// A place holding the expression's value: the expression's own place,
    /// or a temporary the value is spilled into.
    pub(super) fn lower_place_or_spill(
        &mut self,
        expr: &Expr,
    ) -> Result<Option<Place>, String> {
        if expr.info().is_place {
            self.lower_to_place(expr)
        } else {
            self.materialize(expr)
        }
    }

    /// Evaluate into a fresh anonymous local and return its place.
    pub(super) fn materialize(&mut self, expr: &Expr) -> Result<Option<Place>, String> {
        let ty = expr.ty();
        let local = self.new_synth_local(ty);
        let place = Place::local(local);
        match self.lower_into(expr, &place)? {
            Some(()) => Ok(Some(place)),
            None => Ok(None),
        }
    }

    /// Lower an expression into a destination place.
    pub(super) fn lower_into(
        &mut self,
        expr: &Expr,
        place: &Place,
    ) -> Result<Option<()>, String> {
        let ty = expr.ty();
        if self.ctx.is_unit(ty) || self.ctx.is_never(ty) {
            // Nothing to store; evaluate for effect only.
            return Ok(self.lower_expr(expr, None)?.map(|_| ()));
        }
        match self.lower_expr(expr, Some(place))? {
            None => Ok(None),
            Some(LowerResult::Written) => Ok(Some(())),
            Some(LowerResult::Operand(operand)) => {
                self.emit(Statement::Assign {
                    place: place.clone(),
                    rvalue: RValue::Use(operand),
                });
                Ok(Some(()))
            }
            Some(LowerResult::Place(source)) => {
                if source != *place {
                    self.emit_copy(place, &source, ty);
                }
                Ok(Some(()))
            }
        }
    }

    // --- Aggregate initialization ----------------------------------------

    /// Struct/array literals and repeats initialize their destination
    /// sub-place by sub-place; no aggregate temporary is ever built.
    fn lower_aggregate_literal(
        &mut self,
        expr: &Expr,
        ty: TypeId,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        let (place, synthesized) = match dest {
            Some(place) => (place.clone(), false),
            None => {
                let local = self.new_synth_local(ty);
                (Place::local(local), true)
            }
        };
        if self.init_aggregate(expr, &place, ty)?.is_none() {
            return Ok(None);
        }
        Ok(Some(if synthesized {
            LowerResult::Place(place)
        } else {
            LowerResult::Written
        }))
    }

    fn init_aggregate(
        &mut self,
        expr: &Expr,
        place: &Place,
        ty: TypeId,
    ) -> Result<Option<()>, String> {
        match &expr.kind {
            ExprKind::StructLiteral {
                struct_id, fields, ..
            } => {
                let sid = struct_id.expect("struct literals resolve during name resolution");
                if fields.is_empty() {
                    self.emit(Statement::Assign {
                        place: place.clone(),
                        rvalue: RValue::Aggregate {
                            kind: AggregateKind::Struct(sid),
                            elements: vec![],
                        },
                    });
                    return Ok(Some(()));
                }
                for (index, field) in fields.iter().enumerate() {
                    let sub_place = place.clone().field(index);
                    if self.lower_into(&field.value, &sub_place)?.is_none() {
                        return Ok(None);
                    }
                }
                Ok(Some(()))
            }
            ExprKind::ArrayLiteral { elements } => {
                let usize_ty = self.ctx.usize();
                if elements.is_empty() {
                    let element_ty = match self.ctx.type_of(ty) {
                        Type::Array { element, .. } => *element,
                        _ => return Err("array literal without array type".to_string()),
                    };
                    self.emit(Statement::Assign {
                        place: place.clone(),
                        rvalue: RValue::Aggregate {
                            kind: AggregateKind::Array(element_ty),
                            elements: vec![],
                        },
                    });
                    return Ok(Some(()));
                }
                for (index, element) in elements.iter().enumerate() {
                    let sub_place = place
                        .clone()
                        .index(Operand::int(index as i64, usize_ty));
                    if self.lower_into(element, &sub_place)?.is_none() {
                        return Ok(None);
                    }
                }
                Ok(Some(()))
            }
            ExprKind::ArrayRepeat { element, count } => {
                let length = count
                    .info()
                    .const_value
                    .as_ref()
                    .and_then(|value| value.as_int())
                    .expect("repeat counts are const-evaluated by the checker");
                let length = usize::try_from(length).map_err(|_| "negative repeat count")?;
                let element_ty = element.ty();
                let usize_ty = self.ctx.usize();
                if length == 0 {
                    self.emit(Statement::Assign {
                        place: place.clone(),
                        rvalue: RValue::Aggregate {
                            kind: AggregateKind::Array(element_ty),
                            elements: vec![],
                        },
                    });
                    return Ok(Some(()));
                }
                if self.ctx.is_aggregate(element_ty) {
                    // Evaluate once into the first slot, then replicate.
                    let first = place.clone().index(Operand::int(0, usize_ty));
                    if self.lower_into(element, &first)?.is_none() {
                        return Ok(None);
                    }
                    for index in 1..length {
                        let sub_place = place
                            .clone()
                            .index(Operand::int(index as i64, usize_ty));
                        self.emit_copy(&sub_place, &first, element_ty);
                    }
                } else {
                    let Some(operand) = self.lower_to_operand(element)? else {
                        return Ok(None);
                    };
                    self.emit(Statement::Assign {
                        place: place.clone(),
                        rvalue: RValue::ArrayRepeat {
                            element: operand,
                            count: length,
                        },
                    });
                }
                Ok(Some(()))
            }
            _ => Err("not an aggregate literal".to_string()),
        }
    }

    // --- Blocks -----------------------------------------------------------

    pub(super) fn lower_block(
        &mut self,
        block: &HirBlock,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        for stmt in &block.stmts {
            match stmt {
                Stmt::Let(let_stmt) => {
                    let local = self.mir_local(let_stmt.local);
                    if let Some(init) = &let_stmt.init {
                        let place = Place::local(local);
                        if self.lower_into(init, &place)?.is_none() {
                            return Ok(None);
                        }
                    }
                }
                Stmt::Expr { expr, .. } => {
                    if self.lower_expr(expr, None)?.is_none() {
                        return Ok(None);
                    }
                }
                Stmt::Item(_) | Stmt::Empty => {}
            }
        }
        match &block.tail {
            Some(tail) => self.lower_expr(tail, dest),
            None => Ok(Some(self.finish_unit(dest))),
        }
    }

    // --- Calls ------------------------------------------------------------

    fn lower_call(
        &mut self,
        target: &CallTarget,
        args: &[Expr],
        ty: TypeId,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        let CallTarget::Path(path) = target else {
            return Err("non-path callee survived checking".to_string());
        };
        match path.res {
            Res::Func(func) => {
                let mir_id = self.func_map[&func];
                let sig = self.signatures[mir_id].clone();
                self.emit_call(Callee::Function(mir_id), &sig, args, ty, dest)
            }
            Res::Builtin(builtin) => {
                let sig = self.builtin_fn_abi(builtin);
                let callee = Callee::External(
                    self.externals.get(builtin.runtime_name(), || sig.clone()),
                );
                self.emit_call(callee, &sig, args, ty, dest)
            }
            _ => Err("uncallable path survived checking".to_string()),
        }
    }

    fn lower_method_call(
        &mut self,
        receiver: &Expr,
        args: &[Expr],
        target: MethodTarget,
        ty: TypeId,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        match target {
            MethodTarget::User(func) => {
                let mir_id = self.func_map[&func];
                let sig = self.signatures[mir_id].clone();
                let mut all_args: Vec<&Expr> = Vec::with_capacity(args.len() + 1);
                all_args.push(receiver);
                all_args.extend(args.iter());
                self.emit_call_exprs(Callee::Function(mir_id), &sig, &all_args, ty, dest)
            }
            MethodTarget::Builtin(BuiltinMethod::ArrayLen) => {
                // The length is a compile-time constant; the receiver is
                // still evaluated for its effects.
                let length = self.array_length_behind(receiver.ty())?;
                if self.lower_to_operand(receiver)?.is_none() {
                    return Ok(None);
                }
                let usize_ty = self.ctx.usize();
                let operand = Operand::int(length as i64, usize_ty);
                Ok(Some(self.finish_operand(operand, ty, dest)))
            }
            MethodTarget::Builtin(method) => {
                let sig = self.builtin_method_abi(method, receiver);
                let callee = Callee::External(
                    self.externals.get(method.runtime_name(), || sig.clone()),
                );
                let mut all_args: Vec<&Expr> = Vec::with_capacity(args.len() + 1);
                all_args.push(receiver);
                all_args.extend(args.iter());
                self.emit_call_exprs(callee, &sig, &all_args, ty, dest)
            }
            MethodTarget::Unresolved => {
                Err("method call survived checking unresolved".to_string())
            }
        }
    }

    fn array_length_behind(&self, mut ty: TypeId) -> Result<usize, String> {
        loop {
            match self.ctx.type_of(ty) {
                Type::Array { length, .. } => return Ok(*length),
                Type::Reference { target, .. } => ty = *target,
                _ => return Err("`len` receiver is not an array".to_string()),
            }
        }
    }

    fn emit_call(
        &mut self,
        callee: Callee,
        sig: &crate::MirFunctionSig,
        args: &[Expr],
        ty: TypeId,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        let arg_refs: Vec<&Expr> = args.iter().collect();
        self.emit_call_exprs(callee, sig, &arg_refs, ty, dest)
    }

    /// Shared call emission: arguments lower left-to-right according to
    /// the callee's ABI plan; the destination is wired per the return
    /// convention.
    fn emit_call_exprs(
        &mut self,
        callee: Callee,
        sig: &crate::MirFunctionSig,
        args: &[&Expr],
        ty: TypeId,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        let abi_args: Vec<crate::AbiParam> = sig
            .abi_params
            .iter()
            .copied()
            .filter(|param| param.kind != AbiParamKind::SRet)
            .collect();
        debug_assert_eq!(abi_args.len(), args.len());

        let mut lowered = Vec::with_capacity(args.len());
        for (arg, abi) in args.iter().zip(&abi_args) {
            let operand = match abi.kind {
                AbiParamKind::ByVal => match self.lower_to_operand(arg)? {
                    Some(operand) => operand,
                    None => return Ok(None),
                },
                AbiParamKind::Ref => {
                    let Some(place) = self.lower_place_or_spill(arg)? else {
                        return Ok(None);
                    };
                    let ref_ty = self.ctx.reference(abi.ty, false);
                    Operand::Temp(self.define(
                        RValue::Ref {
                            place,
                            mutable: false,
                        },
                        ref_ty,
                    ))
                }
                AbiParamKind::ByValCallerCopy => {
                    // The callee mutates its parameter: hand it a copy.
                    let local = self.new_synth_local(abi.ty);
                    let place = Place::local(local);
                    if self.lower_into(arg, &place)?.is_none() {
                        return Ok(None);
                    }
                    let ref_ty = self.ctx.reference(abi.ty, true);
                    Operand::Temp(self.define(
                        RValue::Ref {
                            place,
                            mutable: true,
                        },
                        ref_ty,
                    ))
                }
                AbiParamKind::SRet => unreachable!("filtered above"),
            };
            lowered.push(operand);
        }

        match sig.return_desc {
            ReturnDesc::Void | ReturnDesc::Never => {
                self.emit(Statement::Call {
                    target: callee,
                    args: lowered,
                    dest: CallDest::Ignore,
                });
                Ok(Some(self.finish_unit(dest)))
            }
            ReturnDesc::Direct(ret_ty) => {
                let temp = self.new_temp(ret_ty);
                self.emit(Statement::Call {
                    target: callee,
                    args: lowered,
                    dest: CallDest::Temp(temp),
                });
                Ok(Some(self.finish_operand(Operand::Temp(temp), ty, dest)))
            }
            ReturnDesc::IndirectSRet(ret_ty) => {
                let (place, synthesized) = match dest {
                    Some(place) => (place.clone(), false),
                    None => {
                        let local = self.new_synth_local(ret_ty);
                        (Place::local(local), true)
                    }
                };
                self.emit(Statement::Call {
                    target: callee,
                    args: lowered,
                    dest: CallDest::SRet(place.clone()),
                });
                Ok(Some(if synthesized {
                    LowerResult::Place(place)
                } else {
                    LowerResult::Written
                }))
            }
        }
    }

    fn builtin_fn_abi(&mut self, builtin: BuiltinFn) -> crate::MirFunctionSig {
        let sig = builtin_fn_sig(self.ctx, builtin);
        let params: Vec<(TypeId, bool)> = sig.params.iter().map(|&ty| (ty, false)).collect();
        plan_signature(self.ctx, &params, sig.ret)
    }

    fn builtin_method_abi(
        &mut self,
        method: BuiltinMethod,
        receiver: &Expr,
    ) -> crate::MirFunctionSig {
        let receiver_ty = receiver.ty();
        let params = match method {
            BuiltinMethod::StringAppend => {
                let str_ty = self.ctx.str_slice();
                let str_ref = self.ctx.reference(str_ty, false);
                vec![(receiver_ty, false), (str_ref, false)]
            }
            _ => vec![(receiver_ty, false)],
        };
        let ret = match method {
            BuiltinMethod::StrLen | BuiltinMethod::StringLen | BuiltinMethod::ArrayLen => {
                self.ctx.usize()
            }
            BuiltinMethod::StringAppend => self.ctx.unit(),
            BuiltinMethod::StringAsStr => {
                let str_ty = self.ctx.str_slice();
                self.ctx.reference(str_ty, false)
            }
            BuiltinMethod::StringAsMutStr => {
                let str_ty = self.ctx.str_slice();
                self.ctx.reference(str_ty, true)
            }
            BuiltinMethod::ToString => self.ctx.string(),
        };
        plan_signature(self.ctx, &params, ret)
    }
}

fn scalar_bin_op(op: BinaryOp) -> BinOp {
    match op {
        BinaryOp::Add => BinOp::Add,
        BinaryOp::Sub => BinOp::Sub,
        BinaryOp::Mul => BinOp::Mul,
        BinaryOp::Div => BinOp::Div,
        BinaryOp::Rem => BinOp::Rem,
        BinaryOp::BitAnd => BinOp::BitAnd,
        BinaryOp::BitOr => BinOp::BitOr,
        BinaryOp::BitXor => BinOp::BitXor,
        BinaryOp::Shl => BinOp::Shl,
        BinaryOp::Shr => BinOp::Shr,
        BinaryOp::Eq => BinOp::Eq,
        BinaryOp::Neq => BinOp::Ne,
        BinaryOp::Less => BinOp::Lt,
        BinaryOp::LessEqual => BinOp::Le,
        BinaryOp::Greater => BinOp::Gt,
        BinaryOp::GreaterEqual => BinOp::Ge,
        BinaryOp::And | BinaryOp::Or => unreachable!("short-circuit ops lower as branches"),
    }
}
