//! # Pass 6: Semantic Check
//!
//! Top-down walk that threads a type expectation and produces an
//! [`ExprInfo`] for every expression: its type, value category (place,
//! mutable), endpoint set, and constant value where one was needed.
//!
//! This pass owns the only two implicit conversions of the language:
//! never-unification (a diverging branch joins with anything) and the
//! auto-ref/auto-deref adjustments for field access, indexing and method
//! receivers. Adjustments are materialized as synthetic `Deref`/`Ref`
//! nodes so lowering sees one uniform shape.

use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};

use crate::builtins::{builtin_fn_sig, lookup_builtin_method, BuiltinFn};
use crate::const_eval::eval_finalized;
use crate::hir::*;
use crate::impl_table::{AssocItem, ImplTable, TypeKey};
use crate::types::{Primitive, Type, TypeContext, TypeId};

/// What the context knows about an expression's type before checking it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    None,
    Exact(TypeId),
}

impl Expectation {
    const fn exact(self) -> Option<TypeId> {
        match self {
            Self::Exact(ty) => Some(ty),
            Self::None => None,
        }
    }
}

pub fn run(
    program: &mut Program,
    ctx: &mut TypeContext,
    impls: &ImplTable,
) -> Result<(), Diagnostic> {
    check_main(program, ctx)?;

    // Constant bodies first: they are whitelist-only after pass 4, but they
    // still receive `ExprInfo` like every other expression.
    for index in 0..program.consts.len() {
        let id = ConstId::new(index);
        let Some(mut value) = program.consts[id].value.take() else {
            continue;
        };
        let declared = program.consts[id].ty.resolved();
        let mut checker = Checker {
            program: &*program,
            ctx: &mut *ctx,
            impls,
            current_fn: None,
            return_ty: TypeId::INVALID,
            loops: Vec::new(),
        };
        let result = checker.check_const_value(&mut value, declared);
        program.consts[id].value = Some(value);
        result?;
    }

    for index in 0..program.functions.len() {
        let id = FuncId::new(index);
        let Some(mut body) = program.functions[id].body.take() else {
            continue;
        };
        let return_ty = program.functions[id].return_type();
        let mut checker = Checker {
            program: &*program,
            ctx: &mut *ctx,
            impls,
            current_fn: Some(id),
            return_ty,
            loops: Vec::new(),
        };
        let result = checker.check_function_body(id, &mut body);
        program.functions[id].body = Some(body);
        result?;
    }

    Ok(())
}

fn check_main(program: &Program, ctx: &mut TypeContext) -> Result<(), Diagnostic> {
    let Some(main) = program.main_function() else {
        return Err(Diagnostic::error(
            DiagnosticKind::UndefinedName,
            "no `main` function found",
        ));
    };
    let main = &program.functions[main];
    if !main.params.is_empty() {
        return Err(Diagnostic::error(
            DiagnosticKind::InvalidType,
            "`main` takes no parameters",
        )
        .with_location(main.span));
    }
    let unit = ctx.unit();
    if main.return_type() != unit {
        return Err(Diagnostic::error(
            DiagnosticKind::InvalidType,
            "`main` must return `()`",
        )
        .with_location(main.span));
    }
    Ok(())
}

struct LoopCtx {
    id: LoopId,
    is_loop_expr: bool,
    /// Accumulated `break value` type for `loop`; the first concrete break
    /// fixes it
    break_ty: Option<TypeId>,
}

struct Checker<'a> {
    program: &'a Program,
    ctx: &'a mut TypeContext,
    impls: &'a ImplTable,
    current_fn: Option<FuncId>,
    return_ty: TypeId,
    loops: Vec<LoopCtx>,
}

impl Checker<'_> {
    fn check_function_body(&mut self, id: FuncId, body: &mut Block) -> Result<(), Diagnostic> {
        let return_ty = self.return_ty;
        let (ty, endpoints) = self.check_block(body, Expectation::Exact(return_ty))?;

        if endpoints.normal {
            let unit = self.ctx.unit();
            if body.tail.is_none() && return_ty != unit {
                let func = &self.program.functions[id];
                return Err(Diagnostic::error(
                    DiagnosticKind::MissingReturn,
                    format!(
                        "function `{}` declares `{}` but can fall off the end of its body",
                        func.name,
                        self.ctx.display(return_ty)
                    ),
                )
                .with_location(func.span));
            }
            let span = body.tail.as_ref().map_or(body.span, |tail| tail.span);
            self.expect_assignable(ty, return_ty, span)?;
        }
        Ok(())
    }

    fn check_const_value(&mut self, value: &mut Expr, declared: TypeId) -> Result<(), Diagnostic> {
        self.check_expr(value, Expectation::Exact(declared))?;
        self.expect_assignable(value.ty(), declared, value.span)
    }

    // --- Shared helpers ---------------------------------------------------

    fn assignable(&self, from: TypeId, to: TypeId) -> bool {
        from == to || self.ctx.is_never(from)
    }

    fn expect_assignable(&self, from: TypeId, to: TypeId, span: Span) -> Result<(), Diagnostic> {
        if self.assignable(from, to) {
            Ok(())
        } else {
            Err(Diagnostic::type_mismatch(
                &self.ctx.display(to),
                &self.ctx.display(from),
                span,
            ))
        }
    }

    /// Never-unification join of two branch types.
    fn unify(&self, a: TypeId, b: TypeId) -> Option<TypeId> {
        if a == b {
            Some(a)
        } else if self.ctx.is_never(a) {
            Some(b)
        } else if self.ctx.is_never(b) {
            Some(a)
        } else {
            None
        }
    }

    fn local_ty(&self, local: LocalId) -> TypeId {
        let func = self.current_fn.expect("locals only occur inside functions");
        self.program.functions[func].locals[local].ty.resolved()
    }

    /// The entry point for every expression. Establishes the global
    /// invariant that an expression which cannot fall through has type `!`.
    fn check_expr(&mut self, expr: &mut Expr, expect: Expectation) -> Result<(), Diagnostic> {
        if expr.info.is_some() {
            // Already annotated; checking is idempotent.
            return Ok(());
        }
        let mut info = self.check_expr_kind(expr, expect)?;
        if !info.endpoints.normal {
            info.ty = self.ctx.never();
        }
        expr.info = Some(info);
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn check_expr_kind(
        &mut self,
        expr: &mut Expr,
        expect: Expectation,
    ) -> Result<ExprInfo, Diagnostic> {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::IntLiteral { value, suffix } => {
                let ty = match suffix {
                    Some(IntSuffix::I32) => self.ctx.i32(),
                    Some(IntSuffix::U32) => self.ctx.u32(),
                    Some(IntSuffix::Isize) => self.ctx.isize(),
                    Some(IntSuffix::Usize) => self.ctx.usize(),
                    None => match expect.exact() {
                        Some(expected) if self.ctx.is_integer(expected) => expected,
                        _ => self.ctx.i32(),
                    },
                };
                if matches!(self.ctx.type_of(ty), Type::Primitive(Primitive::I32))
                    && *value > i32::MAX as u32
                {
                    return Err(Diagnostic::error(
                        DiagnosticKind::TypeMismatch,
                        format!("literal `{value}` out of range for `i32`"),
                    )
                    .with_location(span));
                }
                let mut info = ExprInfo::value(ty);
                info.const_value = Some(ConstValue::Int(i64::from(*value)));
                Ok(info)
            }
            ExprKind::BoolLiteral(value) => {
                let ty = self.ctx.bool();
                let mut info = ExprInfo::value(ty);
                info.const_value = Some(ConstValue::Bool(*value));
                Ok(info)
            }
            ExprKind::CharLiteral(value) => {
                let ty = self.ctx.char();
                let mut info = ExprInfo::value(ty);
                info.const_value = Some(ConstValue::Char(*value));
                Ok(info)
            }
            ExprKind::StrLiteral(value) => {
                let str_ty = self.ctx.str_slice();
                let ty = self.ctx.reference(str_ty, false);
                let mut info = ExprInfo::value(ty);
                info.const_value = Some(ConstValue::Str(value.clone()));
                Ok(info)
            }
            ExprKind::Unit => Ok(ExprInfo::value(self.ctx.unit())),
            ExprKind::Path(path) => self.check_path(path, span),
            ExprKind::Unary { op, operand } => self.check_unary(*op, operand, expect, span),
            ExprKind::Ref {
                mutable, operand, ..
            } => {
                let mutable = *mutable;
                let inner_expect = match expect.exact().map(|ty| self.ctx.type_of(ty)) {
                    Some(Type::Reference {
                        target,
                        mutable: expected_mutable,
                    }) if *expected_mutable == mutable => Expectation::Exact(*target),
                    _ => Expectation::None,
                };
                self.check_expr(operand, inner_expect)?;
                if mutable {
                    let info = operand.info();
                    if !(info.is_place && info.is_mut) {
                        return Err(Diagnostic::error(
                            DiagnosticKind::ImmutableVariableMutated,
                            "cannot borrow this expression as mutable",
                        )
                        .with_location(operand.span));
                    }
                }
                let ty = self.ctx.reference(operand.ty(), mutable);
                let endpoints = operand.info().endpoints.clone();
                Ok(ExprInfo::value(ty).with_endpoints(endpoints))
            }
            ExprKind::Deref { operand, .. } => {
                self.check_expr(operand, Expectation::None)?;
                let (target, mutable) = match self.ctx.type_of(operand.ty()) {
                    Type::Reference { target, mutable } => (*target, *mutable),
                    _ => {
                        return Err(Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            format!(
                                "type `{}` cannot be dereferenced",
                                self.ctx.display(operand.ty())
                            ),
                        )
                        .with_location(span));
                    }
                };
                let endpoints = operand.info().endpoints.clone();
                Ok(ExprInfo {
                    ty: target,
                    is_place: true,
                    is_mut: mutable,
                    endpoints,
                    const_value: None,
                })
            }
            ExprKind::Binary { op, lhs, rhs } => self.check_binary(*op, lhs, rhs, expect, span),
            ExprKind::Assign { lhs, rhs } => {
                self.check_expr(lhs, Expectation::None)?;
                let lhs_info = lhs.info().clone();
                if !lhs_info.is_place {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        "invalid assignment target",
                    )
                    .with_location(lhs.span));
                }
                if !lhs_info.is_mut {
                    return Err(Diagnostic::error(
                        DiagnosticKind::ImmutableVariableMutated,
                        "cannot assign to an immutable place",
                    )
                    .with_location(lhs.span));
                }
                self.check_expr(rhs, Expectation::Exact(lhs_info.ty))?;
                self.expect_assignable(rhs.ty(), lhs_info.ty, rhs.span)?;
                let mut endpoints = lhs_info.endpoints;
                endpoints.then(&rhs.info().endpoints);
                Ok(ExprInfo::value(self.ctx.unit()).with_endpoints(endpoints))
            }
            ExprKind::Cast { operand, target } => {
                self.check_expr(operand, Expectation::None)?;
                let to = target.resolved();
                let from = operand.ty();
                if !self.cast_is_legal(from, to) {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!(
                            "invalid cast: `{}` as `{}`",
                            self.ctx.display(from),
                            self.ctx.display(to)
                        ),
                    )
                    .with_location(span));
                }
                let endpoints = operand.info().endpoints.clone();
                Ok(ExprInfo::value(to).with_endpoints(endpoints))
            }
            ExprKind::Call { target, args } => {
                let (params, ret, string_from) = match target {
                    CallTarget::Path(path) => match path.res {
                        Res::Func(func) => {
                            let callee = &self.program.functions[func];
                            if callee.is_method() {
                                return Err(Diagnostic::error(
                                    DiagnosticKind::InvalidType,
                                    format!(
                                        "`{}` is a method; call it with `.{}(..)` on a receiver",
                                        callee.name, callee.name
                                    ),
                                )
                                .with_location(span));
                            }
                            let params: Vec<TypeId> = callee
                                .params
                                .iter()
                                .map(|&param| callee.locals[param].ty.resolved())
                                .collect();
                            (params, callee.return_type(), false)
                        }
                        Res::Builtin(builtin) => {
                            let sig = builtin_fn_sig(self.ctx, builtin);
                            (sig.params, sig.ret, builtin == BuiltinFn::StringFrom)
                        }
                        Res::Local(_) | Res::Const(_) | Res::Variant(..) => {
                            return Err(Diagnostic::error(
                                DiagnosticKind::InvalidType,
                                format!("`{}` is not a function", path.display()),
                            )
                            .with_location(span));
                        }
                        Res::Unresolved => {
                            return Err(Diagnostic::error(
                                DiagnosticKind::UndefinedName,
                                format!("cannot find `{}` in this scope", path.display()),
                            )
                            .with_location(span));
                        }
                    },
                    CallTarget::Expr(callee) => {
                        self.check_expr(callee, Expectation::None)?;
                        return Err(Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            "callee must be a function-item path",
                        )
                        .with_location(callee.span));
                    }
                };
                if args.len() != params.len() {
                    return Err(Diagnostic::error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "this call takes {} argument(s) but {} were supplied",
                            params.len(),
                            args.len()
                        ),
                    )
                    .with_location(span));
                }
                let mut endpoints = EndpointSet::normal();
                for (arg, &param_ty) in args.iter_mut().zip(&params) {
                    self.check_expr(arg, Expectation::Exact(param_ty))?;
                    if string_from {
                        self.check_string_from_arg(arg)?;
                    } else {
                        self.expect_assignable(arg.ty(), param_ty, arg.span)?;
                    }
                    endpoints.then(&arg.info().endpoints);
                }
                if self.ctx.is_never(ret) {
                    endpoints.normal = false;
                }
                Ok(ExprInfo::value(ret).with_endpoints(endpoints))
            }
            ExprKind::MethodCall {
                receiver,
                method,
                method_span,
                args,
                target,
            } => {
                let method = method.clone();
                let method_span = *method_span;
                self.check_expr(receiver, Expectation::None)?;
                let resolved = self.resolve_method(receiver, &method, method_span)?;
                *target = resolved.target;

                if args.len() != resolved.params.len() {
                    return Err(Diagnostic::error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "method `{method}` takes {} argument(s) but {} were supplied",
                            resolved.params.len(),
                            args.len()
                        ),
                    )
                    .with_location(span));
                }
                let mut endpoints = receiver.info().endpoints.clone();
                for (arg, &param_ty) in args.iter_mut().zip(&resolved.params) {
                    self.check_expr(arg, Expectation::Exact(param_ty))?;
                    self.expect_assignable(arg.ty(), param_ty, arg.span)?;
                    endpoints.then(&arg.info().endpoints);
                }
                Ok(ExprInfo::value(resolved.ret).with_endpoints(endpoints))
            }
            ExprKind::Field { base, target } => {
                self.check_expr(base, Expectation::None)?;
                let derefs = self.count_derefs_to(base.ty(), |ctx, ty| {
                    matches!(ctx.type_of(ty), Type::Struct(_))
                });
                let Some(derefs) = derefs else {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!(
                            "type `{}` has no fields",
                            self.ctx.display(base.ty())
                        ),
                    )
                    .with_location(span));
                };
                for _ in 0..derefs {
                    self.wrap_deref(base);
                }
                let Type::Struct(sid) = self.ctx.type_of(base.ty()) else {
                    unreachable!("deref chain ends at a struct");
                };
                let sid = *sid;
                let (name, name_span) = match target {
                    FieldTarget::Name(name, name_span) => (name.clone(), *name_span),
                    FieldTarget::Index(_) => {
                        unreachable!("field targets resolve exactly once")
                    }
                };
                let info = self.ctx.struct_info(sid);
                let Some(index) = info.field_index(&name) else {
                    return Err(Diagnostic::error(
                        DiagnosticKind::UndefinedName,
                        format!("no field `{name}` on type `{}`", info.name),
                    )
                    .with_location(name_span));
                };
                let field_ty = info.fields[index].1;
                *target = FieldTarget::Index(index);
                let base_info = base.info();
                Ok(ExprInfo {
                    ty: field_ty,
                    is_place: base_info.is_place,
                    is_mut: base_info.is_mut,
                    endpoints: base_info.endpoints.clone(),
                    const_value: None,
                })
            }
            ExprKind::Index { base, index } => {
                self.check_expr(base, Expectation::None)?;
                let derefs = self.count_derefs_to(base.ty(), |ctx, ty| {
                    matches!(ctx.type_of(ty), Type::Array { .. })
                });
                let Some(derefs) = derefs else {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!("type `{}` cannot be indexed", self.ctx.display(base.ty())),
                    )
                    .with_location(span));
                };
                for _ in 0..derefs {
                    self.wrap_deref(base);
                }
                let Type::Array { element, .. } = self.ctx.type_of(base.ty()) else {
                    unreachable!("deref chain ends at an array");
                };
                let element = *element;
                let usize_ty = self.ctx.usize();
                self.check_expr(index, Expectation::Exact(usize_ty))?;
                self.expect_assignable(index.ty(), usize_ty, index.span)?;
                let base_info = base.info().clone();
                let mut endpoints = base_info.endpoints;
                endpoints.then(&index.info().endpoints);
                Ok(ExprInfo {
                    ty: element,
                    is_place: base_info.is_place,
                    is_mut: base_info.is_mut,
                    endpoints,
                    const_value: None,
                })
            }
            ExprKind::StructLiteral {
                struct_id, fields, ..
            } => {
                let sid = struct_id.expect("struct literals resolve during name resolution");
                let field_tys: Vec<TypeId> = self
                    .ctx
                    .struct_info(sid)
                    .fields
                    .iter()
                    .map(|(_, ty)| *ty)
                    .collect();
                let mut endpoints = EndpointSet::normal();
                for (field, &field_ty) in fields.iter_mut().zip(&field_tys) {
                    self.check_expr(&mut field.value, Expectation::Exact(field_ty))?;
                    self.expect_assignable(field.value.ty(), field_ty, field.value.span)?;
                    endpoints.then(&field.value.info().endpoints);
                }
                let ty = self.ctx.struct_type(sid);
                Ok(ExprInfo::value(ty).with_endpoints(endpoints))
            }
            ExprKind::ArrayLiteral { elements } => {
                let expected_element = match expect.exact().map(|ty| self.ctx.type_of(ty)) {
                    Some(Type::Array { element, .. }) => Some(*element),
                    _ => None,
                };
                let mut endpoints = EndpointSet::normal();
                let mut element_ty = expected_element;
                for element in elements.iter_mut() {
                    let element_expect = match element_ty {
                        Some(ty) => Expectation::Exact(ty),
                        None => Expectation::None,
                    };
                    self.check_expr(element, element_expect)?;
                    match element_ty {
                        Some(ty) => self.expect_assignable(element.ty(), ty, element.span)?,
                        None => element_ty = Some(element.ty()),
                    }
                    endpoints.then(&element.info().endpoints);
                }
                let Some(element_ty) = element_ty else {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        "cannot infer the element type of an empty array",
                    )
                    .with_location(span));
                };
                let ty = self.ctx.array(element_ty, elements.len());
                Ok(ExprInfo::value(ty).with_endpoints(endpoints))
            }
            ExprKind::ArrayRepeat { element, count } => {
                let expected_element = match expect.exact().map(|ty| self.ctx.type_of(ty)) {
                    Some(Type::Array { element, .. }) => Some(*element),
                    _ => None,
                };
                let usize_ty = self.ctx.usize();
                self.check_expr(count, Expectation::Exact(usize_ty))?;
                self.expect_assignable(count.ty(), usize_ty, count.span)?;
                let value = eval_finalized(count, &self.program.consts)?;
                let length = match value {
                    ConstValue::Int(v) if v >= 0 => usize::try_from(v).map_err(|_| {
                        Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            "array repeat count out of range",
                        )
                        .with_location(count.span)
                    })?,
                    _ => {
                        return Err(Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            "array repeat count must be a non-negative `usize` constant",
                        )
                        .with_location(count.span));
                    }
                };
                if let Some(info) = count.info.as_mut() {
                    info.const_value = Some(ConstValue::Int(length as i64));
                }
                let element_expect = match expected_element {
                    Some(ty) => Expectation::Exact(ty),
                    None => Expectation::None,
                };
                self.check_expr(element, element_expect)?;
                if let Some(expected) = expected_element {
                    self.expect_assignable(element.ty(), expected, element.span)?;
                }
                let mut endpoints = element.info().endpoints.clone();
                endpoints.then(&count.info().endpoints);
                let ty = self.ctx.array(element.ty(), length);
                Ok(ExprInfo::value(ty).with_endpoints(endpoints))
            }
            ExprKind::Block(block) => {
                let (ty, endpoints) = self.check_block(block, expect)?;
                Ok(ExprInfo::value(ty).with_endpoints(endpoints))
            }
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.check_condition(condition)?;
                match else_branch {
                    None => {
                        self.check_expr(then_branch, Expectation::None)?;
                        let then_ty = then_branch.ty();
                        let unit = self.ctx.unit();
                        if self.unify(then_ty, unit).is_none() {
                            return Err(Diagnostic::error(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "`if` without `else` evaluates to `()`, not `{}`",
                                    self.ctx.display(then_ty)
                                ),
                            )
                            .with_location(then_branch.span));
                        }
                        let mut endpoints = condition.info().endpoints.clone();
                        let mut branch = then_branch.info().endpoints.clone();
                        branch.normal = true; // the skip path falls through
                        endpoints.then(&branch);
                        Ok(ExprInfo::value(unit).with_endpoints(endpoints))
                    }
                    Some(else_branch) => {
                        self.check_expr(then_branch, expect)?;
                        self.check_expr(else_branch, expect)?;
                        let joined = self
                            .unify(then_branch.ty(), else_branch.ty())
                            .ok_or_else(|| {
                                Diagnostic::error(
                                    DiagnosticKind::TypeMismatch,
                                    format!(
                                        "`if` and `else` have incompatible types: `{}` vs `{}`",
                                        self.ctx.display(then_branch.ty()),
                                        self.ctx.display(else_branch.ty())
                                    ),
                                )
                                .with_location(else_branch.span)
                            })?;
                        let mut branches = then_branch.info().endpoints.clone();
                        branches.union(&else_branch.info().endpoints);
                        let mut endpoints = condition.info().endpoints.clone();
                        endpoints.then(&branches);
                        Ok(ExprInfo::value(joined).with_endpoints(endpoints))
                    }
                }
            }
            ExprKind::While {
                loop_id,
                condition,
                body,
            } => {
                let loop_id = *loop_id;
                self.loops.push(LoopCtx {
                    id: loop_id,
                    is_loop_expr: false,
                    break_ty: None,
                });
                let result = (|| {
                    self.check_condition(condition)?;
                    self.check_expr(body, Expectation::None)?;
                    let unit = self.ctx.unit();
                    if self.unify(body.ty(), unit).is_none() {
                        return Err(Diagnostic::error(
                            DiagnosticKind::TypeMismatch,
                            format!(
                                "`while` body evaluates to `()`, not `{}`",
                                self.ctx.display(body.ty())
                            ),
                        )
                        .with_location(body.span));
                    }
                    Ok(())
                })();
                self.loops.pop();
                result?;

                let cond_endpoints = condition.info().endpoints.clone();
                let mut endpoints = cond_endpoints.clone();
                if cond_endpoints.normal {
                    endpoints.union(&body.info().endpoints);
                }
                endpoints.absorb_loop(loop_id);
                if cond_endpoints.normal {
                    endpoints.normal = true;
                }
                Ok(ExprInfo::value(self.ctx.unit()).with_endpoints(endpoints))
            }
            ExprKind::Loop { loop_id, body } => {
                let loop_id = *loop_id;
                self.loops.push(LoopCtx {
                    id: loop_id,
                    is_loop_expr: true,
                    break_ty: None,
                });
                let result = (|| {
                    self.check_expr(body, Expectation::None)?;
                    let unit = self.ctx.unit();
                    if self.unify(body.ty(), unit).is_none() {
                        return Err(Diagnostic::error(
                            DiagnosticKind::TypeMismatch,
                            format!(
                                "`loop` body evaluates to `()`, not `{}`",
                                self.ctx.display(body.ty())
                            ),
                        )
                        .with_location(body.span));
                    }
                    Ok(())
                })();
                let break_ty = self.loops.pop().expect("pushed above").break_ty;
                result?;

                let body_endpoints = body.info().endpoints.clone();
                let has_reachable_break = body_endpoints.breaks_loop(loop_id);
                let mut endpoints = body_endpoints;
                // Falling off the body repeats the loop; it is not an exit.
                endpoints.normal = false;
                endpoints.absorb_loop(loop_id);
                let ty = if has_reachable_break {
                    break_ty.unwrap_or_else(|| self.ctx.unit())
                } else {
                    self.ctx.never()
                };
                Ok(ExprInfo::value(ty).with_endpoints(endpoints))
            }
            ExprKind::Break { value, .. } => {
                let Some(target) = self.loops.last() else {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidControlFlow,
                        "`break` outside of a loop",
                    )
                    .with_location(span));
                };
                let loop_index = self.loops.len() - 1;
                let loop_id = target.id;
                let is_loop_expr = target.is_loop_expr;
                let known_break_ty = target.break_ty;

                let (value_ty, mut endpoints, value_span) = match value {
                    Some(value) => {
                        let value_expect = match known_break_ty {
                            Some(ty) if is_loop_expr => Expectation::Exact(ty),
                            _ => Expectation::None,
                        };
                        self.check_expr(value, value_expect)?;
                        (
                            value.ty(),
                            value.info().endpoints.clone(),
                            value.span,
                        )
                    }
                    None => (self.ctx.unit(), EndpointSet::normal(), span),
                };

                if is_loop_expr {
                    if !self.ctx.is_never(value_ty) {
                        match self.loops[loop_index].break_ty {
                            None => self.loops[loop_index].break_ty = Some(value_ty),
                            Some(existing) => {
                                self.expect_assignable(value_ty, existing, value_span)?;
                            }
                        }
                    }
                } else {
                    let unit = self.ctx.unit();
                    if self.unify(value_ty, unit).is_none() {
                        return Err(Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            "can only `break` with a value inside `loop`",
                        )
                        .with_location(value_span));
                    }
                }

                endpoints.then(&EndpointSet::breaking(loop_id));
                Ok(ExprInfo::value(self.ctx.never()).with_endpoints(endpoints))
            }
            ExprKind::Continue { .. } => {
                let Some(target) = self.loops.last() else {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidControlFlow,
                        "`continue` outside of a loop",
                    )
                    .with_location(span));
                };
                let endpoints = EndpointSet::continuing(target.id);
                Ok(ExprInfo::value(self.ctx.never()).with_endpoints(endpoints))
            }
            ExprKind::Return { value } => {
                if self.current_fn.is_none() {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidControlFlow,
                        "`return` outside of a function",
                    )
                    .with_location(span));
                }
                let return_ty = self.return_ty;
                let (value_ty, mut endpoints, value_span) = match value {
                    Some(value) => {
                        self.check_expr(value, Expectation::Exact(return_ty))?;
                        (value.ty(), value.info().endpoints.clone(), value.span)
                    }
                    None => (self.ctx.unit(), EndpointSet::normal(), span),
                };
                self.expect_assignable(value_ty, return_ty, value_span)?;
                endpoints.then(&EndpointSet::returning());
                Ok(ExprInfo::value(self.ctx.never()).with_endpoints(endpoints))
            }
        }
    }

    fn check_path(&mut self, path: &PathExpr, span: Span) -> Result<ExprInfo, Diagnostic> {
        match path.res {
            Res::Local(local) => {
                let ty = self.local_ty(local);
                let func = self.current_fn.expect("locals only occur inside functions");
                let mutable = self.program.functions[func].locals[local].mutable;
                Ok(ExprInfo {
                    ty,
                    is_place: true,
                    is_mut: mutable,
                    endpoints: EndpointSet::normal(),
                    const_value: None,
                })
            }
            Res::Const(id) => {
                let item = &self.program.consts[id];
                let mut info = ExprInfo::value(item.ty.resolved());
                info.const_value = item.computed.clone();
                Ok(info)
            }
            Res::Variant(enum_id, index) => {
                let ty = self.ctx.enum_type(enum_id);
                let mut info = ExprInfo::value(ty);
                info.const_value = Some(ConstValue::Int(index as i64));
                Ok(info)
            }
            Res::Func(_) | Res::Builtin(_) => Err(Diagnostic::error(
                DiagnosticKind::InvalidType,
                format!(
                    "`{}` is a function and must be called",
                    path.display()
                ),
            )
            .with_location(span)),
            Res::Unresolved => Err(Diagnostic::error(
                DiagnosticKind::UndefinedName,
                format!("cannot find `{}` in this scope", path.display()),
            )
            .with_location(span)),
        }
    }

    fn check_unary(
        &mut self,
        op: UnaryOp,
        operand: &mut Expr,
        expect: Expectation,
        span: Span,
    ) -> Result<ExprInfo, Diagnostic> {
        if op == UnaryOp::Neg {
            // `-2147483648` is the one literal whose magnitude only exists
            // negated; type it as a unit rather than erroring on the operand.
            if let ExprKind::IntLiteral { value, suffix } = &operand.kind {
                let target = match suffix {
                    Some(IntSuffix::I32) => self.ctx.i32(),
                    None => match expect.exact() {
                        Some(expected) if self.ctx.is_integer(expected) => expected,
                        _ => self.ctx.i32(),
                    },
                    Some(_) => TypeId::INVALID,
                };
                if *value == 0x8000_0000 && target == self.ctx.i32() {
                    let mut literal = ExprInfo::value(target);
                    literal.const_value = Some(ConstValue::Int(i64::from(*value)));
                    operand.info = Some(literal);
                    let mut info = ExprInfo::value(target);
                    info.const_value = Some(ConstValue::Int(i64::from(i32::MIN)));
                    return Ok(info);
                }
            }
        }

        self.check_expr(operand, expect)?;
        let ty = operand.ty();
        let endpoints = operand.info().endpoints.clone();
        if self.ctx.is_never(ty) {
            return Ok(ExprInfo::value(ty).with_endpoints(endpoints));
        }

        match op {
            UnaryOp::Neg => {
                if !matches!(
                    self.ctx.type_of(ty),
                    Type::Primitive(Primitive::I32 | Primitive::Isize)
                ) {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!("cannot negate a value of type `{}`", self.ctx.display(ty)),
                    )
                    .with_location(span));
                }
            }
            UnaryOp::Not => {
                if !(self.ctx.is_bool(ty) || self.ctx.is_integer(ty)) {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!(
                            "cannot apply `!` to a value of type `{}`",
                            self.ctx.display(ty)
                        ),
                    )
                    .with_location(span));
                }
            }
        }

        let mut info = ExprInfo::value(ty).with_endpoints(endpoints);
        info.const_value = match (op, operand.info().const_value.as_ref()) {
            (UnaryOp::Neg, Some(ConstValue::Int(v))) => v.checked_neg().map(ConstValue::Int),
            (UnaryOp::Not, Some(ConstValue::Bool(v))) => Some(ConstValue::Bool(!v)),
            (UnaryOp::Not, Some(ConstValue::Int(v))) => Some(ConstValue::Int(!v)),
            _ => None,
        };
        Ok(info)
    }

    fn check_binary(
        &mut self,
        op: BinaryOp,
        lhs: &mut Expr,
        rhs: &mut Expr,
        expect: Expectation,
        span: Span,
    ) -> Result<ExprInfo, Diagnostic> {
        let bool_ty = self.ctx.bool();
        match op {
            BinaryOp::And | BinaryOp::Or => {
                self.check_expr(lhs, Expectation::Exact(bool_ty))?;
                self.expect_assignable(lhs.ty(), bool_ty, lhs.span)?;
                self.check_expr(rhs, Expectation::Exact(bool_ty))?;
                self.expect_assignable(rhs.ty(), bool_ty, rhs.span)?;
                // Short-circuit: the right side may be skipped, so falling
                // through stays possible whenever the left side completes.
                let mut endpoints = lhs.info().endpoints.clone();
                let mut right = rhs.info().endpoints.clone();
                right.normal = true;
                endpoints.then(&right);
                Ok(ExprInfo::value(bool_ty).with_endpoints(endpoints))
            }
            BinaryOp::Eq
            | BinaryOp::Neq
            | BinaryOp::Less
            | BinaryOp::Greater
            | BinaryOp::LessEqual
            | BinaryOp::GreaterEqual => {
                self.check_operand_pair(lhs, rhs, Expectation::None)?;
                let operand_ty = self.join_operands(lhs, rhs, span)?;
                if !self.ctx.is_never(operand_ty)
                    && !matches!(
                        self.ctx.type_of(operand_ty),
                        Type::Primitive(
                            Primitive::I32
                                | Primitive::U32
                                | Primitive::Isize
                                | Primitive::Usize
                                | Primitive::Bool
                                | Primitive::Char
                        )
                    )
                {
                    return Err(Diagnostic::error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "cannot compare values of type `{}`",
                            self.ctx.display(operand_ty)
                        ),
                    )
                    .with_location(span));
                }
                let mut endpoints = lhs.info().endpoints.clone();
                endpoints.then(&rhs.info().endpoints);
                Ok(ExprInfo::value(bool_ty).with_endpoints(endpoints))
            }
            _ => {
                self.check_operand_pair(lhs, rhs, expect)?;
                let operand_ty = self.join_operands(lhs, rhs, span)?;
                if !self.ctx.is_never(operand_ty) && !self.ctx.is_integer(operand_ty) {
                    return Err(Diagnostic::error(
                        DiagnosticKind::TypeMismatch,
                        format!(
                            "binary `{op}` requires integer operands, found `{}`",
                            self.ctx.display(operand_ty)
                        ),
                    )
                    .with_location(span));
                }
                let mut endpoints = lhs.info().endpoints.clone();
                endpoints.then(&rhs.info().endpoints);
                Ok(ExprInfo::value(operand_ty).with_endpoints(endpoints))
            }
        }
    }

    /// Check both operands of a binary operator. When the left side is a
    /// free integer literal and the right side is not, the right side is
    /// checked first so the literal can take its type from it.
    fn check_operand_pair(
        &mut self,
        lhs: &mut Expr,
        rhs: &mut Expr,
        expect: Expectation,
    ) -> Result<(), Diagnostic> {
        let lhs_free_literal =
            matches!(lhs.kind, ExprKind::IntLiteral { suffix: None, .. })
                && expect.exact().is_none();
        let rhs_literal = matches!(rhs.kind, ExprKind::IntLiteral { .. });
        if lhs_free_literal && !rhs_literal {
            self.check_expr(rhs, Expectation::None)?;
            let lhs_expect = if self.ctx.is_never(rhs.ty()) {
                Expectation::None
            } else {
                Expectation::Exact(rhs.ty())
            };
            self.check_expr(lhs, lhs_expect)
        } else {
            self.check_expr(lhs, expect)?;
            let rhs_expect = if self.ctx.is_never(lhs.ty()) {
                Expectation::None
            } else {
                Expectation::Exact(lhs.ty())
            };
            self.check_expr(rhs, rhs_expect)
        }
    }

    /// The common operand type of a checked pair, with never-coercion.
    fn join_operands(
        &mut self,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<TypeId, Diagnostic> {
        self.unify(lhs.ty(), rhs.ty()).ok_or_else(|| {
            Diagnostic::type_mismatch(
                &self.ctx.display(lhs.ty()),
                &self.ctx.display(rhs.ty()),
                span,
            )
        })
    }

    fn check_condition(&mut self, condition: &mut Expr) -> Result<(), Diagnostic> {
        let bool_ty = self.ctx.bool();
        self.check_expr(condition, Expectation::Exact(bool_ty))?;
        if !self.assignable(condition.ty(), bool_ty) {
            return Err(Diagnostic::error(
                DiagnosticKind::InvalidType,
                format!(
                    "condition must be `bool`, found `{}`",
                    self.ctx.display(condition.ty())
                ),
            )
            .with_location(condition.span));
        }
        Ok(())
    }

    fn check_block(
        &mut self,
        block: &mut Block,
        expect: Expectation,
    ) -> Result<(TypeId, EndpointSet), Diagnostic> {
        let mut endpoints = EndpointSet::normal();
        for stmt in &mut block.stmts {
            match stmt {
                Stmt::Let(let_stmt) => {
                    let declared = self.local_ty(let_stmt.local);
                    if let Some(init) = &mut let_stmt.init {
                        self.check_expr(init, Expectation::Exact(declared))?;
                        self.expect_assignable(init.ty(), declared, init.span)?;
                        endpoints.then(&init.info().endpoints);
                    }
                }
                Stmt::Expr { expr, .. } => {
                    self.check_expr(expr, Expectation::None)?;
                    endpoints.then(&expr.info().endpoints);
                }
                Stmt::Item(_) | Stmt::Empty => {}
            }
        }
        let ty = match &mut block.tail {
            Some(tail) => {
                self.check_expr(tail, expect)?;
                let ty = tail.ty();
                endpoints.then(&tail.info().endpoints);
                ty
            }
            None => self.ctx.unit(),
        };
        let ty = if endpoints.normal {
            ty
        } else {
            self.ctx.never()
        };
        Ok((ty, endpoints))
    }

    fn cast_is_legal(&mut self, from: TypeId, to: TypeId) -> bool {
        if from == to || self.ctx.is_never(from) {
            return true;
        }
        let from_castable = matches!(
            self.ctx.type_of(from),
            Type::Primitive(
                Primitive::I32
                    | Primitive::U32
                    | Primitive::Isize
                    | Primitive::Usize
                    | Primitive::Bool
                    | Primitive::Char
            ) | Type::Enum(_)
        );
        from_castable && self.ctx.is_integer(to)
    }

    fn check_string_from_arg(&self, arg: &Expr) -> Result<(), Diagnostic> {
        let ty = arg.ty();
        if self.ctx.is_never(ty) {
            return Ok(());
        }
        if let Type::Reference { target, .. } = self.ctx.type_of(ty) {
            if matches!(self.ctx.type_of(*target), Type::Primitive(Primitive::Str)) {
                return Ok(());
            }
        }
        Err(Diagnostic::type_mismatch(
            "&str",
            &self.ctx.display(ty),
            arg.span,
        ))
    }

    // --- Method resolution ------------------------------------------------

    fn resolve_method(
        &mut self,
        receiver: &mut Box<Expr>,
        method: &str,
        method_span: Span,
    ) -> Result<ResolvedMethod, Diagnostic> {
        // Probe: at each deref step, look for a method on the exposed type.
        let mut ty = receiver.ty();
        let mut derefs = 0usize;
        let mut last_ref_mutable = false;
        let found = loop {
            if let Some(found) = self.find_method(ty, method, method_span)? {
                break found;
            }
            match self.ctx.type_of(ty) {
                Type::Reference { target, mutable } => {
                    last_ref_mutable = *mutable;
                    ty = *target;
                    derefs += 1;
                }
                _ => {
                    return Err(Diagnostic::error(
                        DiagnosticKind::UndefinedName,
                        format!(
                            "no method `{method}` found for type `{}`",
                            self.ctx.display(receiver.ty())
                        ),
                    )
                    .with_location(method_span));
                }
            }
        };

        let (target, self_kind, params, ret) = match found {
            FoundMethod::User(func) => {
                let callee = &self.program.functions[func];
                let self_kind = callee.self_kind.expect("impl-table methods have receivers");
                let params: Vec<TypeId> = callee
                    .params
                    .iter()
                    .map(|&param| callee.locals[param].ty.resolved())
                    .collect();
                (
                    MethodTarget::User(func),
                    self_kind,
                    params,
                    callee.return_type(),
                )
            }
            FoundMethod::Builtin(sig) => (
                MethodTarget::Builtin(sig.method),
                sig.self_kind,
                sig.params,
                sig.ret,
            ),
        };

        // Value category of the receiver once the derefs are applied.
        let (is_place, is_mut) = if derefs > 0 {
            (true, last_ref_mutable)
        } else {
            let info = receiver.info();
            (info.is_place, info.is_mut)
        };

        for _ in 0..derefs {
            self.wrap_deref(receiver);
        }
        match self_kind {
            SelfKind::Value { .. } => {}
            SelfKind::Ref { mutable: false } => self.wrap_ref(receiver, false),
            SelfKind::Ref { mutable: true } => {
                if !(is_place && is_mut) {
                    return Err(Diagnostic::error(
                        DiagnosticKind::ImmutableVariableMutated,
                        format!("method `{method}` needs a mutable receiver"),
                    )
                    .with_location(receiver.span));
                }
                self.wrap_ref(receiver, true);
            }
        }

        Ok(ResolvedMethod {
            target,
            params,
            ret,
        })
    }

    fn find_method(
        &mut self,
        ty: TypeId,
        method: &str,
        method_span: Span,
    ) -> Result<Option<FoundMethod>, Diagnostic> {
        if let Some(key) = TypeKey::of(self.ctx, ty) {
            match self.impls.lookup_assoc(key, method) {
                Some(AssocItem::Method(func)) => return Ok(Some(FoundMethod::User(func))),
                Some(AssocItem::Function(_) | AssocItem::Const(_)) => {
                    return Err(Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!(
                            "`{method}` is an associated item of `{}`, not a method",
                            key.display(self.ctx)
                        ),
                    )
                    .with_location(method_span));
                }
                None => {}
            }
        }
        Ok(lookup_builtin_method(self.ctx, ty, method).map(FoundMethod::Builtin))
    }

    /// Count the derefs needed until `predicate` holds, stepping through
    /// reference types. `None` if the chain bottoms out first.
    fn count_derefs_to(
        &self,
        ty: TypeId,
        predicate: impl Fn(&TypeContext, TypeId) -> bool,
    ) -> Option<usize> {
        let mut current = ty;
        let mut derefs = 0;
        loop {
            if predicate(self.ctx, current) {
                return Some(derefs);
            }
            match self.ctx.type_of(current) {
                Type::Reference { target, .. } => {
                    current = *target;
                    derefs += 1;
                }
                _ => return None,
            }
        }
    }

    /// Wrap an expression in a synthetic deref, computing its annotation
    /// from the reference being stripped.
    fn wrap_deref(&mut self, slot: &mut Box<Expr>) {
        let Type::Reference { target, mutable } = self.ctx.type_of(slot.ty()) else {
            unreachable!("auto-deref applies to references only")
        };
        let (target, mutable) = (*target, *mutable);
        let span = slot.span;
        let endpoints = slot.info().endpoints.clone();
        let inner = std::mem::replace(
            slot,
            Box::new(Expr::new(ExprKind::Unit, span)),
        );
        let mut wrapped = Expr::new(
            ExprKind::Deref {
                operand: inner,
                synthetic: true,
            },
            span,
        );
        wrapped.info = Some(ExprInfo {
            ty: target,
            is_place: true,
            is_mut: mutable,
            endpoints,
            const_value: None,
        });
        *slot = Box::new(wrapped);
    }

    /// Wrap an expression in a synthetic borrow for a method receiver.
    fn wrap_ref(&mut self, slot: &mut Box<Expr>, mutable: bool) {
        let ty = self.ctx.reference(slot.ty(), mutable);
        let span = slot.span;
        let endpoints = slot.info().endpoints.clone();
        let inner = std::mem::replace(
            slot,
            Box::new(Expr::new(ExprKind::Unit, span)),
        );
        let mut wrapped = Expr::new(
            ExprKind::Ref {
                mutable,
                operand: inner,
                synthetic: true,
            },
            span,
        );
        wrapped.info = Some(ExprInfo::value(ty).with_endpoints(endpoints));
        *slot = Box::new(wrapped);
    }
}

/// Outcome of the receiver probe.
enum FoundMethod {
    User(FuncId),
    Builtin(crate::builtins::BuiltinMethodSig),
}

/// A method call after probing: its resolved target and signature.
struct ResolvedMethod {
    target: MethodTarget,
    params: Vec<TypeId>,
    ret: TypeId,
}
