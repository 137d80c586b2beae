//! # Pass 4: Type & Const Finalization
//!
//! The demand-driven resolver service that turns every `TypeAnnotation`
//! from `Unresolved(TypeNode)` into `Resolved(TypeId)` and evaluates every
//! constant expression in a type position (array lengths, const bodies).
//! The in-place mutation doubles as the cache: a second visit observes
//! `Resolved` and short-circuits.
//!
//! Pass 3 borrows [`resolve_annotation`] for struct fields; this pass
//! finishes the job for impls, constants, and every function signature and
//! body.

use index_vec::IndexVec;
use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};

use crate::const_eval::{int_fits, ConstEvaluator};
use crate::hir::*;
use crate::types::{Primitive, Type, TypeContext, TypeId};
use crate::visit::HirVisitor;

/// Everything annotation resolution can need: the interner, the const
/// arena for on-demand evaluation, and the meaning of `Self`.
pub struct AnnotationCx<'a> {
    pub ctx: &'a mut TypeContext,
    pub consts: &'a mut IndexVec<ConstId, ConstItem>,
    pub self_ty: Option<TypeId>,
}

/// Resolve an annotation in place, returning the canonical handle.
pub fn resolve_annotation(
    annotation: &mut TypeAnnotation,
    cx: &mut AnnotationCx<'_>,
) -> Result<TypeId, Diagnostic> {
    match annotation {
        TypeAnnotation::Resolved(id) => Ok(*id),
        TypeAnnotation::Unresolved(node) => {
            let id = resolve_node(node, cx)?;
            *annotation = TypeAnnotation::Resolved(id);
            Ok(id)
        }
    }
}

fn resolve_node(node: &TypeNode, cx: &mut AnnotationCx<'_>) -> Result<TypeId, Diagnostic> {
    match node {
        TypeNode::Primitive(primitive) => Ok(cx.ctx.primitive(*primitive)),
        TypeNode::Unit => Ok(cx.ctx.unit()),
        TypeNode::SelfTy { span } => cx.self_ty.ok_or_else(|| {
            Diagnostic::error(
                DiagnosticKind::InvalidType,
                "`Self` is only available in impls and traits",
            )
            .with_location(*span)
        }),
        TypeNode::Named { name, span, res } => match res {
            Some(TypeRes::Struct(sid)) => Ok(cx.ctx.struct_type(*sid)),
            Some(TypeRes::Enum(eid)) => Ok(cx.ctx.enum_type(*eid)),
            None => Err(Diagnostic::undefined_name(name, *span)),
        },
        TypeNode::Ref { mutable, target } => {
            let target = resolve_node(target, cx)?;
            Ok(cx.ctx.reference(target, *mutable))
        }
        TypeNode::Array { element, length } => {
            let element = resolve_node(element, cx)?;
            let value = ConstEvaluator::new(cx.consts).eval_expr(length)?;
            let length_value = match value {
                ConstValue::Int(v) if v >= 0 => usize::try_from(v).map_err(|_| {
                    array_length_error(length.span)
                })?,
                _ => return Err(array_length_error(length.span)),
            };
            Ok(cx.ctx.array(element, length_value))
        }
    }
}

fn array_length_error(span: Span) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::InvalidType,
        "array length must be a non-negative `usize` constant",
    )
    .with_location(span)
}

pub fn run(program: &mut Program, ctx: &mut TypeContext) -> Result<(), Diagnostic> {
    let Program {
        functions,
        consts,
        impls,
        ..
    } = program;

    // Impl targets first; they give methods their `Self` type.
    for impl_block in impls.iter_mut() {
        resolve_annotation(
            &mut impl_block.for_type,
            &mut AnnotationCx {
                ctx: &mut *ctx,
                consts: &mut *consts,
                self_ty: None,
            },
        )?;
    }

    // Constants: resolve the declared type, evaluate the body, range check.
    for index in 0..consts.len() {
        let id = ConstId::new(index);
        let self_ty = owner_self_ty(consts[id].owner, impls, ctx);
        let mut ty = std::mem::replace(&mut consts[id].ty, TypeAnnotation::Resolved(TypeId::INVALID));
        let resolved = resolve_annotation(
            &mut ty,
            &mut AnnotationCx {
                ctx: &mut *ctx,
                consts: &mut *consts,
                self_ty,
            },
        );
        consts[id].ty = ty;
        let declared = resolved?;

        if consts[id].value.is_some() {
            let value = ConstEvaluator::new(consts).eval_item(id)?;
            check_const_type(&value, declared, ctx, consts[id].span, &consts[id].name)?;
        }
    }

    // Function signatures, locals, and the cast targets inside bodies.
    for index in 0..functions.len() {
        let id = FuncId::new(index);
        let self_ty = match functions[id].owner {
            FuncOwner::Impl(impl_id) => Some(impls[impl_id].for_type.resolved()),
            // Trait declarations have no concrete receiver; their `Self`
            // resolves to the placeholder and never reaches lowering.
            FuncOwner::Trait(_) => Some(ctx.get_id(Type::Underscore)),
            FuncOwner::Free => None,
        };

        for local_index in 0..functions[id].locals.len() {
            let local = LocalId::new(local_index);
            let mut ty = std::mem::replace(
                &mut functions[id].locals[local].ty,
                TypeAnnotation::Resolved(TypeId::INVALID),
            );
            let resolved = resolve_annotation(
                &mut ty,
                &mut AnnotationCx {
                    ctx: &mut *ctx,
                    consts: &mut *consts,
                    self_ty,
                },
            );
            functions[id].locals[local].ty = ty;
            resolved?;
        }

        let mut return_ty = std::mem::replace(
            &mut functions[id].return_ty,
            TypeAnnotation::Resolved(TypeId::INVALID),
        );
        let resolved = resolve_annotation(
            &mut return_ty,
            &mut AnnotationCx {
                ctx: &mut *ctx,
                consts: &mut *consts,
                self_ty,
            },
        );
        functions[id].return_ty = return_ty;
        resolved?;

        if let Some(mut body) = functions[id].body.take() {
            let mut walker = CastTargetResolver {
                ctx: &mut *ctx,
                consts: &mut *consts,
                self_ty,
            };
            let result = walker.visit_block(&mut body);
            functions[id].body = Some(body);
            result?;
        }
    }

    Ok(())
}

fn owner_self_ty(
    owner: FuncOwner,
    impls: &IndexVec<ImplId, ImplBlock>,
    ctx: &mut TypeContext,
) -> Option<TypeId> {
    match owner {
        FuncOwner::Impl(impl_id) => Some(impls[impl_id].for_type.resolved()),
        FuncOwner::Trait(_) => Some(ctx.get_id(Type::Underscore)),
        FuncOwner::Free => None,
    }
}

/// Resolves `as` cast targets while walking a body.
struct CastTargetResolver<'a> {
    ctx: &'a mut TypeContext,
    consts: &'a mut IndexVec<ConstId, ConstItem>,
    self_ty: Option<TypeId>,
}

impl HirVisitor for CastTargetResolver<'_> {
    fn visit_expr(&mut self, expr: &mut Expr) -> Result<(), Diagnostic> {
        if let ExprKind::Cast { target, .. } = &mut expr.kind {
            resolve_annotation(
                target,
                &mut AnnotationCx {
                    ctx: &mut *self.ctx,
                    consts: &mut *self.consts,
                    self_ty: self.self_ty,
                },
            )?;
        }
        self.walk_expr(expr)
    }
}

fn check_const_type(
    value: &ConstValue,
    declared: TypeId,
    ctx: &TypeContext,
    span: Span,
    name: &str,
) -> Result<(), Diagnostic> {
    let ok = match value {
        ConstValue::Int(v) => int_fits(*v, declared, ctx),
        ConstValue::Bool(_) => ctx.is_bool(declared),
        ConstValue::Char(_) => {
            matches!(ctx.type_of(declared), Type::Primitive(Primitive::Char))
        }
        ConstValue::Str(_) => match ctx.type_of(declared) {
            Type::Reference { target, mutable } => {
                !*mutable && matches!(ctx.type_of(*target), Type::Primitive(Primitive::Str))
            }
            _ => false,
        },
    };
    if ok {
        Ok(())
    } else {
        Err(Diagnostic::error(
            DiagnosticKind::TypeMismatch,
            format!(
                "constant `{name}` has type `{}` but its value does not fit it",
                ctx.display(declared)
            ),
        )
        .with_location(span))
    }
}
