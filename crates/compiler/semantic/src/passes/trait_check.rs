//! # Pass 5: Trait Check
//!
//! Validates every trait implementation: all required associated items must
//! be present, and each implemented item's signature must match the trait's
//! declaration by type-id equality on parameter count, parameter types and
//! return type. Methods additionally require the same receiver shape.

use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};

use crate::hir::{FuncId, Function, Program, Span};
use crate::types::TypeContext;

pub fn run(program: &Program, ctx: &TypeContext) -> Result<(), Diagnostic> {
    for impl_block in program.impls.iter() {
        let Some(trait_ref) = &impl_block.trait_ref else {
            continue;
        };
        let trait_id = trait_ref
            .trait_id
            .expect("trait references resolve during name resolution");
        let trait_def = &program.traits[trait_id];

        // Every required method must be implemented with a matching
        // signature.
        for &trait_fn in &trait_def.methods {
            let declared = &program.functions[trait_fn];
            let implemented = impl_block
                .methods
                .iter()
                .copied()
                .find(|&f| program.functions[f].name == declared.name);
            let Some(impl_fn) = implemented else {
                return Err(unimplemented_item(
                    &trait_ref.name,
                    &declared.name,
                    impl_block.span,
                ));
            };
            check_signature(declared, &program.functions[impl_fn], &trait_ref.name, ctx)?;
        }

        // Consts: required unless the trait provides a default; an override
        // must keep the declared type.
        for &trait_const in &trait_def.consts {
            let declared = &program.consts[trait_const];
            let implemented = impl_block
                .consts
                .iter()
                .copied()
                .find(|&c| program.consts[c].name == declared.name);
            match implemented {
                Some(impl_const) => {
                    let impl_item = &program.consts[impl_const];
                    if impl_item.ty.resolved() != declared.ty.resolved() {
                        return Err(Diagnostic::error(
                            DiagnosticKind::TraitItemUnimplemented,
                            format!(
                                "const `{}` has type `{}`, but trait `{}` declares `{}`",
                                impl_item.name,
                                ctx.display(impl_item.ty.resolved()),
                                trait_ref.name,
                                ctx.display(declared.ty.resolved()),
                            ),
                        )
                        .with_location(impl_item.span));
                    }
                }
                None if declared.value.is_some() => {}
                None => {
                    return Err(unimplemented_item(
                        &trait_ref.name,
                        &declared.name,
                        impl_block.span,
                    ));
                }
            }
        }

        // Items the trait does not declare do not belong in a trait impl.
        for &impl_fn in &impl_block.methods {
            let name = &program.functions[impl_fn].name;
            let declared = trait_def
                .methods
                .iter()
                .any(|&f| program.functions[f].name == *name);
            if !declared {
                return Err(not_a_member(
                    &trait_ref.name,
                    name,
                    program.functions[impl_fn].span,
                ));
            }
        }
        for &impl_const in &impl_block.consts {
            let name = &program.consts[impl_const].name;
            let declared = trait_def
                .consts
                .iter()
                .any(|&c| program.consts[c].name == *name);
            if !declared {
                return Err(not_a_member(
                    &trait_ref.name,
                    name,
                    program.consts[impl_const].span,
                ));
            }
        }
    }
    Ok(())
}

fn check_signature(
    declared: &Function,
    implemented: &Function,
    trait_name: &str,
    ctx: &TypeContext,
) -> Result<(), Diagnostic> {
    let mismatch = |detail: String| {
        Diagnostic::error(
            DiagnosticKind::TraitItemUnimplemented,
            format!(
                "method `{}` does not match its declaration in trait `{trait_name}`: {detail}",
                implemented.name
            ),
        )
        .with_location(implemented.span)
    };

    if declared.self_kind != implemented.self_kind {
        return Err(mismatch("wrong receiver".to_string()));
    }
    if declared.params.len() != implemented.params.len() {
        return Err(mismatch(format!(
            "expected {} parameters, found {}",
            declared.params.len(),
            implemented.params.len()
        )));
    }
    for (&decl_param, &impl_param) in declared.params.iter().zip(&implemented.params) {
        let declared_ty = declared.locals[decl_param].ty.resolved();
        let implemented_ty = implemented.locals[impl_param].ty.resolved();
        if declared_ty != implemented_ty {
            return Err(mismatch(format!(
                "parameter `{}` has type `{}`, expected `{}`",
                implemented.locals[impl_param].name,
                ctx.display(implemented_ty),
                ctx.display(declared_ty),
            )));
        }
    }
    if declared.return_type() != implemented.return_type() {
        return Err(mismatch(format!(
            "return type is `{}`, expected `{}`",
            ctx.display(implemented.return_type()),
            ctx.display(declared.return_type()),
        )));
    }
    Ok(())
}

fn unimplemented_item(trait_name: &str, item: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::TraitItemUnimplemented,
        format!("not all trait items implemented: missing `{item}` of trait `{trait_name}`"),
    )
    .with_location(span)
}

fn not_a_member(trait_name: &str, item: &str, span: Span) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::TraitItemUnimplemented,
        format!("`{item}` is not a member of trait `{trait_name}`"),
    )
    .with_location(span)
}
