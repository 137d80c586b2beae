//! # Pass 3: Struct/Enum Finalization
//!
//! Resolves the field and variant annotations of every registered struct
//! and enum and writes the results back into the `TypeContext`. A colored
//! depth-first search then rejects any by-value containment cycle: a struct
//! may only reach itself through a reference.

use rustc_hash::FxHashMap;
use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};

use crate::hir::{Program, Span, TypeAnnotation};
use crate::passes::resolve_annotations::{resolve_annotation, AnnotationCx};
use crate::types::{StructId, Type, TypeContext, TypeId};

pub fn run(program: &mut Program, ctx: &mut TypeContext) -> Result<(), Diagnostic> {
    let Program {
        structs,
        enums,
        consts,
        ..
    } = program;

    let mut spans: FxHashMap<StructId, Span> = FxHashMap::default();

    for def in structs.iter_mut() {
        let sid = def
            .struct_id
            .expect("skeleton registration precedes finalization");
        spans.insert(sid, def.span);
        let mut fields = Vec::with_capacity(def.fields.len());
        for field in &mut def.fields {
            let mut ty = std::mem::replace(&mut field.ty, TypeAnnotation::Resolved(TypeId::INVALID));
            let resolved = resolve_annotation(
                &mut ty,
                &mut AnnotationCx {
                    ctx: &mut *ctx,
                    consts: &mut *consts,
                    self_ty: None,
                },
            );
            field.ty = ty;
            fields.push((field.name.clone(), resolved?));
        }
        ctx.set_struct_fields(sid, fields);
    }

    for def in enums.iter_mut() {
        let eid = def
            .enum_id
            .expect("skeleton registration precedes finalization");
        let variants = def.variants.iter().map(|(name, _)| name.clone()).collect();
        ctx.set_enum_variants(eid, variants);
    }

    detect_cycles(ctx, &spans)
}

#[derive(Clone, Copy, PartialEq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Colored DFS over the by-value containment graph. Only cycles that never
/// pass through a reference are fatal.
fn detect_cycles(
    ctx: &TypeContext,
    spans: &FxHashMap<StructId, Span>,
) -> Result<(), Diagnostic> {
    let count = ctx.struct_count();
    let mut colors = vec![Color::White; count];
    for index in 0..count {
        if colors[index] == Color::White {
            visit(StructId::new(index), ctx, &mut colors, spans)?;
        }
    }
    Ok(())
}

fn visit(
    id: StructId,
    ctx: &TypeContext,
    colors: &mut [Color],
    spans: &FxHashMap<StructId, Span>,
) -> Result<(), Diagnostic> {
    colors[id.index()] = Color::Gray;
    let fields: Vec<TypeId> = ctx
        .struct_info(id)
        .fields
        .iter()
        .map(|(_, ty)| *ty)
        .collect();
    for field_ty in fields {
        for contained in contained_structs(ctx, field_ty) {
            match colors[contained.index()] {
                Color::Gray => {
                    let name = ctx.struct_info(contained).name.clone();
                    let mut diagnostic = Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!("recursive type `{name}` has infinite size"),
                    );
                    if let Some(span) = spans.get(&contained) {
                        diagnostic = diagnostic.with_location(*span);
                    }
                    return Err(diagnostic);
                }
                Color::White => visit(contained, ctx, colors, spans)?,
                Color::Black => {}
            }
        }
    }
    colors[id.index()] = Color::Black;
    Ok(())
}

/// Structs contained by value in a type: direct struct fields and array
/// elements. References break the containment chain.
fn contained_structs(ctx: &TypeContext, ty: TypeId) -> Vec<StructId> {
    match ctx.type_of(ty) {
        Type::Struct(id) => vec![*id],
        Type::Array { element, .. } => contained_structs(ctx, *element),
        _ => vec![],
    }
}
