//! # Function Lowering
//!
//! Builds one `MirFunction`: locals for every HIR binding, the named-
//! return-value aliasing for sret functions, the body in
//! destination-passing style, and the final return emission.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;
use rx_compiler_semantic::hir::{FuncId, FuncOwner, ItemRef, Program};
use rx_compiler_semantic::types::TypeContext;

use crate::function::ReturnDesc;
use crate::{FunctionId, MirFunction, MirFunctionSig, Place, Terminator};

use super::{ExternalRegistry, MirBuilder};

pub(super) fn lower_function(
    program: &Program,
    ctx: &mut TypeContext,
    func_map: &FxHashMap<FuncId, FunctionId>,
    signatures: &IndexVec<FunctionId, MirFunctionSig>,
    externals: &mut ExternalRegistry,
    hir_id: FuncId,
    mir_id: FunctionId,
) -> Result<MirFunction, String> {
    let hir = &program.functions[hir_id];
    let sig = signatures[mir_id].clone();
    let name = symbol_name(program, ctx, hir_id);
    let mut func = MirFunction::new(mir_id, name, sig);

    // NRVO: the first non-parameter local whose type equals the sret return
    // type is speculatively aliased to the return slot.
    let nrvo_candidate = match func.sig.return_desc {
        ReturnDesc::IndirectSRet(ret_ty) => {
            let is_param = |local| {
                hir.self_local == Some(local) || hir.params.contains(&local)
            };
            hir.locals
                .iter_enumerated()
                .find(|(local, info)| !is_param(*local) && info.ty.resolved() == ret_ty)
                .map(|(local, _)| local)
        }
        _ => None,
    };

    let mut builder = MirBuilder::new(
        program, ctx, func_map, signatures, externals, hir, func,
    );

    // One MIR slot per HIR binding, parameters first in ABI order.
    for (hir_local, info) in hir.locals.iter_enumerated() {
        let is_arg =
            hir.self_local == Some(hir_local) || hir.params.contains(&hir_local);
        let mir_local =
            builder
                .func
                .new_local(info.name.clone(), info.ty.resolved(), is_arg);
        builder.local_map.insert(hir_local, mir_local);
        if is_arg {
            builder.func.param_locals.push(mir_local);
        }
        if nrvo_candidate == Some(hir_local) {
            builder.func.ret_slot = Some(mir_local);
        }
    }
    if matches!(builder.func.sig.return_desc, ReturnDesc::IndirectSRet(_))
        && builder.func.ret_slot.is_none()
    {
        let ReturnDesc::IndirectSRet(ret_ty) = builder.func.sig.return_desc else {
            unreachable!()
        };
        let slot = builder.func.new_local("_ret".to_string(), ret_ty, false);
        builder.func.ret_slot = Some(slot);
    }

    let body = hir.body.as_ref().expect("only functions with bodies lower");
    match builder.func.sig.return_desc {
        ReturnDesc::IndirectSRet(_) => {
            let slot = Place::local(builder.func.ret_slot.expect("set above"));
            if builder.lower_block(body, Some(&slot))?.is_some() {
                builder.terminate(Terminator::Return { value: None });
            }
        }
        ReturnDesc::Direct(ret_ty) => {
            if let Some(result) = builder.lower_block(body, None)? {
                let operand = builder.result_to_operand(result, ret_ty)?;
                builder.terminate(Terminator::Return {
                    value: Some(operand),
                });
            }
        }
        ReturnDesc::Void | ReturnDesc::Never => {
            if builder.lower_block(body, None)?.is_some() {
                builder.terminate(Terminator::Return { value: None });
            }
        }
    }

    Ok(builder.func)
}

/// Symbol for the emitter: plain for top-level functions, `Type::name` for
/// impl methods, suffixed with the function index for nested items.
fn symbol_name(program: &Program, ctx: &TypeContext, id: FuncId) -> String {
    let hir = &program.functions[id];
    match hir.owner {
        FuncOwner::Impl(impl_id) => {
            let target = program.impls[impl_id].for_type.resolved();
            format!("{}::{}", ctx.display(target), hir.name)
        }
        FuncOwner::Trait(_) => hir.name.clone(),
        FuncOwner::Free => {
            let top_level = program
                .items
                .iter()
                .any(|item| matches!(item, ItemRef::Function(f) if *f == id));
            if top_level {
                hir.name.clone()
            } else {
                format!("{}.{}", hir.name, id.index())
            }
        }
    }
}
