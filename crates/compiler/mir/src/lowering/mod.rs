//! # HIR to MIR Lowering
//!
//! A destination-passing-style lowerer. Each expression lowers to a
//! [`LowerResult`]: a scalar operand, a place, or `Written` when the value
//! went straight into the destination the caller passed down. Threading the
//! destination is what lets aggregate initializers flatten into sub-place
//! writes and what makes NRVO and sret fall out without a separate pass.

mod builder;
mod control_flow;
mod expr;
mod function;

use index_vec::IndexVec;
use rustc_hash::FxHashMap;
use rx_compiler_semantic::hir::{FuncId, Program};
use rx_compiler_semantic::types::TypeContext;
use tracing::debug;

use crate::function::plan_signature;
use crate::{FunctionId, MirFunctionSig, MirModule, Place};

pub(crate) use builder::{BreakCollector, ExternalRegistry, LoopFrame, MirBuilder};

/// Value of a lowered expression.
#[derive(Debug, Clone)]
pub enum LowerResult {
    /// A scalar, as a temp or constant
    Operand(crate::Operand),
    /// A memory location holding the value
    Place(Place),
    /// The value was written into the caller-provided destination
    Written,
}

/// Lower a fully analyzed program to MIR.
///
/// Every function with a body (free functions and impl methods) becomes a
/// `MirFunction`; the builtins the program touches become external
/// declarations.
pub fn lower_program(
    program: &Program,
    ctx: &mut TypeContext,
) -> Result<MirModule, String> {
    let mut func_map: FxHashMap<FuncId, FunctionId> = FxHashMap::default();
    let mut order: Vec<FuncId> = Vec::new();
    let mut signatures: IndexVec<FunctionId, MirFunctionSig> = IndexVec::new();

    for (id, function) in program.functions.iter_enumerated() {
        if function.body.is_none() {
            continue;
        }
        let mut params: Vec<(rx_compiler_semantic::types::TypeId, bool)> = Vec::new();
        if let Some(self_local) = function.self_local {
            let local = &function.locals[self_local];
            params.push((local.ty.resolved(), local.mutable));
        }
        for &param in &function.params {
            let local = &function.locals[param];
            params.push((local.ty.resolved(), local.mutable));
        }
        let sig = plan_signature(ctx, &params, function.return_type());
        let mir_id = signatures.push(sig);
        func_map.insert(id, mir_id);
        order.push(id);
    }

    let mut externals = ExternalRegistry::new();
    let mut module = MirModule::new();
    for hir_id in order {
        let mir_id = func_map[&hir_id];
        let func = function::lower_function(
            program,
            ctx,
            &func_map,
            &signatures,
            &mut externals,
            hir_id,
            mir_id,
        )?;
        debug!(name = %func.name, blocks = func.basic_blocks.len(), "lowered function");
        func.validate(ctx)?;
        module.functions.push(func);
    }
    module.external_functions = externals.into_externals();

    Ok(module)
}
