//! # MIR Function
//!
//! A function is a CFG of basic blocks plus its stack slots, temp types and
//! ABI signature. The signature materializes caller-side reality: a leading
//! sret pointer when the return value is indirect, then one ABI parameter
//! per source parameter.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;
use rx_compiler_semantic::types::{TypeContext, TypeId};

use crate::{BasicBlock, BasicBlockId, FunctionId, LocalId, TempId, Terminator};

/// How a function returns its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnDesc {
    /// Unit return; `Return(None)`
    Void,
    /// Scalar returned directly
    Direct(TypeId),
    /// Aggregate written through a caller-provided pointer
    IndirectSRet(TypeId),
    /// The function cannot return
    Never,
}

/// How one ABI-level parameter travels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbiParamKind {
    /// The leading structure-return pointer
    SRet,
    /// Scalar passed by value
    ByVal,
    /// Aggregate the callee may mutate: the caller passes the address of a
    /// copy it made
    ByValCallerCopy,
    /// Aggregate the callee only reads: the caller passes the address of
    /// its own storage
    Ref,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbiParam {
    pub kind: AbiParamKind,
    pub ty: TypeId,
}

/// A function signature at both the source and ABI level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirFunctionSig {
    pub return_desc: ReturnDesc,
    /// Source-level parameter types, in declaration order
    pub params: Vec<TypeId>,
    /// ABI-level parameters: optional sret pointer first, then one entry
    /// per source parameter
    pub abi_params: Vec<AbiParam>,
}

/// Plan the ABI signature for a parameter list and return type.
///
/// `params` carries each parameter's type and whether the callee may
/// mutate it (a `mut` binding), which decides between the caller-copy and
/// borrow conventions for aggregates.
pub fn plan_signature(
    ctx: &TypeContext,
    params: &[(TypeId, bool)],
    return_ty: TypeId,
) -> MirFunctionSig {
    let return_desc = if ctx.is_unit(return_ty) {
        ReturnDesc::Void
    } else if ctx.is_never(return_ty) {
        ReturnDesc::Never
    } else if ctx.is_aggregate(return_ty) {
        ReturnDesc::IndirectSRet(return_ty)
    } else {
        ReturnDesc::Direct(return_ty)
    };

    let mut abi_params = Vec::with_capacity(params.len() + 1);
    if let ReturnDesc::IndirectSRet(ty) = return_desc {
        abi_params.push(AbiParam {
            kind: AbiParamKind::SRet,
            ty,
        });
    }
    for &(ty, mutable) in params {
        let kind = if ctx.is_aggregate(ty) {
            if mutable {
                AbiParamKind::ByValCallerCopy
            } else {
                AbiParamKind::Ref
            }
        } else {
            AbiParamKind::ByVal
        };
        abi_params.push(AbiParam { kind, ty });
    }

    MirFunctionSig {
        return_desc,
        params: params.iter().map(|&(ty, _)| ty).collect(),
        abi_params,
    }
}

/// A stack slot: a named source local, a parameter, or synthesized storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalInfo {
    pub name: String,
    pub ty: TypeId,
    pub is_arg: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirFunction {
    pub id: FunctionId,
    pub name: String,
    pub sig: MirFunctionSig,
    pub locals: IndexVec<LocalId, LocalInfo>,
    /// Parameter slots in ABI order (excluding the sret pointer)
    pub param_locals: Vec<LocalId>,
    /// The local aliased to the sret slot, present iff the return is
    /// indirect. NRVO may alias a source local here.
    pub ret_slot: Option<LocalId>,
    pub temp_types: IndexVec<TempId, TypeId>,
    pub basic_blocks: IndexVec<BasicBlockId, BasicBlock>,
    pub start_block: BasicBlockId,
}

impl MirFunction {
    pub fn new(id: FunctionId, name: String, sig: MirFunctionSig) -> Self {
        let mut basic_blocks = IndexVec::new();
        let start_block = basic_blocks.push(BasicBlock::new());
        Self {
            id,
            name,
            sig,
            locals: IndexVec::new(),
            param_locals: Vec::new(),
            ret_slot: None,
            temp_types: IndexVec::new(),
            basic_blocks,
            start_block,
        }
    }

    pub fn add_block(&mut self) -> BasicBlockId {
        self.basic_blocks.push(BasicBlock::new())
    }

    pub fn block(&self, id: BasicBlockId) -> &BasicBlock {
        &self.basic_blocks[id]
    }

    pub fn block_mut(&mut self, id: BasicBlockId) -> &mut BasicBlock {
        &mut self.basic_blocks[id]
    }

    /// Allocate a scalar temp. Unit and never temps are a bug by invariant.
    pub fn new_temp(&mut self, ctx: &TypeContext, ty: TypeId) -> TempId {
        debug_assert!(
            !ctx.is_unit(ty) && !ctx.is_never(ty),
            "no temp may have unit or never type"
        );
        self.temp_types.push(ty)
    }

    pub fn new_local(&mut self, name: String, ty: TypeId, is_arg: bool) -> LocalId {
        self.locals.push(LocalInfo { name, ty, is_arg })
    }

    /// Blocks reachable from the entry, in DFS order.
    pub fn reachable_blocks(&self) -> Vec<BasicBlockId> {
        let mut visited = vec![false; self.basic_blocks.len()];
        let mut order = Vec::new();
        let mut stack = vec![self.start_block];
        while let Some(block) = stack.pop() {
            if std::mem::replace(&mut visited[block.index()], true) {
                continue;
            }
            order.push(block);
            if let Some(terminator) = self.basic_blocks[block].terminator() {
                stack.extend(terminator.target_blocks());
            }
        }
        order
    }

    /// Structural validation of the invariants the emitter relies on:
    /// every temp defined exactly once, no unit/never temps, every
    /// reachable block terminated with valid targets, and non-void
    /// functions returning a value on every `Return`.
    pub fn validate(&self, ctx: &TypeContext) -> Result<(), String> {
        for (temp, &ty) in self.temp_types.iter_enumerated() {
            if ctx.is_unit(ty) || ctx.is_never(ty) {
                return Err(format!("temp {temp:?} has forbidden type"));
            }
        }

        let mut definitions: FxHashMap<TempId, usize> = FxHashMap::default();
        for block in &self.basic_blocks {
            for phi in &block.phis {
                *definitions.entry(phi.dest).or_default() += 1;
            }
            for statement in &block.statements {
                if let Some(temp) = statement.defined_temp() {
                    *definitions.entry(temp).or_default() += 1;
                }
            }
        }
        for (temp, _) in self.temp_types.iter_enumerated() {
            let count = definitions.get(&temp).copied().unwrap_or(0);
            if count != 1 {
                return Err(format!("temp {temp:?} defined {count} times"));
            }
        }

        for block_id in self.reachable_blocks() {
            let block = self.block(block_id);
            let Some(terminator) = block.terminator() else {
                return Err(format!("reachable block {block_id:?} has no terminator"));
            };
            for target in terminator.target_blocks() {
                if target.index() >= self.basic_blocks.len() {
                    return Err(format!(
                        "block {block_id:?} targets non-existent {target:?}"
                    ));
                }
            }
            if let Terminator::Return { value } = terminator {
                let needs_value = matches!(self.sig.return_desc, ReturnDesc::Direct(_));
                if needs_value != value.is_some() {
                    return Err(format!(
                        "return in {block_id:?} disagrees with the return convention"
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rx_compiler_semantic::types::TypeContext;

    use super::*;

    #[test]
    fn test_abi_plan_scalar() {
        let mut ctx = TypeContext::new();
        let i32_ty = ctx.i32();
        let unit = ctx.unit();
        let sig = plan_signature(&ctx, &[(i32_ty, false)], unit);
        assert_eq!(sig.return_desc, ReturnDesc::Void);
        assert_eq!(sig.abi_params.len(), 1);
        assert_eq!(sig.abi_params[0].kind, AbiParamKind::ByVal);
    }

    #[test]
    fn test_abi_plan_sret_and_aggregate_params() {
        let mut ctx = TypeContext::new();
        let string = ctx.string();
        let i32_ty = ctx.i32();
        let arr = ctx.array(i32_ty, 4);
        let sig = plan_signature(&ctx, &[(arr, false), (arr, true)], string);
        assert_eq!(sig.return_desc, ReturnDesc::IndirectSRet(string));
        assert_eq!(sig.abi_params.len(), 3);
        assert_eq!(sig.abi_params[0].kind, AbiParamKind::SRet);
        assert_eq!(sig.abi_params[1].kind, AbiParamKind::Ref);
        assert_eq!(sig.abi_params[2].kind, AbiParamKind::ByValCallerCopy);
    }

    #[test]
    fn test_validate_catches_double_definition() {
        let mut ctx = TypeContext::new();
        let i32_ty = ctx.i32();
        let unit = ctx.unit();
        let sig = plan_signature(&ctx, &[], unit);
        let mut func = MirFunction::new(FunctionId::new(0), "f".to_string(), sig);
        let temp = func.new_temp(&ctx, i32_ty);
        let start = func.start_block;
        func.block_mut(start).push_statement(crate::Statement::Define {
            temp,
            rvalue: crate::RValue::Use(crate::Operand::int(1, i32_ty)),
        });
        func.block_mut(start).push_statement(crate::Statement::Define {
            temp,
            rvalue: crate::RValue::Use(crate::Operand::int(2, i32_ty)),
        });
        func.block_mut(start)
            .set_terminator(Terminator::Return { value: None });
        assert!(func.validate(&ctx).is_err());
    }
}
