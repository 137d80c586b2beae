//! # MirBuilder
//!
//! The stateful builder for one function's MIR: the current block cursor,
//! the loop stack, and the shared emission helpers the expression and
//! control-flow lowering build on. `current_block` is `None` exactly when
//! the path being lowered is unreachable.

use index_vec::IndexVec;
use rustc_hash::FxHashMap;
use rx_compiler_semantic::hir::{Expr, ExprKind, FuncId, Function, LoopId, Program, Res};
use rx_compiler_semantic::hir::LocalId as HirLocalId;
use rx_compiler_semantic::types::{Type, TypeContext, TypeId};

use crate::{
    BasicBlockId, Constant, ExternalFunction, ExternalId, FunctionId, LocalId, MirFunction,
    MirFunctionSig, Operand, Place, RValue, Statement, TempId, Terminator,
};

use super::LowerResult;

/// Where `break value` collects for an enclosing loop.
pub(crate) enum BreakCollector {
    /// The loop produces no value (`while`, unit loops)
    None,
    /// Aggregate destination: breaks write here
    Place(Place),
    /// Scalar loop value realized as a phi in the exit block
    Phi {
        ty: TypeId,
        incoming: Vec<(BasicBlockId, TempId)>,
    },
}

pub(crate) struct LoopFrame {
    pub id: LoopId,
    pub continue_target: BasicBlockId,
    pub break_target: BasicBlockId,
    pub collector: BreakCollector,
}

/// Lazily registered runtime externals, deduplicated by symbol.
pub(crate) struct ExternalRegistry {
    externals: IndexVec<ExternalId, ExternalFunction>,
    by_name: FxHashMap<String, ExternalId>,
}

impl ExternalRegistry {
    pub fn new() -> Self {
        Self {
            externals: IndexVec::new(),
            by_name: FxHashMap::default(),
        }
    }

    pub fn get(&mut self, name: &str, sig: impl FnOnce() -> MirFunctionSig) -> ExternalId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.externals.push(ExternalFunction {
            name: name.to_string(),
            sig: sig(),
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn into_externals(self) -> IndexVec<ExternalId, ExternalFunction> {
        self.externals
    }
}

pub(crate) struct MirBuilder<'a> {
    pub program: &'a Program,
    pub ctx: &'a mut TypeContext,
    pub func_map: &'a FxHashMap<FuncId, FunctionId>,
    pub signatures: &'a IndexVec<FunctionId, MirFunctionSig>,
    pub externals: &'a mut ExternalRegistry,
    pub hir: &'a Function,
    pub func: MirFunction,
    pub current_block: Option<BasicBlockId>,
    pub local_map: FxHashMap<HirLocalId, LocalId>,
    pub loop_stack: Vec<LoopFrame>,
    synth_counter: usize,
}

impl<'a> MirBuilder<'a> {
    pub fn new(
        program: &'a Program,
        ctx: &'a mut TypeContext,
        func_map: &'a FxHashMap<FuncId, FunctionId>,
        signatures: &'a IndexVec<FunctionId, MirFunctionSig>,
        externals: &'a mut ExternalRegistry,
        hir: &'a Function,
        func: MirFunction,
    ) -> Self {
        let start = func.start_block;
        Self {
            program,
            ctx,
            func_map,
            signatures,
            externals,
            hir,
            func,
            current_block: Some(start),
            local_map: FxHashMap::default(),
            loop_stack: Vec::new(),
            synth_counter: 0,
        }
    }

    // --- Block management -------------------------------------------------

    pub fn emit(&mut self, statement: Statement) {
        let block = self
            .current_block
            .expect("statement emitted on an unreachable path");
        self.func.block_mut(block).push_statement(statement);
    }

    /// Terminate the current block; the cursor becomes unreachable.
    pub fn terminate(&mut self, terminator: Terminator) {
        let block = self
            .current_block
            .take()
            .expect("terminator emitted on an unreachable path");
        self.func.block_mut(block).set_terminator(terminator);
    }

    pub fn switch_to(&mut self, block: BasicBlockId) {
        debug_assert!(self.current_block.is_none(), "abandoning an open block");
        self.current_block = Some(block);
    }

    pub fn add_block(&mut self) -> BasicBlockId {
        self.func.add_block()
    }

    /// Seal a block that ended up with no predecessors.
    pub fn seal_unreachable(&mut self, block: BasicBlockId) {
        if !self.func.block(block).is_terminated() {
            self.func.block_mut(block).set_terminator(Terminator::Unreachable);
        }
    }

    // --- Values -----------------------------------------------------------

    pub fn new_temp(&mut self, ty: TypeId) -> TempId {
        self.func.new_temp(self.ctx, ty)
    }

    pub fn define(&mut self, rvalue: RValue, ty: TypeId) -> TempId {
        let temp = self.new_temp(ty);
        self.emit(Statement::Define { temp, rvalue });
        temp
    }

    /// Synthesize an anonymous stack slot, e.g. for a reference to an
    /// rvalue or an sret destination nobody named.
    pub fn new_synth_local(&mut self, ty: TypeId) -> LocalId {
        let name = format!("_t{}", self.synth_counter);
        self.synth_counter += 1;
        self.func.new_local(name, ty, false)
    }

    /// Force an operand into a temp (phi inputs are temps, not constants).
    pub fn operand_to_temp(&mut self, operand: Operand, ty: TypeId) -> TempId {
        match operand {
            Operand::Temp(temp) => temp,
            Operand::Constant(_) => self.define(RValue::Use(operand), ty),
        }
    }

    pub fn const_operand(value: &rx_compiler_semantic::hir::ConstValue, ty: TypeId) -> Operand {
        use rx_compiler_semantic::hir::ConstValue;
        match value {
            ConstValue::Int(v) => Operand::int(*v, ty),
            ConstValue::Bool(v) => Operand::bool(*v),
            ConstValue::Char(v) => Operand::Constant(Constant::Char(*v)),
            ConstValue::Str(v) => Operand::Constant(Constant::Str(v.clone())),
        }
    }

    // --- Result plumbing --------------------------------------------------

    /// Deliver a scalar to the destination, if one was provided.
    pub fn finish_operand(
        &mut self,
        operand: Operand,
        ty: TypeId,
        dest: Option<&Place>,
    ) -> LowerResult {
        match dest {
            Some(place) => {
                if !self.ctx.is_unit(ty) && !self.ctx.is_never(ty) {
                    self.emit(Statement::Assign {
                        place: place.clone(),
                        rvalue: RValue::Use(operand),
                    });
                }
                LowerResult::Written
            }
            None => LowerResult::Operand(operand),
        }
    }

    /// Deliver a place-resident value to the destination, if one was
    /// provided; scalars load through a temp, aggregates copy memberwise.
    pub fn finish_place(
        &mut self,
        place: Place,
        ty: TypeId,
        dest: Option<&Place>,
    ) -> LowerResult {
        match dest {
            Some(target) => {
                if *target != place {
                    self.emit_copy(target, &place, ty);
                }
                LowerResult::Written
            }
            None => LowerResult::Place(place),
        }
    }

    pub fn finish_unit(&self, dest: Option<&Place>) -> LowerResult {
        match dest {
            Some(_) => LowerResult::Written,
            None => LowerResult::Operand(Operand::unit()),
        }
    }

    /// Convert a lowered result to a scalar operand.
    pub fn result_to_operand(
        &mut self,
        result: LowerResult,
        ty: TypeId,
    ) -> Result<Operand, String> {
        match result {
            LowerResult::Operand(operand) => Ok(operand),
            LowerResult::Place(place) => {
                if self.ctx.is_aggregate(ty) {
                    return Err("aggregate value used as an operand".to_string());
                }
                let temp = self.new_temp(ty);
                self.emit(Statement::Load { temp, place });
                Ok(Operand::Temp(temp))
            }
            LowerResult::Written => {
                Err("destination-written value used as an operand".to_string())
            }
        }
    }

    // --- Memberwise copies ------------------------------------------------

    /// Copy a value of the given type between places. Aggregates flatten
    /// into scalar loads and stores; unit is nothing.
    pub fn emit_copy(&mut self, dest: &Place, src: &Place, ty: TypeId) {
        match self.ctx.type_of(ty).clone() {
            Type::Unit | Type::Never => {}
            Type::Struct(sid) => {
                let fields: Vec<TypeId> = self
                    .ctx
                    .struct_info(sid)
                    .fields
                    .iter()
                    .map(|(_, field_ty)| *field_ty)
                    .collect();
                if fields.is_empty() {
                    // Opaque builtin aggregate (String): move as one unit.
                    let temp = self.new_temp(ty);
                    self.emit(Statement::Load {
                        temp,
                        place: src.clone(),
                    });
                    self.emit(Statement::Assign {
                        place: dest.clone(),
                        rvalue: RValue::Use(Operand::Temp(temp)),
                    });
                    return;
                }
                for (index, field_ty) in fields.into_iter().enumerate() {
                    let dest_field = dest.clone().field(index);
                    let src_field = src.clone().field(index);
                    self.emit_copy(&dest_field, &src_field, field_ty);
                }
            }
            Type::Array { element, length } => {
                let usize_ty = self.ctx.usize();
                for index in 0..length {
                    let idx = Operand::int(index as i64, usize_ty);
                    let dest_elem = dest.clone().index(idx.clone());
                    let src_elem = src.clone().index(idx);
                    self.emit_copy(&dest_elem, &src_elem, element);
                }
            }
            _ => {
                let temp = self.new_temp(ty);
                self.emit(Statement::Load {
                    temp,
                    place: src.clone(),
                });
                self.emit(Statement::Assign {
                    place: dest.clone(),
                    rvalue: RValue::Use(Operand::Temp(temp)),
                });
            }
        }
    }

    // --- HIR shorthands ---------------------------------------------------

    pub fn mir_local(&self, local: HirLocalId) -> LocalId {
        self.local_map[&local]
    }

    /// Whether an expression is exactly the local aliased to the sret slot,
    /// making `return local` a no-op.
    pub fn is_ret_slot_local(&self, expr: &Expr) -> bool {
        let Some(ret_slot) = self.func.ret_slot else {
            return false;
        };
        match &expr.kind {
            ExprKind::Path(path) => match path.res {
                Res::Local(local) => self.local_map.get(&local) == Some(&ret_slot),
                _ => false,
            },
            _ => false,
        }
    }
}
