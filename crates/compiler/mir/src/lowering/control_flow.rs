//! # Control-Flow Lowering
//!
//! Branches, loops and jumps. Shapes:
//!
//! - `if` gets `then`/`else`/`join` blocks; a needed value either writes
//!   the caller's destination from both arms or merges through a phi.
//! - loops get `header`/`body`/`exit`; `break` jumps to `exit`, feeding the
//!   loop's break collector, `continue` jumps to `header`.
//! - `&&`/`||` lower as an `if` over the right-hand side.
//!
//! `current_block` goes `None` whenever a path cannot continue; unreachable
//! join/exit blocks are sealed with `Unreachable`.

use rx_compiler_parser::parser::BinaryOp;
use rx_compiler_semantic::hir::{Expr, LoopId};
use rx_compiler_semantic::types::TypeId;

use crate::function::ReturnDesc;
use crate::{BasicBlockId, Operand, PhiNode, Place, RValue, TempId, Terminator};

use super::{BreakCollector, LoopFrame, LowerResult, MirBuilder};

/// How an `if` delivers its value.
enum IfMode {
    /// Both arms write this place; `true` when it was synthesized here
    Dest(Place, bool),
    /// Scalar value merged by a phi at the join
    Phi,
    /// Unit or diverging: evaluate for effect only
    Effect,
}

impl MirBuilder<'_> {
    pub(super) fn lower_if(
        &mut self,
        expr: &Expr,
        condition: &Expr,
        then_branch: &Expr,
        else_branch: Option<&Expr>,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        let ty = expr.ty();
        let Some(cond) = self.lower_to_operand(condition)? else {
            return Ok(None);
        };
        let then_bb = self.add_block();
        let else_bb = self.add_block();
        let join = self.add_block();
        self.terminate(Terminator::if_else(cond, then_bb, else_bb));

        let mode = if self.ctx.is_aggregate(ty) {
            match dest {
                Some(place) => IfMode::Dest(place.clone(), false),
                None => {
                    let local = self.new_synth_local(ty);
                    IfMode::Dest(Place::local(local), true)
                }
            }
        } else if self.ctx.is_unit(ty) || self.ctx.is_never(ty) {
            IfMode::Effect
        } else {
            match dest {
                Some(place) => IfMode::Dest(place.clone(), false),
                None => IfMode::Phi,
            }
        };

        let mut incoming: Vec<(BasicBlockId, TempId)> = Vec::new();

        self.switch_to(then_bb);
        let then_reached = self.lower_if_arm(then_branch, &mode, ty, &mut incoming)?;
        if then_reached {
            self.terminate(Terminator::goto(join));
        }

        self.switch_to(else_bb);
        let else_reached = match else_branch {
            Some(else_branch) => {
                let reached = self.lower_if_arm(else_branch, &mode, ty, &mut incoming)?;
                if reached {
                    self.terminate(Terminator::goto(join));
                }
                reached
            }
            None => {
                // No else: the skip path falls straight through.
                self.terminate(Terminator::goto(join));
                true
            }
        };

        if !then_reached && !else_reached {
            self.seal_unreachable(join);
            return Ok(None);
        }
        self.switch_to(join);

        match mode {
            IfMode::Dest(place, synthesized) => Ok(Some(if synthesized {
                LowerResult::Place(place)
            } else {
                LowerResult::Written
            })),
            IfMode::Phi => {
                let temp = self.new_temp(ty);
                self.func.block_mut(join).push_phi(PhiNode {
                    dest: temp,
                    ty,
                    incoming,
                });
                Ok(Some(LowerResult::Operand(Operand::Temp(temp))))
            }
            IfMode::Effect => Ok(Some(self.finish_unit(dest))),
        }
    }

    /// Lower one arm; `true` if it can reach the join.
    fn lower_if_arm(
        &mut self,
        arm: &Expr,
        mode: &IfMode,
        ty: TypeId,
        incoming: &mut Vec<(BasicBlockId, TempId)>,
    ) -> Result<bool, String> {
        match mode {
            IfMode::Dest(place, _) => {
                let place = place.clone();
                Ok(self.lower_into(arm, &place)?.is_some())
            }
            IfMode::Phi => match self.lower_to_operand(arm)? {
                Some(operand) => {
                    let temp = self.operand_to_temp(operand, ty);
                    let pred = self.current_block.expect("arm still open");
                    incoming.push((pred, temp));
                    Ok(true)
                }
                None => Ok(false),
            },
            IfMode::Effect => Ok(self.lower_expr(arm, None)?.is_some()),
        }
    }

    pub(super) fn lower_short_circuit(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        let bool_ty = self.ctx.bool();
        let Some(first) = self.lower_to_operand(lhs)? else {
            return Ok(None);
        };
        let rhs_bb = self.add_block();
        let short_bb = self.add_block();
        let join = self.add_block();
        match op {
            // `a && b`: false short-circuits; `a || b`: true does.
            BinaryOp::And => self.terminate(Terminator::if_else(first, rhs_bb, short_bb)),
            BinaryOp::Or => self.terminate(Terminator::if_else(first, short_bb, rhs_bb)),
            _ => return Err("not a short-circuit operator".to_string()),
        }

        let mut incoming: Vec<(BasicBlockId, TempId)> = Vec::new();

        self.switch_to(rhs_bb);
        if let Some(operand) = self.lower_to_operand(rhs)? {
            let temp = self.operand_to_temp(operand, bool_ty);
            let pred = self.current_block.expect("rhs still open");
            incoming.push((pred, temp));
            self.terminate(Terminator::goto(join));
        }

        self.switch_to(short_bb);
        let short_value = matches!(op, BinaryOp::Or);
        let temp = self.define(RValue::Use(Operand::bool(short_value)), bool_ty);
        let pred = self.current_block.expect("short side is open");
        incoming.push((pred, temp));
        self.terminate(Terminator::goto(join));

        self.switch_to(join);
        let result = self.new_temp(bool_ty);
        self.func.block_mut(join).push_phi(PhiNode {
            dest: result,
            ty: bool_ty,
            incoming,
        });
        Ok(Some(self.finish_operand(Operand::Temp(result), bool_ty, dest)))
    }

    pub(super) fn lower_while(
        &mut self,
        expr: &Expr,
        loop_id: LoopId,
        condition: &Expr,
        body: &Expr,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        let falls_through = expr.info().endpoints.normal;
        let header = self.add_block();
        self.terminate(Terminator::goto(header));
        self.switch_to(header);
        let body_bb = self.add_block();
        let exit = self.add_block();

        // The condition belongs to the loop: breaks inside it target us.
        self.loop_stack.push(LoopFrame {
            id: loop_id,
            continue_target: header,
            break_target: exit,
            collector: BreakCollector::None,
        });
        match self.lower_to_operand(condition)? {
            Some(cond) => {
                self.terminate(Terminator::if_else(cond, body_bb, exit));
                self.switch_to(body_bb);
                if self.lower_expr(body, None)?.is_some() {
                    self.terminate(Terminator::goto(header));
                }
            }
            None => self.seal_unreachable(body_bb),
        }
        self.loop_stack.pop();

        if falls_through {
            self.switch_to(exit);
            Ok(Some(self.finish_unit(dest)))
        } else {
            self.seal_unreachable(exit);
            Ok(None)
        }
    }

    pub(super) fn lower_loop(
        &mut self,
        expr: &Expr,
        loop_id: LoopId,
        body: &Expr,
        dest: Option<&Place>,
    ) -> Result<Option<LowerResult>, String> {
        let ty = expr.ty();
        let falls_through = expr.info().endpoints.normal;
        let header = self.add_block();
        self.terminate(Terminator::goto(header));
        self.switch_to(header);
        let exit = self.add_block();

        let collector = if self.ctx.is_unit(ty) || self.ctx.is_never(ty) {
            BreakCollector::None
        } else if self.ctx.is_aggregate(ty) {
            let place = match dest {
                Some(place) => place.clone(),
                None => Place::local(self.new_synth_local(ty)),
            };
            BreakCollector::Place(place)
        } else {
            BreakCollector::Phi {
                ty,
                incoming: Vec::new(),
            }
        };
        self.loop_stack.push(LoopFrame {
            id: loop_id,
            continue_target: header,
            break_target: exit,
            collector,
        });
        if self.lower_expr(body, None)?.is_some() {
            self.terminate(Terminator::goto(header));
        }
        let frame = self.loop_stack.pop().expect("pushed above");

        if falls_through {
            self.switch_to(exit);
            match frame.collector {
                BreakCollector::None => Ok(Some(self.finish_unit(dest))),
                BreakCollector::Place(place) => Ok(Some(if dest.is_some() {
                    LowerResult::Written
                } else {
                    LowerResult::Place(place)
                })),
                BreakCollector::Phi { ty, incoming, .. } => {
                    let temp = self.new_temp(ty);
                    self.func.block_mut(exit).push_phi(PhiNode {
                        dest: temp,
                        ty,
                        incoming,
                    });
                    Ok(Some(self.finish_operand(Operand::Temp(temp), ty, dest)))
                }
            }
        } else {
            self.seal_unreachable(exit);
            Ok(None)
        }
    }

    pub(super) fn lower_break(
        &mut self,
        value: Option<&Expr>,
        target: LoopId,
    ) -> Result<Option<LowerResult>, String> {
        let index = self
            .loop_stack
            .iter()
            .rposition(|frame| frame.id == target)
            .ok_or("break targets a loop that is not on the stack")?;

        enum Sink {
            Nothing,
            Place(Place),
            Phi(TypeId),
        }
        let sink = match &self.loop_stack[index].collector {
            BreakCollector::None => Sink::Nothing,
            BreakCollector::Place(place) => Sink::Place(place.clone()),
            BreakCollector::Phi { ty, .. } => Sink::Phi(*ty),
        };

        match sink {
            Sink::Place(place) => {
                let value = value.ok_or("aggregate loop break carries no value")?;
                if self.lower_into(value, &place)?.is_none() {
                    return Ok(None);
                }
            }
            Sink::Phi(ty) => {
                let value = value.ok_or("scalar loop break carries no value")?;
                let Some(operand) = self.lower_to_operand(value)? else {
                    return Ok(None);
                };
                let temp = self.operand_to_temp(operand, ty);
                let pred = self.current_block.expect("break site is open");
                if let BreakCollector::Phi { incoming, .. } =
                    &mut self.loop_stack[index].collector
                {
                    incoming.push((pred, temp));
                }
            }
            Sink::Nothing => {
                if let Some(value) = value {
                    if self.lower_expr(value, None)?.is_none() {
                        return Ok(None);
                    }
                }
            }
        }

        let break_target = self.loop_stack[index].break_target;
        self.terminate(Terminator::goto(break_target));
        Ok(None)
    }

    pub(super) fn lower_continue(
        &mut self,
        target: LoopId,
    ) -> Result<Option<LowerResult>, String> {
        let frame = self
            .loop_stack
            .iter()
            .rev()
            .find(|frame| frame.id == target)
            .ok_or("continue targets a loop that is not on the stack")?;
        let continue_target = frame.continue_target;
        self.terminate(Terminator::goto(continue_target));
        Ok(None)
    }

    pub(super) fn lower_return(
        &mut self,
        value: Option<&Expr>,
    ) -> Result<Option<LowerResult>, String> {
        match self.func.sig.return_desc {
            ReturnDesc::IndirectSRet(_) => {
                let slot = Place::local(self.func.ret_slot.expect("sret functions have a slot"));
                if let Some(value) = value {
                    if self.is_ret_slot_local(value) {
                        // NRVO: the value already lives in the return slot.
                    } else if self.lower_into(value, &slot)?.is_none() {
                        return Ok(None);
                    }
                }
                self.terminate(Terminator::Return { value: None });
            }
            ReturnDesc::Direct(_) => {
                let value = value.ok_or("non-unit function returns without a value")?;
                let Some(operand) = self.lower_to_operand(value)? else {
                    return Ok(None);
                };
                self.terminate(Terminator::Return {
                    value: Some(operand),
                });
            }
            ReturnDesc::Void | ReturnDesc::Never => {
                if let Some(value) = value {
                    if self.lower_expr(value, None)?.is_none() {
                        return Ok(None);
                    }
                }
                self.terminate(Terminator::Return { value: None });
            }
        }
        Ok(None)
    }
}
