//! # MIR Basic Block
//!
//! A straight-line statement sequence with one entry, phi nodes at the
//! head, and exactly one terminator at the end. A block is never appended
//! to after it has been terminated.

use crate::{PhiNode, Statement, Terminator};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BasicBlock {
    /// Phi nodes conceptually executing on entry
    pub phis: Vec<PhiNode>,
    pub statements: Vec<Statement>,
    /// `None` only while the block is still under construction
    pub terminator: Option<Terminator>,
}

impl BasicBlock {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn is_terminated(&self) -> bool {
        self.terminator.is_some()
    }

    pub fn push_statement(&mut self, statement: Statement) {
        debug_assert!(
            !self.is_terminated(),
            "statement appended to a terminated block"
        );
        self.statements.push(statement);
    }

    pub fn set_terminator(&mut self, terminator: Terminator) {
        debug_assert!(!self.is_terminated(), "block terminated twice");
        self.terminator = Some(terminator);
    }

    pub fn push_phi(&mut self, phi: PhiNode) {
        self.phis.push(phi);
    }

    pub fn terminator(&self) -> Option<&Terminator> {
        self.terminator.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BasicBlockId, Terminator};

    #[test]
    fn test_terminator_lifecycle() {
        let mut block = BasicBlock::new();
        assert!(!block.is_terminated());
        block.set_terminator(Terminator::goto(BasicBlockId::new(0)));
        assert!(block.is_terminated());
    }

    #[test]
    #[should_panic(expected = "terminated twice")]
    #[cfg(debug_assertions)]
    fn test_double_termination_panics() {
        let mut block = BasicBlock::new();
        block.set_terminator(Terminator::Unreachable);
        block.set_terminator(Terminator::Unreachable);
    }
}
