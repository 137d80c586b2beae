//! # MIR Terminators
//!
//! Terminators end basic blocks and are the only way control moves between
//! them. Phi nodes live at block heads and select the incoming temp by
//! predecessor.

use rx_compiler_semantic::types::TypeId;

use crate::{BasicBlockId, Operand, TempId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Terminator {
    /// Unconditional jump
    Goto { target: BasicBlockId },
    /// Multi-way branch on an integer (or bool) discriminant
    SwitchInt {
        discr: Operand,
        targets: Vec<(i64, BasicBlockId)>,
        otherwise: BasicBlockId,
    },
    /// Function return; `None` for void and sret returns
    Return { value: Option<Operand> },
    /// This point is never reached
    Unreachable,
}

impl Terminator {
    pub const fn goto(target: BasicBlockId) -> Self {
        Self::Goto { target }
    }

    /// A two-way branch on a boolean: zero goes to `if_false`, everything
    /// else to `if_true`.
    pub fn if_else(discr: Operand, if_true: BasicBlockId, if_false: BasicBlockId) -> Self {
        Self::SwitchInt {
            discr,
            targets: vec![(0, if_false)],
            otherwise: if_true,
        }
    }

    /// Successor blocks of this terminator.
    pub fn target_blocks(&self) -> Vec<BasicBlockId> {
        match self {
            Self::Goto { target } => vec![*target],
            Self::SwitchInt {
                targets, otherwise, ..
            } => {
                let mut blocks: Vec<BasicBlockId> =
                    targets.iter().map(|(_, block)| *block).collect();
                blocks.push(*otherwise);
                blocks
            }
            Self::Return { .. } | Self::Unreachable => vec![],
        }
    }

    pub const fn is_return(&self) -> bool {
        matches!(self, Self::Return { .. })
    }
}

/// A phi node: selects the temp flowing in from the taken predecessor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiNode {
    pub dest: TempId,
    pub ty: TypeId,
    pub incoming: Vec<(BasicBlockId, TempId)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_if_else_shape() {
        let term = Terminator::if_else(
            Operand::bool(true),
            BasicBlockId::new(1),
            BasicBlockId::new(2),
        );
        assert_eq!(
            term.target_blocks(),
            vec![BasicBlockId::new(2), BasicBlockId::new(1)]
        );
    }

    #[test]
    fn test_return_has_no_targets() {
        assert!(Terminator::Return { value: None }.target_blocks().is_empty());
    }
}
