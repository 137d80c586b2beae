//! # Rx Mid-level Intermediate Representation (MIR)
//!
//! The MIR is an SSA-form control-flow graph consumed by the machine-IR
//! emitter. Its design follows three rules:
//!
//! 1. **Scalar temps, addressed aggregates**: scalars ride in single-
//!    assignment temporaries; structs and arrays are only ever addressed
//!    through [`Place`]s and never become operands.
//! 2. **Explicit control flow**: every block ends in exactly one
//!    terminator; merges carry phi nodes.
//! 3. **Destination passing**: lowering threads a destination place
//!    downward so aggregate initializers write in place, which is what
//!    makes copy elision, NRVO and the sret convention fall out for free.

pub use basic_block::BasicBlock;
pub use function::{AbiParam, AbiParamKind, LocalInfo, MirFunction, MirFunctionSig, ReturnDesc};
pub use lowering::lower_program;
pub use module::{ExternalFunction, MirModule};
pub use place::{Place, PlaceBase, Projection};
pub use statement::{AggregateKind, BinOp, CallDest, Callee, RValue, Statement, UnOp};
pub use terminator::{PhiNode, Terminator};
pub use value::{Constant, Operand};

pub mod basic_block;
pub mod function;
pub mod lowering;
pub mod module;
pub mod place;
pub mod pretty;
pub mod statement;
pub mod terminator;
pub mod value;

// --- Core Identifiers ---

index_vec::define_index_type! {
    /// Unique identifier for a function within a MIR module
    pub struct FunctionId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for an external (runtime) function in a module
    pub struct ExternalId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for a basic block within a function
    pub struct BasicBlockId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for a scalar temporary within a function.
    /// Single-assignment: each temp is defined by exactly one statement.
    pub struct TempId = usize;
}

index_vec::define_index_type! {
    /// Unique identifier for a stack slot (named local or synthesized
    /// temporary storage) within a function
    pub struct LocalId = usize;
}

// --- Pretty Printing Support ---

/// Trait for pretty-printing MIR constructs
pub trait PrettyPrint {
    fn pretty_print(&self, indent: usize) -> String;
}

pub(crate) fn indent_str(level: usize) -> String {
    "  ".repeat(level)
}
