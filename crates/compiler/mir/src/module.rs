//! # MIR Module
//!
//! The unit of lowering: every function of the compilation unit plus the
//! external runtime functions it calls.

use index_vec::IndexVec;

use crate::{ExternalId, FunctionId, MirFunction, MirFunctionSig};

/// A runtime function the emitter must provide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalFunction {
    pub name: String,
    pub sig: MirFunctionSig,
}

#[derive(Debug, Default)]
pub struct MirModule {
    pub functions: IndexVec<FunctionId, MirFunction>,
    pub external_functions: IndexVec<ExternalId, ExternalFunction>,
}

impl MirModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn function_by_name(&self, name: &str) -> Option<&MirFunction> {
        self.functions.iter().find(|func| func.name == name)
    }

    pub fn external_by_name(&self, name: &str) -> Option<ExternalId> {
        self.external_functions
            .iter_enumerated()
            .find(|(_, ext)| ext.name == name)
            .map(|(id, _)| id)
    }
}
