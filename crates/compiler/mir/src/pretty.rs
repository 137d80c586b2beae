//! # Textual MIR
//!
//! The debug rendering of the MIR, and the textual form `ir_pipeline`
//! hands to the external emitter. Temps print as `%n`, stack slots as
//! `_n`, blocks as `bb n`.

use rx_compiler_semantic::types::TypeContext;

use crate::{
    indent_str, AbiParamKind, BasicBlock, CallDest, Callee, Constant, MirFunction, MirModule,
    Operand, Place, PlaceBase, PrettyPrint, Projection, RValue, ReturnDesc, Statement,
    Terminator,
};

impl PrettyPrint for Constant {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Int { value, .. } => value.to_string(),
            Self::Bool(value) => value.to_string(),
            Self::Char(value) => format!("{value:?}"),
            Self::Str(value) => format!("{value:?}"),
            Self::Unit => "()".to_string(),
        }
    }
}

impl PrettyPrint for Operand {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Constant(constant) => constant.pretty_print(0),
            Self::Temp(temp) => format!("%{}", temp.index()),
        }
    }
}

impl PrettyPrint for Place {
    fn pretty_print(&self, _indent: usize) -> String {
        let mut out = match self.base {
            PlaceBase::Local(local) => format!("_{}", local.index()),
            PlaceBase::Temp(temp) => format!("%{}", temp.index()),
        };
        for projection in &self.projections {
            match projection {
                Projection::Field(index) => out.push_str(&format!(".{index}")),
                Projection::Index(operand) => {
                    out.push_str(&format!("[{}]", operand.pretty_print(0)));
                }
                Projection::Deref => out = format!("(*{out})"),
            }
        }
        out
    }
}

impl PrettyPrint for RValue {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Use(operand) => operand.pretty_print(0),
            Self::BinaryOp { op, lhs, rhs } => {
                format!("{op} {}, {}", lhs.pretty_print(0), rhs.pretty_print(0))
            }
            Self::UnaryOp { op, operand } => format!("{op} {}", operand.pretty_print(0)),
            Self::Cast { operand, .. } => format!("cast {}", operand.pretty_print(0)),
            Self::Ref { place, mutable } => {
                let kind = if *mutable { "&mut" } else { "&" };
                format!("{kind} {}", place.pretty_print(0))
            }
            Self::ArrayRepeat { element, count } => {
                format!("repeat {} x {count}", element.pretty_print(0))
            }
            Self::Aggregate { elements, .. } => {
                let parts: Vec<String> =
                    elements.iter().map(|e| e.pretty_print(0)).collect();
                format!("aggregate {{{}}}", parts.join(", "))
            }
        }
    }
}

impl PrettyPrint for Statement {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Define { temp, rvalue } => {
                format!("%{} = {}", temp.index(), rvalue.pretty_print(0))
            }
            Self::Assign { place, rvalue } => {
                format!("{} = {}", place.pretty_print(0), rvalue.pretty_print(0))
            }
            Self::Load { temp, place } => {
                format!("%{} = load {}", temp.index(), place.pretty_print(0))
            }
            Self::Call { target, args, dest } => {
                let callee = match target {
                    Callee::Function(id) => format!("fn{}", id.index()),
                    Callee::External(id) => format!("ext{}", id.index()),
                };
                let args: Vec<String> = args.iter().map(|a| a.pretty_print(0)).collect();
                let call = format!("call {callee}({})", args.join(", "));
                match dest {
                    CallDest::Ignore => call,
                    CallDest::Temp(temp) => format!("%{} = {call}", temp.index()),
                    CallDest::SRet(place) => {
                        format!("{call} sret {}", place.pretty_print(0))
                    }
                }
            }
        }
    }
}

impl PrettyPrint for Terminator {
    fn pretty_print(&self, _indent: usize) -> String {
        match self {
            Self::Goto { target } => format!("goto bb{}", target.index()),
            Self::SwitchInt {
                discr,
                targets,
                otherwise,
            } => {
                let arms: Vec<String> = targets
                    .iter()
                    .map(|(value, block)| format!("{value} -> bb{}", block.index()))
                    .collect();
                format!(
                    "switch {} [{}] otherwise bb{}",
                    discr.pretty_print(0),
                    arms.join(", "),
                    otherwise.index()
                )
            }
            Self::Return { value: Some(value) } => {
                format!("return {}", value.pretty_print(0))
            }
            Self::Return { value: None } => "return".to_string(),
            Self::Unreachable => "unreachable".to_string(),
        }
    }
}

impl PrettyPrint for BasicBlock {
    fn pretty_print(&self, indent: usize) -> String {
        let pad = indent_str(indent);
        let mut out = String::new();
        for phi in &self.phis {
            let incoming: Vec<String> = phi
                .incoming
                .iter()
                .map(|(block, temp)| format!("bb{}: %{}", block.index(), temp.index()))
                .collect();
            out.push_str(&format!(
                "{pad}%{} = phi [{}]\n",
                phi.dest.index(),
                incoming.join(", ")
            ));
        }
        for statement in &self.statements {
            out.push_str(&format!("{pad}{}\n", statement.pretty_print(0)));
        }
        match &self.terminator {
            Some(terminator) => {
                out.push_str(&format!("{pad}{}\n", terminator.pretty_print(0)));
            }
            None => out.push_str(&format!("{pad}<unterminated>\n")),
        }
        out
    }
}

/// Render a full module with type information from the context.
pub fn render_module(module: &MirModule, ctx: &TypeContext) -> String {
    let mut out = String::new();
    for function in &module.functions {
        out.push_str(&render_function(function, ctx));
        out.push('\n');
    }
    out
}

/// Render the external declarations the emitter must provide.
pub fn render_externals(module: &MirModule, ctx: &TypeContext) -> String {
    let mut out = String::new();
    for external in &module.external_functions {
        let params: Vec<String> = external
            .sig
            .abi_params
            .iter()
            .map(|param| {
                let kind = match param.kind {
                    AbiParamKind::SRet => "sret ",
                    AbiParamKind::ByVal => "",
                    AbiParamKind::ByValCallerCopy => "byval ",
                    AbiParamKind::Ref => "ref ",
                };
                format!("{kind}{}", ctx.display(param.ty))
            })
            .collect();
        out.push_str(&format!(
            "declare {}({}) -> {}\n",
            external.name,
            params.join(", "),
            render_return(&external.sig.return_desc, ctx)
        ));
    }
    out
}

pub fn render_function(function: &MirFunction, ctx: &TypeContext) -> String {
    let mut out = String::new();
    let params: Vec<String> = function
        .param_locals
        .iter()
        .map(|&local| {
            let info = &function.locals[local];
            format!("_{}: {}", local.index(), ctx.display(info.ty))
        })
        .collect();
    out.push_str(&format!(
        "fn {}({}) -> {} {{\n",
        function.name,
        params.join(", "),
        render_return(&function.sig.return_desc, ctx)
    ));

    for (local, info) in function.locals.iter_enumerated() {
        if info.is_arg {
            continue;
        }
        let role = if function.ret_slot == Some(local) {
            " // return slot"
        } else {
            ""
        };
        out.push_str(&format!(
            "  let _{}: {};{role}\n",
            local.index(),
            ctx.display(info.ty)
        ));
    }

    for (id, block) in function.basic_blocks.iter_enumerated() {
        let marker = if id == function.start_block { " // entry" } else { "" };
        out.push_str(&format!("bb{}:{marker}\n", id.index()));
        out.push_str(&block.pretty_print(1));
    }
    out.push_str("}\n");
    out
}

fn render_return(desc: &ReturnDesc, ctx: &TypeContext) -> String {
    match desc {
        ReturnDesc::Void => "()".to_string(),
        ReturnDesc::Direct(ty) => ctx.display(*ty),
        ReturnDesc::IndirectSRet(ty) => format!("sret {}", ctx.display(*ty)),
        ReturnDesc::Never => "!".to_string(),
    }
}
