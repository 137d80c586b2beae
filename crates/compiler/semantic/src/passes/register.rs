//! # Pass 1: Skeleton Registration
//!
//! Walks the program top-down and registers every struct and enum in the
//! `TypeContext` with an empty field/variant list, storing the assigned ID
//! on the HIR definition. This is what makes forward references and mutual
//! recursion expressible in later passes. Two type definitions with the same
//! name in the same scope are fatal.

use rustc_hash::FxHashMap;
use rx_compiler_diagnostics::Diagnostic;

use crate::hir::{Block, ConstId, Expr, FuncId, ItemRef, Program, Span, Stmt};
use crate::types::TypeContext;
use crate::visit::HirVisitor;

pub fn run(program: &mut Program, ctx: &mut TypeContext) -> Result<(), Diagnostic> {
    let items = program.items.clone();
    let mut pass = Registrar { program, ctx };
    pass.register_scope(&items)
}

struct Registrar<'a> {
    program: &'a mut Program,
    ctx: &'a mut TypeContext,
}

impl Registrar<'_> {
    /// Register the type definitions of one lexical scope, then recurse into
    /// the bodies that introduce nested scopes.
    fn register_scope(&mut self, items: &[ItemRef]) -> Result<(), Diagnostic> {
        let mut seen: FxHashMap<String, Span> = FxHashMap::default();

        for item in items {
            match *item {
                ItemRef::Struct(id) => {
                    let def = &self.program.structs[id];
                    check_duplicate(&mut seen, &def.name, def.span)?;
                    let struct_id = self.ctx.register_struct(def.name.clone());
                    self.program.structs[id].struct_id = Some(struct_id);
                }
                ItemRef::Enum(id) => {
                    let def = &self.program.enums[id];
                    check_duplicate(&mut seen, &def.name, def.span)?;
                    let enum_id = self.ctx.register_enum(def.name.clone());
                    self.program.enums[id].enum_id = Some(enum_id);
                }
                _ => {}
            }
        }

        for item in items {
            match *item {
                ItemRef::Function(id) => self.register_function(id)?,
                ItemRef::Const(id) => self.register_const(id)?,
                ItemRef::Impl(id) => {
                    let (methods, consts) = {
                        let block = &self.program.impls[id];
                        (block.methods.clone(), block.consts.clone())
                    };
                    for method in methods {
                        self.register_function(method)?;
                    }
                    for const_id in consts {
                        self.register_const(const_id)?;
                    }
                }
                ItemRef::Trait(id) => {
                    let consts = self.program.traits[id].consts.clone();
                    for const_id in consts {
                        self.register_const(const_id)?;
                    }
                }
                ItemRef::Struct(_) | ItemRef::Enum(_) => {}
            }
        }

        Ok(())
    }

    fn register_function(&mut self, id: FuncId) -> Result<(), Diagnostic> {
        // Detach the body so the arenas stay free while we descend.
        let Some(mut body) = self.program.functions[id].body.take() else {
            return Ok(());
        };
        let result = self.register_block(&mut body);
        self.program.functions[id].body = Some(body);
        result
    }

    fn register_const(&mut self, id: ConstId) -> Result<(), Diagnostic> {
        let Some(mut value) = self.program.consts[id].value.take() else {
            return Ok(());
        };
        let result = self.register_expr(&mut value);
        self.program.consts[id].value = Some(value);
        result
    }

    /// Each block is a scope: its items register together, then the
    /// statements are scanned for nested blocks.
    fn register_block(&mut self, block: &mut Block) -> Result<(), Diagnostic> {
        let items: Vec<ItemRef> = block
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Item(item) => Some(*item),
                _ => None,
            })
            .collect();
        self.register_scope(&items)?;

        for stmt in &mut block.stmts {
            match stmt {
                Stmt::Let(let_stmt) => {
                    if let Some(init) = &mut let_stmt.init {
                        self.register_expr(init)?;
                    }
                }
                Stmt::Expr { expr, .. } => self.register_expr(expr)?,
                Stmt::Item(_) | Stmt::Empty => {}
            }
        }
        if let Some(tail) = &mut block.tail {
            self.register_expr(tail)?;
        }
        Ok(())
    }

    fn register_expr(&mut self, expr: &mut Expr) -> Result<(), Diagnostic> {
        struct BlockFinder<'a, 'b> {
            pass: &'a mut Registrar<'b>,
        }
        impl HirVisitor for BlockFinder<'_, '_> {
            fn visit_block(&mut self, block: &mut Block) -> Result<(), Diagnostic> {
                self.pass.register_block(block)
            }
        }
        BlockFinder { pass: self }.visit_expr(expr)
    }
}

fn check_duplicate(
    seen: &mut FxHashMap<String, Span>,
    name: &str,
    span: Span,
) -> Result<(), Diagnostic> {
    if let Some(&first) = seen.get(name) {
        return Err(Diagnostic::multiple_definition(name, span)
            .with_related_span(first, "first definition here".to_string()));
    }
    seen.insert(name.to_string(), span);
    Ok(())
}
