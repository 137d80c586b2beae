//! # Pass 2: Name Resolution
//!
//! Maintains a live scope stack. Every scope is processed in two sub-phases:
//! first all items are collected (items are order-independent within their
//! scope), then statements and expressions are resolved in source order.
//!
//! Besides resolving identifiers to definitions, this pass:
//! - partially resolves named components inside `TypeNode`s so the type
//!   resolver never repeats a scope lookup,
//! - normalizes struct literal field lists into declaration order,
//! - builds the impl table (associated items, trait implementations).

use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};

use crate::hir::*;
use crate::impl_table::{AssocItem, ImplTable, TypeKey};
use crate::scope::{ScopeKind, ScopeStack, TypeDef, ValueDef};
use crate::types::{TypeContext, TypeId};

pub fn run(program: &mut Program, ctx: &TypeContext) -> Result<ImplTable, Diagnostic> {
    let mut resolver = Resolver {
        program,
        ctx,
        scopes: ScopeStack::with_root(),
        impls: ImplTable::new(),
        func_stack: Vec::new(),
    };
    resolver.scopes.push(ScopeKind::Block);
    let items = resolver.program.items.clone();
    resolver.resolve_scope(&items)?;
    Ok(resolver.impls)
}

struct Resolver<'a> {
    program: &'a mut Program,
    ctx: &'a TypeContext,
    scopes: ScopeStack,
    impls: ImplTable,
    /// Innermost function whose body is being resolved; local lookups read
    /// its locals arena
    func_stack: Vec<FuncId>,
}

impl Resolver<'_> {
    /// Process one scope: collect items, register impl headers, resolve the
    /// item interiors.
    fn resolve_scope(&mut self, items: &[ItemRef]) -> Result<(), Diagnostic> {
        self.collect_items(items)?;
        for item in items {
            if let ItemRef::Impl(id) = item {
                self.register_impl_header(*id)?;
            }
        }
        for item in items {
            self.resolve_item_interior(*item)?;
        }
        Ok(())
    }

    /// Sub-phase one: introduce every item of the scope before any
    /// statement is visited.
    fn collect_items(&mut self, items: &[ItemRef]) -> Result<(), Diagnostic> {
        for item in items {
            match *item {
                ItemRef::Function(id) => {
                    let (name, span) = {
                        let func = &self.program.functions[id];
                        (func.name.clone(), func.span)
                    };
                    if !self.scopes.current().define_value(&name, ValueDef::Func(id)) {
                        return Err(Diagnostic::multiple_definition(&name, span));
                    }
                }
                ItemRef::Const(id) => {
                    let (name, span) = {
                        let item = &self.program.consts[id];
                        (item.name.clone(), item.span)
                    };
                    if !self.scopes.current().define_value(&name, ValueDef::Const(id)) {
                        return Err(Diagnostic::multiple_definition(&name, span));
                    }
                }
                ItemRef::Struct(id) => {
                    let (name, span) = {
                        let def = &self.program.structs[id];
                        (def.name.clone(), def.span)
                    };
                    if !self.scopes.current().define_type(&name, TypeDef::Struct(id)) {
                        return Err(Diagnostic::multiple_definition(&name, span));
                    }
                }
                ItemRef::Enum(id) => {
                    let (name, span) = {
                        let def = &self.program.enums[id];
                        (def.name.clone(), def.span)
                    };
                    if !self.scopes.current().define_type(&name, TypeDef::Enum(id)) {
                        return Err(Diagnostic::multiple_definition(&name, span));
                    }
                }
                ItemRef::Trait(id) => {
                    let (name, span) = {
                        let def = &self.program.traits[id];
                        (def.name.clone(), def.span)
                    };
                    if !self.scopes.current().define_trait(&name, id) {
                        return Err(Diagnostic::multiple_definition(&name, span));
                    }
                }
                ItemRef::Impl(_) => {}
            }
        }
        Ok(())
    }

    /// Register an impl block in the impl table: resolve the target type,
    /// add its associated items, and bind the trait reference.
    fn register_impl_header(&mut self, id: ImplId) -> Result<(), Diagnostic> {
        let span = self.program.impls[id].span;
        let mut for_type =
            std::mem::replace(&mut self.program.impls[id].for_type, TypeAnnotation::Resolved(TypeId::INVALID));
        let result = match &mut for_type {
            TypeAnnotation::Unresolved(node) => self.resolve_type_node(node),
            TypeAnnotation::Resolved(_) => Ok(()),
        };
        self.program.impls[id].for_type = for_type;
        result?;

        let key = self.impl_target_key(id, span)?;

        let methods = self.program.impls[id].methods.clone();
        let consts = self.program.impls[id].consts.clone();
        for method in methods {
            let (name, span, is_method) = {
                let func = &self.program.functions[method];
                (func.name.clone(), func.span, func.is_method())
            };
            let item = if is_method {
                AssocItem::Method(method)
            } else {
                AssocItem::Function(method)
            };
            if !self.impls.register_assoc(key, &name, item) {
                return Err(Diagnostic::multiple_definition(&name, span));
            }
        }
        for const_id in consts {
            let (name, span) = {
                let item = &self.program.consts[const_id];
                (item.name.clone(), item.span)
            };
            if !self.impls.register_assoc(key, &name, AssocItem::Const(const_id)) {
                return Err(Diagnostic::multiple_definition(&name, span));
            }
        }

        if self.program.impls[id].trait_ref.is_some() {
            let (trait_name, trait_span) = {
                let trait_ref = self.program.impls[id].trait_ref.as_ref().expect("checked");
                (trait_ref.name.clone(), trait_ref.span)
            };
            let trait_id = self
                .scopes
                .lookup_trait(&trait_name)
                .ok_or_else(|| Diagnostic::undefined_name(&trait_name, trait_span))?;
            self.program.impls[id]
                .trait_ref
                .as_mut()
                .expect("checked")
                .trait_id = Some(trait_id);
            if !self.impls.register_trait_impl(key, trait_id, id) {
                return Err(Diagnostic::error(
                    DiagnosticKind::MultipleDefinition,
                    format!(
                        "conflicting implementations of trait `{trait_name}` for `{}`",
                        key.display(self.ctx)
                    ),
                )
                .with_location(span));
            }

            // Defaulted trait consts become associated items of the target
            // unless the impl overrides them.
            let defaults = self.program.traits[trait_id].consts.clone();
            for const_id in defaults {
                let (name, has_default) = {
                    let item = &self.program.consts[const_id];
                    (item.name.clone(), item.value.is_some())
                };
                if has_default && self.impls.lookup_assoc(key, &name).is_none() {
                    self.impls.register_assoc(key, &name, AssocItem::Const(const_id));
                }
            }
        }

        Ok(())
    }

    /// The impl table key for an impl target that has been partially
    /// resolved. Only nominal types can carry impls.
    fn impl_target_key(&self, id: ImplId, span: Span) -> Result<TypeKey, Diagnostic> {
        let TypeAnnotation::Unresolved(node) = &self.program.impls[id].for_type else {
            return Err(invalid_impl_target(span));
        };
        match node {
            TypeNode::Named {
                res: Some(TypeRes::Struct(sid)),
                ..
            } => Ok(TypeKey::Struct(*sid)),
            TypeNode::Named {
                res: Some(TypeRes::Enum(eid)),
                ..
            } => Ok(TypeKey::Enum(*eid)),
            _ => Err(invalid_impl_target(span)),
        }
    }

    fn resolve_item_interior(&mut self, item: ItemRef) -> Result<(), Diagnostic> {
        match item {
            ItemRef::Function(id) => self.resolve_function(id),
            ItemRef::Const(id) => self.resolve_const(id),
            ItemRef::Struct(id) => self.resolve_struct(id),
            ItemRef::Enum(_) => Ok(()),
            ItemRef::Trait(id) => {
                self.scopes.push(ScopeKind::Trait);
                let methods = self.program.traits[id].methods.clone();
                let consts = self.program.traits[id].consts.clone();
                let mut result = Ok(());
                for method in methods {
                    result = self.resolve_function(method);
                    if result.is_err() {
                        break;
                    }
                }
                if result.is_ok() {
                    for const_id in consts {
                        result = self.resolve_const(const_id);
                        if result.is_err() {
                            break;
                        }
                    }
                }
                self.scopes.pop();
                result
            }
            ItemRef::Impl(id) => {
                self.scopes.push(ScopeKind::Impl);
                let methods = self.program.impls[id].methods.clone();
                let consts = self.program.impls[id].consts.clone();
                let mut result = Ok(());
                for method in methods {
                    result = self.resolve_function(method);
                    if result.is_err() {
                        break;
                    }
                }
                if result.is_ok() {
                    for const_id in consts {
                        result = self.resolve_const(const_id);
                        if result.is_err() {
                            break;
                        }
                    }
                }
                self.scopes.pop();
                result
            }
        }
    }

    fn resolve_struct(&mut self, id: StructDefId) -> Result<(), Diagnostic> {
        let field_count = self.program.structs[id].fields.len();
        for index in 0..field_count {
            let mut ty = std::mem::replace(
                &mut self.program.structs[id].fields[index].ty,
                TypeAnnotation::Resolved(TypeId::INVALID),
            );
            let result = match &mut ty {
                TypeAnnotation::Unresolved(node) => self.resolve_type_node(node),
                TypeAnnotation::Resolved(_) => Ok(()),
            };
            self.program.structs[id].fields[index].ty = ty;
            result?;
        }
        Ok(())
    }

    fn resolve_function(&mut self, id: FuncId) -> Result<(), Diagnostic> {
        self.scopes.push(ScopeKind::Function);
        self.func_stack.push(id);
        let result = self.resolve_function_inner(id);
        self.func_stack.pop();
        self.scopes.pop();
        result
    }

    fn resolve_function_inner(&mut self, id: FuncId) -> Result<(), Diagnostic> {
        // Parameter and receiver annotations resolve in the function scope.
        let local_count = self.program.functions[id].locals.len();
        let param_locals: Vec<LocalId> = {
            let func = &self.program.functions[id];
            func.self_local.into_iter().chain(func.params.iter().copied()).collect()
        };
        debug_assert!(param_locals.len() <= local_count);
        for local in &param_locals {
            self.resolve_local_annotation(id, *local)?;
        }

        let mut return_ty = std::mem::replace(
            &mut self.program.functions[id].return_ty,
            TypeAnnotation::Resolved(TypeId::INVALID),
        );
        let result = match &mut return_ty {
            TypeAnnotation::Unresolved(node) => self.resolve_type_node(node),
            TypeAnnotation::Resolved(_) => Ok(()),
        };
        self.program.functions[id].return_ty = return_ty;
        result?;

        // Introduce the parameters into the function scope.
        if let Some(self_local) = self.program.functions[id].self_local {
            self.scopes
                .current()
                .define_value("self", ValueDef::Local(self_local));
        }
        for index in 0..self.program.functions[id].params.len() {
            let local = self.program.functions[id].params[index];
            let name = self.program.functions[id].locals[local].name.clone();
            self.scopes.current().define_value(&name, ValueDef::Local(local));
        }

        let Some(mut body) = self.program.functions[id].body.take() else {
            return Ok(());
        };
        let result = self.resolve_block(&mut body);
        self.program.functions[id].body = Some(body);
        result
    }

    fn resolve_local_annotation(&mut self, func: FuncId, local: LocalId) -> Result<(), Diagnostic> {
        let mut ty = std::mem::replace(
            &mut self.program.functions[func].locals[local].ty,
            TypeAnnotation::Resolved(TypeId::INVALID),
        );
        let result = match &mut ty {
            TypeAnnotation::Unresolved(node) => self.resolve_type_node(node),
            TypeAnnotation::Resolved(_) => Ok(()),
        };
        self.program.functions[func].locals[local].ty = ty;
        result
    }

    fn resolve_const(&mut self, id: ConstId) -> Result<(), Diagnostic> {
        let mut ty = std::mem::replace(
            &mut self.program.consts[id].ty,
            TypeAnnotation::Resolved(TypeId::INVALID),
        );
        let result = match &mut ty {
            TypeAnnotation::Unresolved(node) => self.resolve_type_node(node),
            TypeAnnotation::Resolved(_) => Ok(()),
        };
        self.program.consts[id].ty = ty;
        result?;

        let Some(mut value) = self.program.consts[id].value.take() else {
            return Ok(());
        };
        let result = self.resolve_expr(&mut value);
        self.program.consts[id].value = Some(value);
        result
    }

    fn resolve_block(&mut self, block: &mut Block) -> Result<(), Diagnostic> {
        self.scopes.push(ScopeKind::Block);
        let result = self.resolve_block_inner(block);
        self.scopes.pop();
        result
    }

    fn resolve_block_inner(&mut self, block: &mut Block) -> Result<(), Diagnostic> {
        let items: Vec<ItemRef> = block
            .stmts
            .iter()
            .filter_map(|stmt| match stmt {
                Stmt::Item(item) => Some(*item),
                _ => None,
            })
            .collect();
        self.resolve_scope(&items)?;

        for stmt in &mut block.stmts {
            match stmt {
                Stmt::Let(let_stmt) => {
                    // The initializer resolves before the binding is
                    // introduced, so `let x = x;` sees the outer `x`.
                    if let Some(init) = &mut let_stmt.init {
                        self.resolve_expr(init)?;
                    }
                    let Some(&func) = self.func_stack.last() else {
                        return Err(Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            "`let` bindings are not allowed in constant expressions",
                        )
                        .with_location(let_stmt.span));
                    };
                    let local = let_stmt.local;
                    self.resolve_local_annotation(func, local)?;
                    let name = self.program.functions[func].locals[local].name.clone();
                    self.scopes.current().define_value(&name, ValueDef::Local(local));
                }
                Stmt::Expr { expr, .. } => self.resolve_expr(expr)?,
                Stmt::Item(_) | Stmt::Empty => {}
            }
        }
        if let Some(tail) = &mut block.tail {
            self.resolve_expr(tail)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_lines)]
    fn resolve_expr(&mut self, expr: &mut Expr) -> Result<(), Diagnostic> {
        let span = expr.span;
        match &mut expr.kind {
            ExprKind::IntLiteral { .. }
            | ExprKind::BoolLiteral(_)
            | ExprKind::CharLiteral(_)
            | ExprKind::StrLiteral(_)
            | ExprKind::Unit
            | ExprKind::Continue { .. } => Ok(()),
            ExprKind::Path(path) => self.resolve_path(path, span),
            ExprKind::Unary { operand, .. } => self.resolve_expr(operand),
            ExprKind::Ref { operand, .. } | ExprKind::Deref { operand, .. } => {
                self.resolve_expr(operand)
            }
            ExprKind::Binary { lhs, rhs, .. } | ExprKind::Assign { lhs, rhs } => {
                self.resolve_expr(lhs)?;
                self.resolve_expr(rhs)
            }
            ExprKind::Cast { operand, target } => {
                self.resolve_expr(operand)?;
                if let TypeAnnotation::Unresolved(node) = target {
                    self.resolve_type_node(node)?;
                }
                Ok(())
            }
            ExprKind::Call { target, args } => {
                match target {
                    CallTarget::Path(path) => self.resolve_path(path, span)?,
                    CallTarget::Expr(callee) => self.resolve_expr(callee)?,
                }
                for arg in args {
                    self.resolve_expr(arg)?;
                }
                Ok(())
            }
            ExprKind::MethodCall { receiver, args, .. } => {
                self.resolve_expr(receiver)?;
                for arg in args {
                    self.resolve_expr(arg)?;
                }
                Ok(())
            }
            ExprKind::Field { base, .. } => self.resolve_expr(base),
            ExprKind::Index { base, index } => {
                self.resolve_expr(base)?;
                self.resolve_expr(index)
            }
            ExprKind::StructLiteral {
                name,
                name_span,
                struct_id,
                fields,
            } => {
                let name = name.clone();
                let name_span = *name_span;
                for field in fields.iter_mut() {
                    self.resolve_expr(&mut field.value)?;
                }
                let def_id = match self.scopes.lookup_type(&name) {
                    Some(TypeDef::Struct(def_id)) => def_id,
                    Some(TypeDef::Enum(_)) => {
                        return Err(Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            format!("`{name}` is an enum, not a struct"),
                        )
                        .with_location(name_span));
                    }
                    Some(TypeDef::String) => {
                        return Err(Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            "`String` cannot be built with a struct literal",
                        )
                        .with_location(name_span));
                    }
                    None => return Err(Diagnostic::undefined_name(&name, name_span)),
                };
                let sid = self.program.structs[def_id].struct_id.ok_or_else(|| {
                    Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!("type `{name}` is not usable here"),
                    )
                    .with_location(name_span)
                })?;
                *struct_id = Some(sid);

                // Normalize the field list into declaration order.
                let decl: Vec<String> = self.program.structs[def_id]
                    .fields
                    .iter()
                    .map(|field| field.name.clone())
                    .collect();
                let mut slots: Vec<Option<FieldInit>> = decl.iter().map(|_| None).collect();
                for field in std::mem::take(fields) {
                    match decl.iter().position(|declared| *declared == field.name) {
                        Some(index) => {
                            if slots[index].is_some() {
                                return Err(Diagnostic::multiple_definition(
                                    &field.name,
                                    field.name_span,
                                ));
                            }
                            slots[index] = Some(field);
                        }
                        None => {
                            return Err(Diagnostic::error(
                                DiagnosticKind::UndefinedName,
                                format!("struct `{name}` has no field named `{}`", field.name),
                            )
                            .with_location(field.name_span));
                        }
                    }
                }
                let mut normalized = Vec::with_capacity(slots.len());
                for (index, slot) in slots.into_iter().enumerate() {
                    match slot {
                        Some(field) => normalized.push(field),
                        None => {
                            return Err(Diagnostic::error(
                                DiagnosticKind::TypeMismatch,
                                format!(
                                    "missing field `{}` in initializer of `{name}`",
                                    decl[index]
                                ),
                            )
                            .with_location(name_span));
                        }
                    }
                }
                *fields = normalized;
                Ok(())
            }
            ExprKind::ArrayLiteral { elements } => {
                for element in elements {
                    self.resolve_expr(element)?;
                }
                Ok(())
            }
            ExprKind::ArrayRepeat { element, count } => {
                self.resolve_expr(element)?;
                self.resolve_expr(count)
            }
            ExprKind::Block(block) => self.resolve_block(block),
            ExprKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_expr(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.resolve_expr(else_branch)?;
                }
                Ok(())
            }
            ExprKind::While {
                condition, body, ..
            } => {
                self.resolve_expr(condition)?;
                self.resolve_expr(body)
            }
            ExprKind::Loop { body, .. } => self.resolve_expr(body),
            ExprKind::Break { value, .. } | ExprKind::Return { value } => {
                if let Some(value) = value {
                    self.resolve_expr(value)?;
                }
                Ok(())
            }
        }
    }

    fn resolve_path(&mut self, path: &mut PathExpr, span: Span) -> Result<(), Diagnostic> {
        if path.segments.len() == 1 {
            let (name, name_span) = (&path.segments[0].0, path.segments[0].1);
            if name == "self" {
                match self.scopes.lookup_value("self") {
                    Some(ValueDef::Local(local)) => {
                        path.res = Res::Local(local);
                        return Ok(());
                    }
                    _ => {
                        return Err(Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            "`self` is only available in methods",
                        )
                        .with_location(name_span));
                    }
                }
            }
            let def = self
                .scopes
                .lookup_value(name)
                .ok_or_else(|| Diagnostic::undefined_name(name, name_span))?;
            path.res = match def {
                ValueDef::Local(local) => Res::Local(local),
                ValueDef::Const(id) => Res::Const(id),
                ValueDef::Func(id) => Res::Func(id),
                ValueDef::Builtin(builtin) => Res::Builtin(builtin),
            };
            return Ok(());
        }

        if path.segments.len() != 2 {
            return Err(Diagnostic::error(
                DiagnosticKind::InvalidType,
                format!("`{}` is not a valid path", path.display()),
            )
            .with_location(span));
        }

        let (head, head_span) = (path.segments[0].0.clone(), path.segments[0].1);
        let (tail, tail_span) = (path.segments[1].0.clone(), path.segments[1].1);
        let head_def = self
            .scopes
            .lookup_type(&head)
            .ok_or_else(|| Diagnostic::undefined_name(&head, head_span))?;
        let key = match head_def {
            TypeDef::Enum(def_id) => {
                let def = &self.program.enums[def_id];
                let index = def
                    .variants
                    .iter()
                    .position(|(variant, _)| *variant == tail)
                    .ok_or_else(|| {
                        Diagnostic::error(
                            DiagnosticKind::UndefinedName,
                            format!("enum `{head}` has no variant named `{tail}`"),
                        )
                        .with_location(tail_span)
                    })?;
                let enum_id = def.enum_id.ok_or_else(|| {
                    Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!("type `{head}` is not usable here"),
                    )
                    .with_location(head_span)
                })?;
                path.res = Res::Variant(enum_id, index);
                return Ok(());
            }
            TypeDef::Struct(def_id) => {
                let sid = self.program.structs[def_id].struct_id.ok_or_else(|| {
                    Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        format!("type `{head}` is not usable here"),
                    )
                    .with_location(head_span)
                })?;
                TypeKey::Struct(sid)
            }
            TypeDef::String => {
                if tail == "from" {
                    path.res = Res::Builtin(crate::builtins::BuiltinFn::StringFrom);
                    return Ok(());
                }
                TypeKey::Struct(self.ctx.string_struct_id())
            }
        };

        match self.impls.lookup_assoc(key, &tail) {
            Some(AssocItem::Function(id) | AssocItem::Method(id)) => {
                path.res = Res::Func(id);
                Ok(())
            }
            Some(AssocItem::Const(id)) => {
                path.res = Res::Const(id);
                Ok(())
            }
            None => Err(Diagnostic::error(
                DiagnosticKind::UndefinedName,
                format!("no associated item named `{tail}` on `{head}`"),
            )
            .with_location(tail_span)),
        }
    }

    /// Partial resolution inside a `TypeNode`: named components get their
    /// definition filled in; `Self` is validated against the scope stack.
    fn resolve_type_node(&mut self, node: &mut TypeNode) -> Result<(), Diagnostic> {
        match node {
            TypeNode::Primitive(_) | TypeNode::Unit => Ok(()),
            TypeNode::SelfTy { span } => {
                if self.scopes.in_impl_or_trait() {
                    Ok(())
                } else {
                    Err(Diagnostic::error(
                        DiagnosticKind::InvalidType,
                        "`Self` is only available in impls and traits",
                    )
                    .with_location(*span))
                }
            }
            TypeNode::Named { name, span, res } => {
                match self.scopes.lookup_type(name) {
                    Some(TypeDef::Struct(def_id)) => {
                        let sid = self.program.structs[def_id].struct_id.ok_or_else(|| {
                            Diagnostic::error(
                                DiagnosticKind::InvalidType,
                                format!("type `{name}` is not usable here"),
                            )
                            .with_location(*span)
                        })?;
                        *res = Some(TypeRes::Struct(sid));
                        Ok(())
                    }
                    Some(TypeDef::Enum(def_id)) => {
                        let eid = self.program.enums[def_id].enum_id.ok_or_else(|| {
                            Diagnostic::error(
                                DiagnosticKind::InvalidType,
                                format!("type `{name}` is not usable here"),
                            )
                            .with_location(*span)
                        })?;
                        *res = Some(TypeRes::Enum(eid));
                        Ok(())
                    }
                    Some(TypeDef::String) => {
                        *res = Some(TypeRes::Struct(self.ctx.string_struct_id()));
                        Ok(())
                    }
                    None => Err(Diagnostic::undefined_name(name, *span)),
                }
            }
            TypeNode::Ref { target, .. } => self.resolve_type_node(target),
            TypeNode::Array { element, length } => {
                self.resolve_type_node(element)?;
                self.resolve_expr(length)
            }
        }
    }
}

fn invalid_impl_target(span: Span) -> Diagnostic {
    Diagnostic::error(
        DiagnosticKind::InvalidType,
        "impl blocks require a struct or enum target",
    )
    .with_location(span)
}
