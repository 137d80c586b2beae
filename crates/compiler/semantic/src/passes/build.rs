//! # Pass 0: HIR Builder
//!
//! Mechanical translation of the AST into skeletal HIR. Every refinement
//! union starts in its unresolved state; no semantic checking happens here.
//! The only errors are structural ones the grammar cannot express: a `self`
//! parameter outside an impl or trait, a misplaced or missing body, a
//! missing const value.

use index_vec::IndexVec;
use rx_compiler_diagnostics::{Diagnostic, DiagnosticKind};
use rx_compiler_parser::parser as ast;
use rx_compiler_parser::parser::Spanned;

use crate::hir::*;
use crate::types::Primitive;

/// Build the HIR for a parsed compilation unit.
pub fn run(ast: &ast::ParsedProgram) -> Result<Program, Diagnostic> {
    let mut builder = HirBuilder {
        program: Program::new(),
    };
    let mut items = Vec::with_capacity(ast.items.len());
    for item in &ast.items {
        items.push(builder.build_item(item, FuncOwner::Free)?);
    }
    builder.program.items = items;
    Ok(builder.program)
}

struct HirBuilder {
    program: Program,
}

/// Per-body state: the locals arena under construction and the loop counter.
struct BodyCtx {
    locals: IndexVec<LocalId, Local>,
    loop_counter: u32,
}

impl BodyCtx {
    fn new() -> Self {
        Self {
            locals: IndexVec::new(),
            loop_counter: 0,
        }
    }

    fn next_loop(&mut self) -> LoopId {
        let id = LoopId(self.loop_counter);
        self.loop_counter += 1;
        id
    }
}

impl HirBuilder {
    fn build_item(&mut self, item: &ast::Item, owner: FuncOwner) -> Result<ItemRef, Diagnostic> {
        match item {
            ast::Item::Function(def) => Ok(ItemRef::Function(self.build_function(def, owner)?)),
            ast::Item::Struct(def) => Ok(ItemRef::Struct(self.build_struct(def)?)),
            ast::Item::Enum(def) => Ok(ItemRef::Enum(self.build_enum(def))),
            ast::Item::Const(def) => Ok(ItemRef::Const(self.build_const(def, owner)?)),
            ast::Item::Trait(def) => Ok(ItemRef::Trait(self.build_trait(def)?)),
            ast::Item::Impl(def) => Ok(ItemRef::Impl(self.build_impl(def)?)),
        }
    }

    fn build_function(
        &mut self,
        def: &Spanned<ast::FunctionDef>,
        owner: FuncOwner,
    ) -> Result<FuncId, Diagnostic> {
        let span = def.span();
        let def = def.value();
        let mut cx = BodyCtx::new();

        let mut self_kind = None;
        let mut self_local = None;
        let mut params = Vec::new();
        for (index, param) in def.params.iter().enumerate() {
            match param {
                ast::FnParam::SelfParam(self_param) => {
                    if index != 0 {
                        return Err(Diagnostic::syntax_error(
                            "`self` must be the first parameter".to_string(),
                            self_param.span(),
                        ));
                    }
                    if matches!(owner, FuncOwner::Free) {
                        return Err(Diagnostic::error(
                            DiagnosticKind::InvalidType,
                            "`self` parameter outside of an impl or trait",
                        )
                        .with_location(self_param.span()));
                    }
                    let (kind, ty) = match *self_param.value() {
                        ast::SelfParam::Value { mutable } => (
                            SelfKind::Value { mutable },
                            TypeNode::SelfTy {
                                span: self_param.span(),
                            },
                        ),
                        ast::SelfParam::Reference { mutable } => (
                            SelfKind::Ref { mutable },
                            TypeNode::Ref {
                                mutable,
                                target: Box::new(TypeNode::SelfTy {
                                    span: self_param.span(),
                                }),
                            },
                        ),
                    };
                    let binding_mutable = matches!(kind, SelfKind::Value { mutable: true });
                    self_kind = Some(kind);
                    self_local = Some(cx.locals.push(Local {
                        name: "self".to_string(),
                        mutable: binding_mutable,
                        ty: TypeAnnotation::Unresolved(ty),
                        span: self_param.span(),
                    }));
                }
                ast::FnParam::Normal(param) => {
                    let local = cx.locals.push(Local {
                        name: param.name.value().clone(),
                        mutable: param.mutable,
                        ty: TypeAnnotation::Unresolved(self.build_type(&param.type_expr)?),
                        span: param.name.span(),
                    });
                    params.push(local);
                }
            }
        }

        let return_ty = match &def.return_type {
            Some(ty) => TypeAnnotation::Unresolved(self.build_type(ty)?),
            None => TypeAnnotation::Unresolved(TypeNode::Unit),
        };

        let body = match (&def.body, owner) {
            (Some(body), FuncOwner::Trait(_)) => {
                return Err(Diagnostic::syntax_error(
                    "trait methods cannot have a body".to_string(),
                    body.span(),
                ));
            }
            (Some(body), _) => Some(self.build_block_expr(body, &mut cx)?),
            (None, FuncOwner::Trait(_)) => None,
            (None, _) => {
                return Err(Diagnostic::syntax_error(
                    format!("function `{}` must have a body", def.name.value()),
                    def.name.span(),
                ));
            }
        };
        let body = match body {
            Some(expr) => match expr.kind {
                ExprKind::Block(block) => Some(block),
                _ => unreachable!("function bodies parse as blocks"),
            },
            None => None,
        };

        Ok(self.program.functions.push(Function {
            name: def.name.value().clone(),
            span,
            owner,
            self_kind,
            self_local,
            params,
            locals: cx.locals,
            return_ty,
            body,
        }))
    }

    fn build_struct(&mut self, def: &Spanned<ast::StructDef>) -> Result<StructDefId, Diagnostic> {
        let span = def.span();
        let def = def.value();
        let mut fields = Vec::with_capacity(def.fields.len());
        for (name, ty) in &def.fields {
            fields.push(FieldDef {
                name: name.value().clone(),
                span: name.span(),
                ty: TypeAnnotation::Unresolved(self.build_type(ty)?),
            });
        }
        Ok(self.program.structs.push(StructDef {
            name: def.name.value().clone(),
            span,
            fields,
            struct_id: None,
        }))
    }

    fn build_enum(&mut self, def: &Spanned<ast::EnumDef>) -> EnumDefId {
        let span = def.span();
        let def = def.value();
        let variants = def
            .variants
            .iter()
            .map(|variant| (variant.value().clone(), variant.span()))
            .collect();
        self.program.enums.push(EnumDef {
            name: def.name.value().clone(),
            span,
            variants,
            enum_id: None,
        })
    }

    fn build_const(
        &mut self,
        def: &Spanned<ast::ConstDef>,
        owner: FuncOwner,
    ) -> Result<ConstId, Diagnostic> {
        let span = def.span();
        let def = def.value();
        let value = match (&def.value, owner) {
            (Some(value), _) => {
                // Const initializers have no locals arena of their own; any
                // binding inside one is rejected during resolution.
                let mut throwaway = BodyCtx::new();
                Some(self.build_expr(value, &mut throwaway)?)
            }
            (None, FuncOwner::Trait(_)) => None,
            (None, _) => {
                return Err(Diagnostic::syntax_error(
                    format!("constant `{}` must have a value", def.name.value()),
                    def.name.span(),
                ));
            }
        };
        Ok(self.program.consts.push(ConstItem {
            name: def.name.value().clone(),
            span,
            owner,
            ty: TypeAnnotation::Unresolved(self.build_type(&def.ty)?),
            value,
            computed: None,
        }))
    }

    fn build_trait(&mut self, def: &Spanned<ast::TraitDef>) -> Result<TraitId, Diagnostic> {
        let span = def.span();
        // Reserve the ID so member functions can name their owner.
        let trait_id = self.program.traits.push(TraitDef {
            name: def.value().name.value().clone(),
            span,
            methods: Vec::new(),
            consts: Vec::new(),
        });
        let mut methods = Vec::new();
        let mut consts = Vec::new();
        for item in &def.value().items {
            match item {
                ast::Item::Function(f) => {
                    methods.push(self.build_function(f, FuncOwner::Trait(trait_id))?);
                }
                ast::Item::Const(c) => {
                    consts.push(self.build_const(c, FuncOwner::Trait(trait_id))?);
                }
                _ => unreachable!("the grammar restricts trait items"),
            }
        }
        self.program.traits[trait_id].methods = methods;
        self.program.traits[trait_id].consts = consts;
        Ok(trait_id)
    }

    fn build_impl(&mut self, def: &Spanned<ast::ImplDef>) -> Result<ImplId, Diagnostic> {
        let span = def.span();
        let impl_id = self.program.impls.push(ImplBlock {
            span,
            for_type: TypeAnnotation::Unresolved(self.build_type(&def.value().for_type)?),
            trait_ref: def.value().trait_name.as_ref().map(|name| TraitRef {
                name: name.value().clone(),
                span: name.span(),
                trait_id: None,
            }),
            methods: Vec::new(),
            consts: Vec::new(),
        });
        let mut methods = Vec::new();
        let mut consts = Vec::new();
        for item in &def.value().items {
            match item {
                ast::Item::Function(f) => {
                    methods.push(self.build_function(f, FuncOwner::Impl(impl_id))?);
                }
                ast::Item::Const(c) => {
                    consts.push(self.build_const(c, FuncOwner::Impl(impl_id))?);
                }
                _ => unreachable!("the grammar restricts impl items"),
            }
        }
        self.program.impls[impl_id].methods = methods;
        self.program.impls[impl_id].consts = consts;
        Ok(impl_id)
    }

    fn build_block(
        &mut self,
        block: &ast::Block,
        span: Span,
        cx: &mut BodyCtx,
    ) -> Result<Block, Diagnostic> {
        let mut stmts = Vec::with_capacity(block.statements.len());
        for stmt in &block.statements {
            stmts.push(self.build_stmt(stmt, cx)?);
        }
        let tail = match &block.tail {
            Some(expr) => Some(Box::new(self.build_expr(expr, cx)?)),
            None => None,
        };
        Ok(Block { stmts, tail, span })
    }

    fn build_stmt(
        &mut self,
        stmt: &Spanned<ast::Statement>,
        cx: &mut BodyCtx,
    ) -> Result<Stmt, Diagnostic> {
        match stmt.value() {
            ast::Statement::Let {
                name,
                mutable,
                ty,
                value,
            } => {
                let init = match value {
                    Some(value) => Some(self.build_expr(value, cx)?),
                    None => None,
                };
                let local = cx.locals.push(Local {
                    name: name.value().clone(),
                    mutable: *mutable,
                    ty: TypeAnnotation::Unresolved(self.build_type(ty)?),
                    span: name.span(),
                });
                Ok(Stmt::Let(LetStmt {
                    local,
                    init,
                    span: stmt.span(),
                }))
            }
            ast::Statement::Expression {
                expr,
                has_semicolon,
            } => Ok(Stmt::Expr {
                expr: self.build_expr(expr, cx)?,
                has_semicolon: *has_semicolon,
            }),
            ast::Statement::Item(item) => {
                Ok(Stmt::Item(self.build_item(item, FuncOwner::Free)?))
            }
            ast::Statement::Empty => Ok(Stmt::Empty),
        }
    }

    /// Build an expression that is syntactically a block.
    fn build_block_expr(
        &mut self,
        expr: &Spanned<ast::Expression>,
        cx: &mut BodyCtx,
    ) -> Result<Expr, Diagnostic> {
        self.build_expr(expr, cx)
    }

    #[allow(clippy::too_many_lines)]
    fn build_expr(
        &mut self,
        expr: &Spanned<ast::Expression>,
        cx: &mut BodyCtx,
    ) -> Result<Expr, Diagnostic> {
        let span = expr.span();
        let kind = match expr.value() {
            ast::Expression::Literal(lit) => ExprKind::IntLiteral {
                value: lit.value,
                suffix: lit.suffix,
            },
            ast::Expression::BooleanLiteral(value) => ExprKind::BoolLiteral(*value),
            ast::Expression::CharLiteral(value) => ExprKind::CharLiteral(*value),
            ast::Expression::StringLiteral(value) => ExprKind::StrLiteral(value.clone()),
            ast::Expression::Unit => ExprKind::Unit,
            ast::Expression::Path { segments } => ExprKind::Path(PathExpr {
                segments: segments
                    .iter()
                    .map(|seg| (seg.value().clone(), seg.span()))
                    .collect(),
                res: Res::Unresolved,
            }),
            ast::Expression::SelfValue => ExprKind::Path(PathExpr {
                segments: vec![("self".to_string(), span)],
                res: Res::Unresolved,
            }),
            ast::Expression::Unary { op, expr } => ExprKind::Unary {
                op: *op,
                operand: Box::new(self.build_expr(expr, cx)?),
            },
            ast::Expression::Reference { mutable, expr } => ExprKind::Ref {
                mutable: *mutable,
                operand: Box::new(self.build_expr(expr, cx)?),
                synthetic: false,
            },
            ast::Expression::Deref(expr) => ExprKind::Deref {
                operand: Box::new(self.build_expr(expr, cx)?),
                synthetic: false,
            },
            ast::Expression::Binary { op, left, right } => ExprKind::Binary {
                op: *op,
                lhs: Box::new(self.build_expr(left, cx)?),
                rhs: Box::new(self.build_expr(right, cx)?),
            },
            ast::Expression::Assign { lhs, rhs } => ExprKind::Assign {
                lhs: Box::new(self.build_expr(lhs, cx)?),
                rhs: Box::new(self.build_expr(rhs, cx)?),
            },
            ast::Expression::Cast { expr, target_type } => ExprKind::Cast {
                operand: Box::new(self.build_expr(expr, cx)?),
                target: TypeAnnotation::Unresolved(self.build_type(target_type)?),
            },
            ast::Expression::FunctionCall { callee, args } => {
                let target = match callee.value() {
                    ast::Expression::Path { segments } => CallTarget::Path(PathExpr {
                        segments: segments
                            .iter()
                            .map(|seg| (seg.value().clone(), seg.span()))
                            .collect(),
                        res: Res::Unresolved,
                    }),
                    _ => CallTarget::Expr(Box::new(self.build_expr(callee, cx)?)),
                };
                let args = args
                    .iter()
                    .map(|arg| self.build_expr(arg, cx))
                    .collect::<Result<Vec<_>, _>>()?;
                ExprKind::Call { target, args }
            }
            ast::Expression::MethodCall {
                receiver,
                method,
                args,
            } => ExprKind::MethodCall {
                receiver: Box::new(self.build_expr(receiver, cx)?),
                method: method.value().clone(),
                method_span: method.span(),
                args: args
                    .iter()
                    .map(|arg| self.build_expr(arg, cx))
                    .collect::<Result<Vec<_>, _>>()?,
                target: MethodTarget::Unresolved,
            },
            ast::Expression::MemberAccess { object, field } => ExprKind::Field {
                base: Box::new(self.build_expr(object, cx)?),
                target: FieldTarget::Name(field.value().clone(), field.span()),
            },
            ast::Expression::IndexAccess { array, index } => ExprKind::Index {
                base: Box::new(self.build_expr(array, cx)?),
                index: Box::new(self.build_expr(index, cx)?),
            },
            ast::Expression::StructLiteral { name, fields } => ExprKind::StructLiteral {
                name: name.value().clone(),
                name_span: name.span(),
                struct_id: None,
                fields: fields
                    .iter()
                    .map(|(field_name, value)| {
                        Ok(FieldInit {
                            name: field_name.value().clone(),
                            name_span: field_name.span(),
                            value: self.build_expr(value, cx)?,
                        })
                    })
                    .collect::<Result<Vec<_>, Diagnostic>>()?,
            },
            ast::Expression::ArrayLiteral(elements) => ExprKind::ArrayLiteral {
                elements: elements
                    .iter()
                    .map(|element| self.build_expr(element, cx))
                    .collect::<Result<Vec<_>, _>>()?,
            },
            ast::Expression::ArrayRepeat { element, count } => ExprKind::ArrayRepeat {
                element: Box::new(self.build_expr(element, cx)?),
                count: Box::new(self.build_expr(count, cx)?),
            },
            ast::Expression::Block(block) => {
                ExprKind::Block(self.build_block(block, span, cx)?)
            }
            ast::Expression::If {
                condition,
                then_block,
                else_block,
            } => ExprKind::If {
                condition: Box::new(self.build_expr(condition, cx)?),
                then_branch: Box::new(self.build_expr(then_block, cx)?),
                else_branch: match else_block {
                    Some(else_block) => Some(Box::new(self.build_expr(else_block, cx)?)),
                    None => None,
                },
            },
            ast::Expression::While { condition, body } => {
                let loop_id = cx.next_loop();
                ExprKind::While {
                    loop_id,
                    condition: Box::new(self.build_expr(condition, cx)?),
                    body: Box::new(self.build_expr(body, cx)?),
                }
            }
            ast::Expression::Loop { body } => {
                let loop_id = cx.next_loop();
                ExprKind::Loop {
                    loop_id,
                    body: Box::new(self.build_expr(body, cx)?),
                }
            }
            ast::Expression::Break { value } => ExprKind::Break {
                value: match value {
                    Some(value) => Some(Box::new(self.build_expr(value, cx)?)),
                    None => None,
                },
                target: None,
            },
            ast::Expression::Continue => ExprKind::Continue { target: None },
            ast::Expression::Return { value } => ExprKind::Return {
                value: match value {
                    Some(value) => Some(Box::new(self.build_expr(value, cx)?)),
                    None => None,
                },
            },
        };
        Ok(Expr::new(kind, span))
    }
}

/// Translate a syntactic type into its unresolved `TypeNode`.
impl HirBuilder {
    fn build_type(&mut self, ty: &Spanned<ast::TypeExpr>) -> Result<TypeNode, Diagnostic> {
        Ok(match ty.value() {
            ast::TypeExpr::Named(named) => match named.value() {
                ast::NamedType::I32 => TypeNode::Primitive(Primitive::I32),
                ast::NamedType::U32 => TypeNode::Primitive(Primitive::U32),
                ast::NamedType::Isize => TypeNode::Primitive(Primitive::Isize),
                ast::NamedType::Usize => TypeNode::Primitive(Primitive::Usize),
                ast::NamedType::Bool => TypeNode::Primitive(Primitive::Bool),
                ast::NamedType::Char => TypeNode::Primitive(Primitive::Char),
                ast::NamedType::Str => TypeNode::Primitive(Primitive::Str),
                ast::NamedType::Custom(name) => TypeNode::Named {
                    name: name.clone(),
                    span: named.span(),
                    res: None,
                },
            },
            ast::TypeExpr::Unit => TypeNode::Unit,
            ast::TypeExpr::SelfType => TypeNode::SelfTy { span: ty.span() },
            ast::TypeExpr::Reference { mutable, target } => TypeNode::Ref {
                mutable: *mutable,
                target: Box::new(self.build_type(target)?),
            },
            ast::TypeExpr::Array { element, length } => {
                // Lengths are const expressions; they own no bindings, so a
                // throwaway locals arena suffices. Bindings smuggled into a
                // length are rejected during resolution.
                let mut throwaway = BodyCtx::new();
                TypeNode::Array {
                    element: Box::new(self.build_type(element)?),
                    length: Box::new(self.build_expr(length, &mut throwaway)?),
                }
            }
        })
    }
}
