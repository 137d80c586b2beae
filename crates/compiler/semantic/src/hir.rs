//! # High-Level IR
//!
//! The HIR mirrors the AST structurally, with every "to be refined" field
//! modeled as a tagged union holding its unresolved payload initially and
//! replaced in place by a later pass:
//!
//! - [`TypeAnnotation`]: `Unresolved(TypeNode)` → `Resolved(TypeId)` (pass 4)
//! - [`Res`] on paths: `Unresolved` → definition reference (pass 2)
//! - [`FieldTarget`]: `Name` → `Index` (pass 6)
//! - [`MethodTarget`]: `Unresolved` → method reference (pass 6)
//! - [`ExprInfo`]: absent → present on every expression (pass 6)
//! - Break/continue loop targets: absent → present (pass 7)
//!
//! Bodies, struct/enum/const/trait/impl definitions live in program-level
//! arenas addressed by dense IDs; the item tree holds IDs only, so tree
//! ownership stays acyclic. Every node carries the source span of the AST
//! node it derived from, which is the only back-pointer diagnostics need.

use chumsky::span::SimpleSpan;
use index_vec::IndexVec;

use crate::builtins::{BuiltinFn, BuiltinMethod};
use crate::types::{EnumId, StructId, TypeId};
pub use rx_compiler_parser::lexer::IntSuffix;
pub use rx_compiler_parser::parser::{BinaryOp, UnaryOp};

pub type Span = SimpleSpan<usize>;

index_vec::define_index_type! {
    /// A function or method body in the program arena.
    pub struct FuncId = usize;
}

index_vec::define_index_type! {
    /// A constant item in the program arena.
    pub struct ConstId = usize;
}

index_vec::define_index_type! {
    /// A trait definition in the program arena.
    pub struct TraitId = usize;
}

index_vec::define_index_type! {
    /// An impl block in the program arena.
    pub struct ImplId = usize;
}

index_vec::define_index_type! {
    /// A HIR struct definition (distinct from `StructId`, which addresses
    /// the registered type in the `TypeContext`).
    pub struct StructDefId = usize;
}

index_vec::define_index_type! {
    /// A HIR enum definition.
    pub struct EnumDefId = usize;
}

index_vec::define_index_type! {
    /// A named binding owned by its enclosing function body.
    pub struct LocalId = usize;
}

/// Key identifying a loop expression within its function, used to bind
/// `break`/`continue` to their target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopId(pub u32);

/// The whole compilation unit after HIR building.
#[derive(Debug)]
pub struct Program {
    /// Top-level items in source order
    pub items: Vec<ItemRef>,
    pub functions: IndexVec<FuncId, Function>,
    pub structs: IndexVec<StructDefId, StructDef>,
    pub enums: IndexVec<EnumDefId, EnumDef>,
    pub consts: IndexVec<ConstId, ConstItem>,
    pub traits: IndexVec<TraitId, TraitDef>,
    pub impls: IndexVec<ImplId, ImplBlock>,
}

impl Program {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            functions: IndexVec::new(),
            structs: IndexVec::new(),
            enums: IndexVec::new(),
            consts: IndexVec::new(),
            traits: IndexVec::new(),
            impls: IndexVec::new(),
        }
    }

    /// The top-level `main` function, if defined.
    pub fn main_function(&self) -> Option<FuncId> {
        self.items.iter().find_map(|item| match item {
            ItemRef::Function(id) if self.functions[*id].name == "main" => Some(*id),
            _ => None,
        })
    }
}

impl Default for Program {
    fn default() -> Self {
        Self::new()
    }
}

/// Reference from the item tree into the program arenas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemRef {
    Function(FuncId),
    Struct(StructDefId),
    Enum(EnumDefId),
    Const(ConstId),
    Trait(TraitId),
    Impl(ImplId),
}

/// Who owns a function body: a free item, an impl, or a trait declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuncOwner {
    Free,
    Impl(ImplId),
    Trait(TraitId),
}

/// Receiver shape of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfKind {
    /// `self` / `mut self`
    Value { mutable: bool },
    /// `&self` / `&mut self`
    Ref { mutable: bool },
}

/// A function or method.
#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub span: Span,
    pub owner: FuncOwner,
    /// `Some` makes this a method; the receiver is `locals[self_local]`
    pub self_kind: Option<SelfKind>,
    pub self_local: Option<LocalId>,
    /// Parameter locals in declaration order (excluding the receiver)
    pub params: Vec<LocalId>,
    /// Every binding of the body, including parameters
    pub locals: IndexVec<LocalId, Local>,
    /// Return type; synthesized from `()` when the source omits it
    pub return_ty: TypeAnnotation,
    /// `None` for trait method declarations
    pub body: Option<Block>,
}

impl Function {
    pub fn is_method(&self) -> bool {
        self.self_kind.is_some()
    }

    /// The resolved return type. Valid after pass 4.
    pub fn return_type(&self) -> TypeId {
        self.return_ty.resolved()
    }
}

/// A named binding with its declared mutability and type.
#[derive(Debug)]
pub struct Local {
    pub name: String,
    pub mutable: bool,
    pub ty: TypeAnnotation,
    pub span: Span,
}

/// A struct definition. The registered `StructId` is attached during
/// skeleton registration.
#[derive(Debug)]
pub struct StructDef {
    pub name: String,
    pub span: Span,
    pub fields: Vec<FieldDef>,
    pub struct_id: Option<StructId>,
}

#[derive(Debug)]
pub struct FieldDef {
    pub name: String,
    pub span: Span,
    pub ty: TypeAnnotation,
}

/// An enum definition (unit variants).
#[derive(Debug)]
pub struct EnumDef {
    pub name: String,
    pub span: Span,
    pub variants: Vec<(String, Span)>,
    pub enum_id: Option<EnumId>,
}

/// A constant item. The evaluated value is attached by pass 4; the original
/// expression is preserved alongside it.
#[derive(Debug)]
pub struct ConstItem {
    pub name: String,
    pub span: Span,
    pub owner: FuncOwner,
    pub ty: TypeAnnotation,
    /// `None` only for trait consts without a default
    pub value: Option<Expr>,
    pub computed: Option<ConstValue>,
}

/// A trait definition; `items` reference the function/const arenas.
#[derive(Debug)]
pub struct TraitDef {
    pub name: String,
    pub span: Span,
    pub methods: Vec<FuncId>,
    pub consts: Vec<ConstId>,
}

/// An impl block, inherent or trait.
#[derive(Debug)]
pub struct ImplBlock {
    pub span: Span,
    pub for_type: TypeAnnotation,
    /// `Some((name, span, resolved))` for `impl Trait for Type`
    pub trait_ref: Option<TraitRef>,
    pub methods: Vec<FuncId>,
    pub consts: Vec<ConstId>,
}

#[derive(Debug)]
pub struct TraitRef {
    pub name: String,
    pub span: Span,
    pub trait_id: Option<TraitId>,
}

/// A block: hoisted items, ordered statements, optional trailing value.
#[derive(Debug)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub tail: Option<Box<Expr>>,
    pub span: Span,
}

#[derive(Debug)]
pub enum Stmt {
    Let(LetStmt),
    Expr {
        expr: Expr,
        /// Distinguishes a block-like expression used as a statement from
        /// the syntactic end of the block
        has_semicolon: bool,
    },
    Item(ItemRef),
    Empty,
}

#[derive(Debug)]
pub struct LetStmt {
    pub local: LocalId,
    pub init: Option<Expr>,
    pub span: Span,
}

// --- Type annotations --------------------------------------------------

/// A type annotation, refined in place by pass 4. The mutation is its own
/// cache: a second visit observes `Resolved` and short-circuits.
#[derive(Debug)]
pub enum TypeAnnotation {
    Unresolved(TypeNode),
    Resolved(TypeId),
}

impl TypeAnnotation {
    /// The resolved handle. Panics before pass 4 completes.
    pub fn resolved(&self) -> TypeId {
        match self {
            Self::Resolved(id) => *id,
            Self::Unresolved(node) => {
                panic!("type annotation not yet resolved: {node:?}")
            }
        }
    }

    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Syntactic shape of a type, kept until resolution.
#[derive(Debug)]
pub enum TypeNode {
    Primitive(crate::types::Primitive),
    Unit,
    SelfTy { span: Span },
    Named {
        name: String,
        span: Span,
        /// Partial resolution installed by pass 2 so the type resolver does
        /// not repeat the scope lookup
        res: Option<TypeRes>,
    },
    Ref {
        mutable: bool,
        target: Box<TypeNode>,
    },
    Array {
        element: Box<TypeNode>,
        length: Box<Expr>,
    },
}

/// What a named type component points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeRes {
    Struct(StructId),
    Enum(EnumId),
}

// --- Expressions --------------------------------------------------------

/// An expression node. `info` is the pass-6 annotation; it is computed once
/// and reused by every later consumer.
#[derive(Debug)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    pub info: Option<ExprInfo>,
}

impl Expr {
    pub const fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            info: None,
        }
    }

    /// The checker's annotation. Valid after pass 6.
    pub fn info(&self) -> &ExprInfo {
        self.info
            .as_ref()
            .expect("expression not yet semantically checked")
    }

    pub fn ty(&self) -> TypeId {
        self.info().ty
    }
}

#[derive(Debug)]
pub enum ExprKind {
    IntLiteral {
        value: u32,
        suffix: Option<IntSuffix>,
    },
    BoolLiteral(bool),
    CharLiteral(char),
    StrLiteral(String),
    Unit,
    Path(PathExpr),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `&operand` / `&mut operand`. Also synthesized by the checker when a
    /// method receiver needs an implicit borrow.
    Ref {
        mutable: bool,
        operand: Box<Expr>,
        /// True when inserted by auto-ref rather than written by the user
        synthetic: bool,
    },
    /// `*operand`. Also synthesized by auto-deref.
    Deref {
        operand: Box<Expr>,
        synthetic: bool,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cast {
        operand: Box<Expr>,
        target: TypeAnnotation,
    },
    Call {
        target: CallTarget,
        args: Vec<Expr>,
    },
    MethodCall {
        receiver: Box<Expr>,
        method: String,
        method_span: Span,
        args: Vec<Expr>,
        target: MethodTarget,
    },
    Field {
        base: Box<Expr>,
        target: FieldTarget,
    },
    Index {
        base: Box<Expr>,
        index: Box<Expr>,
    },
    StructLiteral {
        name: String,
        name_span: Span,
        struct_id: Option<StructId>,
        /// Normalized into declaration order by pass 2
        fields: Vec<FieldInit>,
    },
    ArrayLiteral {
        elements: Vec<Expr>,
    },
    ArrayRepeat {
        element: Box<Expr>,
        count: Box<Expr>,
    },
    Block(Block),
    If {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Option<Box<Expr>>,
    },
    While {
        loop_id: LoopId,
        condition: Box<Expr>,
        body: Box<Expr>,
    },
    Loop {
        loop_id: LoopId,
        body: Box<Expr>,
    },
    Break {
        value: Option<Box<Expr>>,
        /// Bound by pass 7
        target: Option<LoopId>,
    },
    Continue {
        /// Bound by pass 7
        target: Option<LoopId>,
    },
    Return {
        value: Option<Box<Expr>>,
    },
}

#[derive(Debug)]
pub struct FieldInit {
    pub name: String,
    pub name_span: Span,
    pub value: Expr,
}

/// A possibly qualified name with its resolution state.
#[derive(Debug)]
pub struct PathExpr {
    pub segments: Vec<(String, Span)>,
    pub res: Res,
}

impl PathExpr {
    pub fn display(&self) -> String {
        self.segments
            .iter()
            .map(|(name, _)| name.as_str())
            .collect::<Vec<_>>()
            .join("::")
    }
}

/// Resolution of a path, installed by pass 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Res {
    Unresolved,
    Local(LocalId),
    Const(ConstId),
    Func(FuncId),
    Builtin(BuiltinFn),
    /// An enum variant, `Enum::Variant`
    Variant(EnumId, usize),
}

/// Callee of a call expression. Paths resolve through their [`Res`]; a
/// non-path callee is kept for the checker to reject.
#[derive(Debug)]
pub enum CallTarget {
    Path(PathExpr),
    Expr(Box<Expr>),
}

/// Resolution of a method call, installed by pass 6 after the
/// auto-ref/auto-deref probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodTarget {
    Unresolved,
    User(FuncId),
    Builtin(BuiltinMethod),
}

/// A field access target: name until pass 6 resolves it to an index.
#[derive(Debug)]
pub enum FieldTarget {
    Name(String, Span),
    Index(usize),
}

// --- Checker annotations ------------------------------------------------

/// Per-expression record produced by the semantic checker.
#[derive(Debug, Clone)]
pub struct ExprInfo {
    pub ty: TypeId,
    /// Whether the expression denotes a memory location
    pub is_place: bool,
    /// Whether that location may be written through
    pub is_mut: bool,
    pub endpoints: EndpointSet,
    /// Present when the expression is a compile-time constant the checker
    /// needed to evaluate (array repeat counts, const contexts)
    pub const_value: Option<ConstValue>,
}

impl ExprInfo {
    /// A non-place value that evaluates normally.
    pub fn value(ty: TypeId) -> Self {
        Self {
            ty,
            is_place: false,
            is_mut: false,
            endpoints: EndpointSet::normal(),
            const_value: None,
        }
    }

    pub fn with_endpoints(mut self, endpoints: EndpointSet) -> Self {
        self.endpoints = endpoints;
        self
    }
}

/// Abstraction of how evaluating an expression may exit.
///
/// Invariant: `normal` is set iff evaluation can fall through to the next
/// statement. The break/continue sets carry the loops they target.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointSet {
    pub normal: bool,
    pub returns: bool,
    pub breaks: Vec<LoopId>,
    pub continues: Vec<LoopId>,
}

impl EndpointSet {
    /// Plain fall-through evaluation.
    pub fn normal() -> Self {
        Self {
            normal: true,
            ..Self::default()
        }
    }

    pub fn returning() -> Self {
        Self {
            returns: true,
            ..Self::default()
        }
    }

    pub fn breaking(target: LoopId) -> Self {
        Self {
            breaks: vec![target],
            ..Self::default()
        }
    }

    pub fn continuing(target: LoopId) -> Self {
        Self {
            continues: vec![target],
            ..Self::default()
        }
    }

    pub const fn diverges(&self) -> bool {
        !self.normal
    }

    /// Set-union with another endpoint set.
    pub fn union(&mut self, other: &Self) {
        self.normal |= other.normal;
        self.returns |= other.returns;
        for id in &other.breaks {
            if !self.breaks.contains(id) {
                self.breaks.push(*id);
            }
        }
        for id in &other.continues {
            if !self.continues.contains(id) {
                self.continues.push(*id);
            }
        }
    }

    /// Sequencing: `self` then `next`. If `self` cannot fall through, `next`
    /// never runs and contributes nothing.
    pub fn then(&mut self, next: &Self) {
        if !self.normal {
            return;
        }
        self.normal = next.normal;
        let mut other = next.clone();
        other.normal = self.normal;
        self.union(&other);
    }

    /// Remove the endpoints a finished loop absorbs, restoring fall-through
    /// if the loop could be broken out of.
    pub fn absorb_loop(&mut self, loop_id: LoopId) {
        let had_break = self.breaks.contains(&loop_id);
        self.breaks.retain(|id| *id != loop_id);
        self.continues.retain(|id| *id != loop_id);
        if had_break {
            self.normal = true;
        }
    }

    pub fn breaks_loop(&self, loop_id: LoopId) -> bool {
        self.breaks.contains(&loop_id)
    }
}

/// A compile-time constant value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    /// Integer constant, stored widened; range enforced against its type
    Int(i64),
    Bool(bool),
    Char(char),
    Str(String),
}

impl ConstValue {
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_union_dedups() {
        let mut a = EndpointSet::breaking(LoopId(0));
        a.union(&EndpointSet::breaking(LoopId(0)));
        a.union(&EndpointSet::breaking(LoopId(1)));
        assert_eq!(a.breaks.len(), 2);
        assert!(a.diverges());
    }

    #[test]
    fn test_endpoint_sequencing_after_divergence() {
        let mut first = EndpointSet::returning();
        first.then(&EndpointSet::normal());
        // The second evaluation never runs.
        assert!(first.diverges());
        assert!(first.returns);
    }

    #[test]
    fn test_loop_absorbs_own_break() {
        let mut body = EndpointSet::breaking(LoopId(3));
        body.union(&EndpointSet::continuing(LoopId(3)));
        body.absorb_loop(LoopId(3));
        assert!(body.normal);
        assert!(body.breaks.is_empty());
        assert!(body.continues.is_empty());
    }

    #[test]
    fn test_loop_keeps_outer_break() {
        let mut body = EndpointSet::breaking(LoopId(1));
        body.absorb_loop(LoopId(2));
        assert!(!body.normal);
        assert!(body.breaks_loop(LoopId(1)));
    }
}
