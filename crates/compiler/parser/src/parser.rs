//! # Rx Parser
//!
//! This module implements the parser for the frozen Rx language subset using
//! the `chumsky` parser combinator library. The parser transforms a stream of
//! tokens into an Abstract Syntax Tree (AST) of top-level items.
//!
//! ## Architecture
//!
//! - **Expression parsing**: a precedence tower built with `foldl`/`foldr`
//!   over postfix, unary, cast, arithmetic, bitwise, comparison, logical and
//!   assignment layers, with `break`/`continue`/`return` as lowest-precedence
//!   jump expressions.
//! - **Condition contexts**: `if`/`while` conditions use a second expression
//!   entry that forbids struct literals at the head of the condition (the
//!   Rust rule); struct literals remain legal inside parentheses, argument
//!   lists and index brackets.
//! - **Statement parsing**: blocks are `{ stmt* tail-expr? }`; block-like
//!   expressions may appear in statement position without a semicolon, and a
//!   trailing expression without a semicolon becomes the block's value.
//! - **Item parsing**: functions, structs, enums, consts, traits, impls.
//!   Items may also appear inside blocks.

use chumsky::input::ValueInput;
use chumsky::prelude::*;
use rx_compiler_diagnostics::Diagnostic;

use crate::lexer::{IntLiteral, TokenType};

/// A value paired with its source span.
#[derive(Debug, PartialEq, Clone, Hash, Eq)]
pub struct Spanned<T>(T, SimpleSpan<usize>);

impl<T> Spanned<T> {
    /// Create a new spanned value
    pub const fn new(value: T, span: SimpleSpan<usize>) -> Self {
        Self(value, span)
    }

    /// Get the inner value
    pub const fn value(&self) -> &T {
        &self.0
    }

    /// Get the span
    pub const fn span(&self) -> SimpleSpan<usize> {
        self.1
    }

    /// Destructure into value and span
    pub fn into_parts(self) -> (T, SimpleSpan<usize>) {
        (self.0, self.1)
    }
}

/// The primitive type names of Rx, plus user-defined type names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamedType {
    I32,
    U32,
    Isize,
    Usize,
    Bool,
    Char,
    Str,
    Custom(String),
}

impl std::fmt::Display for NamedType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::I32 => write!(f, "i32"),
            Self::U32 => write!(f, "u32"),
            Self::Isize => write!(f, "isize"),
            Self::Usize => write!(f, "usize"),
            Self::Bool => write!(f, "bool"),
            Self::Char => write!(f, "char"),
            Self::Str => write!(f, "str"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// A type expression as written in the source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    /// A named type (`i32`, `bool`, `Point`)
    Named(Spanned<NamedType>),
    /// The unit type `()`
    Unit,
    /// `Self` inside an impl or trait
    SelfType,
    /// A reference type (`&T`, `&mut T`)
    Reference {
        mutable: bool,
        target: Box<Spanned<TypeExpr>>,
    },
    /// An array type `[T; N]`; the length is a const expression
    Array {
        element: Box<Spanned<TypeExpr>>,
        length: Box<Spanned<Expression>>,
    },
}

/// Unary operators that keep their operand's value category.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy)]
pub enum UnaryOp {
    /// Logical/bitwise NOT `!`
    Not,
    /// Arithmetic negation `-`
    Neg,
}

/// Binary operators, in Rust precedence order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    Eq,
    Neq,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
            Self::Eq => "==",
            Self::Neq => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
        };
        write!(f, "{symbol}")
    }
}

/// An expression in the Rx language.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expression {
    /// Integer literal, with optional type suffix
    Literal(IntLiteral),
    /// Boolean literal
    BooleanLiteral(bool),
    /// Character literal
    CharLiteral(char),
    /// String literal (has type `&str`)
    StringLiteral(String),
    /// The unit value `()`
    Unit,
    /// A possibly qualified name: `x`, `E::Variant`, `String::from`
    Path { segments: Vec<Spanned<String>> },
    /// The method receiver `self`
    SelfValue,
    /// Unary operation `!x`, `-x`
    Unary {
        op: UnaryOp,
        expr: Box<Spanned<Expression>>,
    },
    /// Borrow `&x` or `&mut x`
    Reference {
        mutable: bool,
        expr: Box<Spanned<Expression>>,
    },
    /// Dereference `*x`
    Deref(Box<Spanned<Expression>>),
    /// Binary operation
    Binary {
        op: BinaryOp,
        left: Box<Spanned<Expression>>,
        right: Box<Spanned<Expression>>,
    },
    /// Assignment `lhs = rhs` (evaluates to `()`)
    Assign {
        lhs: Box<Spanned<Expression>>,
        rhs: Box<Spanned<Expression>>,
    },
    /// Cast `expr as Type`
    Cast {
        expr: Box<Spanned<Expression>>,
        target_type: Spanned<TypeExpr>,
    },
    /// Function call `callee(args)`
    FunctionCall {
        callee: Box<Spanned<Expression>>,
        args: Vec<Spanned<Expression>>,
    },
    /// Method call `receiver.name(args)`
    MethodCall {
        receiver: Box<Spanned<Expression>>,
        method: Spanned<String>,
        args: Vec<Spanned<Expression>>,
    },
    /// Field access `object.field`
    MemberAccess {
        object: Box<Spanned<Expression>>,
        field: Spanned<String>,
    },
    /// Indexing `array[index]`
    IndexAccess {
        array: Box<Spanned<Expression>>,
        index: Box<Spanned<Expression>>,
    },
    /// Struct literal `Point { x: 1, y: 2 }`
    StructLiteral {
        name: Spanned<String>,
        fields: Vec<(Spanned<String>, Spanned<Expression>)>,
    },
    /// Array literal `[a, b, c]`
    ArrayLiteral(Vec<Spanned<Expression>>),
    /// Array repeat `[elem; count]`
    ArrayRepeat {
        element: Box<Spanned<Expression>>,
        count: Box<Spanned<Expression>>,
    },
    /// Block expression
    Block(Block),
    /// `if cond { .. } else { .. }`; the else branch is a block or another if
    If {
        condition: Box<Spanned<Expression>>,
        then_block: Box<Spanned<Expression>>,
        else_block: Option<Box<Spanned<Expression>>>,
    },
    /// `while cond { .. }`
    While {
        condition: Box<Spanned<Expression>>,
        body: Box<Spanned<Expression>>,
    },
    /// `loop { .. }`
    Loop { body: Box<Spanned<Expression>> },
    /// `break` with optional value
    Break {
        value: Option<Box<Spanned<Expression>>>,
    },
    /// `continue`
    Continue,
    /// `return` with optional value
    Return {
        value: Option<Box<Spanned<Expression>>>,
    },
}

/// A block: ordered statements plus an optional trailing value expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Block {
    pub statements: Vec<Spanned<Statement>>,
    pub tail: Option<Box<Spanned<Expression>>>,
}

/// A statement inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Statement {
    /// `let [mut] name: Type [= expr];`
    Let {
        name: Spanned<String>,
        mutable: bool,
        ty: Spanned<TypeExpr>,
        value: Option<Spanned<Expression>>,
    },
    /// An expression in statement position. `has_semicolon` distinguishes a
    /// block-like expression used as a statement from a trailing value.
    Expression {
        expr: Spanned<Expression>,
        has_semicolon: bool,
    },
    /// A nested item (function, struct, ...) declared inside the block
    Item(Box<Item>),
    /// A bare `;`
    Empty,
}

/// Receiver parameter of a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelfParam {
    /// `self` / `mut self`
    Value { mutable: bool },
    /// `&self` / `&mut self`
    Reference { mutable: bool },
}

/// A function parameter with its name and type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parameter {
    pub name: Spanned<String>,
    pub mutable: bool,
    pub type_expr: Spanned<TypeExpr>,
}

/// Either the receiver or a regular parameter, as parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FnParam {
    SelfParam(Spanned<SelfParam>),
    Normal(Parameter),
}

/// A function or method definition. The body is absent for trait
/// declarations without a default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FunctionDef {
    pub name: Spanned<String>,
    pub params: Vec<FnParam>,
    pub return_type: Option<Spanned<TypeExpr>>,
    pub body: Option<Spanned<Expression>>,
}

/// A struct definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructDef {
    pub name: Spanned<String>,
    pub fields: Vec<(Spanned<String>, Spanned<TypeExpr>)>,
}

/// An enum definition (unit variants only).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumDef {
    pub name: Spanned<String>,
    pub variants: Vec<Spanned<String>>,
}

/// A constant definition. The value is absent for trait declarations
/// without a default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConstDef {
    pub name: Spanned<String>,
    pub ty: Spanned<TypeExpr>,
    pub value: Option<Spanned<Expression>>,
}

/// A trait definition; its items are function signatures and consts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraitDef {
    pub name: Spanned<String>,
    pub items: Vec<Item>,
}

/// An inherent or trait impl block.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImplDef {
    /// `Some` for `impl Trait for Type`, `None` for `impl Type`
    pub trait_name: Option<Spanned<String>>,
    pub for_type: Spanned<TypeExpr>,
    pub items: Vec<Item>,
}

/// A program item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Item {
    Function(Spanned<FunctionDef>),
    Struct(Spanned<StructDef>),
    Enum(Spanned<EnumDef>),
    Const(Spanned<ConstDef>),
    Trait(Spanned<TraitDef>),
    Impl(Spanned<ImplDef>),
}

/// The parsed compilation unit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParsedProgram {
    pub items: Vec<Item>,
}

impl ParsedProgram {
    pub const fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

/// Output from the parsing process, including both AST and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOutput {
    pub program: ParsedProgram,
    pub diagnostics: Vec<Diagnostic>,
}

impl ParseOutput {
    pub const fn new(program: ParsedProgram, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            program,
            diagnostics,
        }
    }
}

/// Parse a source program into an AST with diagnostics.
///
/// Lexer errors and parse errors are reported as `SyntaxError` diagnostics;
/// when any are present the returned program is empty.
pub fn parse_program(input: &str, file_path: &str) -> ParseOutput {
    use logos::Logos;

    let mut tokens = Vec::new();
    let mut diagnostics = Vec::new();

    for (token_result, span) in TokenType::lexer(input).spanned() {
        match token_result {
            Ok(token) => tokens.push((token, SimpleSpan::from(span))),
            Err(()) => {
                let snippet = &input[span.clone()];
                diagnostics.push(
                    Diagnostic::syntax_error(
                        format!("unrecognized token `{snippet}`"),
                        SimpleSpan::from(span),
                    )
                    .in_file(file_path),
                );
            }
        }
    }

    if !diagnostics.is_empty() {
        return ParseOutput::new(ParsedProgram::new(vec![]), diagnostics);
    }

    let token_stream = chumsky::input::Stream::from_iter(tokens)
        .map((0..input.len()).into(), |(t, s): (_, _)| (t, s));

    match program_parser()
        .then_ignore(end())
        .parse(token_stream)
        .into_result()
    {
        Ok(items) => ParseOutput::new(ParsedProgram::new(items), diagnostics),
        Err(parse_errors) => {
            for error in parse_errors {
                diagnostics
                    .push(Diagnostic::syntax_error(format!("{error}"), *error.span())
                        .in_file(file_path));
            }
            ParseOutput::new(ParsedProgram::new(vec![]), diagnostics)
        }
    }
}

/// Helper enum for handling postfix operations during expression parsing.
#[derive(Debug, Clone)]
enum PostfixOp {
    /// Function call with arguments
    Call(Vec<Spanned<Expression>>, SimpleSpan<usize>),
    /// Method call with name and arguments
    Method(Spanned<String>, Vec<Spanned<Expression>>, SimpleSpan<usize>),
    /// Member access with field name
    Member(Spanned<String>),
    /// Index access with index expression
    Index(Spanned<Expression>, SimpleSpan<usize>),
}

/// Prefix operators, folded right-to-left over the postfix level.
#[derive(Debug, Clone, Copy)]
enum PrefixOp {
    Neg,
    Not,
    Deref,
    Ref { mutable: bool },
}

fn union_span(a: SimpleSpan<usize>, b: SimpleSpan<usize>) -> SimpleSpan<usize> {
    SimpleSpan::from(a.start..b.end)
}

// ===================
// Parser Implementation
// ===================

/// Creates a spanned identifier parser
fn spanned_ident<'tokens, I>()
-> impl Parser<'tokens, I, Spanned<String>, extra::Err<Rich<'tokens, TokenType>>> + Clone
where
    I: ValueInput<'tokens, Token = TokenType, Span = SimpleSpan>,
{
    select! { TokenType::Identifier(s) => s }
        .map_with(|s, extra| Spanned::new(s, extra.span()))
        .labelled("identifier")
}

/// The whole-program parser: items until end of input.
fn program_parser<'tokens, I>()
-> impl Parser<'tokens, I, Vec<Item>, extra::Err<Rich<'tokens, TokenType>>>
where
    I: ValueInput<'tokens, Token = TokenType, Span = SimpleSpan>,
{
    item_parser().repeated().collect()
}

/// Builds every item- and expression-level parser in one recursive nest.
///
/// Items, expressions and types are mutually recursive (array lengths are
/// expressions, function bodies are blocks, blocks contain items), so the
/// parsers are declared up front and defined once their dependencies exist.
#[allow(clippy::too_many_lines)]
fn item_parser<'tokens, I>()
-> impl Parser<'tokens, I, Item, extra::Err<Rich<'tokens, TokenType>>> + Clone
where
    I: ValueInput<'tokens, Token = TokenType, Span = SimpleSpan>,
{
    let mut expr = chumsky::recursive::Recursive::declare();
    let mut expr_no_struct = chumsky::recursive::Recursive::declare();
    let mut item = chumsky::recursive::Recursive::declare();

    // --- Types -----------------------------------------------------------

    let type_expr = recursive(|type_expr| {
        let named = select! { TokenType::Identifier(name) => name }.map_with(|name, extra| {
            let named = match name.as_str() {
                "i32" => NamedType::I32,
                "u32" => NamedType::U32,
                "isize" => NamedType::Isize,
                "usize" => NamedType::Usize,
                "bool" => NamedType::Bool,
                "char" => NamedType::Char,
                "str" => NamedType::Str,
                _ => NamedType::Custom(name),
            };
            let span = extra.span();
            Spanned::new(TypeExpr::Named(Spanned::new(named, span)), span)
        });

        let unit = just(TokenType::LParen)
            .then(just(TokenType::RParen))
            .map_with(|_, extra| Spanned::new(TypeExpr::Unit, extra.span()));

        let self_type = just(TokenType::SelfType)
            .map_with(|_, extra| Spanned::new(TypeExpr::SelfType, extra.span()));

        let array = type_expr
            .clone()
            .then_ignore(just(TokenType::Semicolon))
            .then(expr.clone())
            .delimited_by(just(TokenType::LBrack), just(TokenType::RBrack))
            .map_with(|(element, length), extra| {
                Spanned::new(
                    TypeExpr::Array {
                        element: Box::new(element),
                        length: Box::new(length),
                    },
                    extra.span(),
                )
            });

        let reference = just(TokenType::Amp)
            .ignore_then(just(TokenType::Mut).or_not())
            .then(type_expr)
            .map_with(|(mutable, target), extra| {
                Spanned::new(
                    TypeExpr::Reference {
                        mutable: mutable.is_some(),
                        target: Box::new(target),
                    },
                    extra.span(),
                )
            });

        choice((reference, array, unit, self_type, named))
    });

    // --- Blocks and block-like expressions -------------------------------

    let let_stmt = just(TokenType::Let)
        .ignore_then(just(TokenType::Mut).or_not())
        .then(spanned_ident())
        .then_ignore(just(TokenType::Colon))
        .then(type_expr.clone())
        .then(just(TokenType::Eq).ignore_then(expr.clone()).or_not())
        .then_ignore(just(TokenType::Semicolon))
        .map_with(|(((mutable, name), ty), value), extra| {
            Spanned::new(
                Statement::Let {
                    name,
                    mutable: mutable.is_some(),
                    ty,
                    value,
                },
                extra.span(),
            )
        });

    let mut block_like = chumsky::recursive::Recursive::declare();

    let stmt = choice((
        let_stmt,
        item.clone()
            .map_with(|it, extra| Spanned::new(Statement::Item(Box::new(it)), extra.span())),
        just(TokenType::Semicolon)
            .map_with(|_, extra| Spanned::new(Statement::Empty, extra.span())),
        block_like
            .clone()
            .then(just(TokenType::Semicolon).or_not())
            .map_with(|(expr, semi): (Spanned<Expression>, _), extra| {
                Spanned::new(
                    Statement::Expression {
                        expr,
                        has_semicolon: semi.is_some(),
                    },
                    extra.span(),
                )
            }),
        expr.clone()
            .then_ignore(just(TokenType::Semicolon))
            .map_with(|expr, extra| {
                Spanned::new(
                    Statement::Expression {
                        expr,
                        has_semicolon: true,
                    },
                    extra.span(),
                )
            }),
    ));

    let block = stmt
        .repeated()
        .collect::<Vec<_>>()
        .then(expr.clone().or_not())
        .delimited_by(just(TokenType::LBrace), just(TokenType::RBrace))
        .map_with(|(mut statements, tail), extra| {
            // A trailing block-like expression without a semicolon is the
            // block's value, not a statement.
            let mut tail = tail.map(Box::new);
            if tail.is_none() {
                if let Some(last) = statements.last() {
                    if matches!(
                        last.value(),
                        Statement::Expression {
                            has_semicolon: false,
                            ..
                        }
                    ) {
                        let last = statements.pop().expect("non-empty");
                        if let (
                            Statement::Expression { expr, .. },
                            _span,
                        ) = last.into_parts()
                        {
                            tail = Some(Box::new(expr));
                        }
                    }
                }
            }
            Spanned::new(Expression::Block(Block { statements, tail }), extra.span())
        });

    let if_expr = recursive(|if_expr| {
        just(TokenType::If)
            .ignore_then(expr_no_struct.clone())
            .then(block.clone())
            .then(
                just(TokenType::Else)
                    .ignore_then(choice((if_expr, block.clone())))
                    .or_not(),
            )
            .map_with(|((condition, then_block), else_block), extra| {
                Spanned::new(
                    Expression::If {
                        condition: Box::new(condition),
                        then_block: Box::new(then_block),
                        else_block: else_block.map(Box::new),
                    },
                    extra.span(),
                )
            })
    });

    let while_expr = just(TokenType::While)
        .ignore_then(expr_no_struct.clone())
        .then(block.clone())
        .map_with(|(condition, body), extra| {
            Spanned::new(
                Expression::While {
                    condition: Box::new(condition),
                    body: Box::new(body),
                },
                extra.span(),
            )
        });

    let loop_expr = just(TokenType::Loop).ignore_then(block.clone()).map_with(
        |body, extra| {
            Spanned::new(
                Expression::Loop {
                    body: Box::new(body),
                },
                extra.span(),
            )
        },
    );

    block_like.define(choice((
        block.clone(),
        if_expr,
        while_expr,
        loop_expr,
    )));

    // --- Atoms ------------------------------------------------------------

    let literal = select! {
        TokenType::LiteralNumber(lit) => Expression::Literal(lit),
        TokenType::LiteralChar(c) => Expression::CharLiteral(c),
        TokenType::LiteralString(s) => Expression::StringLiteral(s),
        TokenType::True => Expression::BooleanLiteral(true),
        TokenType::False => Expression::BooleanLiteral(false),
    }
    .map_with(|lit, extra| Spanned::new(lit, extra.span()));

    let unit = just(TokenType::LParen)
        .then(just(TokenType::RParen))
        .map_with(|_, extra| Spanned::new(Expression::Unit, extra.span()));

    let path = spanned_ident()
        .separated_by(just(TokenType::ColonColon))
        .at_least(1)
        .collect::<Vec<_>>()
        .map_with(|segments, extra| {
            Spanned::new(Expression::Path { segments }, extra.span())
        });

    let self_value = just(TokenType::SelfValue)
        .map_with(|_, extra| Spanned::new(Expression::SelfValue, extra.span()));

    let struct_literal_fields = spanned_ident()
        .then_ignore(just(TokenType::Colon))
        .then(expr.clone())
        .separated_by(just(TokenType::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(TokenType::LBrace), just(TokenType::RBrace));

    let struct_literal = spanned_ident().then(struct_literal_fields).map_with(
        |(name, fields), extra| {
            Spanned::new(Expression::StructLiteral { name, fields }, extra.span())
        },
    );

    let array_repeat = expr
        .clone()
        .then_ignore(just(TokenType::Semicolon))
        .then(expr.clone())
        .delimited_by(just(TokenType::LBrack), just(TokenType::RBrack))
        .map_with(|(element, count), extra| {
            Spanned::new(
                Expression::ArrayRepeat {
                    element: Box::new(element),
                    count: Box::new(count),
                },
                extra.span(),
            )
        });

    let array_literal = expr
        .clone()
        .separated_by(just(TokenType::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(TokenType::LBrack), just(TokenType::RBrack))
        .map_with(|elements, extra| {
            Spanned::new(Expression::ArrayLiteral(elements), extra.span())
        });

    let paren = expr
        .clone()
        .delimited_by(just(TokenType::LParen), just(TokenType::RParen));

    let atom_common = choice((
        literal,
        unit,
        self_value,
        array_repeat,
        array_literal,
        paren,
        block_like.clone(),
    ));

    let atom_full = choice((atom_common.clone(), struct_literal, path.clone()));
    let atom_no_struct = choice((atom_common, path));

    expr.define(expr_tower(atom_full, expr.clone(), type_expr.clone()));
    expr_no_struct.define(expr_tower(
        atom_no_struct,
        expr.clone(),
        type_expr.clone(),
    ));

    // --- Items ------------------------------------------------------------

    let self_param = choice((
        just(TokenType::Amp)
            .ignore_then(just(TokenType::Mut).or_not())
            .then_ignore(just(TokenType::SelfValue))
            .map_with(|mutable, extra| {
                FnParam::SelfParam(Spanned::new(
                    SelfParam::Reference {
                        mutable: mutable.is_some(),
                    },
                    extra.span(),
                ))
            }),
        just(TokenType::Mut)
            .ignore_then(just(TokenType::SelfValue))
            .map_with(|_, extra| {
                FnParam::SelfParam(Spanned::new(SelfParam::Value { mutable: true }, extra.span()))
            }),
        just(TokenType::SelfValue).map_with(|_, extra| {
            FnParam::SelfParam(Spanned::new(
                SelfParam::Value { mutable: false },
                extra.span(),
            ))
        }),
    ));

    let normal_param = just(TokenType::Mut)
        .or_not()
        .then(spanned_ident())
        .then_ignore(just(TokenType::Colon))
        .then(type_expr.clone())
        .map(|((mutable, name), ty)| {
            FnParam::Normal(Parameter {
                name,
                mutable: mutable.is_some(),
                type_expr: ty,
            })
        });

    let fn_param = choice((self_param, normal_param));

    let fn_def = just(TokenType::Fn)
        .ignore_then(spanned_ident())
        .then(
            fn_param
                .separated_by(just(TokenType::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(TokenType::LParen), just(TokenType::RParen)),
        )
        .then(just(TokenType::Arrow).ignore_then(type_expr.clone()).or_not())
        .then(choice((
            block.clone().map(Some),
            just(TokenType::Semicolon).to(None),
        )))
        .map_with(|(((name, params), return_type), body), extra| {
            Spanned::new(
                FunctionDef {
                    name,
                    params,
                    return_type,
                    body,
                },
                extra.span(),
            )
        });

    let struct_def = just(TokenType::Struct)
        .ignore_then(spanned_ident())
        .then(choice((
            spanned_ident()
                .then_ignore(just(TokenType::Colon))
                .then(type_expr.clone())
                .separated_by(just(TokenType::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(TokenType::LBrace), just(TokenType::RBrace)),
            just(TokenType::Semicolon).to(Vec::new()),
        )))
        .map_with(|(name, fields), extra| {
            Spanned::new(StructDef { name, fields }, extra.span())
        });

    let enum_def = just(TokenType::Enum)
        .ignore_then(spanned_ident())
        .then(
            spanned_ident()
                .separated_by(just(TokenType::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(TokenType::LBrace), just(TokenType::RBrace)),
        )
        .map_with(|(name, variants), extra| {
            Spanned::new(EnumDef { name, variants }, extra.span())
        });

    let const_def = just(TokenType::Const)
        .ignore_then(spanned_ident())
        .then_ignore(just(TokenType::Colon))
        .then(type_expr.clone())
        .then(just(TokenType::Eq).ignore_then(expr.clone()).or_not())
        .then_ignore(just(TokenType::Semicolon))
        .map_with(|((name, ty), value), extra| {
            Spanned::new(ConstDef { name, ty, value }, extra.span())
        });

    // Traits and impls only contain functions and consts.
    let assoc_item = choice((
        fn_def.clone().map(Item::Function),
        const_def.clone().map(Item::Const),
    ));

    let trait_def = just(TokenType::Trait)
        .ignore_then(spanned_ident())
        .then(
            assoc_item
                .clone()
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(TokenType::LBrace), just(TokenType::RBrace)),
        )
        .map_with(|(name, items), extra| {
            Spanned::new(TraitDef { name, items }, extra.span())
        });

    let impl_def = just(TokenType::Impl)
        .ignore_then(
            spanned_ident()
                .then_ignore(just(TokenType::For))
                .or_not(),
        )
        .then(type_expr.clone())
        .then(
            assoc_item
                .repeated()
                .collect::<Vec<_>>()
                .delimited_by(just(TokenType::LBrace), just(TokenType::RBrace)),
        )
        .map_with(|((trait_name, for_type), items), extra| {
            Spanned::new(
                ImplDef {
                    trait_name,
                    for_type,
                    items,
                },
                extra.span(),
            )
        });

    item.define(choice((
        fn_def.map(Item::Function),
        struct_def.map(Item::Struct),
        enum_def.map(Item::Enum),
        const_def.map(Item::Const),
        trait_def.map(Item::Trait),
        impl_def.map(Item::Impl),
    )));

    item
}

/// Builds the expression precedence tower over a given atom parser.
///
/// The `expr` handle is the full expression parser; it is used for
/// bracketed sub-expressions (arguments, indices), jump values and
/// assignment right-hand sides, so that the no-struct restriction of
/// condition contexts does not leak into nested positions.
#[allow(clippy::too_many_lines)]
fn expr_tower<'tokens, I, A, E, T>(
    atom: A,
    expr: E,
    type_expr: T,
) -> impl Parser<'tokens, I, Spanned<Expression>, extra::Err<Rich<'tokens, TokenType>>> + Clone
where
    I: ValueInput<'tokens, Token = TokenType, Span = SimpleSpan>,
    A: Parser<'tokens, I, Spanned<Expression>, extra::Err<Rich<'tokens, TokenType>>>
        + Clone
        + 'tokens,
    E: Parser<'tokens, I, Spanned<Expression>, extra::Err<Rich<'tokens, TokenType>>>
        + Clone
        + 'tokens,
    T: Parser<'tokens, I, Spanned<TypeExpr>, extra::Err<Rich<'tokens, TokenType>>>
        + Clone
        + 'tokens,
{
    let args = expr
        .clone()
        .separated_by(just(TokenType::Comma))
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(TokenType::LParen), just(TokenType::RParen));

    let postfix_op = choice((
        just(TokenType::Dot)
            .ignore_then(spanned_ident())
            .then(args.clone())
            .map_with(|(method, args), extra| PostfixOp::Method(method, args, extra.span())),
        just(TokenType::Dot)
            .ignore_then(spanned_ident())
            .map(PostfixOp::Member),
        args.map_with(|args, extra| PostfixOp::Call(args, extra.span())),
        expr.clone()
            .delimited_by(just(TokenType::LBrack), just(TokenType::RBrack))
            .map_with(|index, extra| PostfixOp::Index(index, extra.span())),
    ));

    let postfix = atom.foldl(postfix_op.repeated(), |lhs, op| match op {
        PostfixOp::Call(args, op_span) => {
            let span = union_span(lhs.span(), op_span);
            Spanned::new(
                Expression::FunctionCall {
                    callee: Box::new(lhs),
                    args,
                },
                span,
            )
        }
        PostfixOp::Method(method, args, op_span) => {
            let span = union_span(lhs.span(), op_span);
            Spanned::new(
                Expression::MethodCall {
                    receiver: Box::new(lhs),
                    method,
                    args,
                },
                span,
            )
        }
        PostfixOp::Member(field) => {
            let span = union_span(lhs.span(), field.span());
            Spanned::new(
                Expression::MemberAccess {
                    object: Box::new(lhs),
                    field,
                },
                span,
            )
        }
        PostfixOp::Index(index, op_span) => {
            let span = union_span(lhs.span(), op_span);
            Spanned::new(
                Expression::IndexAccess {
                    array: Box::new(lhs),
                    index: Box::new(index),
                },
                span,
            )
        }
    });

    let prefix_op = choice((
        just(TokenType::Minus).to(PrefixOp::Neg),
        just(TokenType::Not).to(PrefixOp::Not),
        just(TokenType::Mul).to(PrefixOp::Deref),
        just(TokenType::Amp)
            .ignore_then(just(TokenType::Mut).or_not())
            .map(|mutable| PrefixOp::Ref {
                mutable: mutable.is_some(),
            }),
    ))
    .map_with(|op, extra| (op, extra.span()));

    let unary = prefix_op
        .repeated()
        .foldr(postfix, |(op, op_span), operand| {
            let span = union_span(op_span, operand.span());
            let expr = match op {
                PrefixOp::Neg => Expression::Unary {
                    op: UnaryOp::Neg,
                    expr: Box::new(operand),
                },
                PrefixOp::Not => Expression::Unary {
                    op: UnaryOp::Not,
                    expr: Box::new(operand),
                },
                PrefixOp::Deref => Expression::Deref(Box::new(operand)),
                PrefixOp::Ref { mutable } => Expression::Reference {
                    mutable,
                    expr: Box::new(operand),
                },
            };
            Spanned::new(expr, span)
        });

    let cast = unary.foldl(
        just(TokenType::As).ignore_then(type_expr).repeated(),
        |expr, ty| {
            let span = union_span(expr.span(), ty.span());
            Spanned::new(
                Expression::Cast {
                    expr: Box::new(expr),
                    target_type: ty,
                },
                span,
            )
        },
    );

    let binary = |lhs: Spanned<Expression>,
                  (op, rhs): (BinaryOp, Spanned<Expression>)| {
        let span = union_span(lhs.span(), rhs.span());
        Spanned::new(
            Expression::Binary {
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            },
            span,
        )
    };

    let op = |token: TokenType, op: BinaryOp| just(token).to(op);

    let product = cast.clone().foldl(
        choice((
            op(TokenType::Mul, BinaryOp::Mul),
            op(TokenType::Div, BinaryOp::Div),
            op(TokenType::Percent, BinaryOp::Rem),
        ))
        .then(cast)
        .repeated(),
        binary,
    );

    let sum = product.clone().foldl(
        choice((
            op(TokenType::Plus, BinaryOp::Add),
            op(TokenType::Minus, BinaryOp::Sub),
        ))
        .then(product)
        .repeated(),
        binary,
    );

    let shift = sum.clone().foldl(
        choice((
            op(TokenType::Shl, BinaryOp::Shl),
            op(TokenType::Shr, BinaryOp::Shr),
        ))
        .then(sum)
        .repeated(),
        binary,
    );

    let bitand = shift.clone().foldl(
        op(TokenType::Amp, BinaryOp::BitAnd).then(shift).repeated(),
        binary,
    );

    let bitxor = bitand.clone().foldl(
        op(TokenType::Caret, BinaryOp::BitXor)
            .then(bitand)
            .repeated(),
        binary,
    );

    let bitor = bitxor.clone().foldl(
        op(TokenType::Pipe, BinaryOp::BitOr)
            .then(bitxor)
            .repeated(),
        binary,
    );

    let cmp = bitor.clone().foldl(
        choice((
            op(TokenType::EqEq, BinaryOp::Eq),
            op(TokenType::Neq, BinaryOp::Neq),
            op(TokenType::LessEqual, BinaryOp::LessEqual),
            op(TokenType::GreaterEqual, BinaryOp::GreaterEqual),
            op(TokenType::Less, BinaryOp::Less),
            op(TokenType::Greater, BinaryOp::Greater),
        ))
        .then(bitor)
        .repeated(),
        binary,
    );

    let and = cmp.clone().foldl(
        op(TokenType::AndAnd, BinaryOp::And).then(cmp).repeated(),
        binary,
    );

    let or = and.clone().foldl(
        op(TokenType::OrOr, BinaryOp::Or).then(and).repeated(),
        binary,
    );

    let jump = choice((
        just(TokenType::Return)
            .ignore_then(expr.clone().or_not())
            .map_with(|value, extra| {
                Spanned::new(
                    Expression::Return {
                        value: value.map(Box::new),
                    },
                    extra.span(),
                )
            }),
        just(TokenType::Break)
            .ignore_then(expr.clone().or_not())
            .map_with(|value, extra| {
                Spanned::new(
                    Expression::Break {
                        value: value.map(Box::new),
                    },
                    extra.span(),
                )
            }),
        just(TokenType::Continue)
            .map_with(|_, extra| Spanned::new(Expression::Continue, extra.span())),
    ));

    let assign = or
        .then(just(TokenType::Eq).ignore_then(expr).or_not())
        .map(|(lhs, rhs)| match rhs {
            Some(rhs) => {
                let span = union_span(lhs.span(), rhs.span());
                Spanned::new(
                    Expression::Assign {
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    span,
                )
            }
            None => lhs,
        });

    choice((jump, assign))
}
