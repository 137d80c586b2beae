use logos::Logos;

/// Optional type suffix on an integer literal (`7i32`, `0usize`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntSuffix {
    I32,
    U32,
    Isize,
    Usize,
}

/// An integer literal value together with its suffix, if any.
///
/// The value is kept unsigned and range-checked later against the type the
/// literal ends up with; `-2147483648` is a unary minus applied to the
/// literal `2147483648`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntLiteral {
    pub value: u32,
    pub suffix: Option<IntSuffix>,
}

fn parse_int_literal(slice: &str) -> Option<IntLiteral> {
    let (digits, suffix) = if let Some(d) = slice.strip_suffix("i32") {
        (d, Some(IntSuffix::I32))
    } else if let Some(d) = slice.strip_suffix("u32") {
        (d, Some(IntSuffix::U32))
    } else if let Some(d) = slice.strip_suffix("isize") {
        (d, Some(IntSuffix::Isize))
    } else if let Some(d) = slice.strip_suffix("usize") {
        (d, Some(IntSuffix::Usize))
    } else {
        (slice, None)
    };

    let digits = digits.replace('_', "");
    let (digits, radix) = if let Some(d) = digits.strip_prefix("0x") {
        (d.to_string(), 16)
    } else if let Some(d) = digits.strip_prefix("0o") {
        (d.to_string(), 8)
    } else if let Some(d) = digits.strip_prefix("0b") {
        (d.to_string(), 2)
    } else {
        (digits, 10)
    };

    u32::from_str_radix(&digits, radix)
        .ok()
        .map(|value| IntLiteral { value, suffix })
}

fn unescape(body: &str) -> Option<String> {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '0' => out.push('\0'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            _ => return None,
        }
    }
    Some(out)
}

fn parse_char_literal(slice: &str) -> Option<char> {
    let body = &slice[1..slice.len() - 1];
    let unescaped = unescape(body)?;
    let mut chars = unescaped.chars();
    let c = chars.next()?;
    chars.next().is_none().then_some(c)
}

fn parse_string_literal(slice: &str) -> Option<String> {
    unescape(&slice[1..slice.len() - 1])
}

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(skip r"[\t\n\r ]+")] // Skip whitespace, including carriage return
#[logos(skip r"//[^\n]*")] // Skip single-line comments
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")] // Skip block comments
pub enum TokenType {
    // Literals
    #[regex(r"(0x[0-9a-fA-F_]+|0o[0-7_]+|0b[01_]+|[0-9][0-9_]*)(i32|u32|isize|usize)?", |lex| parse_int_literal(lex.slice()))]
    LiteralNumber(IntLiteral),
    #[regex(r"'([^'\\\n]|\\.)'", |lex| parse_char_literal(lex.slice()))]
    LiteralChar(char),
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| parse_string_literal(lex.slice()))]
    LiteralString(String),
    // Keywords
    #[token("as")]
    As,
    #[token("break")]
    Break,
    #[token("const")]
    Const,
    #[token("continue")]
    Continue,
    #[token("else")]
    Else,
    #[token("enum")]
    Enum,
    #[token("false")]
    False,
    #[token("fn")]
    Fn,
    #[token("for")]
    For,
    #[token("if")]
    If,
    #[token("impl")]
    Impl,
    #[token("let")]
    Let,
    #[token("loop")]
    Loop,
    #[token("mut")]
    Mut,
    #[token("return")]
    Return,
    #[token("self")]
    SelfValue,
    #[token("Self")]
    SelfType,
    #[token("struct")]
    Struct,
    #[token("trait")]
    Trait,
    #[token("true")]
    True,
    #[token("while")]
    While,
    // Identifiers (must come after keywords)
    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),
    // Operators (order matters for longest match)
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("==")]
    EqEq,
    #[token("!=")]
    Neq,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("->")]
    Arrow,
    #[token("::")]
    ColonColon,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Mul,
    #[token("/")]
    Div,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("!")]
    Not,
    #[token("=")]
    Eq,
    // Punctuation
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBrack,
    #[token("]")]
    RBrack,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token(".")]
    Dot,
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LiteralNumber(lit) => write!(f, "{}", lit.value),
            Self::LiteralChar(c) => write!(f, "{c:?}"),
            Self::LiteralString(s) => write!(f, "{s:?}"),
            Self::Identifier(name) => write!(f, "{name}"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_all(input: &str) -> Vec<TokenType> {
        TokenType::lexer(input)
            .map(|t| t.expect("lexing should succeed"))
            .collect()
    }

    #[test]
    fn test_basic_lexer() {
        let tokens = lex_all("fn add(x: i32) -> i32 { x + 1 }");
        let expected = vec![
            TokenType::Fn,
            TokenType::Identifier("add".to_string()),
            TokenType::LParen,
            TokenType::Identifier("x".to_string()),
            TokenType::Colon,
            TokenType::Identifier("i32".to_string()),
            TokenType::RParen,
            TokenType::Arrow,
            TokenType::Identifier("i32".to_string()),
            TokenType::LBrace,
            TokenType::Identifier("x".to_string()),
            TokenType::Plus,
            TokenType::LiteralNumber(IntLiteral {
                value: 1,
                suffix: None,
            }),
            TokenType::RBrace,
        ];
        assert_eq!(tokens, expected);
    }

    #[test]
    fn test_integer_suffixes_and_radixes() {
        let tokens = lex_all("7i32 0xff_usize 0b1010u32 1_000");
        assert_eq!(
            tokens,
            vec![
                TokenType::LiteralNumber(IntLiteral {
                    value: 7,
                    suffix: Some(IntSuffix::I32),
                }),
                TokenType::LiteralNumber(IntLiteral {
                    value: 255,
                    suffix: Some(IntSuffix::Usize),
                }),
                TokenType::LiteralNumber(IntLiteral {
                    value: 10,
                    suffix: Some(IntSuffix::U32),
                }),
                TokenType::LiteralNumber(IntLiteral {
                    value: 1000,
                    suffix: None,
                }),
            ]
        );
    }

    #[test]
    fn test_string_and_char_escapes() {
        let tokens = lex_all(r#""a\nb" '\t' '\'' "#);
        assert_eq!(
            tokens,
            vec![
                TokenType::LiteralString("a\nb".to_string()),
                TokenType::LiteralChar('\t'),
                TokenType::LiteralChar('\''),
            ]
        );
    }

    #[test]
    fn test_shift_vs_comparison_tokens() {
        let tokens = lex_all("a << b >> c < d >= e");
        assert!(tokens.contains(&TokenType::Shl));
        assert!(tokens.contains(&TokenType::Shr));
        assert!(tokens.contains(&TokenType::Less));
        assert!(tokens.contains(&TokenType::GreaterEqual));
    }

    #[test]
    fn test_number_too_large_is_error() {
        let tokens: Vec<_> = TokenType::lexer("4294967296").collect();
        assert_eq!(tokens, vec![Err(())]);
    }

    #[test]
    fn test_block_comments_skipped() {
        let tokens = lex_all("1 /* comment\n spanning lines */ 2");
        assert_eq!(tokens.len(), 2);
    }
}
