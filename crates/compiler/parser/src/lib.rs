//! # Rx Parser
//!
//! Front end of the Rx compiler: a `logos` lexer and a `chumsky` parser
//! producing the span-annotated AST consumed by the semantic pipeline.
//! Lexer and parser failures surface as `SyntaxError` diagnostics.

pub mod lexer;
pub mod parser;

pub use parser::{parse_program, ParseOutput, ParsedProgram};
