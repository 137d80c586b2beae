//! Statements: `let` forms, expression statements, nested items.

use rx_compiler_diagnostics::DiagnosticKind;

use crate::common::{assert_semantic_err, assert_semantic_ok};

#[test]
fn test_let_requires_annotation() {
    // Rx has no inference engine; the annotation is part of the grammar.
    assert_semantic_err("fn main() { let x = 1; }", DiagnosticKind::SyntaxError);
}

#[test]
fn test_let_without_initializer() {
    assert_semantic_ok("fn main() { let mut x: i32; x = 1; printInt(x); }");
}

#[test]
fn test_empty_statements() {
    assert_semantic_ok("fn main() { ;;; }");
}

#[test]
fn test_expression_statements_discard_values() {
    assert_semantic_ok("fn main() { 1 + 2; getInt(); if true { 1 } else { 2 }; }");
}

#[test]
fn test_nested_items_in_blocks() {
    assert_semantic_ok(
        "fn main() {\n\
             struct Local { v: i32 }\n\
             fn make(v: i32) -> Local { Local { v: v } }\n\
             let l: Local = make(3);\n\
             printInt(l.v);\n\
         }",
    );
}

#[test]
fn test_block_item_not_visible_outside() {
    assert_semantic_err(
        "fn main() { { fn hidden() { } } hidden(); }",
        DiagnosticKind::UndefinedName,
    );
}

#[test]
fn test_let_in_const_rejected() {
    assert_semantic_err(
        "const C: i32 = { let x: i32 = 1; x }; fn main() { }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_unit_let() {
    assert_semantic_ok("fn main() { let u: () = (); let v: () = printInt(1); }");
}
