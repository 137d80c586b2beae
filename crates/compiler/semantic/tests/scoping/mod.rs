//! Name resolution: scopes, shadowing, hoisting, and the no-capture rule.

use rx_compiler_diagnostics::DiagnosticKind;

use crate::common::{assert_semantic_err, assert_semantic_ok};

#[test]
fn test_undeclared_variable() {
    assert_semantic_err(
        "fn main() { let x: i32 = y; }",
        DiagnosticKind::UndefinedName,
    );
}

#[test]
fn test_undeclared_function() {
    assert_semantic_err("fn main() { frobnicate(); }", DiagnosticKind::UndefinedName);
}

#[test]
fn test_forward_reference_between_items() {
    assert_semantic_ok("fn main() { helper(); } fn helper() { }");
}

#[test]
fn test_items_hoisted_within_block() {
    assert_semantic_ok(
        "fn main() { let x: i32 = helper(); fn helper() -> i32 { 7 } }",
    );
}

#[test]
fn test_duplicate_functions() {
    assert_semantic_err(
        "fn f() { } fn f() { } fn main() { }",
        DiagnosticKind::MultipleDefinition,
    );
}

#[test]
fn test_duplicate_types_in_scope() {
    assert_semantic_err(
        "struct A { x: i32 } enum A { B } fn main() { }",
        DiagnosticKind::MultipleDefinition,
    );
}

#[test]
fn test_duplicate_impl_items() {
    assert_semantic_err(
        "struct S { v: i32 }\n\
         impl S { fn get(&self) -> i32 { self.v } fn get(&self) -> i32 { 0 } }\n\
         fn main() { }",
        DiagnosticKind::MultipleDefinition,
    );
}

#[test]
fn test_let_shadowing_is_allowed() {
    assert_semantic_ok("fn main() { let x: i32 = 1; let x: bool = true; if x { } }");
}

#[test]
fn test_block_scope_ends() {
    assert_semantic_err(
        "fn main() { { let y: i32 = 1; } let z: i32 = y; }",
        DiagnosticKind::UndefinedName,
    );
}

#[test]
fn test_let_initializer_sees_outer_binding() {
    // The initializer resolves before the new binding is introduced.
    assert_semantic_ok("fn main() { let x: i32 = 1; let x: i32 = x + 1; let y: i32 = x; }");
}

#[test]
fn test_nested_function_cannot_capture() {
    assert_semantic_err(
        "fn main() { let a: i32 = 1; fn inner() -> i32 { a } }",
        DiagnosticKind::UndefinedName,
    );
}

#[test]
fn test_nested_function_sees_outer_items() {
    assert_semantic_ok(
        "const K: i32 = 3;\n\
         fn main() { fn inner() -> i32 { K } let x: i32 = inner(); }",
    );
}

#[test]
fn test_builtins_visible_everywhere() {
    assert_semantic_ok(
        "fn main() { fn deep() { printInt(getInt()); } deep(); }",
    );
}

#[test]
fn test_missing_main() {
    assert_semantic_err("fn not_main() { }", DiagnosticKind::UndefinedName);
}

#[test]
fn test_main_signature_enforced() {
    assert_semantic_err("fn main() -> i32 { 0 }", DiagnosticKind::InvalidType);
    assert_semantic_err("fn main(x: i32) { }", DiagnosticKind::InvalidType);
}

#[test]
fn test_enum_variant_resolution() {
    assert_semantic_ok(
        "enum Color { Red, Green }\n\
         fn main() { let c: Color = Color::Green; }",
    );
    assert_semantic_err(
        "enum Color { Red }\n\
         fn main() { let c: Color = Color::Blue; }",
        DiagnosticKind::UndefinedName,
    );
}

#[test]
fn test_self_outside_method() {
    assert_semantic_err("fn main() { let x: i32 = self; }", DiagnosticKind::InvalidType);
}

#[test]
fn test_self_type_outside_impl() {
    assert_semantic_err("fn f(x: Self) { } fn main() { }", DiagnosticKind::InvalidType);
}
