//! Control flow: endpoints, divergence, loops as expressions, missing
//! returns, and the `exit` placement rule.

use rx_compiler_diagnostics::DiagnosticKind;

use crate::common::{assert_semantic_err, assert_semantic_ok};

#[test]
fn test_missing_return() {
    assert_semantic_err(
        "fn f() -> i32 { let x: i32 = 1; } fn main() { exit(0); }",
        DiagnosticKind::MissingReturn,
    );
}

#[test]
fn test_tail_expression_is_the_return_value() {
    assert_semantic_ok("fn f() -> i32 { 42 } fn main() { f(); }");
    assert_semantic_err(
        "fn f() -> i32 { true } fn main() { }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_return_statement_checks_value() {
    assert_semantic_ok("fn f(c: bool) -> i32 { if c { return 1; } 2 } fn main() { }");
    assert_semantic_err(
        "fn f() -> i32 { return true; } fn main() { }",
        DiagnosticKind::TypeMismatch,
    );
    assert_semantic_err(
        "fn f() -> i32 { return; } fn main() { }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_all_paths_return() {
    assert_semantic_ok(
        "fn f(c: bool) -> i32 { if c { return 1; } else { return 2; } } fn main() { }",
    );
    assert_semantic_err(
        "fn f(c: bool) -> i32 { if c { return 1; } } fn main() { }",
        DiagnosticKind::MissingReturn,
    );
}

#[test]
fn test_condition_must_be_bool() {
    assert_semantic_err("fn main() { if 1 { } }", DiagnosticKind::InvalidType);
    assert_semantic_err("fn main() { while 0 { } }", DiagnosticKind::InvalidType);
}

#[test]
fn test_if_without_else_is_unit() {
    assert_semantic_err(
        "fn main() { let x: i32 = if true { 1 }; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_if_branches_must_join() {
    assert_semantic_ok("fn main() { let x: i32 = if true { 1 } else { 2 }; }");
    assert_semantic_err(
        "fn main() { let x: i32 = if true { 1 } else { false }; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_never_unifies_with_any_branch() {
    assert_semantic_ok(
        "fn f(c: bool) -> i32 { let x: i32 = if c { 1 } else { return 0; }; x } fn main() { }",
    );
}

#[test]
fn test_loop_as_expression() {
    assert_semantic_ok(
        "fn main() { let x: i32 = loop { break 3; }; printlnInt(x); exit(0); }",
    );
}

#[test]
fn test_loop_without_break_is_never() {
    assert_semantic_ok("fn f() -> i32 { loop { } } fn main() { }");
}

#[test]
fn test_break_values_must_agree() {
    assert_semantic_ok(
        "fn main() { let x: i32 = loop { if true { break 1; } break 2; }; }",
    );
    assert_semantic_err(
        "fn main() { let x: i32 = loop { if true { break 1; } break false; }; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_while_cannot_break_with_value() {
    assert_semantic_err(
        "fn main() { while true { break 1; } }",
        DiagnosticKind::InvalidType,
    );
    assert_semantic_ok("fn main() { while true { break; } }");
}

#[test]
fn test_jumps_outside_loops() {
    assert_semantic_err("fn main() { break; }", DiagnosticKind::InvalidControlFlow);
    assert_semantic_err(
        "fn main() { continue; }",
        DiagnosticKind::InvalidControlFlow,
    );
}

#[test]
fn test_nested_loop_jumps_bind_innermost() {
    assert_semantic_ok(
        "fn main() {\n\
             let mut i: i32 = 0;\n\
             while i < 10 {\n\
                 let x: i32 = loop { break i; };\n\
                 i = x + 1;\n\
                 continue;\n\
             }\n\
         }",
    );
}

#[test]
fn test_while_body_must_be_unit() {
    assert_semantic_err(
        "fn main() { while true { 5 } }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_exit_as_final_statement_of_main() {
    assert_semantic_ok("fn main() { printInt(1); exit(0); }");
}

#[test]
fn test_exit_elsewhere_in_main() {
    assert_semantic_err(
        "fn main() { exit(0); printInt(1); }",
        DiagnosticKind::InvalidControlFlow,
    );
}

#[test]
fn test_exit_in_other_function() {
    assert_semantic_err(
        "fn f() { exit(1); } fn main() { f(); }",
        DiagnosticKind::InvalidControlFlow,
    );
}

#[test]
fn test_exit_nested_in_main_statement() {
    assert_semantic_err(
        "fn main() { if true { exit(0); } }",
        DiagnosticKind::InvalidControlFlow,
    );
}

#[test]
fn test_short_circuit_with_divergence() {
    assert_semantic_ok(
        "fn f(c: bool) -> bool { c && { return false; } } fn main() { }",
    );
}

#[test]
fn test_rechecking_is_idempotent() {
    use rx_compiler_semantic::passes;

    let source = "fn main() { let x: i32 = if true { 1 } else { 2 }; printInt(x); }";
    let mut analysis = crate::common::assert_semantic_ok(source);
    // Running the checker again over an annotated tree is a no-op.
    let impls = std::mem::take(&mut analysis.impls);
    passes::check::run(&mut analysis.program, &mut analysis.ctx, &impls)
        .expect("re-checking an already checked program succeeds");
}
