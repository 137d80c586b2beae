//! Expression checking: operators, references, mutability, and the
//! `ExprInfo` invariants.

use rx_compiler_diagnostics::DiagnosticKind;

use crate::common::{assert_semantic_err, assert_semantic_ok};

#[test]
fn test_arithmetic_requires_identical_integers() {
    assert_semantic_ok("fn main() { let a: i32 = 1 + 2 * 3 % 4; }");
    assert_semantic_err(
        "fn main() { let a: i32 = 1 + true; }",
        DiagnosticKind::TypeMismatch,
    );
    assert_semantic_err(
        "fn main() { let a: u32 = 1u32; let b: i32 = 2; let c: i32 = a + b; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_free_literal_adapts_to_other_operand() {
    assert_semantic_ok("fn main() { let a: usize = 2usize; let b: usize = 1 + a; }");
    assert_semantic_ok("fn main() { let a: usize = 2usize; let b: usize = a + 1; }");
}

#[test]
fn test_bitwise_and_shifts() {
    assert_semantic_ok(
        "fn main() { let a: u32 = 0xffu32 & 0x0fu32 | 1u32 ^ 2u32; let b: u32 = a << 2u32 >> 1u32; }",
    );
    assert_semantic_err(
        "fn main() { let a: bool = true & false; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_comparisons_produce_bool() {
    assert_semantic_ok("fn main() { let b: bool = 1 < 2; let c: bool = b == false; }");
    assert_semantic_err(
        "fn main() { let b: bool = 1 < true; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_logical_operators_need_bool() {
    assert_semantic_ok("fn main() { let b: bool = true && false || true; }");
    assert_semantic_err(
        "fn main() { let b: bool = 1 && true; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_negation_needs_signed() {
    assert_semantic_ok("fn main() { let a: i32 = -5; let b: isize = -(1isize); }");
    assert_semantic_err(
        "fn main() { let a: u32 = 1u32; let b: u32 = -a; }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_not_on_bool_and_integers() {
    assert_semantic_ok("fn main() { let a: bool = !true; let b: u32 = !0u32; }");
    assert_semantic_err(
        "fn main() { let s: &str = \"x\"; let t: &str = !s; }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_assignment_requires_mutable_place() {
    assert_semantic_ok("fn main() { let mut x: i32 = 1; x = 2; }");
    assert_semantic_err(
        "fn main() { let x: i32 = 1; x = 2; }",
        DiagnosticKind::ImmutableVariableMutated,
    );
    assert_semantic_err(
        "fn main() { 1 = 2; }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_mut_borrow_requires_mutable_place() {
    assert_semantic_ok("fn main() { let mut x: i32 = 1; let r: &mut i32 = &mut x; *r = 2; }");
    assert_semantic_err(
        "fn main() { let x: i32 = 1; let r: &mut i32 = &mut x; }",
        DiagnosticKind::ImmutableVariableMutated,
    );
    assert_semantic_err(
        "fn main() { let r: &mut i32 = &mut 4; }",
        DiagnosticKind::ImmutableVariableMutated,
    );
}

#[test]
fn test_shared_reference_to_rvalue_is_fine() {
    assert_semantic_ok("fn main() { let r: &i32 = &4; let v: i32 = *r; }");
}

#[test]
fn test_deref_requires_reference() {
    assert_semantic_err(
        "fn main() { let x: i32 = 1; let y: i32 = *x; }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_write_through_shared_reference() {
    assert_semantic_err(
        "fn main() { let mut x: i32 = 1; let r: &i32 = &x; *r = 2; }",
        DiagnosticKind::ImmutableVariableMutated,
    );
}

#[test]
fn test_field_mutability_chases_through_references() {
    assert_semantic_ok(
        "struct P { x: i32 }\n\
         fn main() { let mut p: P = P { x: 1 }; let r: &mut P = &mut p; r.x = 2; }",
    );
    assert_semantic_err(
        "struct P { x: i32 }\n\
         fn main() { let mut p: P = P { x: 1 }; let r: &P = &p; r.x = 2; }",
        DiagnosticKind::ImmutableVariableMutated,
    );
}

#[test]
fn test_field_of_immutable_binding() {
    assert_semantic_err(
        "struct P { x: i32 }\n\
         fn main() { let p: P = P { x: 1 }; p.x = 2; }",
        DiagnosticKind::ImmutableVariableMutated,
    );
}

#[test]
fn test_auto_deref_field_through_double_reference() {
    assert_semantic_ok(
        "struct P { x: i32 }\n\
         fn main() {\n\
             let p: P = P { x: 7 };\n\
             let r: &P = &p;\n\
             let rr: &&P = &r;\n\
             let v: i32 = rr.x;\n\
         }",
    );
}

#[test]
fn test_index_through_reference() {
    assert_semantic_ok(
        "fn main() { let a: [i32; 2] = [1, 2]; let r: &[i32; 2] = &a; let v: i32 = r[0]; }",
    );
}

#[test]
fn test_function_item_is_not_a_value() {
    assert_semantic_err(
        "fn f() { } fn main() { let g: i32 = f; }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_call_arity_and_argument_types() {
    assert_semantic_ok("fn add(a: i32, b: i32) -> i32 { a + b } fn main() { add(1, 2); }");
    assert_semantic_err(
        "fn add(a: i32, b: i32) -> i32 { a + b } fn main() { add(1); }",
        DiagnosticKind::TypeMismatch,
    );
    assert_semantic_err(
        "fn add(a: i32, b: i32) -> i32 { a + b } fn main() { add(1, true); }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_calling_a_non_function() {
    assert_semantic_err(
        "fn main() { let x: i32 = 1; x(); }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_string_from_accepts_both_str_references() {
    assert_semantic_ok(
        "fn main() {\n\
             let a: String = String::from(\"lit\");\n\
             let mut s: String = String::from(\"x\");\n\
             let m: &mut str = s.as_mut_str();\n\
             let b: String = String::from(m);\n\
         }",
    );
    assert_semantic_err(
        "fn main() { let s: String = String::from(1); }",
        DiagnosticKind::TypeMismatch,
    );
}
