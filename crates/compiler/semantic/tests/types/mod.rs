//! Types: annotations, literal typing, arrays, structs, enums, consts,
//! casts, and the struct containment cycle check.

use rx_compiler_diagnostics::DiagnosticKind;

use crate::common::{assert_semantic_err, assert_semantic_ok};

#[test]
fn test_let_type_mismatch() {
    assert_semantic_err(
        "fn main() { let a: i32 = true; exit(0); }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_literal_suffixes() {
    assert_semantic_ok("fn main() { let a: u32 = 1u32; let b: usize = 2usize; }");
    assert_semantic_err(
        "fn main() { let a: u32 = 1i32; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_unsuffixed_literal_takes_expected_type() {
    assert_semantic_ok("fn main() { let a: usize = 10; let b: u32 = 0; }");
}

#[test]
fn test_expected_type_sticks_to_the_binding() {
    assert_semantic_err(
        "fn main() { let a: usize = 1; let b: i32 = a; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_i32_min_literal() {
    assert_semantic_ok("fn main() { let a: i32 = -2147483648; }");
    assert_semantic_err(
        "fn main() { let a: i32 = 2147483648; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_array_types() {
    assert_semantic_ok("fn main() { let a: [i32; 3] = [1, 2, 3]; let x: i32 = a[0]; }");
    assert_semantic_err(
        "fn main() { let a: [i32; 3] = [1, 2]; }",
        DiagnosticKind::TypeMismatch,
    );
    assert_semantic_err(
        "fn main() { let a: [i32; 2] = [1, true]; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_index_must_be_usize() {
    assert_semantic_ok("fn main() { let a: [i32; 2] = [1, 2]; let i: usize = 1; a[i]; }");
    assert_semantic_err(
        "fn main() { let a: [i32; 2] = [1, 2]; let i: i32 = 1; a[i]; }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_index_non_array() {
    assert_semantic_err(
        "fn main() { let x: i32 = 1; x[0]; }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_struct_literal_checking() {
    assert_semantic_ok(
        "struct Point { x: i32, y: i32 }\n\
         fn main() { let p: Point = Point { y: 2, x: 1 }; let x: i32 = p.x; }",
    );
    assert_semantic_err(
        "struct Point { x: i32, y: i32 }\n\
         fn main() { let p: Point = Point { x: 1 }; }",
        DiagnosticKind::TypeMismatch,
    );
    assert_semantic_err(
        "struct Point { x: i32 }\n\
         fn main() { let p: Point = Point { x: 1, z: 2 }; }",
        DiagnosticKind::UndefinedName,
    );
    assert_semantic_err(
        "struct Point { x: i32 }\n\
         fn main() { let p: Point = Point { x: 1, x: 2 }; }",
        DiagnosticKind::MultipleDefinition,
    );
}

#[test]
fn test_unknown_field_access() {
    assert_semantic_err(
        "struct Point { x: i32 }\n\
         fn main() { let p: Point = Point { x: 1 }; let y: i32 = p.y; }",
        DiagnosticKind::UndefinedName,
    );
}

#[test]
fn test_field_on_non_struct() {
    assert_semantic_err(
        "fn main() { let x: i32 = 1; let y: i32 = x.f; }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_recursive_struct_rejected() {
    assert_semantic_err(
        "struct A { b: B } struct B { a: A } fn main() { }",
        DiagnosticKind::InvalidType,
    );
    assert_semantic_err(
        "struct S { next: S } fn main() { }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_recursion_through_reference_is_fine() {
    assert_semantic_ok(
        "struct Node { next: &Node, value: i32 } fn main() { }",
    );
}

#[test]
fn test_recursion_through_array_rejected() {
    assert_semantic_err(
        "struct S { inner: [S; 2] } fn main() { }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_mutual_recursion_of_types_with_forward_refs() {
    assert_semantic_ok(
        "struct A { b: &B } struct B { a: &A } fn main() { }",
    );
}

#[test]
fn test_const_in_array_length() {
    assert_semantic_ok(
        "const N: usize = 4;\n\
         fn main() { let a: [i32; N] = [0; N]; let n: usize = a.len(); }",
    );
}

#[test]
fn test_const_arithmetic_and_references() {
    assert_semantic_ok(
        "const A: i32 = 2 + 3 * 4;\n\
         const B: i32 = A * 2;\n\
         fn main() { let x: i32 = B; }",
    );
}

#[test]
fn test_const_cycle() {
    assert_semantic_err(
        "const A: i32 = B; const B: i32 = A; fn main() { }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_const_division_by_zero() {
    assert_semantic_err(
        "const A: i32 = 1 / 0; fn main() { }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_const_rejects_non_const_constructs() {
    assert_semantic_err(
        "const A: i32 = getInt(); fn main() { }",
        DiagnosticKind::InvalidType,
    );
    assert_semantic_err(
        "const A: i32 = { 1 }; fn main() { }",
        DiagnosticKind::InvalidType,
    );
    assert_semantic_err(
        "const A: bool = 1 < 2; fn main() { }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_const_range_check() {
    assert_semantic_err(
        "const A: u32 = -1; fn main() { }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_negative_array_length() {
    assert_semantic_err(
        "fn main() { let a: [i32; -1] = [0; 0]; }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_casts() {
    assert_semantic_ok(
        "fn main() {\n\
             let a: i32 = 'x' as i32;\n\
             let b: u32 = a as u32;\n\
             let c: usize = true as usize;\n\
         }",
    );
    assert_semantic_err(
        "fn main() { let b: bool = 1 as bool; }",
        DiagnosticKind::InvalidType,
    );
    assert_semantic_err(
        "struct S { x: i32 } fn main() { let s: S = S { x: 1 }; let y: i32 = s as i32; }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_enum_to_integer_cast() {
    assert_semantic_ok(
        "enum Color { Red, Green, Blue }\n\
         fn main() { let n: i32 = Color::Blue as i32; }",
    );
}

#[test]
fn test_string_type_round_trip() {
    assert_semantic_ok(
        "fn main() {\n\
             let mut s: String = String::from(\"hello\");\n\
             s.append(\" world\");\n\
             let v: &str = s.as_str();\n\
             let n: usize = s.len();\n\
         }",
    );
}

#[test]
fn test_empty_array_needs_expectation() {
    assert_semantic_ok("fn main() { let a: [i32; 0] = []; }");
    assert_semantic_err("fn main() { [].len(); }", DiagnosticKind::InvalidType);
}
