//! Method calls: the auto-ref/auto-deref probe, receiver mutability, and
//! the builtin method surface.

use rx_compiler_diagnostics::DiagnosticKind;

use crate::common::{assert_semantic_err, assert_semantic_ok};

#[test]
fn test_auto_borrow_for_ref_receiver() {
    assert_semantic_ok(
        "struct A { x: i32 }\n\
         impl A { fn get(&self) -> i32 { self.x } }\n\
         fn main() { let a: A = A { x: 7 }; printlnInt(a.get()); exit(0); }",
    );
}

#[test]
fn test_method_found_through_reference() {
    assert_semantic_ok(
        "struct A { x: i32 }\n\
         impl A { fn get(&self) -> i32 { self.x } }\n\
         fn read(r: &A) -> i32 { r.get() }\n\
         fn main() { let a: A = A { x: 1 }; printInt(read(&a)); }",
    );
}

#[test]
fn test_mut_receiver_needs_mutable_place() {
    assert_semantic_ok(
        "struct C { n: i32 }\n\
         impl C { fn bump(&mut self) { self.n = self.n + 1; } }\n\
         fn main() { let mut c: C = C { n: 0 }; c.bump(); }",
    );
    assert_semantic_err(
        "struct C { n: i32 }\n\
         impl C { fn bump(&mut self) { self.n = self.n + 1; } }\n\
         fn main() { let c: C = C { n: 0 }; c.bump(); }",
        DiagnosticKind::ImmutableVariableMutated,
    );
}

#[test]
fn test_shared_ref_never_promotes_to_mut() {
    assert_semantic_err(
        "struct C { n: i32 }\n\
         impl C { fn bump(&mut self) { self.n = self.n + 1; } }\n\
         fn f(r: &C) { r.bump(); }\n\
         fn main() { }",
        DiagnosticKind::ImmutableVariableMutated,
    );
}

#[test]
fn test_mut_ref_demotes_to_shared() {
    assert_semantic_ok(
        "struct A { x: i32 }\n\
         impl A { fn get(&self) -> i32 { self.x } }\n\
         fn f(r: &mut A) -> i32 { r.get() }\n\
         fn main() { }",
    );
}

#[test]
fn test_by_value_receiver() {
    assert_semantic_ok(
        "struct A { x: i32 }\n\
         impl A { fn into_x(self) -> i32 { self.x } }\n\
         fn main() { let a: A = A { x: 2 }; printInt(a.into_x()); }",
    );
}

#[test]
fn test_unknown_method() {
    assert_semantic_err(
        "struct A { x: i32 }\n\
         fn main() { let a: A = A { x: 1 }; a.missing(); }",
        DiagnosticKind::UndefinedName,
    );
}

#[test]
fn test_method_argument_checking() {
    assert_semantic_err(
        "struct A { x: i32 }\n\
         impl A { fn set(&mut self, v: i32) { self.x = v; } }\n\
         fn main() { let mut a: A = A { x: 1 }; a.set(true); }",
        DiagnosticKind::TypeMismatch,
    );
}

#[test]
fn test_associated_function_call() {
    assert_semantic_ok(
        "struct A { x: i32 }\n\
         impl A { fn origin() -> A { A { x: 0 } } }\n\
         fn main() { let a: A = A::origin(); }",
    );
}

#[test]
fn test_method_called_as_associated_function_rejected() {
    assert_semantic_err(
        "struct A { x: i32 }\n\
         impl A { fn get(&self) -> i32 { self.x } }\n\
         fn main() { let a: A = A { x: 1 }; A::get(); }",
        DiagnosticKind::InvalidType,
    );
}

#[test]
fn test_methods_on_enums() {
    assert_semantic_ok(
        "enum Direction { North, South }\n\
         impl Direction { fn flip(&self) -> Direction {\n\
             if *self as i32 == 0 { Direction::South } else { Direction::North }\n\
         } }\n\
         fn main() { let d: Direction = Direction::North; let e: Direction = d.flip(); }",
    );
}

#[test]
fn test_builtin_len_methods() {
    assert_semantic_ok(
        "fn main() {\n\
             let a: [i32; 3] = [0; 3];\n\
             let n1: usize = a.len();\n\
             let r: &[i32; 3] = &a;\n\
             let n2: usize = r.len();\n\
             let s: &str = \"hello\";\n\
             let n3: usize = s.len();\n\
         }",
    );
}

#[test]
fn test_to_string_on_unsigned() {
    assert_semantic_ok(
        "fn main() { let s: String = 42u32.to_string(); let t: String = 7usize.to_string(); }",
    );
    assert_semantic_err(
        "fn main() { let s: String = 42i32.to_string(); }",
        DiagnosticKind::UndefinedName,
    );
}

#[test]
fn test_probe_materializes_synthetic_borrow() {
    use rx_compiler_semantic::hir::{ExprKind, Stmt};

    let analysis = assert_semantic_ok(
        "struct A { x: i32 }\n\
         impl A { fn get(&self) -> i32 { self.x } }\n\
         fn main() { let a: A = A { x: 7 }; a.get(); }",
    );
    let main = analysis.program.main_function().expect("main exists");
    let body = analysis.program.functions[main].body.as_ref().expect("body");
    let Stmt::Expr { expr, .. } = &body.stmts[1] else {
        panic!("second statement is the method call");
    };
    let ExprKind::MethodCall { receiver, .. } = &expr.kind else {
        panic!("expected a method call");
    };
    // The checker inserted `&a` for the `&self` receiver.
    let ExprKind::Ref {
        mutable, synthetic, ..
    } = &receiver.kind
    else {
        panic!("receiver was not auto-borrowed: {:?}", receiver.kind);
    };
    assert!(!mutable);
    assert!(synthetic);
}
