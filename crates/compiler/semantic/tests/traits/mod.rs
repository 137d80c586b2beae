//! Trait declarations, implementations, and the signature match check.

use rx_compiler_diagnostics::DiagnosticKind;

use crate::common::{assert_semantic_err, assert_semantic_ok};

#[test]
fn test_complete_trait_impl() {
    assert_semantic_ok(
        "trait Shape { fn area(&self) -> i32; }\n\
         struct Square { side: i32 }\n\
         impl Shape for Square { fn area(&self) -> i32 { self.side * self.side } }\n\
         fn main() { let s: Square = Square { side: 3 }; printInt(s.area()); }",
    );
}

#[test]
fn test_missing_trait_item() {
    assert_semantic_err(
        "trait Shape { fn area(&self) -> i32; }\n\
         struct Square { side: i32 }\n\
         impl Shape for Square { }\n\
         fn main() { }",
        DiagnosticKind::TraitItemUnimplemented,
    );
}

#[test]
fn test_return_type_mismatch() {
    assert_semantic_err(
        "trait T { fn f(&self) -> i32; }\n\
         struct S;\n\
         impl T for S { fn f(&self) -> bool { true } }\n\
         fn main() { }",
        DiagnosticKind::TraitItemUnimplemented,
    );
}

#[test]
fn test_parameter_type_mismatch() {
    assert_semantic_err(
        "trait T { fn f(&self, v: i32); }\n\
         struct S;\n\
         impl T for S { fn f(&self, v: bool) { } }\n\
         fn main() { }",
        DiagnosticKind::TraitItemUnimplemented,
    );
}

#[test]
fn test_receiver_shape_mismatch() {
    assert_semantic_err(
        "trait T { fn f(&mut self); }\n\
         struct S;\n\
         impl T for S { fn f(&self) { } }\n\
         fn main() { }",
        DiagnosticKind::TraitItemUnimplemented,
    );
}

#[test]
fn test_extra_impl_item_rejected() {
    assert_semantic_err(
        "trait T { fn f(&self); }\n\
         struct S;\n\
         impl T for S { fn f(&self) { } fn g(&self) { } }\n\
         fn main() { }",
        DiagnosticKind::TraitItemUnimplemented,
    );
}

#[test]
fn test_trait_const_with_default() {
    assert_semantic_ok(
        "trait T { const K: i32 = 5; fn f(&self); }\n\
         struct S;\n\
         impl T for S { fn f(&self) { } }\n\
         fn main() { let k: i32 = S::K; printInt(k); }",
    );
}

#[test]
fn test_trait_const_without_default_required() {
    assert_semantic_err(
        "trait T { const K: i32; }\n\
         struct S;\n\
         impl T for S { }\n\
         fn main() { }",
        DiagnosticKind::TraitItemUnimplemented,
    );
}

#[test]
fn test_trait_const_override_type_checked() {
    assert_semantic_err(
        "trait T { const K: i32; }\n\
         struct S;\n\
         impl T for S { const K: bool = true; }\n\
         fn main() { }",
        DiagnosticKind::TraitItemUnimplemented,
    );
}

#[test]
fn test_duplicate_trait_impl() {
    assert_semantic_err(
        "trait T { fn f(&self); }\n\
         struct S;\n\
         impl T for S { fn f(&self) { } }\n\
         impl T for S { fn f(&self) { } }\n\
         fn main() { }",
        DiagnosticKind::MultipleDefinition,
    );
}

#[test]
fn test_unknown_trait() {
    assert_semantic_err(
        "struct S;\n\
         impl Nope for S { }\n\
         fn main() { }",
        DiagnosticKind::UndefinedName,
    );
}

#[test]
fn test_impl_target_must_be_nominal() {
    assert_semantic_err("impl i32 { } fn main() { }", DiagnosticKind::InvalidType);
}

#[test]
fn test_self_type_in_impl() {
    assert_semantic_ok(
        "struct Counter { n: i32 }\n\
         impl Counter {\n\
             fn fresh() -> Self { Counter { n: 0 } }\n\
             fn clone_me(&self) -> Self { Counter { n: self.n } }\n\
         }\n\
         fn main() { let c: Counter = Counter::fresh(); let d: Counter = c.clone_me(); }",
    );
}

#[test]
fn test_trait_method_body_rejected() {
    assert_semantic_err(
        "trait T { fn f(&self) { } }\n\
         fn main() { }",
        DiagnosticKind::SyntaxError,
    );
}
