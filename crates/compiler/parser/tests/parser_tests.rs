//! Parser integration tests: grammar coverage over items, statements and
//! the expression precedence tower.

use rx_compiler_parser::parser::{
    BinaryOp, Expression, Item, Statement, TypeExpr,
};
use rx_compiler_parser::{parse_program, ParseOutput};

#[track_caller]
fn parse_ok(source: &str) -> ParseOutput {
    let output = parse_program(source, "test.rx");
    assert!(
        output.diagnostics.is_empty(),
        "expected a clean parse, got {:?}\nsource: {source}",
        output.diagnostics
    );
    output
}

#[track_caller]
fn parse_err(source: &str) {
    let output = parse_program(source, "test.rx");
    assert!(
        !output.diagnostics.is_empty(),
        "expected a parse failure\nsource: {source}"
    );
}

fn main_body(output: &ParseOutput) -> &Expression {
    let Item::Function(def) = &output.program.items[0] else {
        panic!("first item is not a function");
    };
    def.value().body.as_ref().expect("body").value()
}

#[test]
fn test_function_items() {
    let output = parse_ok("fn add(x: i32, mut y: i32) -> i32 { x + y }");
    let Item::Function(def) = &output.program.items[0] else {
        panic!("expected a function");
    };
    assert_eq!(def.value().name.value(), "add");
    assert_eq!(def.value().params.len(), 2);
    assert!(def.value().return_type.is_some());
}

#[test]
fn test_struct_enum_const_items() {
    let output = parse_ok(
        "struct Point { x: i32, y: i32 }\n\
         struct Marker;\n\
         enum Color { Red, Green, Blue }\n\
         const LIMIT: usize = 64;",
    );
    assert_eq!(output.program.items.len(), 4);
    let Item::Enum(def) = &output.program.items[2] else {
        panic!("expected an enum");
    };
    assert_eq!(def.value().variants.len(), 3);
}

#[test]
fn test_trait_and_impl_items() {
    parse_ok(
        "trait Area { fn area(&self) -> i32; const SIDES: i32 = 4; }\n\
         struct Square { side: i32 }\n\
         impl Area for Square { fn area(&self) -> i32 { self.side * self.side } }\n\
         impl Square { fn double(&mut self) { self.side = self.side * 2; } }",
    );
}

#[test]
fn test_precedence_mul_before_add() {
    let output = parse_ok("fn main() { let x: i32 = 1 + 2 * 3; }");
    let Expression::Block(block) = main_body(&output) else {
        panic!("body is a block");
    };
    let Statement::Let { value, .. } = block.statements[0].value() else {
        panic!("expected let");
    };
    let Expression::Binary { op, right, .. } = value.as_ref().unwrap().value() else {
        panic!("expected binary");
    };
    assert_eq!(*op, BinaryOp::Add);
    assert!(matches!(
        right.value(),
        Expression::Binary {
            op: BinaryOp::Mul,
            ..
        }
    ));
}

#[test]
fn test_comparison_binds_looser_than_bitor() {
    let output = parse_ok("fn main() { let x: bool = 1 | 2 == 3; }");
    let Expression::Block(block) = main_body(&output) else {
        panic!("body is a block");
    };
    let Statement::Let { value, .. } = block.statements[0].value() else {
        panic!("expected let");
    };
    // `1 | 2 == 3` parses as `(1 | 2) == 3`.
    assert!(matches!(
        value.as_ref().unwrap().value(),
        Expression::Binary {
            op: BinaryOp::Eq,
            ..
        }
    ));
}

#[test]
fn test_unary_binds_tighter_than_cast() {
    let output = parse_ok("fn main() { let x: usize = -1 as usize; }");
    let Expression::Block(block) = main_body(&output) else {
        panic!("body is a block");
    };
    let Statement::Let { value, .. } = block.statements[0].value() else {
        panic!("expected let");
    };
    let Expression::Cast { expr, .. } = value.as_ref().unwrap().value() else {
        panic!("expected `(-1) as usize`");
    };
    assert!(matches!(expr.value(), Expression::Unary { .. }));
}

#[test]
fn test_method_call_vs_member_access() {
    let output = parse_ok("fn main() { a.b.c(1)[0]; }");
    let Expression::Block(block) = main_body(&output) else {
        panic!("body is a block");
    };
    let Statement::Expression { expr, .. } = block.statements[0].value() else {
        panic!("expected expression statement");
    };
    let Expression::IndexAccess { array, .. } = expr.value() else {
        panic!("outermost is the index");
    };
    let Expression::MethodCall { receiver, method, .. } = array.value() else {
        panic!("then the method call");
    };
    assert_eq!(method.value(), "c");
    assert!(matches!(receiver.value(), Expression::MemberAccess { .. }));
}

#[test]
fn test_struct_literal_forbidden_in_condition() {
    // `S { f: 1 }` cannot start the condition: `S` is the whole condition,
    // and `{ f: 1 }` fails to parse as a block.
    parse_err("struct S { f: i32 } fn main() { if S { f: 1 }.f == 1 { } }");
    // But fine behind parentheses.
    parse_ok("struct S { f: i32 } fn main() { if (S { f: 1 }).f == 1 { } }");
    // And `if c { .. }` keeps parsing as condition-then-block.
    parse_ok("fn main() { if c { } }");
}

#[test]
fn test_trailing_expression_becomes_block_value() {
    let output = parse_ok("fn f() -> i32 { g(); 42 }");
    let Item::Function(def) = &output.program.items[0] else {
        panic!("expected function");
    };
    let Expression::Block(block) = def.value().body.as_ref().unwrap().value() else {
        panic!("body block");
    };
    assert_eq!(block.statements.len(), 1);
    assert!(block.tail.is_some());
}

#[test]
fn test_trailing_if_becomes_block_value() {
    let output = parse_ok("fn f() -> i32 { if c { 1 } else { 2 } }");
    let Item::Function(def) = &output.program.items[0] else {
        panic!("expected function");
    };
    let Expression::Block(block) = def.value().body.as_ref().unwrap().value() else {
        panic!("body block");
    };
    assert!(block.statements.is_empty());
    assert!(matches!(
        block.tail.as_ref().unwrap().value(),
        Expression::If { .. }
    ));
}

#[test]
fn test_array_literal_and_repeat() {
    let output = parse_ok("fn main() { let a: [i32; 3] = [1, 2, 3]; let b: [i32; 4] = [0; 4]; }");
    let Expression::Block(block) = main_body(&output) else {
        panic!("body block");
    };
    let Statement::Let { ty, value, .. } = block.statements[0].value() else {
        panic!("let");
    };
    assert!(matches!(ty.value(), TypeExpr::Array { .. }));
    assert!(matches!(
        value.as_ref().unwrap().value(),
        Expression::ArrayLiteral(_)
    ));
    let Statement::Let { value, .. } = block.statements[1].value() else {
        panic!("let");
    };
    assert!(matches!(
        value.as_ref().unwrap().value(),
        Expression::ArrayRepeat { .. }
    ));
}

#[test]
fn test_reference_types_and_borrows() {
    parse_ok(
        "fn f(r: &i32, m: &mut [i32; 2]) -> &i32 { r }\n\
         fn main() { let x: i32 = 1; f(&x, &mut [0, 0]); }",
    );
}

#[test]
fn test_loop_break_value() {
    let output = parse_ok("fn main() { let x: i32 = loop { break 3; }; }");
    let Expression::Block(block) = main_body(&output) else {
        panic!("body block");
    };
    let Statement::Let { value, .. } = block.statements[0].value() else {
        panic!("let");
    };
    assert!(matches!(
        value.as_ref().unwrap().value(),
        Expression::Loop { .. }
    ));
}

#[test]
fn test_paths() {
    let output = parse_ok("fn main() { Color::Red; String::from(\"x\"); }");
    let Expression::Block(block) = main_body(&output) else {
        panic!("body block");
    };
    let Statement::Expression { expr, .. } = block.statements[0].value() else {
        panic!("expr stmt");
    };
    let Expression::Path { segments } = expr.value() else {
        panic!("path");
    };
    assert_eq!(segments.len(), 2);
}

#[test]
fn test_parse_errors() {
    parse_err("fn main( { }");
    parse_err("fn main() { let x i32 = 1; }");
    parse_err("struct S { x: }");
    parse_err("fn main() { 1 +; }");
}

#[test]
fn test_lexer_error_is_reported() {
    let output = parse_program("fn main() { let x: i32 = 1$; }", "test.rx");
    assert!(!output.diagnostics.is_empty());
    assert!(output.diagnostics[0].message.contains("unrecognized token"));
}
