//! MIR lowering tests: destination passing, NRVO, sret calls, phi joins,
//! and the structural invariants of the generated module.

use rx_compiler_mir::{
    lower_program, AbiParamKind, CallDest, Callee, MirFunction, MirModule, RValue, ReturnDesc,
    Statement,
};
use rx_compiler_parser::parse_program;
use rx_compiler_semantic::types::TypeContext;
use rx_compiler_semantic::analyze;

fn lower(source: &str) -> (MirModule, TypeContext) {
    let parsed = parse_program(source, "test.rx");
    assert!(
        parsed.diagnostics.is_empty(),
        "parse failed: {:?}",
        parsed.diagnostics
    );
    let mut analysis = analyze(&parsed.program, "test.rx").expect("semantic analysis succeeds");
    let module =
        lower_program(&analysis.program, &mut analysis.ctx).expect("lowering succeeds");
    (module, analysis.ctx)
}

fn statements(function: &MirFunction) -> Vec<&Statement> {
    function
        .basic_blocks
        .iter()
        .flat_map(|block| block.statements.iter())
        .collect()
}

fn count_calls_to(module: &MirModule, function: &MirFunction, external: &str) -> usize {
    let Some(id) = module.external_by_name(external) else {
        return 0;
    };
    statements(function)
        .iter()
        .filter(|stmt| {
            matches!(
                stmt,
                Statement::Call {
                    target: Callee::External(ext),
                    ..
                } if *ext == id
            )
        })
        .count()
}

#[test]
fn test_arithmetic_end_to_end() {
    let (module, _ctx) = lower(
        "fn main() {\n\
             let a: i32 = getInt();\n\
             let b: i32 = getInt();\n\
             printlnInt(a + b);\n\
             exit(0);\n\
         }",
    );
    let main = module.function_by_name("main").expect("main exists");

    assert_eq!(count_calls_to(&module, main, "getInt"), 2);
    assert_eq!(count_calls_to(&module, main, "printlnInt"), 1);
    assert_eq!(count_calls_to(&module, main, "exit"), 1);

    let adds = statements(main)
        .iter()
        .filter(|stmt| {
            matches!(
                stmt,
                Statement::Define {
                    rvalue: RValue::BinaryOp {
                        op: rx_compiler_mir::BinOp::Add,
                        ..
                    },
                    ..
                }
            )
        })
        .count();
    assert_eq!(adds, 1);
}

#[test]
fn test_validation_holds_for_generated_mir() {
    let (module, ctx) = lower(
        "struct P { x: i32, y: i32 }\n\
         fn sum(p: P) -> i32 { p.x + p.y }\n\
         fn main() {\n\
             let mut i: i32 = 0;\n\
             while i < 3 {\n\
                 i = i + sum(P { x: i, y: 1 });\n\
             }\n\
             printInt(i);\n\
         }",
    );
    for function in &module.functions {
        function.validate(&ctx).expect("valid MIR");
    }
}

#[test]
fn test_aggregate_return_uses_sret() {
    let (module, _ctx) = lower(
        "struct Big { a: i32, b: i32 }\n\
         fn make() -> Big { Big { a: 1, b: 2 } }\n\
         fn main() { let b: Big = make(); printInt(b.a); }",
    );
    let make = module.function_by_name("make").expect("make exists");
    assert!(matches!(make.sig.return_desc, ReturnDesc::IndirectSRet(_)));
    assert!(matches!(
        make.sig.abi_params.first(),
        Some(param) if param.kind == AbiParamKind::SRet
    ));
    assert!(make.ret_slot.is_some());

    // The caller passes `b`'s slot straight through as the destination.
    let main = module.function_by_name("main").expect("main exists");
    let sret_calls = statements(main)
        .iter()
        .filter(|stmt| {
            matches!(
                stmt,
                Statement::Call {
                    dest: CallDest::SRet(_),
                    ..
                }
            )
        })
        .count();
    assert_eq!(sret_calls, 1);
}

#[test]
fn test_nrvo_aliases_named_local() {
    let (module, _ctx) = lower(
        "struct Big { a: i32, b: i32 }\n\
         fn make() -> Big {\n\
             let r: Big = Big { a: 1, b: 2 };\n\
             r\n\
         }\n\
         fn main() { let b: Big = make(); }",
    );
    let make = module.function_by_name("make").expect("make exists");
    let ret_slot = make.ret_slot.expect("sret slot");
    // The named local `r` is the return slot; no copy is emitted on return.
    assert_eq!(make.locals[ret_slot].name, "r");
    let loads = statements(make)
        .iter()
        .filter(|stmt| matches!(stmt, Statement::Load { .. }))
        .count();
    assert_eq!(loads, 0, "NRVO return must not copy the aggregate");
}

#[test]
fn test_aggregate_initialization_flattens() {
    let (module, _ctx) = lower(
        "struct Inner { v: [i32; 2] }\n\
         struct Outer { inner: Inner, flag: bool }\n\
         fn main() {\n\
             let o: Outer = Outer { inner: Inner { v: [1, 2] }, flag: true };\n\
             printInt(o.inner.v[0]);\n\
         }",
    );
    let main = module.function_by_name("main").expect("main exists");
    // Every write lands in a projected sub-place of `o`; nothing allocates
    // an intermediate aggregate.
    let assigns = statements(main)
        .iter()
        .filter(|stmt| matches!(stmt, Statement::Assign { .. }))
        .count();
    assert!(assigns >= 3, "flattened writes for two ints and a bool");
    let synthesized = main
        .locals
        .iter()
        .filter(|local| local.name.starts_with("_t"))
        .count();
    assert_eq!(synthesized, 0, "no temporary aggregate storage");
}

#[test]
fn test_loop_break_value_merges() {
    let (module, _ctx) = lower(
        "fn main() { let x: i32 = loop { break 3; }; printlnInt(x); exit(0); }",
    );
    let main = module.function_by_name("main").expect("main exists");
    let phi_count: usize = main
        .basic_blocks
        .iter()
        .map(|block| block.phis.len())
        .sum();
    assert_eq!(phi_count, 1, "the break value flows through one phi");
}

#[test]
fn test_if_value_without_destination_uses_phi() {
    let (module, _ctx) = lower(
        "fn main() { let c: bool = true; printInt(if c { 1 } else { 2 }); }",
    );
    let main = module.function_by_name("main").expect("main exists");
    let phi_count: usize = main
        .basic_blocks
        .iter()
        .map(|block| block.phis.len())
        .sum();
    assert_eq!(phi_count, 1);
}

#[test]
fn test_if_with_destination_avoids_phi() {
    let (module, _ctx) = lower(
        "fn main() { let c: bool = true; let x: i32 = if c { 1 } else { 2 }; printInt(x); }",
    );
    let main = module.function_by_name("main").expect("main exists");
    let phi_count: usize = main
        .basic_blocks
        .iter()
        .map(|block| block.phis.len())
        .sum();
    assert_eq!(phi_count, 0, "both arms write the destination directly");
}

#[test]
fn test_mutable_aggregate_param_gets_caller_copy() {
    let (module, _ctx) = lower(
        "struct P { x: i32 }\n\
         fn consume(mut p: P) -> i32 { p.x = p.x + 1; p.x }\n\
         fn observe(p: P) -> i32 { p.x }\n\
         fn main() {\n\
             let p: P = P { x: 1 };\n\
             printInt(consume(p));\n\
             printInt(observe(p));\n\
         }",
    );
    let consume = module.function_by_name("consume").expect("consume exists");
    assert_eq!(consume.sig.abi_params[0].kind, AbiParamKind::ByValCallerCopy);
    let observe = module.function_by_name("observe").expect("observe exists");
    assert_eq!(observe.sig.abi_params[0].kind, AbiParamKind::Ref);
}

#[test]
fn test_reference_to_rvalue_materializes_a_place() {
    let (module, _ctx) = lower("fn main() { let r: &i32 = &42; printInt(*r); }");
    let main = module.function_by_name("main").expect("main exists");
    let has_synth = main.locals.iter().any(|local| local.name.starts_with("_t"));
    assert!(has_synth, "the rvalue is spilled into a synthesized local");
    let refs = statements(main)
        .iter()
        .filter(|stmt| {
            matches!(
                stmt,
                Statement::Define {
                    rvalue: RValue::Ref { .. },
                    ..
                }
            )
        })
        .count();
    assert_eq!(refs, 1);
}

#[test]
fn test_getstring_external_is_sret() {
    let (module, _ctx) = lower("fn main() { let s: String = getString(); }");
    let id = module
        .external_by_name("getString")
        .expect("external registered");
    let external = &module.external_functions[id];
    assert!(matches!(
        external.sig.return_desc,
        ReturnDesc::IndirectSRet(_)
    ));
}

#[test]
fn test_array_len_folds_to_constant() {
    let (module, _ctx) = lower(
        "fn main() { let a: [i32; 5] = [0; 5]; let n: usize = a.len(); }",
    );
    assert!(module.external_by_name("array_len").is_none());
}

#[test]
fn test_no_reachable_block_is_unterminated() {
    let (module, _ctx) = lower(
        "fn f(c: bool) -> i32 { if c { return 1; } loop { } }\n\
         fn main() { printInt(f(true)); }",
    );
    let f = module.function_by_name("f").expect("f exists");
    for block_id in f.reachable_blocks() {
        assert!(f.block(block_id).is_terminated());
    }
}
