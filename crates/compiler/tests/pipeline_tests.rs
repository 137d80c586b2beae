//! End-to-end pipeline tests over the driver entry points.

use rx_compiler::{read_input, run_ir, run_semantic, PipelineError};
use rx_compiler_diagnostics::{render_plain, DiagnosticKind};
use rx_compiler_mir::pretty::{render_externals, render_module};

#[test]
fn test_arithmetic_program_compiles() {
    let source = "fn main() {\n\
                      let a: i32 = getInt();\n\
                      let b: i32 = getInt();\n\
                      printlnInt(a + b);\n\
                      exit(0);\n\
                  }";
    let (analysis, module) = run_ir(source, "demo.rx").expect("pipeline succeeds");
    assert!(module.function_by_name("main").is_some());

    let ir = render_module(&module, &analysis.ctx);
    assert!(ir.contains("fn main"));
    assert!(ir.contains("call"));

    let externals = render_externals(&module, &analysis.ctx);
    assert!(externals.contains("declare getInt"));
    assert!(externals.contains("declare exit"));
}

#[test]
fn test_type_mismatch_reported() {
    let source = "fn main() { let a: i32 = true; exit(0); }";
    let diagnostic = run_semantic(source, "demo.rx").unwrap_err();
    assert_eq!(diagnostic.kind, DiagnosticKind::TypeMismatch);

    let rendered = render_plain(source, &diagnostic);
    let header = rendered.lines().next().unwrap();
    assert!(
        header.starts_with("demo.rx:1:"),
        "plain format starts with file:line:col, got {header}"
    );
    assert!(header.contains(": TypeMismatch: "));
}

#[test]
fn test_missing_return_reported() {
    let source = "fn f() -> i32 { let x: i32 = 1; } fn main() { exit(0); }";
    let diagnostic = run_semantic(source, "demo.rx").unwrap_err();
    assert_eq!(diagnostic.kind, DiagnosticKind::MissingReturn);
}

#[test]
fn test_syntax_error_reported() {
    let source = "fn main( { }";
    let diagnostic = run_semantic(source, "demo.rx").unwrap_err();
    assert_eq!(diagnostic.kind, DiagnosticKind::SyntaxError);
}

#[test]
fn test_ir_pipeline_stops_on_semantic_error() {
    let source = "fn main() { undefined(); }";
    match run_ir(source, "demo.rx") {
        Err(PipelineError::Diagnostic(diagnostic)) => {
            assert_eq!(diagnostic.kind, DiagnosticKind::UndefinedName);
        }
        other => panic!("expected a diagnostic, got {other:?}"),
    }
}

#[test]
fn test_auto_borrow_program_lowers() {
    let source = "struct A { x: i32 }\n\
                  impl A { fn get(&self) -> i32 { self.x } }\n\
                  fn main() { let a: A = A { x: 7 }; printlnInt(a.get()); exit(0); }";
    let (analysis, module) = run_ir(source, "demo.rx").expect("pipeline succeeds");
    assert!(module.function_by_name("A::get").is_some());
    let ir = render_module(&module, &analysis.ctx);
    assert!(ir.contains("fn A::get"));
}

#[test]
fn test_read_input_from_file() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, "fn main() {{ exit(0); }}").expect("write");
    let path = file.path().to_string_lossy().to_string();

    let (source, name) = read_input(&path).expect("readable");
    assert_eq!(name, path);
    assert!(run_semantic(&source, &name).is_ok());
}

#[test]
fn test_read_input_missing_file() {
    assert!(read_input("/no/such/file.rx").is_err());
}
