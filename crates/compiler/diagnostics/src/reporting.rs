//! # Diagnostic Rendering
//!
//! Two renderers over the shared [`Diagnostic`] type: the plain
//! `<file>:<line>:<col>: <kind>: <message>` format the pipeline binaries
//! write to stderr, and an `ariadne` report for colored terminal output.

use ariadne::{Label, Report};

use crate::Diagnostic;

/// Render a diagnostic in the pipeline's stderr format.
///
/// One header line, then the offending source line indented by four spaces
/// with a caret underline beneath the span:
///
/// ```text
/// demo.rx:3:9: TypeMismatch: expected `i32`, found `bool`
///     let a: i32 = true;
///             ^^^^
/// ```
///
/// Line and column are 1-based. Spans that cross a line boundary are
/// underlined up to the end of their first line.
pub fn render_plain(source_content: &str, diagnostic: &Diagnostic) -> String {
    let (line, col, line_start) = locate(source_content, diagnostic.span.start);
    let line_text = source_content[line_start..]
        .split(['\n', '\r'])
        .next()
        .unwrap_or("");

    let mut out = format!(
        "{}:{}:{}: {}: {}\n",
        diagnostic.file_path, line, col, diagnostic.kind, diagnostic.message
    );

    out.push_str("    ");
    out.push_str(line_text);
    out.push('\n');

    let span_len = diagnostic.span.end.saturating_sub(diagnostic.span.start);
    let line_remaining = line_text.chars().count().saturating_sub(col - 1);
    let carets = span_len.clamp(1, line_remaining.max(1));
    out.push_str("    ");
    out.push_str(&" ".repeat(col - 1));
    out.push_str(&"^".repeat(carets));
    out.push('\n');

    out
}

/// Translate a byte offset into 1-based line/column plus the byte offset of
/// the start of the containing line.
fn locate(source: &str, offset: usize) -> (usize, usize, usize) {
    let offset = offset.min(source.len());
    let mut line = 1;
    let mut line_start = 0;
    for (idx, byte) in source.bytes().enumerate() {
        if idx >= offset {
            break;
        }
        if byte == b'\n' {
            line += 1;
            line_start = idx + 1;
        }
    }
    let col = source[line_start..offset].chars().count() + 1;
    (line, col, line_start)
}

/// Build a formatted `ariadne` report for a diagnostic.
pub fn build_diagnostic_message(
    source_content: &str,
    diagnostic: &Diagnostic,
    with_color: bool,
) -> String {
    let mut write_buffer = Vec::new();

    let file_id = diagnostic.file_path.clone();
    let report_span = (file_id.clone(), diagnostic.span.into_range());
    let owned_source_content = source_content.to_string();

    // Cache that ariadne uses to fetch source snippets.
    let cache = ariadne::sources(vec![(file_id.clone(), owned_source_content)]);

    let mut report = Report::build(diagnostic.severity.into(), report_span.clone())
        .with_config(
            ariadne::Config::new()
                .with_index_type(ariadne::IndexType::Byte)
                .with_color(with_color),
        )
        .with_message(format!("{}: {}", diagnostic.kind, diagnostic.message))
        .with_label(Label::new(report_span).with_message(&diagnostic.message));

    for (span, message) in &diagnostic.related_spans {
        let related_span = (file_id.clone(), span.into_range());
        report = report.with_label(
            Label::new(related_span)
                .with_message(message)
                .with_color(ariadne::Color::Blue),
        );
    }

    report
        .finish()
        .write(cache, &mut write_buffer)
        .expect("report rendering to a Vec cannot fail");
    String::from_utf8_lossy(&write_buffer).to_string()
}

#[cfg(test)]
mod tests {
    use chumsky::span::SimpleSpan;

    use super::*;
    use crate::DiagnosticKind;

    #[test]
    fn test_plain_format_line_and_column() {
        let source = "fn main() {\n    let a: i32 = true;\n}\n";
        let true_offset = source.find("true").unwrap();
        let diag = Diagnostic::type_mismatch(
            "i32",
            "bool",
            SimpleSpan::from(true_offset..true_offset + 4),
        )
        .in_file("demo.rx");

        let rendered = render_plain(source, &diag);
        let mut lines = rendered.lines();
        assert_eq!(
            lines.next().unwrap(),
            "demo.rx:2:18: TypeMismatch: expected `i32`, found `bool`"
        );
        assert_eq!(lines.next().unwrap(), "        let a: i32 = true;");
        let caret_line = lines.next().unwrap();
        assert!(caret_line.ends_with("^^^^"));
        assert_eq!(caret_line.trim(), "^^^^");
    }

    #[test]
    fn test_plain_format_at_end_of_input() {
        let source = "fn main()";
        let diag = Diagnostic::syntax_error(
            "unexpected end of input".to_string(),
            SimpleSpan::from(source.len()..source.len()),
        )
        .in_file("eof.rx");

        let rendered = render_plain(source, &diag);
        assert!(rendered.starts_with("eof.rx:1:10: SyntaxError:"));
        // Always at least one caret, even for empty spans.
        assert!(rendered.contains('^'));
    }
}
