//! Error taxonomy and diagnostic rendering, end to end: each kind is
//! provoked through a real program and checked for span, message, and
//! rendering details.

use std::collections::HashMap;

use rstest::rstest;

use utlx::api::{compile, run, validate, RunOptions};
use utlx::error::ErrorKind;

fn run_source(source: &str, input: &str) -> Result<String, utlx::error::Diagnostic> {
    let program = compile(source).expect("program should compile");
    let mut inputs = HashMap::new();
    inputs.insert("input".to_string(), input.as_bytes().to_vec());
    run(&program, &inputs, &RunOptions::default())
        .map(|bytes| String::from_utf8(bytes).expect("output should be UTF-8"))
}

fn run_body(body: &str, input: &str) -> Result<String, utlx::error::Diagnostic> {
    run_source(
        &format!("%utlx 1.0\ninput json\noutput json\n---\n{}", body),
        input,
    )
}

#[test]
fn test_lex_error() {
    let diagnostics = validate("%utlx 1.0\ninput json\noutput json\n---\n\"unterminated");
    assert_eq!(diagnostics.items[0].kind, ErrorKind::Lex);
}

#[test]
fn test_parse_error_reports_expected_and_found() {
    let diagnostics = validate("%utlx 1.0\ninput json\noutput json\n---\n{a: }");
    let first = &diagnostics.items[0];
    assert_eq!(first.kind, ErrorKind::Parse);
    assert!(first.message.contains("expected"));
    assert!(first.message.contains("found"));
    assert!(first.span.is_some());
}

#[rstest]
#[case("nosuch", ErrorKind::UnresolvedBinding)]
#[case("1 + true", ErrorKind::TypeMismatch)]
#[case("upper(\"a\", \"b\")", ErrorKind::ArityMismatch)]
#[case("$input.missing", ErrorKind::SelectorFailure)]
#[case("upper(1)", ErrorKind::FunctionArgument)]
#[case("1 / 0", ErrorKind::DivisionByZero)]
#[case("10 % 0", ErrorKind::DivisionByZero)]
fn test_runtime_error_kinds(#[case] body: &str, #[case] expected: ErrorKind) {
    let err = run_body(body, "{}").unwrap_err();
    assert_eq!(err.kind, expected);
}

#[test]
fn test_no_template_match_kind() {
    let source = "%utlx 1.0\ninput json\noutput json\n---\ntemplate {kind: \"a\"} => 1\napply($input.items)";
    let err = run_source(source, r#"{"items":[{"kind":"b"}]}"#).unwrap_err();
    assert_eq!(err.kind, ErrorKind::NoTemplateMatch);
}

#[test]
fn test_format_parse_error_kind() {
    let err = run_body("$input", "not json at all").unwrap_err();
    assert_eq!(err.kind, ErrorKind::FormatParse);
}

#[test]
fn test_format_serialize_error_kind() {
    // CSV output cannot represent a scalar root
    let source = "%utlx 1.0\ninput json\noutput csv\n---\n42";
    let err = run_source(source, "{}").unwrap_err();
    assert_eq!(err.kind, ErrorKind::FormatSerialize);
}

#[test]
fn test_caret_rendering_points_at_the_problem() {
    let source = "%utlx 1.0\ninput json\noutput json\n---\nlet x = oops;\nx";
    let program = compile(source).unwrap();
    let mut inputs = HashMap::new();
    inputs.insert("input".to_string(), b"{}".to_vec());
    let err = run(&program, &inputs, &RunOptions::default()).unwrap_err();

    let rendered = err.render(source);
    assert!(rendered.contains("UnresolvedBinding"));
    assert!(rendered.contains("let x = oops;"));
    assert!(rendered.contains("^^^^"));
}

#[test]
fn test_backtrace_lists_call_chain() {
    let source = "%utlx 1.0\n\
                  input json\n\
                  output json\n\
                  ---\n\
                  function inner(n: Number): Number = n + {}\n\
                  function outer(n: Number): Number = inner(n)\n\
                  outer(1)";
    let err = run_source(source, "{}").unwrap_err();
    let names: Vec<&str> = err.frames.iter().map(|f| f.name.as_str()).collect();
    assert!(names.contains(&"inner"));
    assert!(names.contains(&"outer"));

    let rendered = err.render(source);
    assert!(rendered.contains("trace:"));
}

#[test]
fn test_parser_recovers_and_reports_several() {
    let diagnostics = validate("%utlx 1.0\ninput json\noutput json\n---\n{a: , b: , c: 1}");
    assert!(diagnostics.len() >= 2);
}

#[test]
fn test_let_terminator_hint() {
    let diagnostics = validate("%utlx 1.0\ninput json\noutput json\n---\nlet y = 20\n[y]");
    assert!(diagnostics
        .items
        .iter()
        .any(|d| d.hint.as_deref().map(|h| h.contains("`;`")).unwrap_or(false)));
}

#[test]
fn test_compile_errors_abort_before_running() {
    let err = compile("%utlx 1.0\ninput json\noutput json\n---\n{a: }").unwrap_err();
    assert!(!err.is_empty());
}

#[test]
fn test_missing_version_directive() {
    let diagnostics = validate("input json\noutput json\n---\n1");
    assert!(diagnostics.items[0].message.contains("%utlx"));
}
