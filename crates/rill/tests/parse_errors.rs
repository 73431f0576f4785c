//! Syntax-error behavior: first error wins and diagnostics carry positions
//! and the offending source line.

use pretty_assertions::assert_eq;
use rill::{parse, parse_file, ErrorKind};

#[test]
fn nested_ternary_is_rejected() {
    let err = parse("a ? b ? c : d : e").expect_err("should fail");
    assert_eq!(err.to_string(), "syntax error: nested ternary expression detected");
}

#[test]
fn error_position_is_within_source() {
    let source = "x := (1 + ";
    let err = parse(source).expect_err("should fail");
    assert_eq!(err.kind(), ErrorKind::Syntax);
    let span = err.span().expect("syntax errors carry spans");
    assert!((span.start.offset as usize) <= source.len());
}

#[test]
fn diagnostics_include_file_and_line_text() {
    let err = parse_file("x := 1\ny := )", "scripts/demo.rill").expect_err("should fail");
    let span = err.span().expect("span");
    assert_eq!(span.file.as_deref(), Some("scripts/demo.rill"));
    assert_eq!(span.line_text, "y := )");
    assert_eq!(span.start.line, 1);
}

#[test]
fn unterminated_constructs() {
    assert_eq!(
        parse("if true { 1").expect_err("fail").to_string(),
        "syntax error: unterminated block statement"
    );
    assert_eq!(
        parse("switch x {\ncase 1:").expect_err("fail").to_string(),
        "syntax error: unterminated switch statement"
    );
    assert_eq!(
        parse("func f(a, b").expect_err("fail").to_string(),
        "syntax error: unterminated function parameters"
    );
    assert_eq!(
        parse("\"abc").expect_err("fail").to_string(),
        "syntax error: unterminated string literal"
    );
}

#[test]
fn statement_junk_is_rejected() {
    let err = parse("1 + 2 3").expect_err("should fail");
    assert_eq!(
        err.to_string(),
        "syntax error: unexpected token \"3\" following statement"
    );
}

#[test]
fn assignment_without_value() {
    let err = parse("var x =\n1").expect_err("should fail");
    assert_eq!(err.to_string(), "syntax error: assignment is missing a value");
}

#[test]
fn multiple_default_switch_blocks() {
    let source = "switch x {\ndefault:\n  1\ndefault:\n  2\n}";
    let err = parse(source).expect_err("should fail");
    assert_eq!(
        err.to_string(),
        "syntax error: switch statement has multiple default blocks"
    );
}

#[test]
fn range_of_brace_is_rejected() {
    let err = parse("range {").expect_err("should fail");
    assert_eq!(
        err.to_string(),
        "syntax error: invalid range expression (unexpected \"{\")"
    );
}

#[test]
fn invalid_defer_and_go_targets() {
    assert_eq!(
        parse("defer 1 + 2").expect_err("fail").to_string(),
        "syntax error: invalid defer statement"
    );
    assert_eq!(
        parse("go x").expect_err("fail").to_string(),
        "syntax error: invalid go statement"
    );
}

#[test]
fn template_fragment_errors() {
    assert_eq!(
        parse("'{a; b}'").expect_err("fail").to_string(),
        "syntax error: template contains more than one expression"
    );
    assert_eq!(
        parse("'{var x = 1}'").expect_err("fail").to_string(),
        "syntax error: template contains an unexpected statement type"
    );
    assert_eq!(
        parse("'{unclosed'").expect_err("fail").to_string(),
        "syntax error: unterminated template expression"
    );
}

#[test]
fn invalid_numeric_literals() {
    assert_eq!(
        parse("99999999999999999999").expect_err("fail").to_string(),
        "syntax error: invalid integer: 99999999999999999999"
    );
}

#[test]
fn lexer_errors_are_terminal_syntax_errors() {
    let err = parse("a & b").expect_err("should fail");
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(err.to_string(), "syntax error: unexpected character '&'");
}
