//! Exact compile-error messages for scope and shape failures.

use pretty_assertions::assert_eq;
use rill::{eval, Context, EvalOptions};

fn compile_error(source: &str) -> String {
    eval(&Context::new(), source, &EvalOptions::new())
        .expect_err("compilation should fail")
        .to_string()
}

#[test]
fn undefined_variable() {
    assert_eq!(
        compile_error("foo"),
        "compile error: undefined variable \"foo\" (line 1)"
    );
}

#[test]
fn undefined_assignment_target() {
    assert_eq!(
        compile_error("x = 1"),
        "compile error: undefined variable \"x\" (line 1)"
    );
}

#[test]
fn undefined_in_multi_assignment() {
    assert_eq!(
        compile_error("x := 1;\nx, y = [1, 2]"),
        "compile error: undefined variable \"y\" (line 2)"
    );
}

#[test]
fn undefined_postfix_target() {
    assert_eq!(
        compile_error("\n\n z++;"),
        "compile error: undefined variable \"z\" (line 3)"
    );
}

#[test]
fn undefined_inside_nested_function() {
    let source = "for _, v := range [1, 2, 3] {
\tfunc() {
\t\tundefined_var
\t}()
}";
    assert_eq!(
        compile_error(source),
        "compile error: undefined variable \"undefined_var\" (line 3)"
    );
}

#[test]
fn cannot_assign_to_constant() {
    assert_eq!(
        compile_error("const a = 1; a = 2"),
        "compile error: cannot assign to constant \"a\" (line 1)"
    );
}

#[test]
fn invalid_argument_defaults() {
    assert_eq!(
        compile_error("func bad(a=1, b) {}"),
        "compile error: invalid argument defaults for function \"bad\" (line 1)"
    );
}

#[test]
fn invalid_argument_defaults_for_anonymous_function() {
    assert_eq!(
        compile_error("func(a=1, b) {}()"),
        "compile error: invalid argument defaults for anonymous function (line 1)"
    );
}

#[test]
fn unsupported_default_value() {
    assert_eq!(
        compile_error("func(a, b=len) {}()"),
        "compile error: unsupported default value (got len, line 1)"
    );
    assert_eq!(
        compile_error("func(a, b=1 + 2) {}()"),
        "compile error: unsupported default value (got 1 + 2, line 1)"
    );
}

#[test]
fn list_of_literals_is_a_valid_default() {
    let result = eval(
        &Context::new(),
        "func f(a=[1, 2, 3]) { a }; len(f())",
        &EvalOptions::new(),
    )
    .expect("should evaluate");
    assert_eq!(result, rill::Value::Int(3));
}

#[test]
fn invalid_range_loop_bindings() {
    assert_eq!(
        compile_error("\nfor a, b, c := range [1, 2, 3] {}"),
        "compile error: invalid for loop (line 2)"
    );
}

#[test]
fn defer_outside_function() {
    assert_eq!(
        compile_error("\n defer func() {}()"),
        "compile error: defer statement outside of a function (line 2)"
    );
}

#[test]
fn break_outside_loop() {
    assert_eq!(
        compile_error("break"),
        "compile error: break statement outside of a loop (line 1)"
    );
}

#[test]
fn continue_outside_loop() {
    assert_eq!(
        compile_error("continue"),
        "compile error: continue statement outside of a loop (line 1)"
    );
}

#[test]
fn return_outside_function() {
    assert_eq!(
        compile_error("return 1"),
        "compile error: return statement outside of a function (line 1)"
    );
}

#[test]
fn break_in_function_does_not_see_enclosing_loop() {
    assert_eq!(
        compile_error("for { func() { break }() }"),
        "compile error: break statement outside of a loop (line 1)"
    );
}

#[test]
fn const_redeclaration() {
    assert_eq!(
        compile_error("x := 1; const x = 2"),
        "compile error: invalid redeclaration of \"x\" (line 1)"
    );
}
