//! End-to-end evaluation tests for the core language: literals, operators,
//! control flow, functions, closures, defers, and pipes.

use pretty_assertions::assert_eq;
use rill::{eval, Context, EvalOptions, ErrorKind, Value};

fn run(source: &str) -> Result<Value, rill::Error> {
    eval(&Context::new(), source, &EvalOptions::new().with_concurrency())
}

fn run_ok(source: &str) -> Value {
    run(source).expect("evaluation should succeed")
}

#[test]
fn arithmetic() {
    assert_eq!(run_ok("1 + 1"), Value::Int(2));
    assert_eq!(run_ok("2 + 3 * 4"), Value::Int(14));
    assert_eq!(run_ok("(2 + 3) * 4"), Value::Int(20));
    assert_eq!(run_ok("10 / 3"), Value::Int(3));
    assert_eq!(run_ok("10 % 3"), Value::Int(1));
    assert_eq!(run_ok("2 ** 10"), Value::Int(1024));
    assert_eq!(run_ok("1 << 4"), Value::Int(16));
    assert_eq!(run_ok("-5 + 2"), Value::Int(-3));
}

#[test]
fn empty_program_yields_nil() {
    assert_eq!(run_ok(""), Value::Nil);
}

#[test]
fn int_float_promotion() {
    assert_eq!(run_ok("1 + 2.5"), Value::Float(3.5));
    assert_eq!(run_ok("2.0 * 3"), Value::Float(6.0));
}

#[test]
fn integer_pow_wraps_to_64_bits() {
    assert_eq!(run_ok("2 ** 64"), Value::Int(0));
}

#[test]
fn integer_division_by_zero_raises() {
    let err = run("1 / 0").expect_err("should fail");
    assert_eq!(err.to_string(), "value error: division by zero");
}

#[test]
fn float_division_by_zero_is_infinite() {
    assert_eq!(run_ok("1.0 / 0.0"), Value::Float(f64::INFINITY));
    assert_eq!(run_ok("-1.0 / 0.0"), Value::Float(f64::NEG_INFINITY));
}

#[test]
fn comparisons_and_logic() {
    assert_eq!(run_ok("1 < 2"), Value::Bool(true));
    assert_eq!(run_ok("2 <= 1"), Value::Bool(false));
    assert_eq!(run_ok("1 == 1.0"), Value::Bool(true));
    assert_eq!(run_ok("1 != 2"), Value::Bool(true));
    assert_eq!(run_ok("true && false"), Value::Bool(false));
    assert_eq!(run_ok("false || true"), Value::Bool(true));
    assert_eq!(run_ok("!true"), Value::Bool(false));
}

#[test]
fn logic_operators_short_circuit() {
    // the right side would raise if evaluated
    assert_eq!(run_ok("false && [1][5]"), Value::Bool(false));
    assert_eq!(run_ok("true || [1][5]"), Value::Bool(true));
}

#[test]
fn declarations_and_assignment() {
    assert_eq!(run_ok("x := 41; x + 1"), Value::Int(42));
    assert_eq!(run_ok("var y = 10; y = y + 1; y"), Value::Int(11));
    assert_eq!(run_ok("z := 1; z += 4; z"), Value::Int(5));
    assert_eq!(run_ok("w := 10; w -= 3; w *= 2; w /= 7; w"), Value::Int(2));
}

#[test]
fn multi_declaration_unpacks() {
    assert_eq!(run_ok("a, b := [1, 2]; a + b"), Value::Int(3));
    assert_eq!(run_ok("x := 0; y := 0; x, y = [3, 4]; x * y"), Value::Int(12));
}

#[test]
fn postfix_statements() {
    assert_eq!(run_ok("n := 1; n++; n"), Value::Int(2));
    assert_eq!(run_ok("n := 1; n--; n"), Value::Int(0));
}

#[test]
fn strings_and_templates() {
    assert_eq!(run_ok("\"foo\" + \"bar\""), Value::from("foobar"));
    assert_eq!(run_ok("x := 7; 'value: {x + 1}!'"), Value::from("value: 8!"));
    assert_eq!(run_ok("'{}'"), Value::from(""));
    assert_eq!(run_ok("`raw\\n`"), Value::from("raw\\n"));
}

#[test]
fn string_round_trip_through_int() {
    assert_eq!(run_ok("int(string(12345))"), Value::Int(12345));
    assert_eq!(run_ok("int(string(0 - 9007199254740992))"), Value::Int(-9_007_199_254_740_992));
}

#[test]
fn containers() {
    assert_eq!(run_ok("len([1, 2, 3])"), Value::Int(3));
    assert_eq!(run_ok("[1, 2][1]"), Value::Int(2));
    assert_eq!(run_ok("[1, 2, 3][-1]"), Value::Int(3));
    assert_eq!(run_ok("{\"a\": 1}[\"a\"]"), Value::Int(1));
    assert_eq!(run_ok("m := {\"a\": 1}; m[\"b\"] = 2; m[\"b\"]"), Value::Int(2));
    assert_eq!(run_ok("s := {1, 2, 3}; len(s)"), Value::Int(3));
    assert_eq!(run_ok("2 in [1, 2]"), Value::Bool(true));
    assert_eq!(run_ok("\"ell\" in \"hello\""), Value::Bool(true));
}

#[test]
fn slices() {
    assert_eq!(
        run_ok("[1, 2, 3, 4][1:3]"),
        Value::list(vec![Value::Int(2), Value::Int(3)])
    );
    assert_eq!(run_ok("\"hello\"[1:3]"), Value::from("el"));
    assert_eq!(run_ok("\"hello\"[:2]"), Value::from("he"));
    assert_eq!(run_ok("\"hello\"[3:]"), Value::from("lo"));
}

#[test]
fn out_of_range_index_raises() {
    let err = run("[1][5]").expect_err("should fail");
    assert_eq!(err.kind(), ErrorKind::Index);
}

#[test]
fn missing_map_key_raises() {
    let err = run("{\"a\": 1}[\"b\"]").expect_err("should fail");
    assert_eq!(err.to_string(), "key error: key not found: \"b\"");
}

#[test]
fn unhashable_map_key_raises() {
    let err = run("{[1]: 2}").expect_err("should fail");
    assert_eq!(err.to_string(), "type error: unhashable type: list");
}

#[test]
fn if_expression_yields_branch_value() {
    assert_eq!(run_ok("if true { 1 } else { 2 }"), Value::Int(1));
    assert_eq!(run_ok("if false { 1 } else { 2 }"), Value::Int(2));
    assert_eq!(run_ok("if false { 1 }"), Value::Nil);
    assert_eq!(run_ok("x := 10; if x > 5 { \"big\" } else { \"small\" }"), Value::from("big"));
}

#[test]
fn ternary_expression() {
    assert_eq!(run_ok("1 < 2 ? \"yes\" : \"no\""), Value::from("yes"));
}

#[test]
fn while_style_loop() {
    assert_eq!(run_ok("i := 0; for i < 5 { i += 1 }; i"), Value::Int(5));
}

#[test]
fn c_style_loop_with_break_and_continue() {
    assert_eq!(
        run_ok("total := 0; for i := 0; i < 10; i++ { if i == 5 { break }; total += i }; total"),
        Value::Int(10)
    );
    assert_eq!(
        run_ok("total := 0; for i := 0; i < 5; i++ { if i == 2 { continue }; total += i }; total"),
        Value::Int(8)
    );
}

#[test]
fn infinite_loop_with_break() {
    assert_eq!(run_ok("n := 0; for { n += 1; if n == 3 { break } }; n"), Value::Int(3));
}

#[test]
fn range_loops() {
    assert_eq!(
        run_ok("total := 0; for _, v := range [1, 2, 3] { total += v }; total"),
        Value::Int(6)
    );
    assert_eq!(
        run_ok("total := 0; for i := range 4 { total += i }; total"),
        Value::Int(6)
    );
    assert_eq!(
        run_ok("m := {\"a\": 1, \"b\": 2}; keys := []; for k := range m { keys.append(k) }; keys"),
        Value::list(vec![Value::from("a"), Value::from("b")])
    );
    assert_eq!(
        run_ok("out := \"\"; for _, c := range \"abc\" { out += c }; out"),
        Value::from("abc")
    );
}

#[test]
fn loop_length_matches_len() {
    assert_eq!(
        run_ok("items := [1, 2, 3, 4]; n := 0; for _ := range items { n += 1 }; n == len(items)"),
        Value::Bool(true)
    );
}

#[test]
fn switch_expression() {
    let source = "x := 2
switch x {
case 1:
    \"one\"
case 2, 3:
    \"two-or-three\"
default:
    \"other\"
}";
    assert_eq!(run_ok(source), Value::from("two-or-three"));
    assert_eq!(
        run_ok("switch 9 {\ncase 1:\n  \"one\"\ndefault:\n  \"other\"\n}"),
        Value::from("other")
    );
    assert_eq!(run_ok("switch 9 {\ncase 1:\n  \"one\"\n}"), Value::Nil);
}

#[test]
fn functions_and_defaults() {
    assert_eq!(run_ok("func add(a, b) { a + b }; add(1, 2)"), Value::Int(3));
    assert_eq!(run_ok("func add(a, b=10) { a + b }; add(1)"), Value::Int(11));
    assert_eq!(run_ok("func add(a, b=10) { a + b }; add(1, 2)"), Value::Int(3));
    assert_eq!(run_ok("f := func(x) { x * 2 }; f(21)"), Value::Int(42));
}

#[test]
fn function_arity_errors() {
    let err = run("func f(a, b) { a }; f(1)").expect_err("should fail");
    assert_eq!(
        err.to_string(),
        "args error: function \"f\" takes 2 arguments (1 given)"
    );
    let err = run("func g() { 1 }; g(1)").expect_err("should fail");
    assert_eq!(
        err.to_string(),
        "args error: function \"g\" takes 0 arguments (1 given)"
    );
}

#[test]
fn explicit_return() {
    assert_eq!(
        run_ok("func f(n) { if n > 0 { return \"pos\" }; \"neg\" }; f(1)"),
        Value::from("pos")
    );
    assert_eq!(run_ok("func f() { return }; f()"), Value::Nil);
}

#[test]
fn recursion() {
    assert_eq!(
        run_ok("func fact(n) { n <= 1 ? 1 : n * fact(n - 1) }; fact(5)"),
        Value::Int(120)
    );
}

#[test]
fn nested_function_recursion_through_cell() {
    let source = "outer := func() {
    func fib(n) { n < 2 ? n : fib(n - 1) + fib(n - 2) }
    fib(10)
}
outer()";
    assert_eq!(run_ok(source), Value::Int(55));
}

#[test]
fn closures_share_cells() {
    let source = "counter := func() {
    count := 0
    inc := func() { count = count + 1; count }
    get := func() { count }
    [inc, get]
}
fns := counter()
fns[0]()
fns[0]()
fns[1]()";
    assert_eq!(run_ok(source), Value::Int(2));
}

#[test]
fn closure_captures_loop_variable_writes() {
    let source = "make := func() {
    n := 0
    bump := func() { n += 10 }
    bump()
    bump()
    n
}
make()";
    assert_eq!(run_ok(source), Value::Int(20));
}

#[test]
fn defers_run_in_lifo_order() {
    let source = "order := []
f := func() {
    defer order.append(1)
    defer order.append(2)
    order.append(3)
}
f()
order";
    assert_eq!(
        run_ok(source),
        Value::list(vec![Value::Int(3), Value::Int(2), Value::Int(1)])
    );
}

#[test]
fn defers_run_on_error_exit() {
    let source = "order := []
f := func() {
    defer order.append(1)
    error(\"boom\")
}
try(f)
order";
    assert_eq!(run_ok(source), Value::list(vec![Value::Int(1)]));
}

#[test]
fn defer_arguments_snapshot_at_defer_site() {
    let source = "seen := []
f := func() {
    x := 1
    defer seen.append(x)
    x = 2
}
f()
seen";
    assert_eq!(run_ok(source), Value::list(vec![Value::Int(1)]));
}

#[test]
fn pipe_feeds_prior_result_as_last_argument() {
    assert_eq!(
        run_ok("func double(n) { n * 2 }; 5 | double"),
        Value::Int(10)
    );
    assert_eq!(
        run_ok("func add(a, b) { a + b }; func double(n) { n * 2 }; 3 | add(4) | double"),
        Value::Int(14)
    );
    assert_eq!(run_ok("\"abc\" | strings.to_upper"), Value::from("ABC"));
}

#[test]
fn builtin_conversions() {
    assert_eq!(run_ok("int(\"42\")"), Value::Int(42));
    assert_eq!(run_ok("int(3.9)"), Value::Int(3));
    assert_eq!(run_ok("float(2)"), Value::Float(2.0));
    assert_eq!(run_ok("string(12)"), Value::from("12"));
    assert_eq!(run_ok("bool(\"\")"), Value::Bool(false));
    assert_eq!(run_ok("type([1])"), Value::from("list"));
    assert_eq!(run_ok("chr(104)"), Value::from("h"));
    assert_eq!(run_ok("ord(\"h\")"), Value::Int(104));
}

#[test]
fn invalid_int_literal_raises() {
    let err = run("int(\"abc\")").expect_err("should fail");
    assert_eq!(err.to_string(), "value error: invalid int literal: \"abc\"");
}

#[test]
fn list_methods() {
    assert_eq!(
        run_ok("l := [1]; l.append(2); l"),
        Value::list(vec![Value::Int(1), Value::Int(2)])
    );
    assert_eq!(
        run_ok("[1, 2, 3].map(func(x) { x * 2 })"),
        Value::list(vec![Value::Int(2), Value::Int(4), Value::Int(6)])
    );
    assert_eq!(
        run_ok("[1, 2, 3, 4].filter(func(x) { x % 2 == 0 })"),
        Value::list(vec![Value::Int(2), Value::Int(4)])
    );
    assert_eq!(run_ok("[3, 1, 2].sort()"), Value::list(vec![
        Value::Int(1),
        Value::Int(2),
        Value::Int(3),
    ]));
    assert_eq!(run_ok("[1, 2, 3].pop()"), Value::Int(3));
}

#[test]
fn map_and_set_methods() {
    assert_eq!(
        run_ok("m := {\"a\": 1, \"b\": 2}; m.keys()"),
        Value::list(vec![Value::from("a"), Value::from("b")])
    );
    assert_eq!(run_ok("{\"a\": 1}.get(\"missing\", 9)"), Value::Int(9));
    assert_eq!(run_ok("s := {1}; s.add(2); s.contains(2)"), Value::Bool(true));
}

#[test]
fn iterator_entries_expose_key_and_value() {
    assert_eq!(
        run_ok("it := iter([10, 20]); e := it.next(); [e.key, e.value]"),
        Value::list(vec![Value::Int(0), Value::Int(10)])
    );
    assert_eq!(
        run_ok("it := iter([1]); it.next(); it.next()"),
        Value::Nil
    );
}

#[test]
fn sorted_and_aggregates() {
    assert_eq!(
        run_ok("sorted([3, 1, 2])"),
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
    );
    assert_eq!(run_ok("all([1, 2])"), Value::Bool(true));
    assert_eq!(run_ok("any([0, 0, 3])"), Value::Bool(true));
}

#[test]
fn try_recovers_raised_errors() {
    assert_eq!(
        run_ok("err := try(func() { error(\"boom\") }); type(err)"),
        Value::from("error")
    );
    assert_eq!(
        run_ok("try(func() { error(\"boom\") }, \"fallback\")"),
        Value::from("fallback")
    );
    assert_eq!(
        run_ok("try(func() { 42 }, \"fallback\")"),
        Value::Int(42)
    );
    assert_eq!(
        run_ok("try(func() { [1][9] }, func(e) { \"caught\" })"),
        Value::from("caught")
    );
}

#[test]
fn raised_errors_carry_messages() {
    let err = run("error(\"boom: %d\", 7)").expect_err("should fail");
    assert_eq!(err.to_string(), "value error: boom: 7");
}

#[test]
fn attribute_errors_use_canonical_message() {
    let err = run("foo := 42; foo.bar").expect_err("should fail");
    assert_eq!(
        err.to_string(),
        "type error: attribute \"bar\" not found on int object"
    );
}

#[test]
fn sprintf_formats() {
    assert_eq!(
        run_ok("sprintf(\"%s=%d\", \"n\", 42)"),
        Value::from("n=42")
    );
}

#[test]
fn commutativity_of_numeric_addition() {
    assert_eq!(run_ok("1 + 2 == 2 + 1"), Value::Bool(true));
    assert_eq!(run_ok("1.5 + 2 == 2 + 1.5"), Value::Bool(true));
}
