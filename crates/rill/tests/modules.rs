//! Default modules, the local importer, and the stdio plumbing.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use rill::{eval, CaptureBuffer, Context, EvalOptions, LocalFs, Value};

fn run(source: &str, options: &EvalOptions) -> Result<Value, rill::Error> {
    eval(&Context::new(), source, options)
}

fn run_ok(source: &str) -> Value {
    run(source, &EvalOptions::new()).expect("evaluation should succeed")
}

#[test]
fn math_module() {
    assert_eq!(run_ok("math.abs(-3)"), Value::Int(3));
    assert_eq!(run_ok("math.sum([1, 2, 3])"), Value::Int(6));
    assert_eq!(run_ok("math.min(4, 2, 9)"), Value::Int(2));
    assert_eq!(run_ok("math.max([4, 2, 9])"), Value::Int(9));
    assert_eq!(run_ok("math.pow(2, 3)"), Value::Float(8.0));
    assert_eq!(run_ok("math.floor(2.9)"), Value::Float(2.0));
    assert_eq!(run_ok("math.sqrt(9)"), Value::Float(3.0));
    assert_eq!(run_ok("math.PI > 3.14 && math.PI < 3.15"), Value::Bool(true));
}

#[test]
fn strings_module() {
    assert_eq!(run_ok("strings.to_upper(\"abc\")"), Value::from("ABC"));
    assert_eq!(run_ok("strings.split(\"a,b,c\", \",\")"), Value::list(vec![
        Value::from("a"),
        Value::from("b"),
        Value::from("c"),
    ]));
    assert_eq!(
        run_ok("strings.join([\"a\", \"b\"], \"-\")"),
        Value::from("a-b")
    );
    assert_eq!(run_ok("strings.trim(\"  x  \")"), Value::from("x"));
    assert_eq!(run_ok("strings.repeat(\"ab\", 3)"), Value::from("ababab"));
    assert_eq!(run_ok("strings.count(\"banana\", \"an\")"), Value::Int(2));
    assert_eq!(run_ok("strings.index(\"hello\", \"ll\")"), Value::Int(2));
    assert_eq!(run_ok("strings.trim_prefix(\"rill.rs\", \"rill\")"), Value::from(".rs"));
}

#[test]
fn string_methods_match_module_functions() {
    assert_eq!(run_ok("\"abc\".to_upper() == strings.to_upper(\"abc\")"), Value::Bool(true));
    assert_eq!(run_ok("\"a b\".fields()"), Value::list(vec![Value::from("a"), Value::from("b")]));
}

#[test]
fn module_name_attribute() {
    assert_eq!(run_ok("math.__name__"), Value::from("math"));
}

#[test]
fn stdin_pipe_to_stdout() {
    // os.stdin.read() | strings.to_upper | print
    let stdout = CaptureBuffer::new();
    let options = EvalOptions::new()
        .with_stdin_bytes(b"hello".to_vec())
        .with_stdout(stdout.shared_writer());
    let result = run("os.stdin.read() | strings.to_upper | print", &options).expect("eval");
    assert_eq!(result, Value::Nil);
    assert_eq!(stdout.contents(), "HELLO\n");
}

#[test]
fn print_and_printf_write_to_configured_stdout() {
    let stdout = CaptureBuffer::new();
    let options = EvalOptions::new().with_stdout(stdout.shared_writer());
    run("print(\"a\", 1)", &options).expect("eval");
    run("printf(\"%s=%d\\n\", \"n\", 42)", &options).expect("eval");
    assert_eq!(stdout.contents(), "a 1\nn=42\n");
}

#[test]
fn os_file_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = EvalOptions::new().with_fs(Arc::new(LocalFs::new(dir.path())));
    let result = run(
        "os.write_file(\"note.txt\", \"hi\"); os.read_file(\"note.txt\")",
        &options,
    )
    .expect("eval");
    assert_eq!(result, Value::from("hi"));
}

#[test]
fn os_stat_and_read_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = EvalOptions::new().with_fs(Arc::new(LocalFs::new(dir.path())));
    let result = run(
        "os.mkdir_all(\"sub\"); os.write_file(\"sub/a.txt\", \"abc\"); os.stat(\"sub/a.txt\")[\"size\"]",
        &options,
    )
    .expect("eval");
    assert_eq!(result, Value::Int(3));
    let result = run(
        "os.write_file(\"one.txt\", \"\"); os.read_dir(\"\")",
        &options,
    )
    .expect("eval");
    // entries come back sorted; "sub" was created above
    assert_eq!(
        result,
        Value::list(vec![Value::from("one.txt"), Value::from("sub")])
    );
}

#[test]
fn local_importer_resolves_modules() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("utils.rill"),
        "func double(n) { n * 2 }\nconst answer = 21\n",
    )
    .expect("write module");
    let options = EvalOptions::new().with_modules_dir(dir.path().to_string_lossy().into_owned());
    assert_eq!(
        run("import utils; utils.double(utils.answer)", &options).expect("eval"),
        Value::Int(42)
    );
}

#[test]
fn import_alias() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("utils.rill"), "const answer = 42\n").expect("write module");
    let options = EvalOptions::new().with_modules_dir(dir.path().to_string_lossy().into_owned());
    assert_eq!(
        run("import utils as u; u.answer", &options).expect("eval"),
        Value::Int(42)
    );
}

#[test]
fn from_import_resolves_nested_modules() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("pkg")).expect("mkdir");
    std::fs::write(
        dir.path().join("pkg/geometry.rill"),
        "func area(w, h) { w * h }\nconst unit = \"m2\"\n",
    )
    .expect("write module");
    let options = EvalOptions::new().with_modules_dir(dir.path().to_string_lossy().into_owned());
    assert_eq!(
        run(
            "from pkg.geometry import area, unit as u\n'{area(2, 3)}{u}'",
            &options
        )
        .expect("eval"),
        Value::from("6m2")
    );
}

#[test]
fn missing_module_is_an_import_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let options = EvalOptions::new().with_modules_dir(dir.path().to_string_lossy().into_owned());
    let err = run("import nope", &options).expect_err("should fail");
    assert_eq!(err.to_string(), "import error: module \"nope\" not found");
}

#[test]
fn imports_without_an_importer_fail() {
    let err = run("import anything", &EvalOptions::new()).expect_err("should fail");
    assert_eq!(err.to_string(), "import error: module \"anything\" not found");
}

#[test]
fn module_state_is_shared_between_imports() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join("state.rill"), "items := []\n").expect("write module");
    let options = EvalOptions::new().with_modules_dir(dir.path().to_string_lossy().into_owned());
    // both import statements observe the same module instance
    assert_eq!(
        run(
            "import state\nstate.items.append(1)\nimport state as again\nlen(again.items)",
            &options
        )
        .expect("eval"),
        Value::Int(1)
    );
}

#[test]
fn host_globals_override_defaults() {
    let options = EvalOptions::new().with_global("answer", Value::Int(42));
    assert_eq!(run("answer", &options).expect("eval"), Value::Int(42));
}

#[test]
fn without_default_globals_strips_builtins() {
    let options = EvalOptions::new().without_default_globals();
    let err = run("len([1])", &options).expect_err("should fail");
    assert_eq!(
        err.to_string(),
        "compile error: undefined variable \"len\" (line 1)"
    );
}

#[test]
fn modules_can_use_default_globals() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        dir.path().join("sizes.rill"),
        "func measure(x) { len(x) }\n",
    )
    .expect("write module");
    let options = EvalOptions::new().with_modules_dir(dir.path().to_string_lossy().into_owned());
    assert_eq!(
        run("from sizes import measure; measure(\"abcd\")", &options).expect("eval"),
        Value::Int(4)
    );
}
