//! Channels, spawned threads, and cancellation.

use std::time::Duration;

use pretty_assertions::assert_eq;
use rill::{eval, Context, EvalOptions, ErrorKind, Value};

fn run(source: &str) -> Result<Value, rill::Error> {
    eval(&Context::new(), source, &EvalOptions::new().with_concurrency())
}

fn run_ok(source: &str) -> Value {
    run(source).expect("evaluation should succeed")
}

#[test]
fn buffered_channel_round_trip() {
    assert_eq!(run_ok("c := chan(1); c <- 1; x := <-c; x"), Value::Int(1));
}

#[test]
fn receive_after_close_drains_then_yields_nil() {
    assert_eq!(
        run_ok("c := chan(2); c <- 1; c <- 2; close(c); [<-c, <-c, <-c]"),
        Value::list(vec![Value::Int(1), Value::Int(2), Value::Nil])
    );
}

#[test]
fn send_on_closed_channel_raises() {
    let err = run("c := chan(1); close(c); c <- 1").expect_err("should fail");
    assert_eq!(err.to_string(), "value error: send on closed channel");
}

#[test]
fn channel_capacity_attributes() {
    assert_eq!(run_ok("c := chan(3); c <- 1; [c.len(), c.cap()]"), Value::list(vec![
        Value::Int(1),
        Value::Int(3),
    ]));
}

#[test]
fn go_statement_runs_concurrently() {
    assert_eq!(
        run_ok("c := chan(1); go func() { c <- 42 }(); <-c"),
        Value::Int(42)
    );
}

#[test]
fn unbuffered_channel_synchronizes_sender_and_receiver() {
    assert_eq!(
        run_ok("c := chan(); go func() { c <- \"ping\" }(); <-c"),
        Value::from("ping")
    );
}

#[test]
fn channel_preserves_send_order() {
    let source = "c := chan(8)
go func() {
    for i := range 8 { c <- i }
}()
out := []
for _ := range 8 { out.append(<-c) }
out";
    assert_eq!(
        run_ok(source),
        Value::list((0..8).map(Value::Int).collect())
    );
}

#[test]
fn spawn_returns_the_same_result_as_a_direct_call() {
    assert_eq!(
        run_ok("f := func(n) { n * 2 }; t := f.spawn(3); t.wait() == f(3)"),
        Value::Bool(true)
    );
}

#[test]
fn spawned_thread_raised_error_surfaces_through_wait() {
    let err = run("f := func() { error(\"boom\") }; f.spawn().wait()").expect_err("should fail");
    assert_eq!(err.to_string(), "value error: boom");
}

#[test]
fn thread_done_reports_completion() {
    let source = "f := func(n) { n }
t := f.spawn(1)
t.wait()
t.done()";
    assert_eq!(run_ok(source), Value::Bool(true));
}

#[test]
fn cancelling_a_thread_is_observable_through_its_handle() {
    // the spawned function blocks forever on an empty channel
    let source = "blocked := func() { c := chan(); <-c }
t := blocked.spawn()
t.cancel()
t.wait()";
    let err = run(source).expect_err("wait should surface the cancellation");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
}

#[test]
fn values_flow_between_threads_through_channels() {
    let source = "c := chan(4)
results := chan(4)
worker := func() {
    for {
        v := <-c
        if v == nil { break }
        results <- v * 10
    }
}
worker.spawn()
c <- 1
c <- 2
close(c)
[<-results, <-results]";
    assert_eq!(
        run_ok(source),
        Value::list(vec![Value::Int(10), Value::Int(20)])
    );
}

#[test]
fn cancellation_interrupts_a_busy_loop() {
    let ctx = Context::new();
    let cancel_ctx = ctx.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        cancel_ctx.cancel();
    });
    let err = eval(&ctx, "for { }", &EvalOptions::new().with_concurrency())
        .expect_err("should be cancelled");
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    canceller.join().expect("canceller thread");
}

#[test]
fn concurrency_must_be_enabled() {
    let err = eval(&Context::new(), "chan(1)", &EvalOptions::new()).expect_err("should fail");
    assert_eq!(err.to_string(), "eval error: concurrency is not permitted");
    let err = eval(
        &Context::new(),
        "f := func() { 1 }; go f()",
        &EvalOptions::new(),
    )
    .expect_err("should fail");
    assert_eq!(err.to_string(), "eval error: concurrency is not permitted");
}

#[test]
fn defers_run_when_a_thread_is_cancelled() {
    // the defer closes the flag channel, which the main thread observes as
    // a nil receive once the cancelled thread has unwound
    let source = "flag := chan(1)
blocked := func() {
    defer close(flag)
    c := chan()
    <-c
}
t := blocked.spawn()
t.cancel()
try(func() { t.wait() })
<-flag";
    assert_eq!(run_ok(source), Value::Nil);
}
