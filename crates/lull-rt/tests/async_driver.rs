// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! End-to-end tests for lowered async methods.

mod common;

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lull_ast::{BinOp, Expr, Stmt};
use lull_rt::{AsyncDriver, CancelToken, CompletionSource, Future, FutureStatus, Host, RuntimeFault, Value};

use common::{lower, recording_host};

type Sources = Rc<RefCell<Vec<CompletionSource<Value>>>>;

/// Adds `ready(v)`, settled immediately, and `fetch()`, settled by the test
/// through the returned sources in call order.
fn async_host() -> (Host, Sources, Rc<RefCell<Vec<Value>>>) {
    let (mut host, log) = recording_host();
    let sources: Sources = Rc::new(RefCell::new(Vec::new()));
    host.register("ready", |args| {
        let value = args.first().cloned().unwrap_or(Value::Unit);
        Ok(Value::Future(Future::from_value(value)))
    });
    let pending = Rc::clone(&sources);
    host.register("fetch", move |_| {
        let source = CompletionSource::new();
        let future = source.future();
        pending.borrow_mut().push(source);
        Ok(Value::Future(future))
    });
    (host, sources, log)
}

fn await_call(name: &str, args: Vec<Expr>) -> Expr {
    Expr::await_on(Expr::call(name, args))
}

#[test]
fn settled_operands_complete_within_start() {
    let (host, _, _) = async_host();
    let chain = lower(
        "sum",
        &[],
        vec![
            Stmt::let_binding("x", await_call("ready", vec![Expr::int(1)])),
            Stmt::let_binding("y", await_call("ready", vec![Expr::int(2)])),
            Stmt::ret(Some(Expr::binary(BinOp::Add, Expr::local("x"), Expr::local("y")))),
        ],
    );
    let future = AsyncDriver::start(chain, Rc::new(host), vec![]);
    assert_eq!(future.result(), Ok(Value::Int(3)));
}

#[test]
fn pending_operand_resumes_on_settlement() {
    let (host, sources, log) = async_host();
    let chain = lower(
        "load",
        &[],
        vec![
            Stmt::let_binding("v", await_call("fetch", vec![])),
            Stmt::expr(Expr::call("record", vec![Expr::local("v")])),
            Stmt::ret(Some(Expr::binary(BinOp::Add, Expr::local("v"), Expr::int(1)))),
        ],
    );
    let future = AsyncDriver::start(chain, Rc::new(host), vec![]);

    assert_eq!(future.status(), FutureStatus::Pending);
    assert!(log.borrow().is_empty());

    let source = sources.borrow_mut().remove(0);
    source.set_result(Value::Int(41)).unwrap();

    assert_eq!(future.result(), Ok(Value::Int(42)));
    assert_eq!(*log.borrow(), vec![Value::Int(41)]);
}

#[test]
fn awaited_fault_is_caught_by_catch() {
    let (host, sources, _) = async_host();
    let chain = lower(
        "guarded",
        &[],
        vec![Stmt::try_catch(
            vec![Stmt::expr(await_call("fetch", vec![]))],
            Some("e"),
            vec![Stmt::ret(Some(Expr::binary(BinOp::Add, Expr::str("caught "), Expr::local("e"))))],
            None,
        )],
    );
    let future = AsyncDriver::start(chain, Rc::new(host), vec![]);
    let source = sources.borrow_mut().remove(0);
    source
        .set_exception(RuntimeFault::Thrown(Value::Str("bad".into())))
        .unwrap();
    assert_eq!(future.result(), Ok(Value::Str("caught bad".into())));
}

#[test]
fn unhandled_fault_faults_the_future_after_finally() {
    let (host, sources, log) = async_host();
    let chain = lower(
        "failing",
        &[],
        vec![Stmt::try_finally(
            vec![
                Stmt::expr(await_call("fetch", vec![])),
                Stmt::throw(Expr::str("late")),
            ],
            vec![Stmt::expr(Expr::call("record", vec![Expr::str("cleanup")]))],
        )],
    );
    let future = AsyncDriver::start(chain, Rc::new(host), vec![]);
    let source = sources.borrow_mut().remove(0);
    source.set_result(Value::Unit).unwrap();

    assert_eq!(future.status(), FutureStatus::Faulted);
    assert_eq!(future.result(), Err(RuntimeFault::Thrown(Value::Str("late".into()))));
    assert_eq!(*log.borrow(), vec![Value::Str("cleanup".into())]);
}

#[test]
fn cancellation_observed_at_next_state_runs_finally() {
    let (host, sources, log) = async_host();
    let chain = lower(
        "cancellable",
        &[],
        vec![Stmt::try_finally(
            vec![
                Stmt::expr(await_call("fetch", vec![])),
                Stmt::expr(Expr::call("record", vec![Expr::str("resumed")])),
            ],
            vec![Stmt::expr(Expr::call("record", vec![Expr::str("cleanup")]))],
        )],
    );
    let token = CancelToken::new();
    let future = AsyncDriver::new(chain, Rc::new(host), vec![])
        .unwrap()
        .with_cancel(token.clone())
        .run();

    token.cancel();
    let source = sources.borrow_mut().remove(0);
    source.set_result(Value::Unit).unwrap();

    assert_eq!(future.result(), Err(RuntimeFault::Cancelled));
    assert_eq!(*log.borrow(), vec![Value::Str("cleanup".into())]);
}

#[test]
fn cancellation_inside_try_body_still_runs_finally() {
    let (mut host, _, log) = async_host();
    let token = CancelToken::new();
    let trigger = token.clone();
    host.register("cancel_now", move |_| {
        trigger.cancel();
        Ok(Value::Unit)
    });
    let chain = lower(
        "self_cancelling",
        &[],
        vec![Stmt::try_finally(
            vec![
                Stmt::expr(await_call("ready", vec![])),
                Stmt::expr(Expr::call("cancel_now", vec![])),
            ],
            vec![Stmt::expr(Expr::call("record", vec![Expr::str("fin")]))],
        )],
    );
    let future = AsyncDriver::new(chain, Rc::new(host), vec![])
        .unwrap()
        .with_cancel(token)
        .run();

    assert_eq!(future.result(), Err(RuntimeFault::Cancelled));
    assert_eq!(*log.borrow(), vec![Value::Str("fin".into())]);
}

#[test]
fn awaited_loop_condition_is_reevaluated() {
    let (mut host, _, log) = async_host();
    let remaining = Rc::new(Cell::new(3u32));
    let counter = Rc::clone(&remaining);
    host.register("more", move |_| {
        let left = counter.get();
        counter.set(left.saturating_sub(1));
        Ok(Value::Future(Future::from_value(Value::Bool(left > 0))))
    });
    let chain = lower(
        "drain",
        &[],
        vec![
            Stmt::let_binding("n", Expr::int(0)),
            Stmt::while_loop(
                await_call("more", vec![]),
                vec![Stmt::assign("n", Expr::binary(BinOp::Add, Expr::local("n"), Expr::int(1)))],
            ),
            Stmt::expr(Expr::call("record", vec![Expr::local("n")])),
            Stmt::ret(Some(Expr::local("n"))),
        ],
    );
    let future = AsyncDriver::start(chain, Rc::new(host), vec![]);
    assert_eq!(future.result(), Ok(Value::Int(3)));
    assert_eq!(*log.borrow(), vec![Value::Int(3)]);
}

#[test]
fn drivers_awaiting_one_future_resume_in_attachment_order() {
    let (host, _, log) = async_host();
    let host = Rc::new(host);
    let shared = CompletionSource::new();
    let chain = lower(
        "tagged",
        &["tag", "f"],
        vec![
            Stmt::expr(Expr::await_on(Expr::local("f"))),
            Stmt::expr(Expr::call("record", vec![Expr::local("tag")])),
        ],
    );

    let first = AsyncDriver::start(
        Rc::clone(&chain),
        Rc::clone(&host),
        vec![Value::from("first"), Value::Future(shared.future())],
    );
    let second = AsyncDriver::start(
        chain,
        host,
        vec![Value::from("second"), Value::Future(shared.future())],
    );
    shared.set_result(Value::Unit).unwrap();

    assert_eq!(first.result(), Ok(Value::Unit));
    assert_eq!(second.result(), Ok(Value::Unit));
    assert_eq!(*log.borrow(), vec![Value::from("first"), Value::from("second")]);
}

#[test]
fn iterator_chain_rejected_through_future() {
    let chain = lower("gen", &[], vec![Stmt::yield_value(Expr::int(1))]);
    let future = AsyncDriver::start(chain, Rc::new(Host::new()), vec![]);
    assert!(matches!(future.result(), Err(RuntimeFault::KindMismatch { .. })));
}
