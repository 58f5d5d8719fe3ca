// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Shared fixtures: lowering helpers and a host that records calls.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use lull_ast::{Method, Stmt};
use lull_lower::{transform, LowerConfig, StateChain};
use lull_rt::{Host, Value};

pub fn lower(name: &str, params: &[&str], body: Vec<Stmt>) -> Rc<StateChain> {
    let method = Method::new(name, params, body);
    let chain = transform(&method, &LowerConfig::default())
        .expect("method should lower")
        .expect("method should have suspension points");
    Rc::new(chain)
}

/// Host with `record(args..)` appending its arguments to a shared log.
pub fn recording_host() -> (Host, Rc<RefCell<Vec<Value>>>) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut host = Host::new();
    let sink = Rc::clone(&log);
    host.register("record", move |args| {
        sink.borrow_mut().extend(args.iter().cloned());
        Ok(Value::Unit)
    });
    (host, log)
}
