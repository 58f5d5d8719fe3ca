// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime values.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use lull_ast::Stmt;

use crate::future::Future;

/// Hoisted variable storage of one driver, shared with the closures it
/// creates.
pub type Storage = Rc<RefCell<Vec<Value>>>;

#[derive(Clone)]
pub enum Value {
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
    Closure(Rc<Closure>),
    Future(Future<Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Closure(_) => "closure",
            Value::Future(_) => "future",
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            // Reference types compare by identity.
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Future(a), Value::Future(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Closure(c) => write!(f, "<closure/{}>", c.params.len()),
            Value::Future(_) => write!(f, "<future>"),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Future(fut) => write!(f, "<future {:?}>", fut.status()),
            other => write!(f, "{}", other),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Future<Value>> for Value {
    fn from(f: Future<Value>) -> Self {
        Value::Future(f)
    }
}

/// An anonymous function value.
///
/// Transient locals are copied in at creation; hoisted variables stay shared
/// through the driver's storage. The storage is held weakly: a closure kept
/// in a hoisted slot must not keep its own driver alive. Once the driver is
/// gone, the closure still runs but reads of hoisted variables fault.
pub struct Closure {
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub(crate) env: HashMap<String, Value>,
    pub(crate) storage: Weak<RefCell<Vec<Value>>>,
}
