// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Statement and expression evaluation inside one state.
//!
//! States contain only statements that cannot suspend, so evaluation here
//! is plain recursive interpretation. Hoisted variables go through the
//! driver's storage; everything else lives in a frame dropped at the end of
//! the state.

use std::rc::Rc;

use lull_ast::{BinOp, Expr, ExprKind, Slot, Stmt, StmtKind, UnaryOp};

use crate::env::Frame;
use crate::error::RuntimeFault;
use crate::host::Host;
use crate::value::{Closure, Storage, Value};

/// Non-sequential exit from a statement.
#[derive(Debug)]
enum Unwind {
    Fault(RuntimeFault),
    Break,
    Continue,
    Return(Value),
}

impl From<RuntimeFault> for Unwind {
    fn from(fault: RuntimeFault) -> Self {
        Unwind::Fault(fault)
    }
}

pub(crate) struct Evaluator<'a> {
    host: &'a Host,
    storage: &'a Storage,
    frame: Frame,
    /// Outcome the resumed state receives through `<resume>`.
    resumption: Option<Result<Value, RuntimeFault>>,
}

impl<'a> Evaluator<'a> {
    pub fn new(host: &'a Host, storage: &'a Storage, resumption: Option<Result<Value, RuntimeFault>>) -> Self {
        Self {
            host,
            storage,
            frame: Frame::new(),
            resumption,
        }
    }

    /// Run a state's statements.
    pub fn exec_state(&mut self, stmts: &[Stmt]) -> Result<(), RuntimeFault> {
        match self.exec_block(stmts) {
            Ok(()) => Ok(()),
            Err(Unwind::Fault(fault)) => Err(fault),
            Err(other) => Err(RuntimeFault::Internal(format!(
                "{:?} escaped a state",
                other
            ))),
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeFault> {
        match &expr.kind {
            ExprKind::Unit => Ok(Value::Unit),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Int(n) => Ok(Value::Int(*n)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Local(name) => self
                .frame
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeFault::UndefinedVariable(name.clone())),
            ExprKind::Captured(slot) => self.load(*slot),
            ExprKind::Binary { op, left, right } => self.eval_binary(*op, left, right),
            ExprKind::Unary { op, operand } => {
                let value = self.eval(operand)?;
                match (op, value) {
                    (UnaryOp::Neg, Value::Int(n)) => Ok(Value::Int(n.wrapping_neg())),
                    (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
                    (op, value) => Err(RuntimeFault::TypeError(format!(
                        "cannot apply `{}` to {}",
                        op,
                        value.type_name()
                    ))),
                }
            }
            ExprKind::Call { callee, args } => self.eval_call(callee, args),
            ExprKind::Lambda { params, body } => Ok(Value::Closure(Rc::new(Closure {
                params: params.clone(),
                body: body.clone(),
                env: self.frame.snapshot(),
                storage: Rc::downgrade(self.storage),
            }))),
            ExprKind::Resume => match self.resumption.take() {
                Some(outcome) => outcome,
                None => Err(RuntimeFault::Internal("no resumption value".into())),
            },
            ExprKind::Await(_) => Err(RuntimeFault::Internal(
                "await reached the evaluator without being lowered".into(),
            )),
        }
    }

    /// Evaluate a condition.
    pub fn truthy(&mut self, expr: &Expr) -> Result<bool, RuntimeFault> {
        match self.eval(expr)? {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeFault::TypeError(format!(
                "condition must be bool, found {}",
                other.type_name()
            ))),
        }
    }

    fn load(&self, slot: Slot) -> Result<Value, RuntimeFault> {
        self.storage
            .borrow()
            .get(slot.0 as usize)
            .cloned()
            .ok_or_else(|| RuntimeFault::Internal(format!("no storage for slot {}", slot)))
    }

    fn store(&self, slot: Slot, value: Value) -> Result<(), RuntimeFault> {
        let mut storage = self.storage.borrow_mut();
        let cell = storage
            .get_mut(slot.0 as usize)
            .ok_or_else(|| RuntimeFault::Internal(format!("no storage for slot {}", slot)))?;
        *cell = value;
        Ok(())
    }

    fn exec_block(&mut self, stmts: &[Stmt]) -> Result<(), Unwind> {
        for stmt in stmts {
            self.exec_stmt(stmt)?;
        }
        Ok(())
    }

    fn exec_scoped(&mut self, stmts: &[Stmt]) -> Result<(), Unwind> {
        self.frame.push_scope();
        let result = self.exec_block(stmts);
        self.frame.pop_scope();
        result
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<(), Unwind> {
        match &stmt.kind {
            StmtKind::Let { name, init } => {
                let value = self.eval(init)?;
                self.frame.define(name.clone(), value);
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value)?;
                if !self.frame.assign(target, value) {
                    return Err(RuntimeFault::UndefinedVariable(target.clone()).into());
                }
            }
            StmtKind::Store { slot, value } => {
                let value = self.eval(value)?;
                self.store(*slot, value)?;
            }
            StmtKind::Expr(expr) => {
                self.eval(expr)?;
            }
            StmtKind::If { cond, then_branch, else_branch } => {
                if self.truthy(cond)? {
                    self.exec_scoped(then_branch)?;
                } else {
                    self.exec_scoped(else_branch)?;
                }
            }
            StmtKind::While { cond, body } => {
                while self.truthy(cond)? {
                    match self.exec_scoped(body) {
                        Ok(()) | Err(Unwind::Continue) => {}
                        Err(Unwind::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
            }
            StmtKind::Try { body, catch, finally } => {
                let mut result = self.exec_scoped(body);
                let caught = match &result {
                    Err(Unwind::Fault(fault)) => Some(fault.to_value()),
                    _ => None,
                };
                if let (Some(caught), Some(clause)) = (caught, catch) {
                    self.frame.push_scope();
                    if let Some(name) = &clause.binding {
                        self.frame.define(name.clone(), caught);
                    }
                    result = self.exec_block(&clause.body);
                    self.frame.pop_scope();
                }
                if let Some(fin) = finally {
                    // A jump or fault out of the finally body replaces the
                    // pending one.
                    self.exec_scoped(fin)?;
                }
                result?;
            }
            StmtKind::Throw(expr) => {
                let value = self.eval(expr)?;
                return Err(RuntimeFault::Thrown(value).into());
            }
            StmtKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr)?,
                    None => Value::Unit,
                };
                return Err(Unwind::Return(value));
            }
            StmtKind::Break => return Err(Unwind::Break),
            StmtKind::Continue => return Err(Unwind::Continue),
            StmtKind::Block(stmts) => self.exec_scoped(stmts)?,
            StmtKind::Yield(_) | StmtKind::YieldBreak => {
                return Err(RuntimeFault::Internal("yield outside a lowered state".into()).into());
            }
        }
        Ok(())
    }

    fn eval_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Result<Value, RuntimeFault> {
        // Short-circuit forms evaluate the right side only when needed.
        if matches!(op, BinOp::And | BinOp::Or) {
            let l = self.truthy(left)?;
            return match (op, l) {
                (BinOp::And, false) => Ok(Value::Bool(false)),
                (BinOp::Or, true) => Ok(Value::Bool(true)),
                _ => Ok(Value::Bool(self.truthy(right)?)),
            };
        }

        let l = self.eval(left)?;
        let r = self.eval(right)?;
        match (op, &l, &r) {
            (BinOp::Eq, _, _) => Ok(Value::Bool(l == r)),
            (BinOp::Ne, _, _) => Ok(Value::Bool(l != r)),
            (BinOp::Add, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_add(*b))),
            (BinOp::Sub, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_sub(*b))),
            (BinOp::Mul, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_mul(*b))),
            (BinOp::Div | BinOp::Rem, Value::Int(_), Value::Int(0)) => Err(RuntimeFault::DivisionByZero),
            (BinOp::Div, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_div(*b))),
            (BinOp::Rem, Value::Int(a), Value::Int(b)) => Ok(Value::Int(a.wrapping_rem(*b))),
            // String concatenation stringifies the other operand.
            (BinOp::Add, Value::Str(a), _) => Ok(Value::Str(format!("{}{}", a, r))),
            (BinOp::Add, _, Value::Str(b)) => Ok(Value::Str(format!("{}{}", l, b))),
            (BinOp::Lt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a < b)),
            (BinOp::Le, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a <= b)),
            (BinOp::Gt, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a > b)),
            (BinOp::Ge, Value::Int(a), Value::Int(b)) => Ok(Value::Bool(a >= b)),
            (BinOp::Lt, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a < b)),
            (BinOp::Gt, Value::Str(a), Value::Str(b)) => Ok(Value::Bool(a > b)),
            _ => Err(RuntimeFault::TypeError(format!(
                "cannot apply `{}` to {} and {}",
                op,
                l.type_name(),
                r.type_name()
            ))),
        }
    }

    fn eval_call(&mut self, callee: &Expr, args: &[Expr]) -> Result<Value, RuntimeFault> {
        // A bare name with no binding in scope is a host function.
        if let ExprKind::Local(name) = &callee.kind {
            if self.frame.get(name).is_none() {
                let args = self.eval_args(args)?;
                return self.host.call(name, &args);
            }
        }

        match self.eval(callee)? {
            Value::Closure(closure) => {
                let args = self.eval_args(args)?;
                call_closure(self.host, &closure, args)
            }
            other => Err(RuntimeFault::TypeError(format!(
                "cannot call a value of type {}",
                other.type_name()
            ))),
        }
    }

    fn eval_args(&mut self, args: &[Expr]) -> Result<Vec<Value>, RuntimeFault> {
        args.iter().map(|a| self.eval(a)).collect()
    }
}

fn call_closure(host: &Host, closure: &Closure, args: Vec<Value>) -> Result<Value, RuntimeFault> {
    if args.len() != closure.params.len() {
        return Err(RuntimeFault::ArityMismatch {
            expected: closure.params.len(),
            got: args.len(),
        });
    }

    let mut frame = Frame::with_bindings(closure.env.clone());
    frame.push_scope();
    for (param, arg) in closure.params.iter().zip(args) {
        frame.define(param.clone(), arg);
    }

    let storage = closure.storage.upgrade().unwrap_or_default();
    let mut eval = Evaluator {
        host,
        storage: &storage,
        frame,
        resumption: None,
    };
    match eval.exec_block(&closure.body) {
        Ok(()) => Ok(Value::Unit),
        Err(Unwind::Return(value)) => Ok(value),
        Err(Unwind::Fault(fault)) => Err(fault),
        Err(other) => Err(RuntimeFault::Internal(format!("{:?} escaped a closure", other))),
    }
}
