// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Driver core shared by the enumerator and async wrappers.
//!
//! Steps a state chain from its current state until the next suspension
//! point or completion. Faults are dispatched through the chain's handler
//! table: the innermost handler with a catch takes the fault; a handler with
//! only a finally runs it and rethrows afterwards.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use lull_lower::{MethodKind, StateChain, StateId, SuspendPoint, Terminator};

use crate::cancel::CancelToken;
use crate::error::RuntimeFault;
use crate::future::Future;
use crate::host::Host;
use crate::interp::Evaluator;
use crate::value::{Storage, Value};

/// Why `run` returned.
#[derive(Debug)]
pub(crate) enum Step {
    Yielded(Value),
    Awaiting(Future<Value>),
    Completed(Value),
}

/// What a finally state does once its body ran.
#[derive(Debug)]
enum PendingExit {
    Continue(StateId),
    Rethrow(RuntimeFault),
}

pub(crate) struct Machine {
    chain: Rc<StateChain>,
    host: Rc<Host>,
    storage: Storage,
    current: StateId,
    /// Keyed by finally state.
    pending: HashMap<StateId, PendingExit>,
    resumption: Option<Result<Value, RuntimeFault>>,
    return_value: Value,
    cancel: Option<CancelToken>,
}

impl Machine {
    pub fn new(
        chain: Rc<StateChain>,
        host: Rc<Host>,
        expected: MethodKind,
        args: Vec<Value>,
    ) -> Result<Self, RuntimeFault> {
        if chain.kind != expected {
            return Err(RuntimeFault::KindMismatch {
                chain: chain.name.clone(),
                expected,
            });
        }
        if args.len() != chain.params.len() {
            return Err(RuntimeFault::ArityMismatch {
                expected: chain.params.len(),
                got: args.len(),
            });
        }

        let mut slots = vec![Value::Unit; chain.captures.len()];
        for (slot, arg) in chain.params.iter().zip(args) {
            if let Some(cell) = slots.get_mut(slot.0 as usize) {
                *cell = arg;
            }
        }

        Ok(Self {
            chain,
            host,
            storage: Rc::new(RefCell::new(slots)),
            current: StateChain::ENTRY,
            pending: HashMap::new(),
            resumption: None,
            return_value: Value::Unit,
            cancel: None,
        })
    }

    pub fn chain(&self) -> &StateChain {
        &self.chain
    }

    pub fn set_cancel(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }

    /// Outcome the next state receives through `<resume>`.
    pub fn resume_with(&mut self, outcome: Result<Value, RuntimeFault>) {
        self.resumption = Some(outcome);
    }

    /// Run until a suspension point or completion. An `Err` is a fault no
    /// handler took; the machine must not be run again after it.
    pub fn run(&mut self) -> Result<Step, RuntimeFault> {
        loop {
            match self.step() {
                Ok(Some(step)) => return Ok(step),
                Ok(None) => {}
                Err(fault) => self.dispatch(fault)?,
            }
        }
    }

    /// Run the finally bodies covering the current state, innermost first,
    /// without resuming ordinary control flow. Returns the first fault
    /// raised; later finally bodies still run.
    pub fn unwind_finally(&mut self) -> Result<(), RuntimeFault> {
        let chain = Rc::clone(&self.chain);
        let mut first_fault = None;
        for fin in chain.enclosing_finally(self.current) {
            tracing::trace!(chain = %chain.name, state = %fin, "running finally on dispose");
            let mut eval = Evaluator::new(&self.host, &self.storage, None);
            if let Err(fault) = eval.exec_state(&chain.state(fin).statements) {
                first_fault.get_or_insert(fault);
            }
        }
        self.pending.clear();
        match first_fault {
            Some(fault) => Err(fault),
            None => Ok(()),
        }
    }

    /// Execute the current state. `Ok(None)` means control moved on to
    /// another state without leaving the machine.
    fn step(&mut self) -> Result<Option<Step>, RuntimeFault> {
        let chain = Rc::clone(&self.chain);
        let state = chain
            .states
            .get(self.current.0 as usize)
            .ok_or_else(|| RuntimeFault::Internal(format!("no state {}", self.current)))?;
        tracing::trace!(chain = %chain.name, state = %state.id, "enter state");

        let resumption = self.resumption.take();
        // Finally states, and the routes into them, run even after
        // cancellation.
        let in_finally = self.pending.contains_key(&state.id)
            || matches!(state.terminator, Terminator::EnterFinally { .. });
        if !in_finally && self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            return Err(RuntimeFault::Cancelled);
        }

        let mut eval = Evaluator::new(&self.host, &self.storage, resumption);
        eval.exec_state(&state.statements)?;

        match &state.terminator {
            Terminator::Goto(target) => {
                self.current = *target;
                Ok(None)
            }
            Terminator::Branch { cond, then_to, else_to } => {
                self.current = if eval.truthy(cond)? { *then_to } else { *else_to };
                Ok(None)
            }
            Terminator::Suspend { point, resume } => {
                let step = match point {
                    SuspendPoint::Yield(expr) => Step::Yielded(eval.eval(expr)?),
                    SuspendPoint::Await(expr) => match eval.eval(expr)? {
                        Value::Future(future) => Step::Awaiting(future),
                        other => return Err(RuntimeFault::NotAwaitable(other)),
                    },
                };
                self.current = *resume;
                Ok(Some(step))
            }
            Terminator::Return { value, target } => {
                if let Some(expr) = value {
                    self.return_value = eval.eval(expr)?;
                }
                match target {
                    Some(target) => {
                        self.current = *target;
                        Ok(None)
                    }
                    None => Ok(Some(Step::Completed(std::mem::replace(
                        &mut self.return_value,
                        Value::Unit,
                    )))),
                }
            }
            Terminator::EnterFinally { finally, then } => {
                self.pending.insert(*finally, PendingExit::Continue(*then));
                self.current = *finally;
                Ok(None)
            }
            Terminator::EndFinally => match self.pending.remove(&state.id) {
                Some(PendingExit::Continue(target)) => {
                    self.current = target;
                    Ok(None)
                }
                Some(PendingExit::Rethrow(fault)) => Err(fault),
                None => Err(RuntimeFault::Internal(format!(
                    "finally state {} entered without a pending exit",
                    state.id
                ))),
            },
            Terminator::Complete => {
                let value = std::mem::replace(&mut self.return_value, Value::Unit);
                Ok(Some(Step::Completed(value)))
            }
            Terminator::Unreachable => Err(RuntimeFault::Internal(format!(
                "entered unreachable state {}",
                state.id
            ))),
        }
    }

    /// Route `fault` to the nearest handler covering the current state.
    fn dispatch(&mut self, fault: RuntimeFault) -> Result<(), RuntimeFault> {
        let chain = Rc::clone(&self.chain);
        let mut covering = chain.state(self.current).handler;

        while let Some(id) = covering {
            let handler = chain.handler(id);
            if let Some(catch) = &handler.catch {
                tracing::trace!(chain = %chain.name, handler = %id, %fault, "fault caught");
                if let Some(slot) = catch.slot {
                    if let Some(cell) = self.storage.borrow_mut().get_mut(slot.0 as usize) {
                        *cell = fault.to_value();
                    }
                }
                self.current = catch.entry;
                return Ok(());
            }
            if let Some(fin) = handler.finally {
                self.pending.insert(fin, PendingExit::Rethrow(fault));
                self.current = fin;
                return Ok(());
            }
            covering = handler.parent;
        }

        tracing::debug!(chain = %chain.name, %fault, "fault escaped the chain");
        Err(fault)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lull_ast::{Expr, Method, Stmt};
    use lull_lower::{transform, LowerConfig};

    fn machine(kind: MethodKind, body: Vec<Stmt>, host: Host) -> Machine {
        let method = Method::new("m", &[], body);
        let chain = transform(&method, &LowerConfig::default()).unwrap().unwrap();
        Machine::new(Rc::new(chain), Rc::new(host), kind, vec![]).unwrap()
    }

    #[test]
    fn fault_in_try_runs_finally_then_escapes() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut host = Host::new();
        let sink = Rc::clone(&log);
        host.register("record", move |_| {
            sink.borrow_mut().push("finally");
            Ok(Value::Unit)
        });

        let mut m = machine(
            MethodKind::Iterator,
            vec![Stmt::try_finally(
                vec![
                    Stmt::yield_value(Expr::int(1)),
                    Stmt::throw(Expr::str("boom")),
                ],
                vec![Stmt::expr(Expr::call("record", vec![]))],
            )],
            host,
        );

        assert!(matches!(m.run(), Ok(Step::Yielded(Value::Int(1)))));
        let err = m.run().unwrap_err();
        assert_eq!(err, RuntimeFault::Thrown(Value::Str("boom".into())));
        assert_eq!(*log.borrow(), vec!["finally"]);
    }

    #[test]
    fn wrong_kind_rejected() {
        let method = Method::new("m", &[], vec![Stmt::yield_value(Expr::int(1))]);
        let chain = transform(&method, &LowerConfig::default()).unwrap().unwrap();
        let err = Machine::new(Rc::new(chain), Rc::new(Host::new()), MethodKind::Async, vec![])
            .err()
            .unwrap();
        assert!(matches!(err, RuntimeFault::KindMismatch { expected: MethodKind::Async, .. }));
    }

    #[test]
    fn awaiting_a_plain_value_faults() {
        let mut m = machine(
            MethodKind::Async,
            vec![Stmt::expr(Expr::await_on(Expr::int(3)))],
            Host::new(),
        );
        assert_eq!(m.run().unwrap_err(), RuntimeFault::NotAwaitable(Value::Int(3)));
    }
}
