// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Push-based driver for async chains.
//!
//! Each `await` evaluates its operand to a future and attaches a
//! continuation that re-enters the driver at the resume state with the
//! settled outcome. The driver's own future settles when the chain completes
//! or a fault escapes it; faults never propagate synchronously to `start`.

use std::cell::RefCell;
use std::rc::Rc;

use lull_lower::{MethodKind, StateChain};

use crate::cancel::CancelToken;
use crate::error::RuntimeFault;
use crate::future::{CompletionSource, Future};
use crate::host::Host;
use crate::machine::{Machine, Step};
use crate::value::Value;

pub struct AsyncDriver {
    machine: Rc<RefCell<Machine>>,
    result: CompletionSource<Value>,
}

impl AsyncDriver {
    pub fn new(chain: Rc<StateChain>, host: Rc<Host>, args: Vec<Value>) -> Result<Self, RuntimeFault> {
        let machine = Machine::new(chain, host, MethodKind::Async, args)?;
        Ok(Self {
            machine: Rc::new(RefCell::new(machine)),
            result: CompletionSource::new(),
        })
    }

    /// Observe `token` on entry to every state.
    pub fn with_cancel(self, token: CancelToken) -> Self {
        self.machine.borrow_mut().set_cancel(token);
        self
    }

    /// Future settled with the method's return value.
    pub fn future(&self) -> Future<Value> {
        self.result.future()
    }

    /// Run until the first pending await and return the method's future.
    pub fn run(self) -> Future<Value> {
        let future = self.result.future();
        drive(self.machine, self.result);
        future
    }

    /// Create and run a driver. Argument or kind errors fault the returned
    /// future.
    pub fn start(chain: Rc<StateChain>, host: Rc<Host>, args: Vec<Value>) -> Future<Value> {
        match Self::new(chain, host, args) {
            Ok(driver) => driver.run(),
            Err(fault) => Future::from_fault(fault),
        }
    }
}

fn drive(machine: Rc<RefCell<Machine>>, result: CompletionSource<Value>) {
    loop {
        let step = machine.borrow_mut().run();
        match step {
            Ok(Step::Awaiting(awaited)) => {
                // Settled operands resume in this loop instead of recursing
                // through a continuation.
                if let Some(outcome) = awaited.try_outcome() {
                    machine.borrow_mut().resume_with(outcome);
                    continue;
                }
                awaited.continue_with(move |outcome| {
                    machine.borrow_mut().resume_with(outcome);
                    drive(machine, result);
                    Ok(())
                });
                return;
            }
            Ok(Step::Completed(value)) => {
                tracing::debug!(chain = %machine.borrow().chain().name, "async method completed");
                settle(&result, Ok(value));
                return;
            }
            Ok(Step::Yielded(_)) => {
                let fault = RuntimeFault::Internal("async chain yielded a value".into());
                settle(&result, Err(fault));
                return;
            }
            Err(fault) => {
                tracing::debug!(chain = %machine.borrow().chain().name, %fault, "async method faulted");
                settle(&result, Err(fault));
                return;
            }
        }
    }
}

fn settle(result: &CompletionSource<Value>, outcome: Result<Value, RuntimeFault>) {
    let settled = match outcome {
        Ok(value) => result.set_result(value),
        Err(fault) => result.set_exception(fault),
    };
    if let Err(err) = settled {
        // The driver owns the only settling path; a second settlement means
        // it was resumed twice.
        tracing::error!(%err, "async driver settled twice");
    }
}
