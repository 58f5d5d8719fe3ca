// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Pull-based driver for iterator chains.
//!
//! Single pass: once exhausted, by completion, fault or `dispose`, every
//! further `advance` fails with `EnumeratorError::Exhausted`. Iterate again
//! with a fresh enumerator.

use std::rc::Rc;

use lull_lower::{MethodKind, StateChain};

use crate::error::{EnumeratorError, RuntimeFault};
use crate::host::Host;
use crate::machine::{Machine, Step};
use crate::value::Value;

pub struct Enumerator {
    /// `None` once exhausted.
    machine: Option<Machine>,
    current: Option<Value>,
}

impl Enumerator {
    pub fn new(chain: Rc<StateChain>, host: Rc<Host>, args: Vec<Value>) -> Result<Self, RuntimeFault> {
        let machine = Machine::new(chain, host, MethodKind::Iterator, args)?;
        Ok(Self {
            machine: Some(machine),
            current: None,
        })
    }

    /// Run to the next `yield`. `Ok(false)` when the chain completes.
    pub fn advance(&mut self) -> Result<bool, EnumeratorError> {
        let machine = self.machine.as_mut().ok_or(EnumeratorError::Exhausted)?;
        match machine.run() {
            Ok(Step::Yielded(value)) => {
                self.current = Some(value);
                Ok(true)
            }
            Ok(Step::Completed(_)) => {
                self.finish();
                Ok(false)
            }
            Ok(Step::Awaiting(_)) => {
                self.finish();
                Err(RuntimeFault::Internal("iterator chain awaited a future".into()).into())
            }
            Err(fault) => {
                self.finish();
                Err(fault.into())
            }
        }
    }

    /// Most recently yielded value. `None` before the first successful
    /// `advance` and after exhaustion.
    pub fn current(&self) -> Option<&Value> {
        self.current.as_ref()
    }

    pub fn is_exhausted(&self) -> bool {
        self.machine.is_none()
    }

    /// Stop early, running the finally regions enclosing the paused
    /// position. A no-op once exhausted.
    pub fn dispose(&mut self) -> Result<(), RuntimeFault> {
        let Some(mut machine) = self.machine.take() else {
            return Ok(());
        };
        self.current = None;
        tracing::debug!(chain = %machine.chain().name, "enumerator disposed");
        machine.unwind_finally()
    }

    fn finish(&mut self) {
        if let Some(machine) = self.machine.take() {
            tracing::debug!(chain = %machine.chain().name, "enumerator exhausted");
        }
        self.current = None;
    }
}

/// Yields values until completion; a fault is produced once, then iteration
/// ends.
impl Iterator for Enumerator {
    type Item = Result<Value, RuntimeFault>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(true) => self.current.clone().map(Ok),
            Ok(false) | Err(EnumeratorError::Exhausted) => None,
            Err(EnumeratorError::Fault(fault)) => Some(Err(fault)),
        }
    }
}

/// Dropping a paused enumerator disposes it.
impl Drop for Enumerator {
    fn drop(&mut self) {
        if let Err(fault) = self.dispose() {
            tracing::warn!(%fault, "finally region faulted while dropping enumerator");
        }
    }
}
