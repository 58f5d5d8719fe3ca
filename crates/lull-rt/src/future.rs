// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Single-threaded futures with continuation callbacks.
//!
//! A `Future` settles at most once, to a value or a fault. Only its paired
//! `CompletionSource` can settle it. Continuations run synchronously on the
//! stack of whoever settles the future, in attachment order; a continuation
//! attached after settlement runs immediately inside `continue_with`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::error::{InvalidTransitionError, RuntimeFault};

type Continuation<T> = Box<dyn FnOnce(Result<T, RuntimeFault>)>;

/// Settlement state of a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureStatus {
    Pending,
    Succeeded,
    Faulted,
}

struct Shared<T> {
    outcome: Option<Result<T, RuntimeFault>>,
    continuations: Vec<Continuation<T>>,
}

impl<T> Shared<T> {
    fn new(outcome: Option<Result<T, RuntimeFault>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self {
            outcome,
            continuations: Vec::new(),
        }))
    }
}

/// Read side of a one-shot result.
pub struct Future<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T: Clone + 'static> Future<T> {
    /// Already-succeeded future.
    pub fn from_value(value: T) -> Self {
        Self {
            shared: Shared::new(Some(Ok(value))),
        }
    }

    /// Already-faulted future.
    pub fn from_fault(fault: RuntimeFault) -> Self {
        Self {
            shared: Shared::new(Some(Err(fault))),
        }
    }

    pub fn status(&self) -> FutureStatus {
        match &self.shared.borrow().outcome {
            None => FutureStatus::Pending,
            Some(Ok(_)) => FutureStatus::Succeeded,
            Some(Err(_)) => FutureStatus::Faulted,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.shared.borrow().outcome.is_some()
    }

    /// Settled outcome, or `None` while pending.
    pub fn try_outcome(&self) -> Option<Result<T, RuntimeFault>> {
        self.shared.borrow().outcome.clone()
    }

    /// Settled value. A pending future reports `RuntimeFault::NotSettled`;
    /// there is nothing to block on in a single-threaded runtime.
    pub fn result(&self) -> Result<T, RuntimeFault> {
        self.try_outcome().unwrap_or(Err(RuntimeFault::NotSettled))
    }

    /// Run `callback` with the outcome once settled and return a future for
    /// its result.
    pub fn continue_with<U, F>(&self, callback: F) -> Future<U>
    where
        U: Clone + 'static,
        F: FnOnce(Result<T, RuntimeFault>) -> Result<U, RuntimeFault> + 'static,
    {
        let source = CompletionSource::new();
        let next = source.future();
        self.on_settled(move |outcome| {
            let settled = match callback(outcome) {
                Ok(value) => source.set_result(value),
                Err(fault) => source.set_exception(fault),
            };
            // Nothing else holds this source.
            debug_assert!(settled.is_ok());
        });
        next
    }

    fn on_settled(&self, f: impl FnOnce(Result<T, RuntimeFault>) + 'static) {
        // Clone out first: `f` may attach more continuations to this future.
        let outcome = self.shared.borrow().outcome.clone();
        match outcome {
            Some(outcome) => f(outcome),
            None => self.shared.borrow_mut().continuations.push(Box::new(f)),
        }
    }
}

impl<T> Future<T> {
    /// Both handles observe the same settlement.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

/// A future that never settles.
impl<T> Default for Future<T> {
    fn default() -> Self {
        Self {
            shared: Shared::new(None),
        }
    }
}

impl<T: Clone + 'static> fmt::Debug for Future<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Future").field("status", &self.status()).finish()
    }
}

/// Write side of a one-shot result. Not `Clone`: whoever holds it is the
/// only party that can settle the paired future.
pub struct CompletionSource<T> {
    shared: Rc<RefCell<Shared<T>>>,
}

impl<T: Clone + 'static> CompletionSource<T> {
    pub fn new() -> Self {
        Self {
            shared: Shared::new(None),
        }
    }

    /// The future this source settles.
    pub fn future(&self) -> Future<T> {
        Future {
            shared: Rc::clone(&self.shared),
        }
    }

    pub fn set_result(&self, value: T) -> Result<(), InvalidTransitionError> {
        self.settle(Ok(value))
    }

    pub fn set_exception(&self, fault: RuntimeFault) -> Result<(), InvalidTransitionError> {
        self.settle(Err(fault))
    }

    fn settle(&self, outcome: Result<T, RuntimeFault>) -> Result<(), InvalidTransitionError> {
        let continuations = {
            let mut shared = self.shared.borrow_mut();
            if shared.outcome.is_some() {
                return Err(InvalidTransitionError);
            }
            shared.outcome = Some(outcome.clone());
            std::mem::take(&mut shared.continuations)
        };

        tracing::trace!(
            ok = outcome.is_ok(),
            continuations = continuations.len(),
            "future settled"
        );
        for continuation in continuations {
            continuation(outcome.clone());
        }
        Ok(())
    }
}

impl<T: Clone + 'static> Default for CompletionSource<T> {
    fn default() -> Self {
        Self::new()
    }
}
