// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime error types.

use lull_lower::MethodKind;
use thiserror::Error;

use crate::value::Value;

/// An error raised while executing a state.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeFault {
    /// Raised by a `throw` statement.
    #[error("uncaught exception: {0}")]
    Thrown(Value),

    #[error("undefined variable `{0}`")]
    UndefinedVariable(String),

    #[error("undefined function `{0}`")]
    UndefinedFunction(String),

    #[error("{0}")]
    TypeError(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("expected {expected} argument{}, got {got}", if *.expected == 1 { "" } else { "s" })]
    ArityMismatch { expected: usize, got: usize },

    #[error("cannot await a non-future value `{0}`")]
    NotAwaitable(Value),

    #[error("future has not settled")]
    NotSettled,

    #[error("operation cancelled")]
    Cancelled,

    #[error("chain `{chain}` is not a {expected:?} method")]
    KindMismatch { chain: String, expected: MethodKind },

    /// A malformed chain reached a state it cannot execute.
    #[error("internal runtime error: {0}")]
    Internal(String),
}

impl RuntimeFault {
    /// Value bound by a `catch` clause for this fault.
    pub fn to_value(&self) -> Value {
        match self {
            RuntimeFault::Thrown(value) => value.clone(),
            other => Value::Str(other.to_string()),
        }
    }
}

/// A completion source was settled twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("future already settled")]
pub struct InvalidTransitionError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnumeratorError {
    /// The enumerator already finished, faulted, or was disposed.
    #[error("enumerator is exhausted")]
    Exhausted,

    #[error(transparent)]
    Fault(#[from] RuntimeFault),
}
