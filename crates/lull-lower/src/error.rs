// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Lowering errors.

use lull_ast::Span;
use thiserror::Error;

/// A method the transform refuses to split.
///
/// Fatal for the method: callers must reject compilation rather than emit a
/// partial chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoweringError {
    /// Suspension point nested somewhere it cannot be partially evaluated.
    #[error("suspension point inside {construct} cannot be split into states")]
    UnsupportedSuspension {
        construct: &'static str,
        span: Span,
    },

    /// Body contains both iterator and asynchronous suspension points.
    #[error("method `{method}` both yields and awaits")]
    MixedSuspension {
        method: String,
    },

    #[error("suspension point inside a finally block")]
    SuspensionInFinally {
        span: Span,
    },

    #[error("control cannot leave a finally block through `{keyword}`")]
    JumpOutOfFinally {
        keyword: &'static str,
        span: Span,
    },

    #[error("`{keyword}` outside of a loop")]
    JumpOutsideLoop {
        keyword: &'static str,
        span: Span,
    },

    #[error("iterator method cannot return a value; use `yield break`")]
    ReturnValueInIterator {
        span: Span,
    },

    #[error("state chain for `{method}` has {count} states (limit {limit})")]
    TooManyStates {
        method: String,
        count: usize,
        limit: usize,
    },
}

impl LoweringError {
    /// Source location of the offending construct, when there is one.
    pub fn span(&self) -> Option<Span> {
        match self {
            LoweringError::UnsupportedSuspension { span, .. }
            | LoweringError::SuspensionInFinally { span }
            | LoweringError::JumpOutOfFinally { span, .. }
            | LoweringError::JumpOutsideLoop { span, .. }
            | LoweringError::ReturnValueInIterator { span } => Some(*span),
            LoweringError::MixedSuspension { .. } | LoweringError::TooManyStates { .. } => None,
        }
    }
}
