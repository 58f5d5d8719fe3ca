// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runtime for lowered lull methods.
//!
//! Single-threaded and cooperative: a state runs to completion or to its one
//! suspension point, and continuations run on the stack of whoever settles
//! the awaited future.
//!
//! Components:
//! - future - one-shot `Future`/`CompletionSource` with continuations
//! - enumerator - pull driver for iterator chains
//! - async_driver - continuation driver for async chains
//! - cancel - cooperative cancellation observed at state entry
//! - host - explicit registry of native functions

pub mod async_driver;
pub mod cancel;
mod env;
pub mod enumerator;
pub mod error;
pub mod future;
pub mod host;
mod interp;
mod machine;
pub mod value;

pub use async_driver::AsyncDriver;
pub use cancel::CancelToken;
pub use enumerator::Enumerator;
pub use error::{EnumeratorError, InvalidTransitionError, RuntimeFault};
pub use future::{CompletionSource, Future, FutureStatus};
pub use host::Host;
pub use value::Value;
