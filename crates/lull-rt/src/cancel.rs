// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cooperative cancellation for async drivers.
//!
//! The driver checks the flag on entry to every state. Cancellation surfaces
//! as `RuntimeFault::Cancelled` through ordinary fault dispatch, so enclosing
//! finally regions still run.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared between a driver and whoever may cancel it.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next state entry.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}
