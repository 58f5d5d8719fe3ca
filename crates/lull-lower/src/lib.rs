// SPDX-License-Identifier: (MIT OR Apache-2.0)

//! Suspension lowering for the lull compiler.
//!
//! Rewrites methods containing `yield` or `await` into a [`StateChain`]: a
//! flat table of states, each running from one suspension point to the
//! next, plus the set of variables that must survive between them.

mod analyze;
mod builder;
mod capture;
mod chain;
mod compact;
mod config;
mod display;
mod error;
mod lower;
mod resolve;

pub use analyze::{has_suspension_points, SuspensionAnalyzer, SuspensionReport};
pub use builder::ChainBuilder;
pub use chain::{
    CaptureManifest, CaptureOrigin, CapturedVar, CatchTarget, Handler, HandlerId, MethodKind, State,
    StateChain, StateId, SuspendPoint, Terminator,
};
pub use config::LowerConfig;
pub use error::LoweringError;
pub use lower::transform;
