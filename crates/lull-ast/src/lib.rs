// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Method representation consumed by the lowering pass.
//!
//! Statements and expressions are closed tagged variants, one per construct,
//! so every pass over them is exhaustively checked. The parse layer that
//! produces these nodes lives elsewhere; this crate only defines the shapes
//! and a few construction helpers.

pub mod span;
pub mod expr;
pub mod stmt;
pub mod method;
mod display;

pub use span::Span;
pub use expr::{BinOp, Expr, ExprKind, UnaryOp};
pub use stmt::{CatchClause, Stmt, StmtKind};
pub use method::Method;

/// Unique identifier for AST nodes.
///
/// Nodes synthesized by passes (and by the construction helpers) carry
/// `NodeId::DUMMY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

impl NodeId {
    pub const DUMMY: NodeId = NodeId(u32::MAX);
}

/// Index into a driver's hoisted storage.
///
/// Only appears in bodies rewritten by the lowering pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Slot(pub u32);
