// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Expression AST nodes.

use crate::stmt::Stmt;
use crate::{NodeId, Slot, Span};

/// An expression in the AST.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
    pub span: Span,
}

/// The kind of expression.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ExprKind {
    /// Unit literal
    Unit,
    /// Boolean literal
    Bool(bool),
    /// Integer literal
    Int(i64),
    /// String literal
    Str(String),
    /// Read of a local binding (or a host function name in callee position)
    Local(String),
    /// Binary operation
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Unary operation
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// Call. A `Local` callee with no binding in scope names a host function.
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// Wait for a pending result
    Await(Box<Expr>),
    /// Anonymous function. Its body is a separate method for suspension analysis.
    Lambda {
        params: Vec<String>,
        body: Vec<Stmt>,
    },
    /// Read of hoisted storage. Produced by lowering.
    Captured(Slot),
    /// The value supplied when the driver resumes. Produced by lowering.
    ///
    /// Evaluating it rethrows the resumption error, if any.
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnaryOp {
    Neg,
    Not,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self { id: NodeId::DUMMY, kind, span: Span::DUMMY }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn unit() -> Self {
        Self::new(ExprKind::Unit)
    }

    pub fn bool(value: bool) -> Self {
        Self::new(ExprKind::Bool(value))
    }

    pub fn int(value: i64) -> Self {
        Self::new(ExprKind::Int(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::new(ExprKind::Str(value.into()))
    }

    pub fn local(name: impl Into<String>) -> Self {
        Self::new(ExprKind::Local(name.into()))
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Self::new(ExprKind::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Self::new(ExprKind::Unary { op, operand: Box::new(operand) })
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call {
            callee: Box::new(Expr::local(callee)),
            args,
        })
    }

    pub fn call_value(callee: Expr, args: Vec<Expr>) -> Self {
        Self::new(ExprKind::Call { callee: Box::new(callee), args })
    }

    pub fn await_on(operand: Expr) -> Self {
        Self::new(ExprKind::Await(Box::new(operand)))
    }

    pub fn lambda(params: Vec<String>, body: Vec<Stmt>) -> Self {
        Self::new(ExprKind::Lambda { params, body })
    }

    pub fn captured(slot: Slot) -> Self {
        Self::new(ExprKind::Captured(slot))
    }

    pub fn resume() -> Self {
        Self::new(ExprKind::Resume)
    }

    /// The operand if this is a top-level `await`.
    pub fn as_await(&self) -> Option<&Expr> {
        match &self.kind {
            ExprKind::Await(inner) => Some(inner),
            _ => None,
        }
    }
}
